//! Property-based tests for destination sequencing.
//!
//! Inputs are issued in random order while provider responses are released in a
//! different random order; the last input must always win.

mod common;

use common::{catalog_place, coord, TestMap};
use proptest::prelude::*;
use wayfinder::{
    events::Event,
    models::{CompletionCandidate, Coordinate, CoordinateRegion},
    services::LocationProvider,
    workflow::{DestinationSource, Sequencer},
};

const PLACES: [&str; 6] = [
    "Calgary Tower",
    "Calgary Zoo",
    "Central Library",
    "Peace Bridge",
    "Nose Hill Park",
    "Stampede Park",
];

#[derive(Debug, Clone)]
enum Input {
    Search(usize),
    Suggestion(usize),
    Pin(f64, f64),
    Override(f64, f64),
}

impl Input {
    /// Gate key of the provider call this input makes, if any
    fn gate(&self) -> Option<String> {
        match self {
            Input::Search(i) => Some(format!("search:{}", PLACES[*i])),
            Input::Suggestion(i) => Some(format!("resolve:{}", PLACES[*i])),
            Input::Pin(..) | Input::Override(..) => None,
        }
    }

    fn expected(&self) -> (Coordinate, DestinationSource) {
        match self {
            Input::Search(i) => (catalog_place(PLACES[*i]).coordinate, DestinationSource::Search),
            Input::Suggestion(i) => (
                catalog_place(PLACES[*i]).coordinate,
                DestinationSource::Suggestion,
            ),
            Input::Pin(lat, lon) => (coord(*lat, *lon), DestinationSource::Pin),
            Input::Override(lat, lon) => (coord(*lat, *lon), DestinationSource::Override),
        }
    }
}

fn input_strategy() -> impl Strategy<Value = Input> {
    let place = 0..PLACES.len();
    let lat = 50.8f64..51.3;
    let lon = -114.4f64..-113.8;
    prop_oneof![
        place.clone().prop_map(Input::Search),
        place.prop_map(Input::Suggestion),
        (lat.clone(), lon.clone()).prop_map(|(a, o)| Input::Pin(a, o)),
        (lat, lon).prop_map(|(a, o)| Input::Override(a, o)),
    ]
}

/// A sequence of inputs plus the order in which their responses are released
fn scenario_strategy() -> impl Strategy<Value = (Vec<Input>, Vec<usize>)> {
    prop::collection::vec(input_strategy(), 1..8).prop_flat_map(|inputs| {
        let order: Vec<usize> = (0..inputs.len()).collect();
        (Just(inputs), Just(order).prop_shuffle())
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn last_input_wins_regardless_of_response_order((inputs, order) in scenario_strategy()) {
        runtime().block_on(async {
            let mut map = TestMap::new(LocationProvider::pending());
            for key in inputs.iter().filter_map(Input::gate) {
                map.gates.hold(&key);
            }

            for input in &inputs {
                match input {
                    Input::Search(i) => {
                        map.workflow.on_free_text_search_submitted(PLACES[*i]);
                    }
                    Input::Suggestion(i) => {
                        map.workflow.on_suggestion_chosen(CompletionCandidate::new(PLACES[*i], ""));
                    }
                    Input::Pin(lat, lon) => {
                        map.workflow.on_map_long_press(coord(*lat, *lon));
                    }
                    Input::Override(lat, lon) => {
                        map.workflow.override_destination(coord(*lat, *lon));
                    }
                }
            }

            for index in order {
                if let Some(key) = inputs[index].gate() {
                    map.gates.release(&key);
                }
                tokio::task::yield_now().await;
            }
            map.workflow.idle().await;

            let (coordinate, source) = inputs[inputs.len() - 1].expected();
            let destination = map.workflow.state().destination;
            prop_assert!(destination.is_some());
            let destination = destination.unwrap();
            prop_assert_eq!(destination.coordinate, coordinate);
            prop_assert_eq!(destination.source, source);

            let applied: Vec<u64> = map
                .drain_events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::DestinationChanged(d) => Some(d.request_id.value()),
                    _ => None,
                })
                .collect();
            prop_assert!(
                applied.windows(2).all(|w| w[0] < w[1]),
                "applied ids must strictly increase: {:?}",
                applied
            );
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn only_the_latest_id_is_current(issued in 1usize..50, pick in 0usize..50) {
        let sequencer = Sequencer::new();
        let ids: Vec<_> = (0..issued).map(|_| sequencer.next()).collect();
        let last = ids[ids.len() - 1];

        prop_assert!(sequencer.is_current(last));
        let pick = ids[pick % ids.len()];
        prop_assert_eq!(sequencer.is_current(pick), pick == last);

        sequencer.invalidate();
        prop_assert!(!sequencer.is_current(last));
    }

    #[test]
    fn coordinates_validate_their_range(lat in -200.0f64..200.0, lon in -400.0f64..400.0) {
        let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
        prop_assert_eq!(Coordinate::new(lat, lon).is_ok(), valid);
    }

    #[test]
    fn bounding_region_contains_every_point(
        points in prop::collection::vec((-60.0f64..60.0, -170.0f64..170.0), 1..20),
        padding in 1.05f64..3.0,
    ) {
        let points: Vec<Coordinate> = points.into_iter().map(|(a, o)| coord(a, o)).collect();
        let region = CoordinateRegion::bounding(&points, padding).unwrap();
        prop_assert!(points.iter().all(|p| region.contains(p)));
    }
}
