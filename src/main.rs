use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use wayfinder::{
    config::{self, AppConfig},
    errors::Notice,
    events::Event,
    models::Coordinate,
    services::{
        simulated::{SimulatedGeocoder, SimulatedLocation, SimulatedRouter, SimulatedScenes},
        LocationProvider, MapServices, PlaceAutocompleteService,
    },
    workflow::{DestinationWorkflow, WorkflowState},
};

#[derive(Parser)]
#[command(
    name = "wayfinder",
    about = "Resolve destinations and routes against the built-in Calgary catalog",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Free-text place search; the first match becomes the destination
    Search(SearchArgs),
    /// Autocomplete suggestions for partial text
    Complete(CompleteArgs),
    /// Drop a pin and fetch its street-level preview
    Pin(PinArgs),
    /// Route from a position to a coordinate or searched place
    Route(RouteArgs),
}

#[derive(Args)]
struct SearchArgs {
    #[arg(help = "Place name or address", required = true, num_args = 1..)]
    query: Vec<String>,
}

#[derive(Args)]
struct CompleteArgs {
    #[arg(help = "Partial query text", required = true, num_args = 1..)]
    text: Vec<String>,
}

#[derive(Args)]
struct PinArgs {
    #[arg(help = "Coordinate as lat,lon", allow_hyphen_values = true)]
    at: Coordinate,
}

#[derive(Args)]
struct RouteArgs {
    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Current position as lat,lon; omitted means location access is denied"
    )]
    from: Option<Coordinate>,
    #[arg(
        long,
        allow_hyphen_values = true,
        conflicts_with = "query",
        required_unless_present = "query",
        help = "Destination as lat,lon"
    )]
    to: Option<Coordinate>,
    #[arg(long, help = "Destination found by free-text search")]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    match cli.command {
        Commands::Search(args) => handle_search(&config, args, cli.json).await?,
        Commands::Complete(args) => handle_complete(&config, args, cli.json).await?,
        Commands::Pin(args) => handle_pin(&config, args, cli.json).await?,
        Commands::Route(args) => handle_route(&config, args, cli.json).await?,
    }

    Ok(())
}

/// A workflow wired to the simulated providers, plus its event stream
struct Session {
    workflow: DestinationWorkflow,
    events: broadcast::Receiver<Event>,
}

impl Session {
    fn new(config: &AppConfig, location: LocationProvider) -> Result<Self> {
        let latency = config.simulated_latency();
        let geocoder = Arc::new(SimulatedGeocoder::calgary(latency));
        let services = MapServices::new(
            geocoder.clone(),
            Arc::new(SimulatedRouter::new(config.simulated_speed_kmh, latency)),
            Arc::new(SimulatedScenes::new(None, latency)),
        );
        let autocomplete = PlaceAutocompleteService::new(geocoder, config.autocomplete_settings());
        let settings = config
            .workflow_settings()
            .context("invalid workflow settings")?;

        let workflow = DestinationWorkflow::new(services, autocomplete, location, settings);
        let events = workflow.subscribe_events();
        Ok(Self { workflow, events })
    }

    /// Waits for outstanding requests, then returns the notices raised so far
    async fn settle(&mut self) -> Vec<Notice> {
        self.workflow.idle().await;

        let mut notices = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(Event::Notice(notice)) => notices.push(notice),
                Ok(event) => debug!(?event, "workflow event"),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "event stream lagged");
                }
                Err(_) => break,
            }
        }
        notices
    }

    fn state(&self) -> WorkflowState {
        self.workflow.state()
    }
}

async fn handle_search(config: &AppConfig, args: SearchArgs, json: bool) -> Result<()> {
    let mut session = Session::new(config, LocationProvider::pending())?;
    let query = args.query.join(" ");

    if session.workflow.on_free_text_search_submitted(&query).is_none() {
        return Err(anyhow!("search query is blank"));
    }
    let notices = session.settle().await;
    let state = session.state();

    if json {
        return print_json(&state);
    }
    match &state.destination {
        Some(destination) => render_destination(destination),
        None if notices.is_empty() => println!("No places match \"{}\"", query),
        None => {}
    }
    render_notices(&notices);
    Ok(())
}

async fn handle_complete(config: &AppConfig, args: CompleteArgs, json: bool) -> Result<()> {
    let mut session = Session::new(config, LocationProvider::pending())?;
    let text = args.text.join(" ");

    let mut errors = session.workflow.autocomplete().errors();
    session.workflow.on_search_text_changed(&text);
    let mut notices = session.settle().await;
    while let Ok(notice) = errors.try_recv() {
        notices.push(notice);
    }
    let suggestions = session.workflow.suggestions();

    if json {
        return print_json(&suggestions);
    }
    if suggestions.candidates.is_empty() {
        println!("No suggestions for \"{}\"", text);
    }
    for candidate in &suggestions.candidates {
        if candidate.subtitle.is_empty() {
            println!("- {}", candidate.title);
        } else {
            println!("- {} • {}", candidate.title, candidate.subtitle);
        }
    }
    render_notices(&notices);
    Ok(())
}

async fn handle_pin(config: &AppConfig, args: PinArgs, json: bool) -> Result<()> {
    let mut session = Session::new(config, LocationProvider::pending())?;

    session.workflow.on_map_long_press(args.at);
    let notices = session.settle().await;
    let state = session.state();

    if json {
        return print_json(&state);
    }
    if let Some(destination) = &state.destination {
        render_destination(destination);
    }
    match &state.preview {
        Some(scene) => println!("Preview scene {} at {}", scene.id, scene.coordinate),
        None => println!("No preview available"),
    }
    render_notices(&notices);
    Ok(())
}

async fn handle_route(config: &AppConfig, args: RouteArgs, json: bool) -> Result<()> {
    let source = match args.from {
        Some(from) => SimulatedLocation::at(from),
        None => SimulatedLocation::denied(),
    };
    let location = LocationProvider::start(Arc::new(source));
    location.wait_for_fix().await;

    let mut session = Session::new(config, location)?;
    match (args.to, args.query.as_deref()) {
        (Some(to), _) => {
            session.workflow.override_destination(to);
        }
        (None, Some(query)) => {
            session.workflow.on_free_text_search_submitted(query);
        }
        (None, None) => return Err(anyhow!("either --to or --query is required")),
    }
    let mut notices = session.settle().await;

    // A rejected request raises its notice synchronously; settle collects it either way
    if let Err(err) = session.workflow.request_route() {
        debug!(error = %err, "route request rejected");
    }
    notices.extend(session.settle().await);
    let state = session.state();

    if json {
        return print_json(&state);
    }
    if let Some(destination) = &state.destination {
        render_destination(destination);
    }
    if let Some(route) = &state.route {
        println!(
            "Route {} → {}: {:.1} km, about {} min ({})",
            route.origin,
            route.destination,
            route.route.distance_meters / 1000.0,
            (route.route.expected_travel_time.as_secs() + 59) / 60,
            route.route.transport
        );
    }
    render_notices(&notices);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_destination(destination: &wayfinder::workflow::Destination) {
    match &destination.place {
        Some(place) => println!(
            "Destination {} • {} ({}, {})",
            place.name,
            place.address.as_deref().unwrap_or("no address"),
            destination.coordinate,
            destination.source
        ),
        None => println!(
            "Destination {} ({})",
            destination.coordinate, destination.source
        ),
    }
}

fn render_notices(notices: &[Notice]) {
    for notice in notices {
        eprintln!("! [{}] {}", notice.kind, notice.message);
    }
}
