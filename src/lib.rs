//! Wayfinder
//!
//! Destination resolution for a map screen: typed search with autocomplete, dropped pins
//! and manual overrides all compete for one active destination, and the newest input
//! always wins. A driving route is computed from the current location on request.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod services;
pub mod workflow;

pub use errors::WorkflowError;
pub use workflow::{DestinationWorkflow, WorkflowSettings, WorkflowState};
