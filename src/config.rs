use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::errors::WorkflowError;
use crate::models::{Coordinate, CoordinateRegion, TransportType};
use crate::services::AutocompleteSettings;
use crate::workflow::WorkflowSettings;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_AUTOCOMPLETE_DEBOUNCE_MS: u64 = 250;
// Downtown Calgary
const DEFAULT_REGION_LATITUDE: f64 = 51.0447;
const DEFAULT_REGION_LONGITUDE: f64 = -114.0719;
const DEFAULT_REGION_SPAN_DEGREES: f64 = 0.5;
const DEFAULT_SUGGESTION_SPAN_DEGREES: f64 = 0.01;
const DEFAULT_ROUTE_PADDING_FACTOR: f64 = 1.3;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_SIMULATED_SPEED_KMH: f64 = 50.0;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Upper bound for every provider call (1s - 2min)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 120))]
    pub request_timeout_secs: u64,

    /// Quiet period before an autocomplete query goes out, 0 = disabled
    #[serde(default = "default_autocomplete_debounce_ms")]
    #[validate(range(max = 5000))]
    pub autocomplete_debounce_ms: u64,

    /// Search bias center
    #[serde(default = "default_region_latitude")]
    #[validate(custom = "validate_latitude")]
    pub default_region_latitude: f64,
    #[serde(default = "default_region_longitude")]
    #[validate(custom = "validate_longitude")]
    pub default_region_longitude: f64,
    #[serde(default = "default_region_span_degrees")]
    #[validate(custom = "validate_span")]
    pub default_region_span_degrees: f64,

    /// Camera span after a chosen suggestion resolves
    #[serde(default = "default_suggestion_span_degrees")]
    #[validate(custom = "validate_span")]
    pub suggestion_span_degrees: f64,

    /// Camera padding around a route, as a multiple of its bounding box
    #[serde(default = "default_route_padding_factor")]
    #[validate(range(min = 1.0, max = 10.0))]
    pub route_padding_factor: f64,

    /// Mode used for route requests
    #[serde(default)]
    pub transport: TransportType,

    /// Buffered events per subscriber before it starts lagging
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Artificial delay added by the simulated providers
    #[serde(default)]
    #[validate(range(max = 60_000))]
    pub simulated_latency_ms: u64,

    /// Average speed of the simulated router
    #[serde(default = "default_simulated_speed_kmh")]
    #[validate(range(min = 1.0, max = 300.0))]
    pub simulated_speed_kmh: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            request_timeout_secs: default_request_timeout_secs(),
            autocomplete_debounce_ms: default_autocomplete_debounce_ms(),
            default_region_latitude: default_region_latitude(),
            default_region_longitude: default_region_longitude(),
            default_region_span_degrees: default_region_span_degrees(),
            suggestion_span_degrees: default_suggestion_span_degrees(),
            route_padding_factor: default_route_padding_factor(),
            transport: TransportType::default(),
            event_channel_capacity: default_event_channel_capacity(),
            simulated_latency_ms: 0,
            simulated_speed_kmh: default_simulated_speed_kmh(),
        }
    }
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEFAULT_ENV)
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_region(&self) -> Result<CoordinateRegion, WorkflowError> {
        let center = Coordinate::new(self.default_region_latitude, self.default_region_longitude)?;
        Ok(CoordinateRegion::around(
            center,
            self.default_region_span_degrees,
        ))
    }

    pub fn workflow_settings(&self) -> Result<WorkflowSettings, WorkflowError> {
        Ok(WorkflowSettings {
            request_timeout: self.request_timeout(),
            default_region: self.default_region()?,
            suggestion_span_degrees: self.suggestion_span_degrees,
            route_padding_factor: self.route_padding_factor,
            event_capacity: self.event_channel_capacity,
            transport: self.transport,
        })
    }

    pub fn autocomplete_settings(&self) -> AutocompleteSettings {
        AutocompleteSettings {
            debounce: Duration::from_millis(self.autocomplete_debounce_ms),
            timeout: self.request_timeout(),
        }
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_autocomplete_debounce_ms() -> u64 {
    DEFAULT_AUTOCOMPLETE_DEBOUNCE_MS
}
fn default_region_latitude() -> f64 {
    DEFAULT_REGION_LATITUDE
}
fn default_region_longitude() -> f64 {
    DEFAULT_REGION_LONGITUDE
}
fn default_region_span_degrees() -> f64 {
    DEFAULT_REGION_SPAN_DEGREES
}
fn default_suggestion_span_degrees() -> f64 {
    DEFAULT_SUGGESTION_SPAN_DEGREES
}
fn default_route_padding_factor() -> f64 {
    DEFAULT_ROUTE_PADDING_FACTOR
}
fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
fn default_simulated_speed_kmh() -> f64 {
    DEFAULT_SIMULATED_SPEED_KMH
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_latitude(latitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || latitude.abs() > 90.0 {
        let mut err = ValidationError::new("latitude");
        err.message = Some("latitude must be within [-90, 90]".into());
        return Err(err);
    }
    Ok(())
}

fn validate_longitude(longitude: f64) -> Result<(), ValidationError> {
    if !longitude.is_finite() || longitude.abs() > 180.0 {
        let mut err = ValidationError::new("longitude");
        err.message = Some("longitude must be within [-180, 180]".into());
        return Err(err);
    }
    Ok(())
}

fn validate_span(degrees: f64) -> Result<(), ValidationError> {
    if !degrees.is_finite() || degrees <= 0.0 || degrees > 180.0 {
        let mut err = ValidationError::new("span_degrees");
        err.message = Some("span must be a finite number of degrees in (0, 180]".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter.
///
/// `RUST_LOG` wins when set. Output goes to stderr so command output stays clean.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("wayfinder={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let builder = fmt()
        .with_env_filter(filter_directive)
        .with_writer(std::io::stderr);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Loads application configuration from `config/`
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory
pub fn load_config_from(dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(dir.join("default")).required(false))
        .add_source(File::from(dir.join(&run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
