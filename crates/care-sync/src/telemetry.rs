use crate::config::{AppEnvironment, TelemetryConfig};
use crate::workflows::queue::WorkItem;
use std::fmt;
use tracing::{info_span, Span};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow the configured level; everything else stays at `warn`.
const SYNC_TARGETS: [&str; 2] = ["care_sync", "care_sync_worker"];

#[derive(Debug)]
pub enum TelemetryError {
    Filter { directives: String, source: ParseError },
    Install(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directives, .. } => {
                write!(f, "log filter '{directives}' cannot be parsed")
            }
            TelemetryError::Install(err) => write!(f, "tracing subscriber not installed: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Install(err) => Some(&**err),
        }
    }
}

/// Installs the process-wide subscriber. `RUST_LOG` wins over the configured
/// level. Development runs get colors and event targets; other environments
/// write plain lines for the scheduler's log capture.
pub fn init(config: &TelemetryConfig, environment: AppEnvironment) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.log_level)?,
    };
    let development = environment == AppEnvironment::Development;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(development)
        .with_ansi(development)
        .compact()
        .try_init()
        .map_err(TelemetryError::Install)
}

/// Span wrapping everything logged while one queue item is processed.
pub fn item_span(item: &WorkItem) -> Span {
    info_span!("work_item", id = item.id, citizen = %item.reference)
}

fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let directives = scoped_directives(level);
    EnvFilter::try_new(&directives)
        .map_err(|source| TelemetryError::Filter { directives, source })
}

/// A bare level such as `debug` applies to the sync crates only. Anything
/// with a target or a list is taken as written.
fn scoped_directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let mut directives = vec!["warn".to_string()];
    directives.extend(SYNC_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}
