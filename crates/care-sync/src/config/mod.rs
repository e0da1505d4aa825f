use std::env;
use std::fmt;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    pub sync: SyncConfig,
    pub paths: WorkerPaths,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            recency_window_days: positive_var("SYNC_RECENCY_WINDOW_DAYS")?
                .unwrap_or(defaults.recency_window_days),
            calendar_horizon_weeks: positive_var("SYNC_CALENDAR_HORIZON_WEEKS")?
                .unwrap_or(defaults.calendar_horizon_weeks),
            reference_path: string_var("SYNC_REFERENCE_PATH", defaults.reference_path),
            placement_marker: string_var("SYNC_PLACEMENT_MARKER", defaults.placement_marker),
            fallback_organization: string_var(
                "SYNC_FALLBACK_ORGANIZATION",
                defaults.fallback_organization,
            ),
            task_title: string_var("SYNC_TASK_TITLE", defaults.task_title),
            task_type: string_var("SYNC_TASK_TYPE", defaults.task_type),
            task_billing_name: string_var("SYNC_TASK_BILLING_NAME", defaults.task_billing_name),
            close_billing_name: string_var(
                "SYNC_CLOSE_BILLING_NAME",
                defaults.close_billing_name,
            ),
        };

        let paths = WorkerPaths {
            snapshot: path_var("SYNC_SNAPSHOT_PATH", "data/snapshot.json"),
            queue: path_var("SYNC_QUEUE_PATH", "data/queue.json"),
            billing_ledger: path_var("SYNC_BILLING_LEDGER_PATH", "data/billing.csv"),
            reference_data: env::var("SYNC_REFERENCE_DATA_DIR")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        };

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            sync,
            paths,
        })
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Tunables for the intervention sync rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// References modified within this many days are left alone.
    pub recency_window_days: u32,
    pub calendar_horizon_weeks: u32,
    pub reference_path: String,
    /// Exact name of the reference holding the citizen's care placement.
    pub placement_marker: String,
    pub fallback_organization: String,
    pub task_title: String,
    pub task_type: String,
    pub task_billing_name: String,
    pub close_billing_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            recency_window_days: 14,
            calendar_horizon_weeks: 26,
            reference_path: "/Sundhedsfagligt grundforløb/*/Indsatser/basketGrantReference"
                .to_string(),
            placement_marker: "ÆHF - Forløbsindplacering (Grundforløb)".to_string(),
            fallback_organization: "Sygeplejerådgivere fysisk".to_string(),
            task_title: "Slutliste sygepleje".to_string(),
            task_type: "Tværfagligt samarbejde".to_string(),
            task_billing_name: "Slutlister sygepleje".to_string(),
            close_billing_name: "Afslutning af indsats".to_string(),
        }
    }
}

/// File locations used by the worker binary's adapters.
#[derive(Debug, Clone)]
pub struct WorkerPaths {
    pub snapshot: PathBuf,
    pub queue: PathBuf,
    pub billing_ledger: PathBuf,
    pub reference_data: Option<PathBuf>,
}

fn string_var(name: &str, default: String) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default)
}

fn path_var(name: &str, default: &str) -> PathBuf {
    PathBuf::from(string_var(name, default.to_string()))
}

fn positive_var(name: &'static str) -> Result<Option<u32>, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };

    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidNumber { name, value: raw }),
        Ok(value) => Ok(Some(value)),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be a positive integer, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
