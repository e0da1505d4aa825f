use crate::config::ConfigError;
use crate::reference_data::ReferenceDataError;
use crate::telemetry::TelemetryError;
use crate::workflows::queue::{PopulationError, QueueError};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    ReferenceData(ReferenceDataError),
    Queue(QueueError),
    Population(PopulationError),
    Snapshot(String),
    Worker(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::ReferenceData(err) => write!(f, "reference data error: {}", err),
            AppError::Queue(err) => write!(f, "work queue error: {}", err),
            AppError::Population(err) => write!(f, "queue population error: {}", err),
            AppError::Snapshot(detail) => write!(f, "invalid case snapshot: {}", detail),
            AppError::Worker(detail) => write!(f, "worker task failed: {}", detail),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::ReferenceData(err) => Some(err),
            AppError::Queue(err) => Some(err),
            AppError::Population(err) => Some(err),
            AppError::Snapshot(_) | AppError::Worker(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ReferenceDataError> for AppError {
    fn from(value: ReferenceDataError) -> Self {
        Self::ReferenceData(value)
    }
}

impl From<QueueError> for AppError {
    fn from(value: QueueError) -> Self {
        Self::Queue(value)
    }
}

impl From<PopulationError> for AppError {
    fn from(value: PopulationError) -> Self {
        Self::Population(value)
    }
}
