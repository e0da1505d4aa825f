use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;

/// Rule parameters for the eligibility engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub recency_window_days: u32,
    pub placement_marker: String,
    pub fallback_organization: String,
    /// Canonical title of the follow-up task; its presence on the placement node
    /// suppresses recreation.
    pub task_title: String,
    pub task_type: String,
}

impl EngineConfig {
    pub fn recency_window(&self) -> Duration {
        Duration::days(i64::from(self.recency_window_days))
    }
}

impl From<&SyncConfig> for EngineConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            recency_window_days: config.recency_window_days,
            placement_marker: config.placement_marker.clone(),
            fallback_organization: config.fallback_organization.clone(),
            task_title: config.task_title.clone(),
            task_type: config.task_type.clone(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}
