//! Static approved-value lists and the placement → organization table.
//!
//! The built-in tables mirror the lists maintained by the home-care unit. A
//! deployment may override any of them by dropping a CSV export into the
//! reference-data directory.

mod normalizer;
mod parser;

pub use normalizer::normalize_name;

use crate::workflows::assignments::domain::WorkflowState;
use parser::{ExcludedCitizenRow, NameRow, PlacementRow};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const ORGANIZATIONS: &[&str] = &[
    "Sygeplejen Nord",
    "Sygeplejen Syd",
    "Sygeplejen Øst",
    "Sygeplejen Vest",
    "Sygeplejen Centrum",
    "Sygeplejerådgivere fysisk",
];

const INTERVENTIONS: &[&str] = &[
    "Sygepleje",
    "Medicinadministration",
    "Medicindispensering",
    "Sårpleje",
    "Kateterpleje",
    "Stomipleje",
    "Injektioner",
    "Blodprøvetagning",
    "Observation af helbredstilstand",
];

const PLACEMENTS: &[(&str, &str)] = &[
    ("Lette sygeplejeopgaver", "Sygeplejerådgivere fysisk"),
    ("Rehabiliterende forløb", "Sygeplejerådgivere fysisk"),
    ("Komplekse sygeplejeopgaver", "Sygeplejen Centrum"),
    ("Palliative forløb", "Palliativt team"),
    ("Forebyggende forløb", "Sygeplejerådgivere fysisk"),
];

const EXCLUDED_CITIZENS: &[&str] = &["2512489996", "0101709995"];

const EXCLUDED_STATUSES: &[&str] = &["Indlagt"];

static STANDARD: OnceLock<ReferenceData> = OnceLock::new();

/// Maps a placement name to the organization responsible for follow-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementMapping {
    entries: BTreeMap<String, String>,
}

impl PlacementMapping {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, organization)| (normalize_name(name.as_ref()), organization.into()))
                .collect(),
        }
    }

    pub fn organization_for(&self, placement: &str) -> Option<&str> {
        self.entries
            .get(&normalize_name(placement))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Approved-value lists consulted by the queue population and the sync rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceData {
    approved_organizations: BTreeSet<String>,
    approved_interventions: BTreeSet<String>,
    approved_states: BTreeSet<WorkflowState>,
    placements: PlacementMapping,
    excluded_citizens: BTreeSet<String>,
    excluded_statuses: BTreeSet<String>,
}

impl ReferenceData {
    /// Built-in tables.
    pub fn standard() -> Self {
        STANDARD
            .get_or_init(|| Self {
                approved_organizations: ORGANIZATIONS.iter().map(|name| normalize_name(name)).collect(),
                approved_interventions: INTERVENTIONS.iter().map(|name| normalize_name(name)).collect(),
                approved_states: [
                    WorkflowState::Ordered,
                    WorkflowState::Granted,
                    WorkflowState::Changed,
                    WorkflowState::CreatedAcute,
                ]
                .into_iter()
                .collect(),
                placements: PlacementMapping::new(PLACEMENTS.iter().copied()),
                excluded_citizens: EXCLUDED_CITIZENS.iter().map(|id| id.to_string()).collect(),
                excluded_statuses: EXCLUDED_STATUSES.iter().map(|name| normalize_name(name)).collect(),
            })
            .clone()
    }

    /// Built-in tables overlaid with any CSV exports found in `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ReferenceDataError> {
        let dir = dir.as_ref();
        let mut data = Self::standard();

        if let Some(rows) = read_csv::<NameRow>(&dir.join("organizations.csv"))? {
            data.approved_organizations = rows.iter().map(|row| normalize_name(&row.name)).collect();
        }
        if let Some(rows) = read_csv::<NameRow>(&dir.join("interventions.csv"))? {
            data.approved_interventions = rows.iter().map(|row| normalize_name(&row.name)).collect();
        }
        if let Some(rows) = read_csv::<NameRow>(&dir.join("workflow_states.csv"))? {
            data.approved_states = rows
                .iter()
                .map(|row| match WorkflowState::parse(&row.name) {
                    WorkflowState::Other(name) => Err(ReferenceDataError::UnknownWorkflowState(name)),
                    state => Ok(state),
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(rows) = read_csv::<PlacementRow>(&dir.join("placements.csv"))? {
            data.placements = PlacementMapping::new(
                rows.into_iter()
                    .map(|row| (row.placement, row.organization)),
            );
        }
        if let Some(rows) = read_csv::<ExcludedCitizenRow>(&dir.join("excluded_citizens.csv"))? {
            data.excluded_citizens = rows.into_iter().map(|row| row.national_id).collect();
        }

        Ok(data)
    }

    pub fn with_approved_states<I>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = WorkflowState>,
    {
        self.approved_states = states.into_iter().collect();
        self
    }

    pub fn with_approved_interventions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.approved_interventions = names.into_iter().map(|name| normalize_name(name.as_ref())).collect();
        self
    }

    pub fn with_placements(mut self, placements: PlacementMapping) -> Self {
        self.placements = placements;
        self
    }

    pub fn is_approved_organization(&self, name: &str) -> bool {
        self.approved_organizations.contains(&normalize_name(name))
    }

    pub fn is_approved_intervention(&self, name: &str) -> bool {
        self.approved_interventions.contains(&normalize_name(name))
    }

    pub fn is_approved_state(&self, state: &WorkflowState) -> bool {
        self.approved_states.contains(state)
    }

    pub fn placements(&self) -> &PlacementMapping {
        &self.placements
    }

    pub fn is_excluded_citizen(&self, national_id: &str) -> bool {
        self.excluded_citizens.contains(national_id.trim())
    }

    pub fn is_excluded_status(&self, status: &str) -> bool {
        self.excluded_statuses.contains(&normalize_name(status))
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::standard()
    }
}

fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, ReferenceDataError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ReferenceDataError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    parser::parse_rows(file)
        .map(Some)
        .map_err(|source| ReferenceDataError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceDataError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid reference data in {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("unknown workflow state '{0}' in approved states")]
    UnknownWorkflowState(String),
}
