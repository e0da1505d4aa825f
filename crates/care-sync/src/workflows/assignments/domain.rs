use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::reference_data::normalize_name;

/// Structural type of a pathway node that is itself a (sub-)pathway.
pub const PATHWAY_REFERENCE_KIND: &str = "patientPathwayReference";
/// Structural type of a pathway node pointing at a basket grant.
pub const BASKET_GRANT_REFERENCE_KIND: &str = "basketGrantReference";

/// Identifier wrapper for pathway nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceId(pub String);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathwayId(pub String);

/// Identifier of an ordered or basket grant, as used in calendar tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantId(pub String);

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Citizen snapshot as returned by the case-management platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    pub national_id: String,
    #[serde(default)]
    pub name: String,
    /// Enrollment state label, e.g. "Aktiv" or "Indlagt".
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathway {
    pub id: PathwayId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// Lifecycle stage of a grant on the pathway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkflowState {
    Created,
    Ordered,
    Granted,
    Changed,
    CreatedAcute,
    Other(String),
}

impl WorkflowState {
    pub fn parse(value: &str) -> Self {
        match normalize_name(value).as_str() {
            "created" | "oprettet" => Self::Created,
            "ordered" | "bestilt" => Self::Ordered,
            "granted" | "bevilget" | "bevilliget" => Self::Granted,
            "changed" | "ændret" => Self::Changed,
            "created (acute)" | "created-acute" | "oprettet (akut)" | "oprettet - akut" => {
                Self::CreatedAcute
            }
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Created => "Created",
            Self::Ordered => "Ordered",
            Self::Granted => "Granted",
            Self::Changed => "Changed",
            Self::CreatedAcute => "Created (Acute)",
            Self::Other(name) => name,
        }
    }

    pub fn is_acute(&self) -> bool {
        matches!(self, Self::CreatedAcute)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for WorkflowState {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<WorkflowState> for String {
    fn from(value: WorkflowState) -> Self {
        value.label().to_string()
    }
}

/// Node in a citizen's pathway tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathwayReference {
    pub id: ReferenceId,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub workflow_state: Option<WorkflowState>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Historical pathways are reported as inactive.
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub children: Vec<PathwayReference>,
}

fn default_active() -> bool {
    true
}

impl PathwayReference {
    pub fn summary(&self) -> ReferenceSummary {
        ReferenceSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            workflow_state: self.workflow_state.clone(),
        }
    }
}

/// Lightweight copy of a reference carried in decisions and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSummary {
    pub id: ReferenceId,
    pub name: String,
    pub workflow_state: Option<WorkflowState>,
}

/// Link to the grant currently ordered for a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantLink {
    pub href: String,
}

/// Dereferenced pathway node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub id: ReferenceId,
    pub name: String,
    #[serde(default)]
    pub current_order_grant: Option<GrantLink>,
    /// Acute items carry their basket grant id inline.
    #[serde(default)]
    pub inline_grant_id: Option<GrantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderGrant {
    pub id: GrantId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOrigin {
    OrderedGrant,
    AcuteBasket,
}

/// The grant a reference currently stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGrant {
    pub reference: ReferenceId,
    pub grant_id: GrantId,
    pub origin: GrantOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    /// Tags such as `ORDER_GRANT:<id>`; missing or malformed lists become `None`.
    #[serde(default, deserialize_with = "lenient_identifiers")]
    pub patient_grant_identifiers: Option<Vec<String>>,
}

fn lenient_identifiers<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(tag) => Some(tag),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

/// Task attached to a pathway node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub assignment_type: String,
    #[serde(default)]
    pub responsible_organization: Option<String>,
}

/// Where a new assignment is attached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum AssignmentTarget {
    Reference(ReferenceId),
    Pathway(PathwayId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub target: AssignmentTarget,
    pub assignment_type: String,
    pub title: String,
    pub responsible_organization: String,
    pub responsible_worker: Option<String>,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_state_accepts_platform_labels() {
        assert_eq!(WorkflowState::parse("Bestilt"), WorkflowState::Ordered);
        assert_eq!(WorkflowState::parse("  ændret "), WorkflowState::Changed);
        assert_eq!(
            WorkflowState::parse("Oprettet (Akut)"),
            WorkflowState::CreatedAcute
        );
        assert_eq!(
            WorkflowState::parse("Afsluttet"),
            WorkflowState::Other("Afsluttet".to_string())
        );
    }

    #[test]
    fn calendar_event_tolerates_malformed_tags() {
        let missing: CalendarEvent =
            serde_json::from_str(r#"{"id":"e1"}"#).expect("event without tags");
        assert_eq!(missing.patient_grant_identifiers, None);

        let scalar: CalendarEvent =
            serde_json::from_str(r#"{"id":"e2","patient_grant_identifiers":"ORDER_GRANT:1"}"#)
                .expect("event with scalar tags");
        assert_eq!(scalar.patient_grant_identifiers, None);

        let mixed: CalendarEvent = serde_json::from_str(
            r#"{"id":"e3","patient_grant_identifiers":["ORDER_GRANT:7",42,null]}"#,
        )
        .expect("event with mixed tags");
        assert_eq!(
            mixed.patient_grant_identifiers,
            Some(vec!["ORDER_GRANT:7".to_string()])
        );
    }

    #[test]
    fn reference_defaults_to_active_without_children() {
        let reference: PathwayReference = serde_json::from_str(
            r#"{"id":"r1","name":"Sårpleje","kind":"basketGrantReference","workflow_state":"Bevilget"}"#,
        )
        .expect("reference parses");
        assert!(reference.active);
        assert!(reference.children.is_empty());
        assert_eq!(reference.workflow_state, Some(WorkflowState::Granted));
    }
}
