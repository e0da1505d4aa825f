use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::super::domain::{AssignmentTarget, ReferenceSummary, ResolvedGrant, WorkflowState};

/// Workflow transition applied when a grant is ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionVerb {
    Close,
    Cancel,
}

impl TransitionVerb {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Close => "Close",
            Self::Cancel => "Cancel",
        }
    }
}

impl fmt::Display for TransitionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Field updates sent along with a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub verb: TransitionVerb,
    pub changes: GrantChanges,
}

impl Transition {
    pub fn at(verb: TransitionVerb, now: DateTime<Utc>) -> Self {
        let changes = match verb {
            TransitionVerb::Close => GrantChanges {
                billing_end: Some(now),
                grant_end: Some(now),
                cancelled_at: None,
            },
            TransitionVerb::Cancel => GrantChanges {
                cancelled_at: Some(now),
                ..GrantChanges::default()
            },
        };

        Self { verb, changes }
    }
}

/// Allowed ways to end a grant, keyed by its current workflow state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    verbs: BTreeMap<WorkflowState, TransitionVerb>,
}

impl TransitionTable {
    pub fn standard() -> Self {
        Self::new([
            (WorkflowState::Ordered, TransitionVerb::Close),
            (WorkflowState::Changed, TransitionVerb::Close),
            (WorkflowState::Granted, TransitionVerb::Cancel),
        ])
    }

    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (WorkflowState, TransitionVerb)>,
    {
        Self {
            verbs: entries.into_iter().collect(),
        }
    }

    pub fn verb_for(&self, state: &WorkflowState) -> Option<TransitionVerb> {
        self.verbs.get(state).copied()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Why a reference, or a whole citizen, is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SkipReason {
    NotApproved,
    Covered { event_id: String },
    RecentlyModified { last_modified: DateTime<Utc> },
    AcuteProtected,
    ExistingTask { assignment_id: String },
}

impl SkipReason {
    pub fn summary(&self) -> String {
        match self {
            SkipReason::NotApproved => "intervention or state not approved".to_string(),
            SkipReason::Covered { event_id } => format!("covered by calendar event {event_id}"),
            SkipReason::RecentlyModified { last_modified } => {
                format!("modified recently ({})", last_modified.format("%Y-%m-%d"))
            }
            SkipReason::AcuteProtected => "acute grants are never closed automatically".to_string(),
            SkipReason::ExistingTask { assignment_id } => {
                format!("follow-up task {assignment_id} already exists")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skip {
    /// `None` when the whole citizen is skipped.
    pub reference: Option<ReferenceSummary>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub reference: ReferenceSummary,
    pub grant: ResolvedGrant,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOrder {
    pub target: AssignmentTarget,
    pub title: String,
    pub assignment_type: String,
    pub organization: String,
}

/// What the engine wants done for one reference or citizen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum Decision {
    NoAction(Skip),
    CloseReference(CloseOrder),
    OpenTask(TaskOrder),
}

impl Decision {
    pub fn summary(&self) -> String {
        match self {
            Decision::NoAction(skip) => match &skip.reference {
                Some(reference) => format!("skip '{}': {}", reference.name, skip.reason.summary()),
                None => format!("skip citizen: {}", skip.reason.summary()),
            },
            Decision::CloseReference(order) => format!(
                "{} '{}' (grant {})",
                order.transition.verb, order.reference.name, order.grant.grant_id
            ),
            Decision::OpenTask(order) => {
                format!("open '{}' for {}", order.title, order.organization)
            }
        }
    }
}
