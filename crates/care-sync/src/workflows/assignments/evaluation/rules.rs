use chrono::{DateTime, Utc};

use super::super::calendar::{coverage, Coverage};
use super::super::domain::{CalendarEvent, PathwayReference, ResolvedGrant};
use super::config::EngineConfig;
use super::policy::SkipReason;
use crate::reference_data::ReferenceData;

/// Where a single reference ends up after the checks that precede a close.
pub(crate) enum ReferenceVerdict<'a> {
    Skipped(SkipReason),
    Unresolved,
    Closable(&'a ResolvedGrant),
}

pub(crate) fn is_candidate(reference: &PathwayReference, reference_data: &ReferenceData) -> bool {
    reference_data.is_approved_intervention(&reference.name)
        && reference
            .workflow_state
            .as_ref()
            .map(|state| reference_data.is_approved_state(state))
            .unwrap_or(false)
}

/// Runs the checks in order and stops at the first that applies. A missing
/// `last_modified` never counts as recent.
pub(crate) fn check_reference<'a>(
    reference: &PathwayReference,
    grant: Option<&'a ResolvedGrant>,
    events: &[CalendarEvent],
    reference_data: &ReferenceData,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> ReferenceVerdict<'a> {
    if !is_candidate(reference, reference_data) {
        return ReferenceVerdict::Skipped(SkipReason::NotApproved);
    }

    let Some(grant) = grant else {
        return ReferenceVerdict::Unresolved;
    };

    if let Coverage::Covered { event_id, .. } = coverage(grant, events) {
        return ReferenceVerdict::Skipped(SkipReason::Covered { event_id });
    }

    if let Some(last_modified) = reference.last_modified {
        if now.signed_duration_since(last_modified) < config.recency_window() {
            return ReferenceVerdict::Skipped(SkipReason::RecentlyModified { last_modified });
        }
    }

    if reference
        .workflow_state
        .as_ref()
        .map(|state| state.is_acute())
        .unwrap_or(false)
    {
        return ReferenceVerdict::Skipped(SkipReason::AcuteProtected);
    }

    ReferenceVerdict::Closable(grant)
}
