//! Intervention lifecycle sync for a single citizen.
//!
//! The reference filter, placement resolver and calendar correlator feed the
//! eligibility engine, which turns a citizen snapshot into close/open/skip
//! decisions. The service owns the collaborator calls around it.

pub mod calendar;
pub mod domain;
pub mod evaluation;
pub mod placement;
pub mod ports;
pub mod references;
pub mod service;

#[cfg(test)]
pub(crate) mod tests;

pub use calendar::{candidate_tags, coverage, Coverage};
pub use domain::{
    Assignment, AssignmentRequest, AssignmentTarget, CalendarEvent, Citizen, GrantId, GrantLink,
    GrantOrigin, OrderGrant, Organization, Pathway, PathwayId, PathwayReference, ReferenceId,
    ReferenceSummary, ResolvedGrant, ResolvedReference, WorkflowState,
};
pub use evaluation::{
    CitizenSnapshot, CloseOrder, Decision, EligibilityEngine, EngineConfig, Evaluation,
    EvaluationError, GrantChanges, Skip, SkipReason, TaskOrder, Transition, TransitionTable,
    TransitionVerb,
};
pub use placement::{locate, Placement, PlacementError, PlacementLocation, PlacementRule};
pub use ports::{BillingError, BillingTracker, CaseManagementClient, ClientError};
pub use references::{filter_references, find_by_name, refine, PathPattern, ReferenceMatch};
pub use service::{AssignmentSyncService, CitizenReport, Severity, SyncError, SyncSettings};
