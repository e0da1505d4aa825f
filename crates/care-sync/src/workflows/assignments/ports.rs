use chrono::NaiveDate;

use super::domain::{
    Assignment, AssignmentRequest, CalendarEvent, Citizen, GrantLink, OrderGrant, Organization,
    Pathway, PathwayReference, ResolvedGrant, ResolvedReference,
};
use super::evaluation::{GrantChanges, TransitionVerb};

/// Query/command surface of the case-management platform.
pub trait CaseManagementClient: Send + Sync {
    fn citizen(&self, national_id: &str) -> Result<Citizen, ClientError>;
    fn citizen_pathway(&self, citizen: &Citizen) -> Result<Pathway, ClientError>;
    fn pathway_references(&self, pathway: &Pathway) -> Result<Vec<PathwayReference>, ClientError>;
    fn resolve_reference(&self, reference: &PathwayReference)
        -> Result<ResolvedReference, ClientError>;
    fn current_order_grant(&self, link: &GrantLink) -> Result<OrderGrant, ClientError>;
    fn calendar_events(
        &self,
        citizen: &Citizen,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, ClientError>;
    fn assignments(&self, node: &ResolvedReference) -> Result<Vec<Assignment>, ClientError>;
    /// Assignments attached to the pathway itself rather than to one of its nodes.
    fn pathway_assignments(&self, pathway: &Pathway) -> Result<Vec<Assignment>, ClientError>;
    /// `Ok(None)` when the platform accepted the call but created nothing.
    fn create_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<Option<Assignment>, ClientError>;
    fn edit_grant(
        &self,
        grant: &ResolvedGrant,
        changes: &GrantChanges,
        transition: TransitionVerb,
    ) -> Result<(), ClientError>;
    fn organizations(&self) -> Result<Vec<Organization>, ClientError>;
    fn citizens_by_organization(
        &self,
        organization: &Organization,
    ) -> Result<Vec<Citizen>, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook registering billable work.
pub trait BillingTracker: Send + Sync {
    fn track(&self, task_name: &str) -> Result<(), BillingError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    #[error("billing transport unavailable: {0}")]
    Transport(String),
}
