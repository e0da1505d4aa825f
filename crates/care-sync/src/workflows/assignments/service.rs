use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::domain::{
    Assignment, AssignmentRequest, Citizen, GrantOrigin, PathwayReference, ResolvedGrant,
};
use super::evaluation::{
    CitizenSnapshot, CloseOrder, EligibilityEngine, EngineConfig, Evaluation, EvaluationError,
    TaskOrder,
};
use super::placement::{locate, Placement, PlacementError};
use super::ports::{BillingError, BillingTracker, CaseManagementClient, ClientError};
use super::references::{filter_references, PathPattern};
use crate::config::SyncConfig;
use crate::reference_data::ReferenceData;

/// Per-run settings that sit outside the decision rules.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub reference_path: PathPattern,
    pub calendar_horizon: Duration,
    pub task_billing_name: String,
    pub close_billing_name: String,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            reference_path: PathPattern::parse(&config.reference_path),
            calendar_horizon: Duration::weeks(i64::from(config.calendar_horizon_weeks)),
            task_billing_name: config.task_billing_name.clone(),
            close_billing_name: config.close_billing_name.clone(),
        }
    }
}

/// What was done for one citizen.
#[derive(Debug, Clone, Serialize)]
pub struct CitizenReport {
    pub evaluation: Evaluation,
    pub closed: Vec<CloseOrder>,
    pub created: Option<Assignment>,
}

/// Fetches a citizen's data, runs the engine and applies its decisions.
pub struct AssignmentSyncService<C, B> {
    client: Arc<C>,
    billing: Arc<B>,
    engine: Arc<EligibilityEngine>,
    settings: SyncSettings,
}

impl<C, B> AssignmentSyncService<C, B>
where
    C: CaseManagementClient + 'static,
    B: BillingTracker + 'static,
{
    pub fn new(
        client: Arc<C>,
        billing: Arc<B>,
        config: &SyncConfig,
        reference_data: ReferenceData,
    ) -> Self {
        let engine = EligibilityEngine::new(EngineConfig::from(config), reference_data);
        Self::with_engine(client, billing, engine, SyncSettings::from(config))
    }

    pub fn with_engine(
        client: Arc<C>,
        billing: Arc<B>,
        engine: EligibilityEngine,
        settings: SyncSettings,
    ) -> Self {
        Self {
            client,
            billing,
            engine: Arc::new(engine),
            settings,
        }
    }

    pub fn engine(&self) -> &EligibilityEngine {
        &self.engine
    }

    /// Gathers everything the engine needs. Grant lookups only happen for
    /// approved references, and not at all once the follow-up task exists.
    pub fn snapshot(
        &self,
        national_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CitizenSnapshot, SyncError> {
        let citizen = self
            .client
            .citizen(national_id)
            .map_err(|source| SyncError::client("fetch citizen", source))?;
        let pathway = self
            .client
            .citizen_pathway(&citizen)
            .map_err(|source| SyncError::client("fetch pathway", source))?;
        let all_references = self
            .client
            .pathway_references(&pathway)
            .map_err(|source| SyncError::client("fetch pathway references", source))?;

        let references: Vec<PathwayReference> =
            filter_references(&all_references, &self.settings.reference_path, false)
                .into_iter()
                .map(|entry| entry.reference.clone())
                .collect();

        let location = locate(&all_references, self.engine.placement_rule());
        let existing = match location.node() {
            Some(node) => {
                let resolved = self
                    .client
                    .resolve_reference(node)
                    .map_err(|source| SyncError::client("resolve placement", source))?;
                self.client
                    .assignments(&resolved)
                    .map_err(|source| SyncError::client("fetch placement assignments", source))?
            }
            None => {
                debug!(citizen = %national_id, ?location, "no placement node, using fallback organization");
                self.client
                    .pathway_assignments(&pathway)
                    .map_err(|source| SyncError::client("fetch pathway assignments", source))?
            }
        };
        let placement = self
            .engine
            .resolve_placement(&location, &pathway, &existing)?;

        if let Placement::AlreadyTasked { .. } = placement {
            return Ok(CitizenSnapshot {
                citizen,
                pathway,
                references,
                grants: BTreeMap::new(),
                events: Vec::new(),
                placement,
            });
        }

        let today = now.date_naive();
        let events = self
            .client
            .calendar_events(&citizen, today, today + self.settings.calendar_horizon)
            .map_err(|source| SyncError::client("fetch calendar", source))?;

        let mut grants = BTreeMap::new();
        for reference in references
            .iter()
            .filter(|reference| self.engine.is_candidate(reference))
        {
            let grant = self.resolve_grant(reference)?;
            grants.insert(reference.id.clone(), grant);
        }

        Ok(CitizenSnapshot {
            citizen,
            pathway,
            references,
            grants,
            events,
            placement,
        })
    }

    /// Evaluates one citizen and applies the resulting mutations.
    pub fn process_citizen(
        &self,
        national_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CitizenReport, SyncError> {
        let snapshot = self.snapshot(national_id, now)?;
        let evaluation = self.engine.evaluate(&snapshot, now)?;

        if !evaluation.requires_action() {
            debug!(citizen = %national_id, "no action required");
        }

        let mut closed = Vec::new();
        for order in evaluation.closes() {
            self.apply_close(&snapshot.citizen, order)?;
            closed.push(order.clone());
        }

        let created = match evaluation.task() {
            Some(order) => self.apply_task(&snapshot.citizen, order, now)?,
            None => None,
        };

        Ok(CitizenReport {
            evaluation,
            closed,
            created,
        })
    }

    fn resolve_grant(&self, reference: &PathwayReference) -> Result<ResolvedGrant, SyncError> {
        let resolved = self
            .client
            .resolve_reference(reference)
            .map_err(|source| SyncError::client("resolve reference", source))?;

        let acute = reference
            .workflow_state
            .as_ref()
            .map(|state| state.is_acute())
            .unwrap_or(false);

        if acute {
            let grant_id = resolved
                .inline_grant_id
                .ok_or_else(|| SyncError::MissingGrant {
                    reference: reference.name.clone(),
                })?;
            return Ok(ResolvedGrant {
                reference: reference.id.clone(),
                grant_id,
                origin: GrantOrigin::AcuteBasket,
            });
        }

        let link = resolved
            .current_order_grant
            .ok_or_else(|| SyncError::MissingGrant {
                reference: reference.name.clone(),
            })?;
        let grant = self
            .client
            .current_order_grant(&link)
            .map_err(|source| SyncError::client("fetch current order grant", source))?;

        Ok(ResolvedGrant {
            reference: reference.id.clone(),
            grant_id: grant.id,
            origin: GrantOrigin::OrderedGrant,
        })
    }

    fn apply_close(&self, citizen: &Citizen, order: &CloseOrder) -> Result<(), SyncError> {
        self.client
            .edit_grant(&order.grant, &order.transition.changes, order.transition.verb)
            .map_err(|source| SyncError::client("edit grant", source))?;

        info!(
            citizen = %citizen.national_id,
            reference = %order.reference.name,
            grant = %order.grant.grant_id,
            transition = %order.transition.verb,
            "grant ended"
        );

        self.billing
            .track(&self.settings.close_billing_name)
            .map_err(|source| SyncError::Billing {
                applied: format!("{} of '{}'", order.transition.verb, order.reference.name),
                source,
            })
    }

    fn apply_task(
        &self,
        citizen: &Citizen,
        order: &TaskOrder,
        now: DateTime<Utc>,
    ) -> Result<Option<Assignment>, SyncError> {
        let today = now.date_naive();
        let request = AssignmentRequest {
            target: order.target.clone(),
            assignment_type: order.assignment_type.clone(),
            title: order.title.clone(),
            responsible_organization: order.organization.clone(),
            responsible_worker: None,
            description: None,
            start_date: today,
            due_date: today,
        };

        let Some(assignment) = self
            .client
            .create_assignment(&request)
            .map_err(|source| SyncError::client("create assignment", source))?
        else {
            debug!(citizen = %citizen.national_id, "platform created no assignment");
            return Ok(None);
        };

        info!(
            citizen = %citizen.national_id,
            assignment = %assignment.id,
            organization = %order.organization,
            "follow-up task created"
        );

        self.billing
            .track(&self.settings.task_billing_name)
            .map_err(|source| SyncError::Billing {
                applied: format!("creation of task {}", assignment.id),
                source,
            })?;

        Ok(Some(assignment))
    }
}

/// How the queue driver should treat a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Data inconsistency; the item needs manual handling.
    BusinessRule,
    Unexpected,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("reference '{reference}' does not expose its current grant")]
    MissingGrant { reference: String },
    #[error("{action} failed: {source}")]
    Client {
        action: &'static str,
        source: ClientError,
    },
    #[error("{applied} was applied but billing was not recorded: {source}")]
    Billing {
        applied: String,
        source: BillingError,
    },
}

impl SyncError {
    fn client(action: &'static str, source: ClientError) -> Self {
        Self::Client { action, source }
    }

    pub fn severity(&self) -> Severity {
        match self {
            SyncError::Client {
                source: ClientError::Malformed(_) | ClientError::Unavailable(_),
                ..
            } => Severity::Unexpected,
            _ => Severity::BusinessRule,
        }
    }
}
