mod config;
mod policy;
mod rules;

pub use config::EngineConfig;
pub use policy::{
    CloseOrder, Decision, GrantChanges, Skip, SkipReason, TaskOrder, Transition, TransitionTable,
    TransitionVerb,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::domain::{
    Assignment, AssignmentTarget, CalendarEvent, Citizen, Pathway, PathwayReference, ReferenceId,
    ResolvedGrant,
};
use super::placement::{
    resolve_placement, Placement, PlacementError, PlacementLocation, PlacementRule,
};
use crate::reference_data::ReferenceData;
use rules::{check_reference, ReferenceVerdict};

/// Everything the engine needs about one citizen, fetched up front.
#[derive(Debug, Clone)]
pub struct CitizenSnapshot {
    pub citizen: Citizen,
    pub pathway: Pathway,
    /// Candidate references in discovery order.
    pub references: Vec<PathwayReference>,
    /// Resolved grants for the references that passed the approval check.
    pub grants: BTreeMap<ReferenceId, ResolvedGrant>,
    pub events: Vec<CalendarEvent>,
    pub placement: Placement,
}

/// Ordered decisions for one citizen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub citizen: String,
    pub decisions: Vec<Decision>,
    /// True when some reference is backed by a calendar booking.
    pub covered: bool,
}

impl Evaluation {
    pub fn closes(&self) -> impl Iterator<Item = &CloseOrder> {
        self.decisions.iter().filter_map(|decision| match decision {
            Decision::CloseReference(order) => Some(order),
            _ => None,
        })
    }

    pub fn task(&self) -> Option<&TaskOrder> {
        self.decisions.iter().find_map(|decision| match decision {
            Decision::OpenTask(order) => Some(order),
            _ => None,
        })
    }

    pub fn skips(&self) -> impl Iterator<Item = &Skip> {
        self.decisions.iter().filter_map(|decision| match decision {
            Decision::NoAction(skip) => Some(skip),
            _ => None,
        })
    }

    pub fn requires_action(&self) -> bool {
        self.closes().next().is_some() || self.task().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("citizen {citizen}: reference '{reference}' has no resolved grant")]
    UnresolvedGrant { citizen: String, reference: String },
    #[error("citizen {citizen}: cannot close '{reference}': invalid state {state}")]
    InvalidTransition {
        citizen: String,
        reference: String,
        state: String,
    },
}

/// Stateless rule evaluator over a [`CitizenSnapshot`].
pub struct EligibilityEngine {
    config: EngineConfig,
    reference_data: ReferenceData,
    transitions: TransitionTable,
    placement_rule: PlacementRule,
}

impl EligibilityEngine {
    pub fn new(config: EngineConfig, reference_data: ReferenceData) -> Self {
        let placement_rule = PlacementRule::standard(config.placement_marker.clone());
        Self {
            config,
            reference_data,
            transitions: TransitionTable::standard(),
            placement_rule,
        }
    }

    pub fn with_transitions(mut self, transitions: TransitionTable) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reference_data(&self) -> &ReferenceData {
        &self.reference_data
    }

    pub fn placement_rule(&self) -> &PlacementRule {
        &self.placement_rule
    }

    /// Approved intervention name and approved workflow state.
    pub fn is_candidate(&self, reference: &PathwayReference) -> bool {
        rules::is_candidate(reference, &self.reference_data)
    }

    pub fn resolve_placement(
        &self,
        location: &PlacementLocation<'_>,
        pathway: &Pathway,
        existing: &[Assignment],
    ) -> Result<Placement, PlacementError> {
        resolve_placement(
            location,
            &pathway.id,
            existing,
            &self.config.task_title,
            self.reference_data.placements(),
            &self.config.fallback_organization,
        )
    }

    pub fn evaluate(
        &self,
        snapshot: &CitizenSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EvaluationError> {
        let citizen = snapshot.citizen.national_id.clone();

        if let Placement::AlreadyTasked { assignment_id, .. } = &snapshot.placement {
            return Ok(Evaluation {
                citizen,
                decisions: vec![Decision::NoAction(Skip {
                    reference: None,
                    reason: SkipReason::ExistingTask {
                        assignment_id: assignment_id.clone(),
                    },
                })],
                covered: false,
            });
        }

        let mut decisions = Vec::with_capacity(snapshot.references.len() + 1);
        let mut covered = false;

        for reference in &snapshot.references {
            let verdict = check_reference(
                reference,
                snapshot.grants.get(&reference.id),
                &snapshot.events,
                &self.reference_data,
                &self.config,
                now,
            );

            let decision = match verdict {
                ReferenceVerdict::Skipped(reason) => {
                    covered |= matches!(reason, SkipReason::Covered { .. });
                    Decision::NoAction(Skip {
                        reference: Some(reference.summary()),
                        reason,
                    })
                }
                ReferenceVerdict::Unresolved => {
                    return Err(EvaluationError::UnresolvedGrant {
                        citizen,
                        reference: reference.name.clone(),
                    })
                }
                ReferenceVerdict::Closable(grant) => {
                    Decision::CloseReference(self.close_order(&citizen, reference, grant, now)?)
                }
            };

            debug!(citizen = %citizen, decision = %decision.summary(), "reference evaluated");
            decisions.push(decision);
        }

        if !covered {
            if let Some(order) = self.task_order(snapshot) {
                decisions.push(Decision::OpenTask(order));
            }
        }

        Ok(Evaluation {
            citizen,
            decisions,
            covered,
        })
    }

    fn close_order(
        &self,
        citizen: &str,
        reference: &PathwayReference,
        grant: &ResolvedGrant,
        now: DateTime<Utc>,
    ) -> Result<CloseOrder, EvaluationError> {
        let state = reference.workflow_state.as_ref();
        let verb = state
            .and_then(|state| self.transitions.verb_for(state))
            .ok_or_else(|| EvaluationError::InvalidTransition {
                citizen: citizen.to_string(),
                reference: reference.name.clone(),
                state: state
                    .map(|state| state.label().to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
            })?;

        Ok(CloseOrder {
            reference: reference.summary(),
            grant: grant.clone(),
            transition: Transition::at(verb, now),
        })
    }

    fn task_order(&self, snapshot: &CitizenSnapshot) -> Option<TaskOrder> {
        let target = match &snapshot.placement {
            Placement::Mapped { node, .. } => AssignmentTarget::Reference(node.clone()),
            Placement::Fallback { .. } => AssignmentTarget::Pathway(snapshot.pathway.id.clone()),
            Placement::AlreadyTasked { .. } => return None,
        };

        Some(TaskOrder {
            target,
            title: self.config.task_title.clone(),
            assignment_type: self.config.task_type.clone(),
            organization: snapshot.placement.organization()?.to_string(),
        })
    }
}
