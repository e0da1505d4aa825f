use serde::Serialize;
use std::fmt;

use super::domain::{
    Assignment, AssignmentTarget, PathwayId, PathwayReference, ReferenceId,
    BASKET_GRANT_REFERENCE_KIND, PATHWAY_REFERENCE_KIND,
};
use super::references::find_by_name;
use crate::reference_data::{normalize_name, PlacementMapping};

/// One level of the descent from the placement marker to the placement node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementStep {
    ChildOfKind(String),
    ChildNamed(String),
}

impl PlacementStep {
    fn select<'a>(&self, node: &'a PathwayReference) -> Option<&'a PathwayReference> {
        node.children.iter().find(|child| match self {
            PlacementStep::ChildOfKind(kind) => child.kind == *kind,
            PlacementStep::ChildNamed(name) => normalize_name(&child.name) == normalize_name(name),
        })
    }
}

impl fmt::Display for PlacementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementStep::ChildOfKind(kind) => write!(f, "child of kind {kind}"),
            PlacementStep::ChildNamed(name) => write!(f, "child named {name}"),
        }
    }
}

/// How to find the care-placement node inside the pathway tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRule {
    pub marker: String,
    pub steps: Vec<PlacementStep>,
}

impl PlacementRule {
    /// Marker pathway → sub-pathway → "Indsatser" container → placement grant.
    pub fn standard(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            steps: vec![
                PlacementStep::ChildOfKind(PATHWAY_REFERENCE_KIND.to_string()),
                PlacementStep::ChildNamed("Indsatser".to_string()),
                PlacementStep::ChildOfKind(BASKET_GRANT_REFERENCE_KIND.to_string()),
            ],
        }
    }
}

/// Outcome of walking the pathway tree for the placement node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementLocation<'a> {
    /// No reference carries the marker name.
    NoMarker,
    /// The marker exists but the descent stopped at `missing`.
    Incomplete { missing: String },
    Found(&'a PathwayReference),
}

impl<'a> PlacementLocation<'a> {
    pub fn node(&self) -> Option<&'a PathwayReference> {
        match self {
            PlacementLocation::Found(node) => Some(*node),
            _ => None,
        }
    }
}

pub fn locate<'a>(roots: &'a [PathwayReference], rule: &PlacementRule) -> PlacementLocation<'a> {
    let Some(mut node) = find_by_name(roots, &rule.marker) else {
        return PlacementLocation::NoMarker;
    };

    for step in &rule.steps {
        match step.select(node) {
            Some(child) => node = child,
            None => {
                return PlacementLocation::Incomplete {
                    missing: step.to_string(),
                }
            }
        }
    }

    PlacementLocation::Found(node)
}

/// Responsible organization for follow-up, or the reason there is nothing to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Placement {
    /// No placement node could be found; follow-up goes to the fallback organization.
    Fallback { organization: String },
    Mapped {
        node: ReferenceId,
        placement: String,
        organization: String,
    },
    /// The closing task already exists where a new one would be attached.
    AlreadyTasked {
        target: AssignmentTarget,
        assignment_id: String,
    },
}

impl Placement {
    pub fn organization(&self) -> Option<&str> {
        match self {
            Placement::Fallback { organization } | Placement::Mapped { organization, .. } => {
                Some(organization)
            }
            Placement::AlreadyTasked { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("placement '{placement}' has no responsible organization")]
    Unmapped { placement: String },
}

/// Maps a located placement to its organization. `existing` holds the assignments
/// already attached to the task target: the placement node, or the pathway when
/// there is none.
pub fn resolve_placement(
    location: &PlacementLocation<'_>,
    pathway: &PathwayId,
    existing: &[Assignment],
    task_title: &str,
    mapping: &PlacementMapping,
    fallback_organization: &str,
) -> Result<Placement, PlacementError> {
    let node = location.node();

    if let Some(assignment) = existing.iter().find(|assignment| assignment.title == task_title) {
        let target = match node {
            Some(node) => AssignmentTarget::Reference(node.id.clone()),
            None => AssignmentTarget::Pathway(pathway.clone()),
        };
        return Ok(Placement::AlreadyTasked {
            target,
            assignment_id: assignment.id.clone(),
        });
    }

    let Some(node) = node else {
        return Ok(Placement::Fallback {
            organization: fallback_organization.to_string(),
        });
    };

    let organization = mapping
        .organization_for(&node.name)
        .ok_or_else(|| PlacementError::Unmapped {
            placement: node.name.clone(),
        })?;

    Ok(Placement::Mapped {
        node: node.id.clone(),
        placement: node.name.clone(),
        organization: organization.to_string(),
    })
}
