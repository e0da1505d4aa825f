use serde::Serialize;

use super::domain::{CalendarEvent, GrantOrigin, ResolvedGrant};

const ORDER_GRANT_TAG: &str = "ORDER_GRANT";
const BASKET_GRANT_TAG: &str = "BASKET_GRANT";

/// Whether a calendar booking already represents a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Coverage {
    Covered { event_id: String, tag: String },
    NotCovered,
}

impl Coverage {
    pub fn is_covered(&self) -> bool {
        matches!(self, Coverage::Covered { .. })
    }
}

/// Tags a booking for this grant would carry.
pub fn candidate_tags(grant: &ResolvedGrant) -> Vec<String> {
    let mut tags = vec![format!("{ORDER_GRANT_TAG}:{}", grant.grant_id)];
    if grant.origin == GrantOrigin::AcuteBasket {
        tags.push(format!("{BASKET_GRANT_TAG}:{}", grant.grant_id));
    }
    tags
}

/// First event whose tag list contains one of the grant's candidate tags.
/// Events without a usable tag list never match.
pub fn coverage(grant: &ResolvedGrant, events: &[CalendarEvent]) -> Coverage {
    let candidates = candidate_tags(grant);

    events
        .iter()
        .find_map(|event| {
            let tags = event.patient_grant_identifiers.as_deref()?;
            candidates
                .iter()
                .find(|candidate| tags.contains(candidate))
                .map(|tag| Coverage::Covered {
                    event_id: event.id.clone(),
                    tag: tag.clone(),
                })
        })
        .unwrap_or(Coverage::NotCovered)
}
