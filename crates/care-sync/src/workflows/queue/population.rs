use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, error, info};

use super::{ItemState, QueueError, WorkQueue};
use crate::reference_data::ReferenceData;
use crate::workflows::assignments::{CaseManagementClient, ClientError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PopulationSummary {
    pub cleared: usize,
    pub organizations: usize,
    pub enqueued: usize,
    pub excluded: usize,
    pub duplicates: usize,
    pub errors: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PopulationError {
    #[error("case-management lookup failed: {0}")]
    Client(#[from] ClientError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Clears pending items and enqueues every eligible citizen of the approved
/// organizations once, keyed by national identifier with an empty payload.
pub fn populate_queue<C, Q>(
    client: &C,
    queue: &Q,
    reference_data: &ReferenceData,
) -> Result<PopulationSummary, PopulationError>
where
    C: CaseManagementClient + ?Sized,
    Q: WorkQueue + ?Sized,
{
    let mut summary = PopulationSummary {
        cleared: queue.clear(ItemState::New)?,
        ..PopulationSummary::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    for organization in client.organizations()? {
        if !reference_data.is_approved_organization(&organization.name) {
            continue;
        }
        summary.organizations += 1;

        let citizens = client.citizens_by_organization(&organization)?;
        debug!(organization = %organization.name, citizens = citizens.len(), "enqueueing organization");

        for citizen in citizens {
            let national_id = citizen.national_id.trim().to_string();
            if reference_data.is_excluded_citizen(&national_id)
                || reference_data.is_excluded_status(&citizen.status)
            {
                summary.excluded += 1;
                continue;
            }
            if !seen.insert(national_id.clone()) {
                summary.duplicates += 1;
                continue;
            }

            match queue.add_item(Value::Object(Map::new()), &national_id) {
                Ok(()) => summary.enqueued += 1,
                Err(err) => {
                    error!(citizen = %national_id, error = %err, "could not enqueue citizen");
                    summary.errors += 1;
                }
            }
        }
    }

    info!(
        organizations = summary.organizations,
        enqueued = summary.enqueued,
        excluded = summary.excluded,
        "queue populated"
    );
    Ok(summary)
}
