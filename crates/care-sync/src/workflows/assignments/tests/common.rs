use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::SyncConfig;
use crate::reference_data::ReferenceData;
use crate::workflows::assignments::domain::{
    Assignment, AssignmentRequest, AssignmentTarget, CalendarEvent, Citizen, GrantId, GrantLink, OrderGrant,
    Organization, Pathway, PathwayId, PathwayReference, ReferenceId, ResolvedGrant,
    ResolvedReference, WorkflowState, BASKET_GRANT_REFERENCE_KIND, PATHWAY_REFERENCE_KIND,
};
use crate::workflows::assignments::evaluation::{
    CitizenSnapshot, EligibilityEngine, EngineConfig, GrantChanges, TransitionVerb,
};
use crate::workflows::assignments::placement::Placement;
use crate::workflows::assignments::ports::{
    BillingError, BillingTracker, CaseManagementClient, ClientError,
};
use crate::workflows::assignments::AssignmentSyncService;
use crate::workflows::queue::{ItemState, QueueError, WorkItem, WorkQueue};

pub(crate) const MARKER: &str = "ÆHF - Forløbsindplacering (Grundforløb)";
pub(crate) const TASK_TITLE: &str = "Slutliste sygepleje";
pub(crate) const PLACEMENT_ID: &str = "placement-1";

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn reference(id: &str, name: &str, state: &str, days_ago: i64) -> PathwayReference {
    PathwayReference {
        id: ReferenceId(id.to_string()),
        name: name.to_string(),
        kind: BASKET_GRANT_REFERENCE_KIND.to_string(),
        workflow_state: Some(WorkflowState::parse(state)),
        last_modified: Some(now() - Duration::days(days_ago)),
        active: true,
        children: Vec::new(),
    }
}

pub(crate) fn node(id: &str, name: &str, kind: &str, children: Vec<PathwayReference>) -> PathwayReference {
    PathwayReference {
        id: ReferenceId(id.to_string()),
        name: name.to_string(),
        kind: kind.to_string(),
        workflow_state: None,
        last_modified: None,
        active: true,
        children,
    }
}

/// `/Sundhedsfagligt grundforløb/Sygepleje/Indsatser/<interventions>`.
pub(crate) fn base_pathway(interventions: Vec<PathwayReference>) -> PathwayReference {
    node(
        "base",
        "Sundhedsfagligt grundforløb",
        PATHWAY_REFERENCE_KIND,
        vec![node(
            "base-nursing",
            "Sygepleje",
            PATHWAY_REFERENCE_KIND,
            vec![node("base-folder", "Indsatser", "folderReference", interventions)],
        )],
    )
}

/// Marker pathway holding `placement` three levels down.
pub(crate) fn placement_pathway(placement: &str) -> PathwayReference {
    node(
        "marker",
        MARKER,
        PATHWAY_REFERENCE_KIND,
        vec![node(
            "marker-sub",
            "Forløbsindplacering",
            PATHWAY_REFERENCE_KIND,
            vec![node(
                "marker-folder",
                "Indsatser",
                "folderReference",
                vec![node(PLACEMENT_ID, placement, BASKET_GRANT_REFERENCE_KIND, Vec::new())],
            )],
        )],
    )
}

pub(crate) fn event(id: &str, tags: &[&str]) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        title: "Sygeplejebesøg".to_string(),
        starts_at: Some(now() + Duration::days(2)),
        patient_grant_identifiers: Some(tags.iter().map(|tag| tag.to_string()).collect()),
    }
}

pub(crate) fn ordered_grant(reference: &str, grant: &str) -> ResolvedGrant {
    ResolvedGrant {
        reference: ReferenceId(reference.to_string()),
        grant_id: GrantId(grant.to_string()),
        origin: crate::workflows::assignments::domain::GrantOrigin::OrderedGrant,
    }
}

pub(crate) fn acute_grant(reference: &str, grant: &str) -> ResolvedGrant {
    ResolvedGrant {
        reference: ReferenceId(reference.to_string()),
        grant_id: GrantId(grant.to_string()),
        origin: crate::workflows::assignments::domain::GrantOrigin::AcuteBasket,
    }
}

pub(crate) fn citizen(national_id: &str) -> Citizen {
    Citizen {
        national_id: national_id.to_string(),
        name: "Test Borger".to_string(),
        status: "Aktiv".to_string(),
    }
}

pub(crate) fn pathway() -> Pathway {
    Pathway {
        id: PathwayId("pathway-1".to_string()),
        name: "Sundhedsfagligt grundforløb".to_string(),
    }
}

pub(crate) fn engine() -> EligibilityEngine {
    EligibilityEngine::new(EngineConfig::default(), ReferenceData::standard())
}

pub(crate) fn snapshot(
    references: Vec<PathwayReference>,
    grants: Vec<ResolvedGrant>,
    events: Vec<CalendarEvent>,
    placement: Placement,
) -> CitizenSnapshot {
    CitizenSnapshot {
        citizen: citizen("0101501234"),
        pathway: pathway(),
        references,
        grants: grants
            .into_iter()
            .map(|grant| (grant.reference.clone(), grant))
            .collect::<BTreeMap<_, _>>(),
        events,
        placement,
    }
}

pub(crate) fn fallback() -> Placement {
    Placement::Fallback {
        organization: "Sygeplejerådgivere fysisk".to_string(),
    }
}

/// How a reference resolves against the fake platform.
#[derive(Debug, Clone)]
pub(crate) enum GrantSetup {
    Ordered(&'static str),
    Acute(&'static str),
    NoLink,
}

#[derive(Debug, Clone)]
pub(crate) struct CitizenFixture {
    pub(crate) citizen: Citizen,
    pub(crate) interventions: Vec<PathwayReference>,
    pub(crate) placement: Option<String>,
    pub(crate) placement_assignments: Vec<Assignment>,
    pub(crate) pathway_assignments: Vec<Assignment>,
    pub(crate) grants: HashMap<String, GrantSetup>,
    pub(crate) events: Vec<CalendarEvent>,
}

impl CitizenFixture {
    pub(crate) fn new(national_id: &str) -> Self {
        Self {
            citizen: citizen(national_id),
            interventions: Vec::new(),
            placement: None,
            placement_assignments: Vec::new(),
            pathway_assignments: Vec::new(),
            grants: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub(crate) fn intervention(mut self, reference: PathwayReference, grant: GrantSetup) -> Self {
        self.grants.insert(reference.id.0.clone(), grant);
        self.interventions.push(reference);
        self
    }

    pub(crate) fn placement(mut self, name: &str) -> Self {
        self.placement = Some(name.to_string());
        self
    }

    pub(crate) fn existing_task(mut self, title: &str) -> Self {
        self.placement_assignments.push(existing_assignment(title));
        self
    }

    /// Task attached to the pathway, where fallback tasks go.
    pub(crate) fn existing_pathway_task(mut self, title: &str) -> Self {
        self.pathway_assignments.push(existing_assignment(title));
        self
    }

    pub(crate) fn event(mut self, event: CalendarEvent) -> Self {
        self.events.push(event);
        self
    }

    fn pathway(&self) -> Pathway {
        Pathway {
            id: PathwayId(format!("pathway-{}", self.citizen.national_id)),
            name: "Sundhedsfagligt grundforløb".to_string(),
        }
    }

    fn references(&self) -> Vec<PathwayReference> {
        let mut roots = vec![base_pathway(self.interventions.clone())];
        if let Some(name) = &self.placement {
            roots.push(placement_pathway(name));
        }
        roots
    }
}

fn existing_assignment(title: &str) -> Assignment {
    Assignment {
        id: "task-existing".to_string(),
        title: title.to_string(),
        assignment_type: "Tværfagligt samarbejde".to_string(),
        responsible_organization: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GrantEdit {
    pub(crate) grant: ResolvedGrant,
    pub(crate) changes: GrantChanges,
    pub(crate) verb: TransitionVerb,
}

#[derive(Default)]
pub(crate) struct FakeClient {
    fixtures: HashMap<String, CitizenFixture>,
    organizations: Vec<(Organization, Vec<Citizen>)>,
    pub(crate) edit_error: Option<ClientError>,
    pub(crate) calendar_error: Option<ClientError>,
    pub(crate) failing_grants: Vec<&'static str>,
    pub(crate) create_returns_none: bool,
    pub(crate) edits: Mutex<Vec<GrantEdit>>,
    pub(crate) created: Mutex<Vec<AssignmentRequest>>,
}

impl FakeClient {
    pub(crate) fn with(fixtures: Vec<CitizenFixture>) -> Self {
        Self {
            fixtures: fixtures
                .into_iter()
                .map(|fixture| (fixture.citizen.national_id.clone(), fixture))
                .collect(),
            ..Self::default()
        }
    }

    pub(crate) fn with_organization(mut self, name: &str, citizens: Vec<Citizen>) -> Self {
        let organization = Organization {
            id: format!("org-{}", self.organizations.len() + 1),
            name: name.to_string(),
        };
        self.organizations.push((organization, citizens));
        self
    }

    pub(crate) fn edits(&self) -> Vec<GrantEdit> {
        self.edits.lock().expect("edits mutex poisoned").clone()
    }

    pub(crate) fn created(&self) -> Vec<AssignmentRequest> {
        self.created.lock().expect("created mutex poisoned").clone()
    }

    fn fixture_for_pathway(&self, pathway: &Pathway) -> Result<&CitizenFixture, ClientError> {
        self.fixtures
            .values()
            .find(|fixture| fixture.pathway() == *pathway)
            .ok_or_else(|| ClientError::NotFound(format!("pathway {}", pathway.id.0)))
    }

    /// Tasks this fake has created on `target`, numbered like `create_assignment`.
    fn created_on(&self, target: &AssignmentTarget) -> Vec<Assignment> {
        if self.create_returns_none {
            return Vec::new();
        }
        self.created()
            .into_iter()
            .enumerate()
            .filter(|(_, request)| request.target == *target)
            .map(|(index, request)| Assignment {
                id: format!("task-{}", index + 1),
                title: request.title,
                assignment_type: request.assignment_type,
                responsible_organization: Some(request.responsible_organization),
            })
            .collect()
    }

    fn grant_setup(&self, reference: &ReferenceId) -> Option<&GrantSetup> {
        self.fixtures
            .values()
            .find_map(|fixture| fixture.grants.get(&reference.0))
    }
}

impl CaseManagementClient for FakeClient {
    fn citizen(&self, national_id: &str) -> Result<Citizen, ClientError> {
        self.fixtures
            .get(national_id)
            .map(|fixture| fixture.citizen.clone())
            .ok_or_else(|| ClientError::NotFound(format!("citizen {national_id}")))
    }

    fn citizen_pathway(&self, citizen: &Citizen) -> Result<Pathway, ClientError> {
        self.fixtures
            .get(&citizen.national_id)
            .map(CitizenFixture::pathway)
            .ok_or_else(|| ClientError::NotFound(format!("pathway for {}", citizen.national_id)))
    }

    fn pathway_references(&self, pathway: &Pathway) -> Result<Vec<PathwayReference>, ClientError> {
        Ok(self.fixture_for_pathway(pathway)?.references())
    }

    fn resolve_reference(
        &self,
        reference: &PathwayReference,
    ) -> Result<ResolvedReference, ClientError> {
        let mut resolved = ResolvedReference {
            id: reference.id.clone(),
            name: reference.name.clone(),
            current_order_grant: None,
            inline_grant_id: None,
        };
        if reference.id.0 == PLACEMENT_ID {
            return Ok(resolved);
        }

        match self.grant_setup(&reference.id) {
            Some(GrantSetup::Ordered(grant)) => {
                resolved.current_order_grant = Some(GrantLink {
                    href: format!("/orders/{grant}"),
                });
            }
            Some(GrantSetup::Acute(grant)) => {
                resolved.inline_grant_id = Some(GrantId(grant.to_string()));
            }
            Some(GrantSetup::NoLink) => {}
            None => return Err(ClientError::NotFound(format!("reference {}", reference.id))),
        }
        Ok(resolved)
    }

    fn current_order_grant(&self, link: &GrantLink) -> Result<OrderGrant, ClientError> {
        let grant = link.href.trim_start_matches("/orders/");
        if self.failing_grants.contains(&grant) {
            return Err(ClientError::NotFound(format!("order grant {grant}")));
        }
        Ok(OrderGrant {
            id: GrantId(grant.to_string()),
        })
    }

    fn calendar_events(
        &self,
        citizen: &Citizen,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, ClientError> {
        if let Some(err) = &self.calendar_error {
            return Err(err.clone());
        }
        Ok(self
            .fixtures
            .get(&citizen.national_id)
            .map(|fixture| fixture.events.clone())
            .unwrap_or_default())
    }

    fn assignments(&self, node: &ResolvedReference) -> Result<Vec<Assignment>, ClientError> {
        let mut assignments = self.created_on(&AssignmentTarget::Reference(node.id.clone()));
        if node.id.0 == PLACEMENT_ID {
            assignments.extend(
                self.fixtures
                    .values()
                    .flat_map(|fixture| fixture.placement_assignments.clone()),
            );
        }
        Ok(assignments)
    }

    fn pathway_assignments(&self, pathway: &Pathway) -> Result<Vec<Assignment>, ClientError> {
        let fixture = self.fixture_for_pathway(pathway)?;
        let mut assignments = fixture.pathway_assignments.clone();
        assignments.extend(self.created_on(&AssignmentTarget::Pathway(pathway.id.clone())));
        Ok(assignments)
    }

    fn create_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<Option<Assignment>, ClientError> {
        let mut created = self.created.lock().expect("created mutex poisoned");
        created.push(request.clone());
        if self.create_returns_none {
            return Ok(None);
        }
        Ok(Some(Assignment {
            id: format!("task-{}", created.len()),
            title: request.title.clone(),
            assignment_type: request.assignment_type.clone(),
            responsible_organization: Some(request.responsible_organization.clone()),
        }))
    }

    fn edit_grant(
        &self,
        grant: &ResolvedGrant,
        changes: &GrantChanges,
        transition: TransitionVerb,
    ) -> Result<(), ClientError> {
        if let Some(err) = &self.edit_error {
            return Err(err.clone());
        }
        self.edits
            .lock()
            .expect("edits mutex poisoned")
            .push(GrantEdit {
                grant: grant.clone(),
                changes: changes.clone(),
                verb: transition,
            });
        Ok(())
    }

    fn organizations(&self) -> Result<Vec<Organization>, ClientError> {
        Ok(self
            .organizations
            .iter()
            .map(|(organization, _)| organization.clone())
            .collect())
    }

    fn citizens_by_organization(
        &self,
        organization: &Organization,
    ) -> Result<Vec<Citizen>, ClientError> {
        self.organizations
            .iter()
            .find(|(candidate, _)| candidate.id == organization.id)
            .map(|(_, citizens)| citizens.clone())
            .ok_or_else(|| ClientError::NotFound(format!("organization {}", organization.id)))
    }
}

#[derive(Default)]
pub(crate) struct MemoryBilling {
    pub(crate) fail: bool,
    events: Mutex<Vec<String>>,
}

impl MemoryBilling {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().expect("billing mutex poisoned").clone()
    }
}

impl BillingTracker for MemoryBilling {
    fn track(&self, task_name: &str) -> Result<(), BillingError> {
        if self.fail {
            return Err(BillingError::Transport("ledger offline".to_string()));
        }
        self.events
            .lock()
            .expect("billing mutex poisoned")
            .push(task_name.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueueEntry {
    pub(crate) item: WorkItem,
    pub(crate) state: ItemState,
    pub(crate) message: Option<String>,
}

#[derive(Default)]
pub(crate) struct MemoryQueue {
    entries: Mutex<Vec<QueueEntry>>,
    next_id: AtomicU64,
    reject_adds: bool,
}

impl MemoryQueue {
    pub(crate) fn with_references(references: &[&str]) -> Self {
        let queue = Self::default();
        for reference in references {
            queue
                .add_item(Value::Object(Default::default()), reference)
                .expect("seed queue");
        }
        queue
    }

    pub(crate) fn rejecting() -> Self {
        Self {
            reject_adds: true,
            ..Self::default()
        }
    }

    pub(crate) fn entries(&self) -> Vec<QueueEntry> {
        self.entries.lock().expect("queue mutex poisoned").clone()
    }

    pub(crate) fn state_of(&self, reference: &str) -> Option<ItemState> {
        self.entries()
            .into_iter()
            .find(|entry| entry.item.reference == reference)
            .map(|entry| entry.state)
    }

    fn settle(&self, item_id: u64, state: ItemState, message: Option<&str>) -> Result<(), QueueError> {
        let mut entries = self.entries.lock().expect("queue mutex poisoned");
        let entry = entries
            .iter_mut()
            .find(|entry| entry.item.id == item_id)
            .ok_or(QueueError::UnknownItem(item_id))?;
        if entry.state != ItemState::InProgress {
            return Err(QueueError::NotClaimed { id: item_id });
        }
        entry.state = state;
        entry.message = message.map(str::to_string);
        Ok(())
    }
}

impl WorkQueue for MemoryQueue {
    fn claim_next(&self) -> Result<Option<WorkItem>, QueueError> {
        let mut entries = self.entries.lock().expect("queue mutex poisoned");
        Ok(entries
            .iter_mut()
            .find(|entry| entry.state == ItemState::New)
            .map(|entry| {
                entry.state = ItemState::InProgress;
                entry.item.clone()
            }))
    }

    fn complete(&self, item_id: u64) -> Result<(), QueueError> {
        self.settle(item_id, ItemState::Completed, None)
    }

    fn fail(&self, item_id: u64, message: &str) -> Result<(), QueueError> {
        self.settle(item_id, ItemState::Failed, Some(message))
    }

    fn add_item(&self, data: Value, reference: &str) -> Result<(), QueueError> {
        if self.reject_adds {
            return Err(QueueError::Storage("read only".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries
            .lock()
            .expect("queue mutex poisoned")
            .push(QueueEntry {
                item: WorkItem {
                    id,
                    reference: reference.to_string(),
                    data,
                },
                state: ItemState::New,
                message: None,
            });
        Ok(())
    }

    fn clear(&self, state: ItemState) -> Result<usize, QueueError> {
        let mut entries = self.entries.lock().expect("queue mutex poisoned");
        let before = entries.len();
        entries.retain(|entry| entry.state != state);
        Ok(before - entries.len())
    }
}

pub(crate) fn build_service(
    client: FakeClient,
    billing: MemoryBilling,
) -> (
    AssignmentSyncService<FakeClient, MemoryBilling>,
    Arc<FakeClient>,
    Arc<MemoryBilling>,
) {
    let client = Arc::new(client);
    let billing = Arc::new(billing);
    let service = AssignmentSyncService::new(
        client.clone(),
        billing.clone(),
        &SyncConfig::default(),
        ReferenceData::standard(),
    );
    (service, client, billing)
}
