use care_sync::error::AppError;
use care_sync::workflows::assignments::{
    Assignment, AssignmentRequest, AssignmentTarget, BillingError, BillingTracker, CalendarEvent,
    CaseManagementClient, Citizen, ClientError, GrantChanges, GrantLink, OrderGrant, Organization,
    Pathway, PathwayReference, ReferenceId, ResolvedGrant, ResolvedReference, TransitionVerb,
};
use care_sync::workflows::queue::{ItemState, QueueError, WorkItem, WorkQueue};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Offline export of the case-management platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CaseSnapshot {
    #[serde(default)]
    pub(crate) organizations: Vec<OrganizationRecord>,
    #[serde(default)]
    pub(crate) citizens: Vec<CitizenRecord>,
    /// Current order grants keyed by link href.
    #[serde(default)]
    pub(crate) order_grants: HashMap<String, OrderGrant>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OrganizationRecord {
    pub(crate) id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) citizens: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CitizenRecord {
    pub(crate) citizen: Citizen,
    pub(crate) pathway: Pathway,
    #[serde(default)]
    pub(crate) references: Vec<PathwayReference>,
    #[serde(default)]
    pub(crate) resolved: HashMap<ReferenceId, ResolvedReference>,
    #[serde(default)]
    pub(crate) events: Vec<CalendarEvent>,
    #[serde(default)]
    pub(crate) assignments: HashMap<ReferenceId, Vec<Assignment>>,
    /// Assignments attached to the pathway itself.
    #[serde(default)]
    pub(crate) pathway_assignments: Vec<Assignment>,
}

/// Mutation requested against the platform during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub(crate) enum Mutation {
    GrantEdited {
        grant: ResolvedGrant,
        transition: TransitionVerb,
        changes: GrantChanges,
    },
    AssignmentCreated {
        request: AssignmentRequest,
        assignment: Assignment,
    },
}

/// Case-management client answering from a [`CaseSnapshot`]; mutations are
/// recorded rather than sent anywhere.
pub(crate) struct SnapshotCaseClient {
    snapshot: CaseSnapshot,
    created: Mutex<HashMap<AssignmentTarget, Vec<Assignment>>>,
    mutations: Mutex<Vec<Mutation>>,
}

impl SnapshotCaseClient {
    pub(crate) fn new(snapshot: CaseSnapshot) -> Self {
        Self {
            snapshot,
            created: Mutex::new(HashMap::new()),
            mutations: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn open(path: &Path) -> Result<Self, AppError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: CaseSnapshot = serde_json::from_reader(reader)
            .map_err(|err| AppError::Snapshot(format!("{}: {err}", path.display())))?;
        debug!(
            path = %path.display(),
            citizens = snapshot.citizens.len(),
            organizations = snapshot.organizations.len(),
            "case snapshot loaded"
        );
        Ok(Self::new(snapshot))
    }

    pub(crate) fn mutations(&self) -> Vec<Mutation> {
        self.mutations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn record(&self, mutation: Mutation) -> Result<(), ClientError> {
        self.mutations
            .lock()
            .map_err(|_| ClientError::Unavailable("mutation log poisoned".to_string()))?
            .push(mutation);
        Ok(())
    }

    fn citizen_record(&self, national_id: &str) -> Result<&CitizenRecord, ClientError> {
        self.snapshot
            .citizens
            .iter()
            .find(|record| record.citizen.national_id == national_id)
            .ok_or_else(|| ClientError::NotFound(format!("citizen {national_id}")))
    }

    fn created_on(&self, target: &AssignmentTarget) -> Result<Vec<Assignment>, ClientError> {
        let created = self
            .created
            .lock()
            .map_err(|_| ClientError::Unavailable("assignment store poisoned".to_string()))?;
        Ok(created.get(target).cloned().unwrap_or_default())
    }

    fn resolved(&self, id: &ReferenceId) -> Option<&ResolvedReference> {
        self.snapshot
            .citizens
            .iter()
            .find_map(|record| record.resolved.get(id))
    }
}

impl CaseManagementClient for SnapshotCaseClient {
    fn citizen(&self, national_id: &str) -> Result<Citizen, ClientError> {
        Ok(self.citizen_record(national_id.trim())?.citizen.clone())
    }

    fn citizen_pathway(&self, citizen: &Citizen) -> Result<Pathway, ClientError> {
        Ok(self.citizen_record(&citizen.national_id)?.pathway.clone())
    }

    fn pathway_references(&self, pathway: &Pathway) -> Result<Vec<PathwayReference>, ClientError> {
        self.snapshot
            .citizens
            .iter()
            .find(|record| record.pathway.id == pathway.id)
            .map(|record| record.references.clone())
            .ok_or_else(|| ClientError::NotFound(format!("pathway {}", pathway.name)))
    }

    fn resolve_reference(
        &self,
        reference: &PathwayReference,
    ) -> Result<ResolvedReference, ClientError> {
        Ok(self
            .resolved(&reference.id)
            .cloned()
            .unwrap_or_else(|| ResolvedReference {
                id: reference.id.clone(),
                name: reference.name.clone(),
                current_order_grant: None,
                inline_grant_id: None,
            }))
    }

    fn current_order_grant(&self, link: &GrantLink) -> Result<OrderGrant, ClientError> {
        self.snapshot
            .order_grants
            .get(&link.href)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("order grant {}", link.href)))
    }

    fn calendar_events(
        &self,
        citizen: &Citizen,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarEvent>, ClientError> {
        // Undated events are kept; the export may predate start times.
        Ok(self
            .citizen_record(&citizen.national_id)?
            .events
            .iter()
            .filter(|event| {
                event
                    .starts_at
                    .map_or(true, |start| (from..=to).contains(&start.date_naive()))
            })
            .cloned()
            .collect())
    }

    fn assignments(&self, node: &ResolvedReference) -> Result<Vec<Assignment>, ClientError> {
        let mut assignments: Vec<Assignment> = self
            .snapshot
            .citizens
            .iter()
            .find_map(|record| record.assignments.get(&node.id))
            .cloned()
            .unwrap_or_default();
        assignments.extend(self.created_on(&AssignmentTarget::Reference(node.id.clone()))?);
        Ok(assignments)
    }

    fn pathway_assignments(&self, pathway: &Pathway) -> Result<Vec<Assignment>, ClientError> {
        let mut assignments = self
            .snapshot
            .citizens
            .iter()
            .find(|record| record.pathway.id == pathway.id)
            .map(|record| record.pathway_assignments.clone())
            .ok_or_else(|| ClientError::NotFound(format!("pathway {}", pathway.name)))?;
        assignments.extend(self.created_on(&AssignmentTarget::Pathway(pathway.id.clone()))?);
        Ok(assignments)
    }

    fn create_assignment(
        &self,
        request: &AssignmentRequest,
    ) -> Result<Option<Assignment>, ClientError> {
        let mut created = self
            .created
            .lock()
            .map_err(|_| ClientError::Unavailable("assignment store poisoned".to_string()))?;
        let label = match &request.target {
            AssignmentTarget::Reference(id) => id.0.clone(),
            AssignmentTarget::Pathway(id) => id.0.clone(),
        };
        let entry = created.entry(request.target.clone()).or_default();
        let assignment = Assignment {
            id: format!("local-{label}-{}", entry.len() + 1),
            title: request.title.clone(),
            assignment_type: request.assignment_type.clone(),
            responsible_organization: Some(request.responsible_organization.clone()),
        };
        entry.push(assignment.clone());
        drop(created);

        self.record(Mutation::AssignmentCreated {
            request: request.clone(),
            assignment: assignment.clone(),
        })?;
        Ok(Some(assignment))
    }

    fn edit_grant(
        &self,
        grant: &ResolvedGrant,
        changes: &GrantChanges,
        transition: TransitionVerb,
    ) -> Result<(), ClientError> {
        self.record(Mutation::GrantEdited {
            grant: grant.clone(),
            transition,
            changes: changes.clone(),
        })
    }

    fn organizations(&self) -> Result<Vec<Organization>, ClientError> {
        Ok(self
            .snapshot
            .organizations
            .iter()
            .map(|record| Organization {
                id: record.id.clone(),
                name: record.name.clone(),
            })
            .collect())
    }

    fn citizens_by_organization(
        &self,
        organization: &Organization,
    ) -> Result<Vec<Citizen>, ClientError> {
        let record = self
            .snapshot
            .organizations
            .iter()
            .find(|record| record.id == organization.id)
            .ok_or_else(|| ClientError::NotFound(format!("organization {}", organization.name)))?;

        Ok(record
            .citizens
            .iter()
            .map(|national_id| {
                self.citizen_record(national_id)
                    .map(|found| found.citizen.clone())
                    .unwrap_or_else(|_| Citizen {
                        national_id: national_id.clone(),
                        name: String::new(),
                        status: String::new(),
                    })
            })
            .collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct QueueFile {
    next_id: u64,
    items: Vec<StoredItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredItem {
    #[serde(flatten)]
    pub(crate) item: WorkItem,
    pub(crate) state: ItemState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

/// Work queue persisted as one JSON document, rewritten after every change.
pub(crate) struct JsonFileWorkQueue {
    path: PathBuf,
    state: Mutex<QueueFile>,
}

impl JsonFileWorkQueue {
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let path = path.into();
        let state = match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))
                .map_err(|err| QueueError::Storage(format!("{}: {err}", path.display())))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => QueueFile::default(),
            Err(err) => return Err(QueueError::Storage(format!("{}: {err}", path.display()))),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub(crate) fn items(&self) -> Vec<StoredItem> {
        self.state
            .lock()
            .map(|guard| guard.items.clone())
            .unwrap_or_default()
    }

    fn update<T>(&self, change: impl FnOnce(&mut QueueFile) -> Result<T, QueueError>) -> Result<T, QueueError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| QueueError::Storage("queue state poisoned".to_string()))?;
        let result = change(&mut *state)?;
        self.persist(&*state)?;
        Ok(result)
    }

    fn persist(&self, state: &QueueFile) -> Result<(), QueueError> {
        let storage = |err: &dyn std::fmt::Display| {
            QueueError::Storage(format!("{}: {err}", self.path.display()))
        };
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| storage(&err))?;
        }
        let staging = self.path.with_extension("json.tmp");
        let file = File::create(&staging).map_err(|err| storage(&err))?;
        serde_json::to_writer_pretty(file, state).map_err(|err| storage(&err))?;
        fs::rename(&staging, &self.path).map_err(|err| storage(&err))
    }

    fn settle(&self, item_id: u64, state: ItemState, message: Option<&str>) -> Result<(), QueueError> {
        self.update(|file| {
            let stored = file
                .items
                .iter_mut()
                .find(|stored| stored.item.id == item_id)
                .ok_or(QueueError::UnknownItem(item_id))?;
            if stored.state != ItemState::InProgress {
                return Err(QueueError::NotClaimed { id: item_id });
            }
            stored.state = state;
            stored.message = message.map(str::to_string);
            Ok(())
        })
    }
}

impl WorkQueue for JsonFileWorkQueue {
    fn claim_next(&self) -> Result<Option<WorkItem>, QueueError> {
        self.update(|file| {
            Ok(file
                .items
                .iter_mut()
                .find(|stored| stored.state == ItemState::New)
                .map(|stored| {
                    stored.state = ItemState::InProgress;
                    stored.item.clone()
                }))
        })
    }

    fn complete(&self, item_id: u64) -> Result<(), QueueError> {
        self.settle(item_id, ItemState::Completed, None)
    }

    fn fail(&self, item_id: u64, message: &str) -> Result<(), QueueError> {
        self.settle(item_id, ItemState::Failed, Some(message))
    }

    fn add_item(&self, data: Value, reference: &str) -> Result<(), QueueError> {
        self.update(|file| {
            file.next_id += 1;
            file.items.push(StoredItem {
                item: WorkItem {
                    id: file.next_id,
                    reference: reference.to_string(),
                    data,
                },
                state: ItemState::New,
                message: None,
            });
            Ok(())
        })
    }

    fn clear(&self, state: ItemState) -> Result<usize, QueueError> {
        self.update(|file| {
            let before = file.items.len();
            file.items.retain(|stored| stored.state != state);
            Ok(before - file.items.len())
        })
    }
}

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    recorded_at: String,
    task: &'a str,
}

/// Appends one CSV row per billable task.
pub(crate) struct CsvBillingLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvBillingLedger {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl BillingTracker for CsvBillingLedger {
    fn track(&self, task_name: &str) -> Result<(), BillingError> {
        let transport = |err: &dyn std::fmt::Display| {
            BillingError::Transport(format!("{}: {err}", self.path.display()))
        };
        let _guard = self
            .lock
            .lock()
            .map_err(|_| BillingError::Transport("ledger lock poisoned".to_string()))?;

        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| transport(&err))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(LedgerRow {
                recorded_at: Utc::now().to_rfc3339(),
                task: task_name,
            })
            .map_err(|err| transport(&err))?;
        writer.flush().map_err(|err| transport(&err))?;

        info!(task = task_name, "billing recorded");
        Ok(())
    }
}
