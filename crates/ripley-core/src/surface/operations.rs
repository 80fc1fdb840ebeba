// ── Operations surface ──
//
// Service operations and upscaling jobs share one collection (keys
// `op:{id}` / `job:{id}`); agents live in their own. Snapshots are treated
// as authoritative and replace whatever events built.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use ripley_api::events::{
    AgentStatusChangedPayload, JobStatusChangedPayload, OperationCompletedPayload,
    OperationFailedPayload, OperationProgressPayload, OperationStartedPayload,
};
use ripley_api::models::{AgentRecord, OperationRecord, UpscalingJobRecord};
use ripley_api::{EventKind, SnapshotSource};

use crate::error::CoreError;
use crate::model::{Agent, Operation, OperationKind, OperationStatus, operation_key};
use crate::store::{EntityCollection, Snapshot};
use crate::stream::EntityStream;
use crate::view::{Surface, payload};

/// Everything one operations resync fetches. All three reads must succeed.
#[derive(Debug, Clone)]
pub struct OperationsSnapshot {
    pub operations: Vec<OperationRecord>,
    pub jobs: Vec<UpscalingJobRecord>,
    pub agents: Vec<AgentRecord>,
}

pub struct OperationsSurface {
    operations: EntityCollection<Operation>,
    agents: EntityCollection<Agent>,
}

impl Default for OperationsSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationsSurface {
    pub fn new() -> Self {
        Self {
            operations: EntityCollection::new(),
            agents: EntityCollection::new(),
        }
    }

    pub fn operations(&self) -> Snapshot<Operation> {
        self.operations.snapshot()
    }

    pub fn operations_stream(&self) -> EntityStream<Operation> {
        EntityStream::new(self.operations.subscribe())
    }

    pub fn operation(&self, kind: OperationKind, id: &str) -> Option<Arc<Operation>> {
        self.operations.get(&operation_key(kind, id))
    }

    pub fn agents(&self) -> Snapshot<Agent> {
        self.agents.snapshot()
    }

    pub fn agents_stream(&self) -> EntityStream<Agent> {
        EntityStream::new(self.agents.subscribe())
    }

    pub fn agent(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.agents.get(agent_id)
    }

    fn upsert_operation(&self, kind: OperationKind, id: &str, modify: impl FnOnce(&mut Operation)) {
        self.operations.upsert_with(operation_key(kind, id), |existing| {
            let mut op = existing
                .cloned()
                .unwrap_or_else(|| Operation::new(kind, id));
            modify(&mut op);
            op
        });
    }
}

#[async_trait]
impl Surface for OperationsSurface {
    const NAME: &'static str = "operations";

    const EVENT_TYPES: &'static [EventKind] = &[
        EventKind::OperationStarted,
        EventKind::OperationProgress,
        EventKind::OperationCompleted,
        EventKind::OperationFailed,
        EventKind::UpscalingJobStatusChanged,
        EventKind::AgentStatusChanged,
    ];

    type Fetched = OperationsSnapshot;

    async fn fetch(source: &dyn SnapshotSource) -> Result<OperationsSnapshot, CoreError> {
        let (operations, jobs, agents) =
            tokio::try_join!(source.operations(), source.upscaling_jobs(), source.agents())?;
        Ok(OperationsSnapshot {
            operations,
            jobs,
            agents,
        })
    }

    fn apply_snapshot(&self, fetched: OperationsSnapshot) {
        let items = fetched
            .operations
            .into_iter()
            .map(Operation::from)
            .chain(fetched.jobs.into_iter().map(Operation::from))
            .map(|op| (op.key(), op))
            .collect();
        self.operations.upsert_and_prune(items, |_, fresh| fresh);

        let agents = fetched
            .agents
            .into_iter()
            .map(|a| (a.agent_id.clone(), Agent::from(a)))
            .collect();
        self.agents.upsert_and_prune(agents, |_, fresh| fresh);
    }

    fn apply_event(&self, kind: EventKind, data: &Value) -> Result<(), CoreError> {
        let now = Utc::now();
        match kind {
            EventKind::OperationStarted => {
                let p: OperationStartedPayload = payload(kind, data)?;
                self.upsert_operation(OperationKind::Operation, &p.operation_id, |op| {
                    op.status = OperationStatus::Running;
                    op.progress = 0.0;
                    op.error = None;
                    op.completed_at = None;
                    op.started_at.get_or_insert(now);
                    if p.operation_type.is_some() {
                        op.operation_type = p.operation_type;
                    }
                    if p.drive.is_some() {
                        op.drive = p.drive;
                    }
                    if p.title.is_some() {
                        op.title = p.title;
                    }
                    if p.message.is_some() {
                        op.message = p.message;
                    }
                });
            }
            EventKind::OperationProgress => {
                let p: OperationProgressPayload = payload(kind, data)?;
                self.upsert_operation(OperationKind::Operation, &p.operation_id, |op| {
                    op.status = OperationStatus::Running;
                    op.progress = p.progress.clamp(0.0, 1.0);
                    if p.message.is_some() {
                        op.message = p.message;
                    }
                });
            }
            EventKind::OperationCompleted => {
                let p: OperationCompletedPayload = payload(kind, data)?;
                self.upsert_operation(OperationKind::Operation, &p.operation_id, |op| {
                    op.status = OperationStatus::Completed;
                    op.progress = 1.0;
                    op.completed_at = Some(now);
                    if p.message.is_some() {
                        op.message = p.message;
                    }
                });
            }
            EventKind::OperationFailed => {
                let p: OperationFailedPayload = payload(kind, data)?;
                self.upsert_operation(OperationKind::Operation, &p.operation_id, |op| {
                    op.status = OperationStatus::Failed;
                    op.completed_at = Some(now);
                    op.error = p.error;
                });
            }
            EventKind::UpscalingJobStatusChanged => {
                let p: JobStatusChangedPayload = payload(kind, data)?;
                self.upsert_operation(OperationKind::UpscalingJob, &p.job_id, |job| {
                    job.status = p.status;
                    job.operation_type.get_or_insert_with(|| "upscale".into());
                    if let Some(progress) = p.progress {
                        job.progress = progress.clamp(0.0, 1.0);
                    }
                    if p.error_message.is_some() {
                        job.error = p.error_message;
                    }
                    if p.agent_id.is_some() {
                        job.agent_id = p.agent_id;
                    }
                    if p.status == OperationStatus::Running {
                        job.started_at.get_or_insert(now);
                    }
                    if p.status.is_terminal() {
                        job.completed_at.get_or_insert(now);
                    }
                });
            }
            EventKind::AgentStatusChanged => {
                let p: AgentStatusChangedPayload = payload(kind, data)?;
                self.agents.upsert_with(p.agent_id.clone(), |existing| Agent {
                    agent_id: p.agent_id,
                    name: p.name.or_else(|| existing.and_then(|a| a.name.clone())),
                    status: p.status,
                    last_seen: Some(now),
                });
            }
            _ => {}
        }
        Ok(())
    }
}
