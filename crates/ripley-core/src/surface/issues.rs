// ── Issues surface ──

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use ripley_api::events::{IssueCreatedPayload, unwrap_nested};
use ripley_api::models::IssueRecord;
use ripley_api::{EventKind, SnapshotSource};

use crate::error::CoreError;
use crate::model::Issue;
use crate::store::{EntityCollection, Snapshot};
use crate::stream::EntityStream;
use crate::view::{Surface, payload};

/// Active (unresolved) issues, keyed by id.
pub struct IssuesSurface {
    issues: EntityCollection<Issue>,
}

impl Default for IssuesSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl IssuesSurface {
    pub fn new() -> Self {
        Self {
            issues: EntityCollection::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot<Issue> {
        self.issues.snapshot()
    }

    pub fn stream(&self) -> EntityStream<Issue> {
        EntityStream::new(self.issues.subscribe())
    }

    pub fn get(&self, id: i64) -> Option<Arc<Issue>> {
        self.issues.get(&id.to_string())
    }
}

#[async_trait]
impl Surface for IssuesSurface {
    const NAME: &'static str = "issues";

    const EVENT_TYPES: &'static [EventKind] = &[EventKind::IssueCreated];

    type Fetched = Vec<IssueRecord>;

    async fn fetch(source: &dyn SnapshotSource) -> Result<Vec<IssueRecord>, CoreError> {
        Ok(source.active_issues().await?)
    }

    fn apply_snapshot(&self, fetched: Vec<IssueRecord>) {
        let items = fetched
            .into_iter()
            .map(Issue::from)
            .map(|issue| (issue.key(), issue))
            .collect();
        self.issues.upsert_and_prune(items, |_, fresh| fresh);
    }

    fn apply_event(&self, kind: EventKind, data: &Value) -> Result<(), CoreError> {
        if kind == EventKind::IssueCreated {
            let record: IssueCreatedPayload = payload(kind, unwrap_nested(data, "issue"))?;
            let issue = Issue::from(record);
            if issue.resolved {
                self.issues.remove(&issue.key());
            } else {
                self.issues.upsert(issue.key(), issue);
            }
        }
        Ok(())
    }
}
