use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::models::{NewOvertimeSubmission, OvertimeSubmission, SubmissionFilter};
use crate::database::store::{StatusChange, SubmissionStore};
use crate::services::internal_id;

/// Process-local store used in development and tests.
///
/// Every operation holds the lock for its whole read-modify-write, which makes
/// the conditional writes atomic.
#[derive(Default)]
pub struct InMemorySubmissionStore {
    submissions: RwLock<HashMap<Uuid, OvertimeSubmission>>,
    reserved_sequences: RwLock<HashMap<String, u32>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed document, bypassing id assignment. Test seeding only.
    pub async fn seed(&self, submission: OvertimeSubmission) {
        self.submissions
            .write()
            .await
            .insert(submission.id, submission);
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OvertimeSubmission>> {
        Ok(self.submissions.read().await.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<OvertimeSubmission>> {
        let submissions = self.submissions.read().await;
        let mut found: Vec<OvertimeSubmission> = Vec::new();
        for id in ids {
            if found.iter().any(|s| s.id == *id) {
                continue;
            }
            if let Some(submission) = submissions.get(id) {
                found.push(submission.clone());
            }
        }
        Ok(found)
    }

    async fn find(&self, filter: &SubmissionFilter) -> Result<Vec<OvertimeSubmission>> {
        let mut found: Vec<OvertimeSubmission> = self
            .submissions
            .read()
            .await
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn insert(&self, submission: NewOvertimeSubmission) -> Result<OvertimeSubmission> {
        let mut submissions = self.submissions.write().await;
        if submissions
            .values()
            .any(|s| s.internal_id == submission.internal_id)
        {
            anyhow::bail!("duplicate internal id {}", submission.internal_id);
        }
        let created = submission.into_submission(Uuid::new_v4());
        submissions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn replace(&self, submission: &OvertimeSubmission) -> Result<bool> {
        let mut submissions = self.submissions.write().await;
        match submissions.get_mut(&submission.id) {
            Some(stored) if stored.version + 1 == submission.version => {
                *stored = submission.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_status_change(&self, ids: &[Uuid], change: &StatusChange) -> Result<Vec<Uuid>> {
        let mut submissions = self.submissions.write().await;
        let mut modified = Vec::new();
        for id in ids {
            if let Some(stored) = submissions.get_mut(id) {
                if stored.status == change.from {
                    change.apply(stored);
                    modified.push(*id);
                }
            }
        }
        Ok(modified)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.submissions.write().await.remove(&id).is_some())
    }

    async fn next_internal_sequence(&self, year_suffix: &str) -> Result<u32> {
        let submissions = self.submissions.read().await;
        let mut reserved = self.reserved_sequences.write().await;
        let scanned = internal_id::next_sequence(
            submissions.values().map(|s| s.internal_id.as_str()),
            year_suffix,
        );
        let last = reserved.entry(year_suffix.to_string()).or_insert(0);
        *last = scanned.max(*last + 1);
        Ok(*last)
    }
}
