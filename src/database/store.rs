use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::models::{
    NewOvertimeSubmission, OvertimeStatus, OvertimeSubmission, Stamp, StampKind, SubmissionFilter,
};

/// A status transition applied as one conditional write.
///
/// Only rows whose current status equals `from` are touched; `edited` is
/// always stamped together with every kind in `stamps`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub from: OvertimeStatus,
    pub to: OvertimeStatus,
    pub stamps: Vec<StampKind>,
    pub rejection_reason: Option<String>,
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn stamp(&self) -> Stamp {
        Stamp::new(self.actor.clone(), self.at)
    }

    /// In-place application, shared by stores that work on whole documents.
    pub fn apply(&self, submission: &mut OvertimeSubmission) {
        submission.status = self.to;
        for kind in &self.stamps {
            submission.audit.set(*kind, self.stamp());
        }
        if let Some(reason) = &self.rejection_reason {
            submission.audit.rejection_reason = Some(reason.clone());
        }
        submission.audit.edited = Some(self.stamp());
        submission.version += 1;
    }
}

/// The submissions collection.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OvertimeSubmission>>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<OvertimeSubmission>>;

    /// Newest first.
    async fn find(&self, filter: &SubmissionFilter) -> Result<Vec<OvertimeSubmission>>;

    async fn insert(&self, submission: NewOvertimeSubmission) -> Result<OvertimeSubmission>;

    /// Replace the whole document if its stored version still equals
    /// `submission.version - 1`. Returns `false` when the write lost a race.
    async fn replace(&self, submission: &OvertimeSubmission) -> Result<bool>;

    /// Apply `change` to every id whose status is still `change.from`.
    /// Returns the ids actually modified.
    async fn apply_status_change(&self, ids: &[Uuid], change: &StatusChange) -> Result<Vec<Uuid>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Atomically reserve the next internal-id sequence number for a year suffix.
    async fn next_internal_sequence(&self, year_suffix: &str) -> Result<u32>;
}
