//! Batched status transitions over many submissions.
//!
//! Eligibility is decided per submission (policy, then state machine) and
//! ineligible ones are skipped silently. Eligible submissions are grouped by
//! their planned transition and each group is written with one conditional
//! update, so a submission can move at most once per call.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::database::models::OvertimeSubmission;
use crate::error::ActionError;
use crate::services::overtime::OvertimeService;
use crate::services::policy::{Actor, Transition, can_transition};
use crate::services::state_machine::{self, Outcome, Plan};

const BULK_APPROVE: &str = "bulkApproveOvertimeSubmissions";
const BULK_REJECT: &str = "bulkRejectOvertimeSubmissions";
const BULK_MARK_AS_ACCOUNTED: &str = "bulkMarkAsAccountedOvertimeSubmissions";
const BULK_CANCEL: &str = "bulkCancelOvertimeRequests";

/// `count < total` means some requested submissions were skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub success: Outcome,
    pub count: usize,
    pub total: usize,
}

/// Eligible submissions sharing one planned transition.
struct Group {
    plan: Plan,
    members: Vec<OvertimeSubmission>,
}

fn partition(
    actor: &Actor,
    submissions: Vec<OvertimeSubmission>,
    transition: Transition,
    planner: impl Fn(&OvertimeSubmission) -> Result<Plan, ActionError>,
) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();

    for submission in submissions {
        if !can_transition(actor, &submission, transition).is_allowed() {
            log::debug!(
                "Skipping {}: {} not allowed for {}",
                submission.internal_id,
                transition.as_str(),
                actor.email
            );
            continue;
        }
        let Ok(plan) = planner(&submission) else {
            log::debug!(
                "Skipping {}: {} not allowed from {}",
                submission.internal_id,
                transition.as_str(),
                submission.status
            );
            continue;
        };

        match groups.iter_mut().find(|g| g.plan == plan) {
            Some(group) => group.members.push(submission),
            None => groups.push(Group {
                plan,
                members: vec![submission],
            }),
        }
    }

    groups
}

impl OvertimeService {
    async fn bulk_transition(
        &self,
        actor: &Actor,
        ids: &[Uuid],
        transition: Transition,
        action: &'static str,
        success: Outcome,
        rejection_reason: Option<String>,
        planner: impl Fn(&OvertimeSubmission) -> Result<Plan, ActionError>,
    ) -> Result<BulkOutcome, ActionError> {
        let submissions = self
            .store
            .find_by_ids(ids)
            .await
            .map_err(|e| ActionError::server(action, e))?;

        let groups = partition(actor, submissions, transition, planner);
        if groups.is_empty() {
            return Err(ActionError::NoValidSubmissions);
        }

        let now = Utc::now();
        let mut count = 0;

        for Group { plan, members } in groups {
            let member_ids: Vec<Uuid> = members.iter().map(|s| s.id).collect();
            let change = plan
                .clone()
                .into_change(actor, now, rejection_reason.clone());
            let modified = self
                .store
                .apply_status_change(&member_ids, &change)
                .await
                .map_err(|e| ActionError::server(action, e))?;

            if modified.len() < member_ids.len() {
                log::warn!(
                    "{}: {} of {} submissions changed concurrently ({} -> {})",
                    action,
                    member_ids.len() - modified.len(),
                    member_ids.len(),
                    plan.from,
                    plan.to
                );
            }
            count += modified.len();

            for submission in members.iter().filter(|s| modified.contains(&s.id)) {
                self.notify(submission, &plan, rejection_reason.as_deref());
            }
        }

        log::info!(
            "{} by {}: {} of {} submissions modified",
            action,
            actor.email,
            count,
            ids.len()
        );
        if count == 0 {
            return Err(ActionError::NoValidSubmissions);
        }
        self.committed().await;

        Ok(BulkOutcome {
            success,
            count,
            total: ids.len(),
        })
    }

    /// Approve every eligible submission. Overtime requests advance one stage
    /// (or both, for a final approver); other kinds are approved directly.
    pub async fn bulk_approve(&self, actor: &Actor, ids: &[Uuid]) -> Result<BulkOutcome, ActionError> {
        self.bulk_transition(
            actor,
            ids,
            Transition::Approve,
            BULK_APPROVE,
            Outcome::Approved,
            None,
            |s| state_machine::plan_approve(s, actor),
        )
        .await
    }

    pub async fn bulk_reject(
        &self,
        actor: &Actor,
        ids: &[Uuid],
        reason: &str,
    ) -> Result<BulkOutcome, ActionError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ActionError::ReasonRequired);
        }

        self.bulk_transition(
            actor,
            ids,
            Transition::Reject,
            BULK_REJECT,
            Outcome::Rejected,
            Some(reason.to_string()),
            state_machine::plan_reject,
        )
        .await
    }

    pub async fn bulk_mark_as_accounted(
        &self,
        actor: &Actor,
        ids: &[Uuid],
    ) -> Result<BulkOutcome, ActionError> {
        self.bulk_transition(
            actor,
            ids,
            Transition::MarkAsAccounted,
            BULK_MARK_AS_ACCOUNTED,
            Outcome::Accounted,
            None,
            state_machine::plan_mark_as_accounted,
        )
        .await
    }

    pub async fn bulk_cancel(&self, actor: &Actor, ids: &[Uuid]) -> Result<BulkOutcome, ActionError> {
        self.bulk_transition(
            actor,
            ids,
            Transition::Cancel,
            BULK_CANCEL,
            Outcome::Cancelled,
            None,
            state_machine::plan_cancel,
        )
        .await
    }
}
