//! Allowed status transitions and the stamps each one writes.
//!
//! Planning never touches the store: the engine turns a [`Plan`] into a
//! [`StatusChange`] and lets the store apply it conditionally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::{OvertimeStatus, OvertimeSubmission, StampKind, SubmissionKind};
use crate::database::store::StatusChange;
use crate::error::ActionError;
use crate::services::policy::Actor;

/// Success tag returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Inserted,
    Approved,
    SupervisorApproved,
    PlantManagerApproved,
    Rejected,
    Accounted,
    Cancelled,
    Completed,
    Corrected,
    Updated,
    Deleted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Inserted => "inserted",
            Outcome::Approved => "approved",
            Outcome::SupervisorApproved => "supervisor-approved",
            Outcome::PlantManagerApproved => "plant-manager-approved",
            Outcome::Rejected => "rejected",
            Outcome::Accounted => "accounted",
            Outcome::Cancelled => "cancelled",
            Outcome::Completed => "completed",
            Outcome::Corrected => "corrected",
            Outcome::Updated => "updated",
            Outcome::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which approval step a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalStage {
    Supervisor,
    Final,
}

impl ApprovalStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStage::Supervisor => "supervisor",
            ApprovalStage::Final => "final",
        }
    }
}

/// A planned status transition for one submission.
///
/// Two submissions with equal plans can be written in the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Plan {
    pub from: OvertimeStatus,
    pub to: OvertimeStatus,
    pub stamps: Vec<StampKind>,
    pub outcome: Outcome,
}

impl Plan {
    fn new(
        from: OvertimeStatus,
        to: OvertimeStatus,
        stamps: &[StampKind],
        outcome: Outcome,
    ) -> Self {
        Self {
            from,
            to,
            stamps: stamps.to_vec(),
            outcome,
        }
    }

    pub fn approval_stage(&self) -> Option<ApprovalStage> {
        match self.outcome {
            Outcome::SupervisorApproved => Some(ApprovalStage::Supervisor),
            Outcome::Approved | Outcome::PlantManagerApproved => Some(ApprovalStage::Final),
            _ => None,
        }
    }

    pub fn into_change(
        self,
        actor: &Actor,
        at: DateTime<Utc>,
        rejection_reason: Option<String>,
    ) -> StatusChange {
        StatusChange {
            from: self.from,
            to: self.to,
            stamps: self.stamps,
            rejection_reason,
            actor: actor.email.clone(),
            at,
        }
    }
}

pub fn plan_approve(submission: &OvertimeSubmission, actor: &Actor) -> Result<Plan, ActionError> {
    use OvertimeStatus::*;

    match (submission.status, submission.kind) {
        (Pending, SubmissionKind::OvertimeRequest) if actor.is_final_approver() => Ok(Plan::new(
            Pending,
            Approved,
            &[
                StampKind::SupervisorApproved,
                StampKind::PlantManagerApproved,
                StampKind::Approved,
            ],
            Outcome::Approved,
        )),
        (Pending, SubmissionKind::OvertimeRequest) => Ok(Plan::new(
            Pending,
            PendingPlantManager,
            &[StampKind::SupervisorApproved],
            Outcome::SupervisorApproved,
        )),
        (Pending, _) => Ok(Plan::new(
            Pending,
            Approved,
            &[StampKind::Approved],
            Outcome::Approved,
        )),
        (PendingPlantManager, SubmissionKind::OvertimeRequest) => Ok(Plan::new(
            PendingPlantManager,
            Approved,
            &[StampKind::PlantManagerApproved, StampKind::Approved],
            Outcome::PlantManagerApproved,
        )),
        _ => Err(ActionError::InvalidStatus),
    }
}

pub fn plan_reject(submission: &OvertimeSubmission) -> Result<Plan, ActionError> {
    match submission.status {
        OvertimeStatus::Pending => Ok(Plan::new(
            OvertimeStatus::Pending,
            OvertimeStatus::Rejected,
            &[StampKind::Rejected],
            Outcome::Rejected,
        )),
        _ => Err(ActionError::InvalidStatus),
    }
}

pub fn plan_mark_as_accounted(submission: &OvertimeSubmission) -> Result<Plan, ActionError> {
    match (submission.status, submission.kind) {
        (_, SubmissionKind::Production) => Err(ActionError::InvalidStatus),
        (OvertimeStatus::Approved, _) => Ok(Plan::new(
            OvertimeStatus::Approved,
            OvertimeStatus::Accounted,
            &[StampKind::Accounted],
            Outcome::Accounted,
        )),
        _ => Err(ActionError::InvalidStatus),
    }
}

pub fn plan_cancel(submission: &OvertimeSubmission) -> Result<Plan, ActionError> {
    match submission.status {
        OvertimeStatus::Pending => Ok(Plan::new(
            OvertimeStatus::Pending,
            OvertimeStatus::Cancelled,
            &[StampKind::Cancelled],
            Outcome::Cancelled,
        )),
        _ => Err(ActionError::CannotCancel),
    }
}

/// Production submissions close with their actual output instead of being accounted.
pub fn plan_complete(submission: &OvertimeSubmission) -> Result<Plan, ActionError> {
    match (submission.status, submission.kind) {
        (OvertimeStatus::Approved, SubmissionKind::Production) => Ok(Plan::new(
            OvertimeStatus::Approved,
            OvertimeStatus::Completed,
            &[StampKind::Completed],
            Outcome::Completed,
        )),
        _ => Err(ActionError::InvalidStatus),
    }
}

pub fn check_correctable(submission: &OvertimeSubmission) -> Result<(), ActionError> {
    if submission.status.is_settled() {
        return Err(ActionError::CannotCorrectAccounted);
    }
    Ok(())
}

pub fn check_editable(submission: &OvertimeSubmission) -> Result<(), ActionError> {
    check_correctable(submission)?;
    match submission.status {
        OvertimeStatus::Cancelled | OvertimeStatus::Rejected => Err(ActionError::InvalidStatus),
        _ => Ok(()),
    }
}

pub fn check_days_off_editable(submission: &OvertimeSubmission) -> Result<(), ActionError> {
    match (submission.status, submission.kind) {
        (OvertimeStatus::Pending | OvertimeStatus::Approved, SubmissionKind::Production) => Ok(()),
        _ => Err(ActionError::InvalidStatus),
    }
}

/// Status after a correction or edit.
///
/// HR and admin changes send an open submission back through approval;
/// closed ones keep their status. `mark_as_cancelled` wins over both.
pub fn rewrite_target(
    submission: &OvertimeSubmission,
    actor: &Actor,
    mark_as_cancelled: bool,
) -> OvertimeStatus {
    if mark_as_cancelled {
        OvertimeStatus::Cancelled
    } else if submission.status.is_closed() {
        submission.status
    } else if actor.is_admin() || actor.is_hr() {
        OvertimeStatus::Pending
    } else {
        submission.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{actor, submission};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_approval_is_single_step() {
        let s = submission(SubmissionKind::Standard, OvertimeStatus::Pending);
        let plan = plan_approve(&s, &actor("boss@plant.test", &[])).unwrap();
        assert_eq!(plan.to, OvertimeStatus::Approved);
        assert_eq!(plan.stamps, vec![StampKind::Approved]);
        assert_eq!(plan.outcome, Outcome::Approved);
        assert_eq!(plan.approval_stage(), Some(ApprovalStage::Final));
    }

    #[test]
    fn test_overtime_request_goes_through_two_stages() {
        let s = submission(SubmissionKind::OvertimeRequest, OvertimeStatus::Pending);
        let first = plan_approve(&s, &actor("boss@plant.test", &[])).unwrap();
        assert_eq!(first.to, OvertimeStatus::PendingPlantManager);
        assert_eq!(first.outcome, Outcome::SupervisorApproved);
        assert_eq!(first.approval_stage(), Some(ApprovalStage::Supervisor));

        let s = submission(
            SubmissionKind::OvertimeRequest,
            OvertimeStatus::PendingPlantManager,
        );
        let second = plan_approve(&s, &actor("pm@plant.test", &["plant-manager"])).unwrap();
        assert_eq!(second.to, OvertimeStatus::Approved);
        assert_eq!(
            second.stamps,
            vec![StampKind::PlantManagerApproved, StampKind::Approved]
        );
        assert_eq!(second.outcome, Outcome::PlantManagerApproved);
    }

    #[test]
    fn test_final_approver_fast_path_stamps_every_stage() {
        let s = submission(SubmissionKind::OvertimeRequest, OvertimeStatus::Pending);
        for roles in [&["plant-manager"][..], &["admin"]] {
            let plan = plan_approve(&s, &actor("pm@plant.test", roles)).unwrap();
            assert_eq!(plan.to, OvertimeStatus::Approved);
            assert_eq!(plan.stamps.len(), 3);
            assert_eq!(plan.outcome, Outcome::Approved);
        }
    }

    #[test]
    fn test_hr_is_not_a_final_approver() {
        let s = submission(SubmissionKind::OvertimeRequest, OvertimeStatus::Pending);
        let plan = plan_approve(&s, &actor("hr@plant.test", &["hr"])).unwrap();
        assert_eq!(plan.to, OvertimeStatus::PendingPlantManager);
    }

    #[test]
    fn test_approve_from_closed_states_is_invalid() {
        for status in [
            OvertimeStatus::Approved,
            OvertimeStatus::Rejected,
            OvertimeStatus::Accounted,
            OvertimeStatus::Cancelled,
            OvertimeStatus::Draft,
            OvertimeStatus::PendingDirector,
        ] {
            let s = submission(SubmissionKind::Standard, status);
            assert_eq!(
                plan_approve(&s, &actor("root@plant.test", &["admin"])),
                Err(ActionError::InvalidStatus)
            );
        }
    }

    #[test]
    fn test_reject_only_from_pending() {
        let pending = submission(SubmissionKind::Standard, OvertimeStatus::Pending);
        assert_eq!(plan_reject(&pending).unwrap().to, OvertimeStatus::Rejected);

        let second_stage = submission(
            SubmissionKind::OvertimeRequest,
            OvertimeStatus::PendingPlantManager,
        );
        assert_eq!(plan_reject(&second_stage), Err(ActionError::InvalidStatus));
    }

    #[test]
    fn test_accounting_requires_approved_non_production() {
        let approved = submission(SubmissionKind::Standard, OvertimeStatus::Approved);
        assert_eq!(
            plan_mark_as_accounted(&approved).unwrap().to,
            OvertimeStatus::Accounted
        );

        let pending = submission(SubmissionKind::Standard, OvertimeStatus::Pending);
        assert_eq!(plan_mark_as_accounted(&pending), Err(ActionError::InvalidStatus));

        let production = submission(SubmissionKind::Production, OvertimeStatus::Approved);
        assert_eq!(
            plan_mark_as_accounted(&production),
            Err(ActionError::InvalidStatus)
        );
        assert_eq!(
            plan_complete(&production).unwrap().to,
            OvertimeStatus::Completed
        );
    }

    #[test]
    fn test_cancel_outside_pending_reports_cannot_cancel() {
        let s = submission(SubmissionKind::Standard, OvertimeStatus::Approved);
        assert_eq!(plan_cancel(&s), Err(ActionError::CannotCancel));
    }

    #[test]
    fn test_edit_guards() {
        let accounted = submission(SubmissionKind::Standard, OvertimeStatus::Accounted);
        assert_eq!(
            check_editable(&accounted),
            Err(ActionError::CannotCorrectAccounted)
        );
        let rejected = submission(SubmissionKind::Standard, OvertimeStatus::Rejected);
        assert_eq!(check_editable(&rejected), Err(ActionError::InvalidStatus));
        assert_eq!(check_correctable(&rejected), Ok(()));
    }

    #[test]
    fn test_rewrite_target_resets_for_privileged_roles() {
        let approved = submission(SubmissionKind::Standard, OvertimeStatus::Approved);
        assert_eq!(
            rewrite_target(&approved, &actor("hr@plant.test", &["hr"]), false),
            OvertimeStatus::Pending
        );
        assert_eq!(
            rewrite_target(&approved, &actor("hr@plant.test", &["hr"]), true),
            OvertimeStatus::Cancelled
        );

        let pending = submission(SubmissionKind::Standard, OvertimeStatus::Pending);
        assert_eq!(
            rewrite_target(&pending, &actor("owner@plant.test", &[]), false),
            OvertimeStatus::Pending
        );
    }

    #[test]
    fn test_rewrite_target_keeps_closed_states() {
        let admin = actor("admin@plant.test", &["admin"]);
        for status in [OvertimeStatus::Cancelled, OvertimeStatus::Rejected] {
            let closed = submission(SubmissionKind::Standard, status);
            assert_eq!(rewrite_target(&closed, &admin, false), status);
        }
    }

    #[test]
    fn test_outcome_serializes_as_tag() {
        assert_eq!(
            serde_json::to_value(Outcome::PlantManagerApproved).unwrap(),
            serde_json::json!("plant-manager-approved")
        );
        assert_eq!(Outcome::SupervisorApproved.to_string(), "supervisor-approved");
    }
}
