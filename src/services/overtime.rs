//! Single-submission mutations and reads.
//!
//! Every mutator checks, in order: the submission exists, the policy allows
//! the actor, the state machine allows the transition. Writes are
//! conditional; a write that loses a race is re-read and reported instead of
//! being applied twice.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{
    Article, AuditTrail, FieldChange, HistoryEntry, HoursSummary, NewOvertimeSubmission,
    OvertimeStatus, OvertimeSubmission, ScheduledDayOff, Stamp, StampKind, StatusChanged,
    SubmissionChanges, SubmissionFilter, SubmissionInput,
};
use crate::database::store::SubmissionStore;
use crate::error::ActionError;
use crate::middleware::cache::{CacheLayer, SUBMISSIONS_TAG};
use crate::services::history;
use crate::services::internal_id;
use crate::services::notifications::{NotificationEvent, Notifier};
use crate::services::policy::{Actor, Transition, can_transition, can_view};
use crate::services::state_machine::{self, Outcome, Plan};

const INSERT: &str = "insertOvertimeSubmission";
const APPROVE: &str = "approveOvertimeSubmission";
const REJECT: &str = "rejectOvertimeSubmission";
const MARK_AS_ACCOUNTED: &str = "markAsAccountedOvertimeSubmission";
const CANCEL: &str = "cancelOvertimeRequest";
const CORRECT: &str = "correctOvertimeSubmission";
const UPDATE: &str = "updateOvertimeSubmission";
const COMPLETE: &str = "completeProductionOvertime";
const ADD_DAY_OFF: &str = "addEmployeeDayOff";
const REMOVE_DAY_OFF: &str = "removeEmployeeDayOff";
const DELETE: &str = "deleteOvertimeSubmission";
const GET: &str = "getOvertimeSubmission";
const LIST: &str = "listOvertimeSubmissions";
const SUMMARY: &str = "overtimeHoursSummary";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inserted {
    pub success: Outcome,
    pub id: Uuid,
    pub internal_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionRequest {
    #[serde(default)]
    pub changes: SubmissionChanges,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub mark_as_cancelled: bool,
}

/// Whose hours to summarize, and over which work dates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryRequest {
    pub employee: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct OvertimeService {
    pub(crate) store: Arc<dyn SubmissionStore>,
    pub(crate) notifier: Notifier,
    pub(crate) cache: CacheLayer,
}

impl OvertimeService {
    pub fn new(store: Arc<dyn SubmissionStore>, notifier: Notifier, cache: CacheLayer) -> Self {
        Self {
            store,
            notifier,
            cache,
        }
    }

    async fn load(&self, id: Uuid, action: &'static str) -> Result<OvertimeSubmission, ActionError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(|e| ActionError::server(action, e))?
            .ok_or(ActionError::NotFound)
    }

    /// Explain a conditional write that matched nothing.
    async fn lost_race(
        &self,
        id: Uuid,
        action: &'static str,
        replan: impl Fn(&OvertimeSubmission) -> Result<Plan, ActionError>,
    ) -> ActionError {
        match self.load(id, action).await {
            Ok(current) => replan(&current).err().unwrap_or(ActionError::InvalidStatus),
            Err(e) => e,
        }
    }

    pub(crate) async fn committed(&self) {
        self.cache.invalidate_tag(SUBMISSIONS_TAG).await;
    }

    pub(crate) fn notify(&self, submission: &OvertimeSubmission, plan: &Plan, reason: Option<&str>) {
        if let Some(stage) = plan.approval_stage() {
            self.notifier
                .emit(NotificationEvent::approved(submission, stage));
        } else if let Some(reason) = reason.filter(|_| plan.outcome == Outcome::Rejected) {
            self.notifier.emit(NotificationEvent::rejected(submission, reason));
        }
    }

    pub async fn insert(
        &self,
        actor: &Actor,
        input: SubmissionInput,
    ) -> Result<Inserted, ActionError> {
        if input.status.is_some_and(|s| s != OvertimeStatus::Pending) {
            log::debug!("Ignoring client-supplied status on insert by {}", actor.email);
        }

        let kind = input.kind;
        let details = input.into_details();
        details.validate(kind).map_err(ActionError::Validation)?;

        let now = Utc::now();
        let suffix = internal_id::year_suffix(now);
        let sequence = self
            .store
            .next_internal_sequence(&suffix)
            .await
            .map_err(|e| ActionError::server(INSERT, e))?;

        let new_submission = NewOvertimeSubmission {
            internal_id: internal_id::format(sequence, &suffix),
            kind,
            status: OvertimeStatus::Pending,
            submitted_by: actor.email.clone(),
            details,
            audit: AuditTrail {
                requested: Some(Stamp::new(actor.email.clone(), now)),
                ..Default::default()
            },
            created_at: now,
        };

        let created = self.store.insert(new_submission).await.map_err(|e| {
            log::error!("{} failed: {:#}", INSERT, e);
            ActionError::NotInserted
        })?;

        log::info!(
            "Overtime submission {} ({}) inserted by {}",
            created.internal_id,
            created.kind,
            actor.email
        );
        self.committed().await;

        Ok(Inserted {
            success: Outcome::Inserted,
            id: created.id,
            internal_id: created.internal_id,
        })
    }

    /// Shared flow of the status-only transitions.
    async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        transition: Transition,
        action: &'static str,
        rejection_reason: Option<String>,
        planner: impl Fn(&OvertimeSubmission) -> Result<Plan, ActionError>,
    ) -> Result<Outcome, ActionError> {
        let submission = self.load(id, action).await?;
        can_transition(actor, &submission, transition).into_result()?;
        let plan = planner(&submission)?;
        if plan.outcome == Outcome::Rejected
            && rejection_reason.as_deref().is_none_or(str::is_empty)
        {
            return Err(ActionError::ReasonRequired);
        }

        let change = plan
            .clone()
            .into_change(actor, Utc::now(), rejection_reason.clone());
        let modified = self
            .store
            .apply_status_change(&[id], &change)
            .await
            .map_err(|e| ActionError::server(action, e))?;

        if modified.is_empty() {
            log::warn!(
                "{} on {} lost a concurrent update",
                action,
                submission.internal_id
            );
            return Err(self.lost_race(id, action, planner).await);
        }

        log::info!(
            "Overtime submission {}: {} -> {} ({}) by {}",
            submission.internal_id,
            plan.from,
            plan.to,
            plan.outcome,
            actor.email
        );
        self.notify(&submission, &plan, rejection_reason.as_deref());
        self.committed().await;

        Ok(plan.outcome)
    }

    pub async fn approve(&self, actor: &Actor, id: Uuid) -> Result<Outcome, ActionError> {
        self.transition(actor, id, Transition::Approve, APPROVE, None, |s| {
            state_machine::plan_approve(s, actor)
        })
        .await
    }

    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        reason: &str,
    ) -> Result<Outcome, ActionError> {
        self.transition(
            actor,
            id,
            Transition::Reject,
            REJECT,
            Some(reason.trim().to_string()),
            state_machine::plan_reject,
        )
        .await
    }

    pub async fn mark_as_accounted(&self, actor: &Actor, id: Uuid) -> Result<Outcome, ActionError> {
        self.transition(
            actor,
            id,
            Transition::MarkAsAccounted,
            MARK_AS_ACCOUNTED,
            None,
            state_machine::plan_mark_as_accounted,
        )
        .await
    }

    pub async fn cancel(&self, actor: &Actor, id: Uuid) -> Result<Outcome, ActionError> {
        self.transition(
            actor,
            id,
            Transition::Cancel,
            CANCEL,
            None,
            state_machine::plan_cancel,
        )
        .await
    }

    /// Version-checked write of a rewritten document.
    async fn replace(
        &self,
        submission: &OvertimeSubmission,
        action: &'static str,
    ) -> Result<(), ActionError> {
        let written = self
            .store
            .replace(submission)
            .await
            .map_err(|e| ActionError::server(action, e))?;

        if written {
            Ok(())
        } else {
            log::warn!(
                "{} on {} lost a concurrent update",
                action,
                submission.internal_id
            );
            Err(self
                .lost_race(submission.id, action, |_| Err(ActionError::InvalidStatus))
                .await)
        }
    }

    /// Apply changes to a copy of the submission, returning the diff and the
    /// status transition the rewrite causes.
    fn rewrite(
        actor: &Actor,
        submission: &mut OvertimeSubmission,
        changes: SubmissionChanges,
        mark_as_cancelled: bool,
    ) -> Result<(HistoryEntry, bool), ActionError> {
        let previous = submission.status;
        let diff =
            history::apply_changes(&mut submission.details, changes).map_err(ActionError::Validation)?;
        let target = state_machine::rewrite_target(submission, actor, mark_as_cancelled);

        if diff.is_empty() && target == previous {
            return Err(ActionError::NoChanges);
        }
        submission
            .details
            .validate(submission.kind)
            .map_err(ActionError::Validation)?;

        let now = Utc::now();
        let stamp = Stamp::new(actor.email.clone(), now);
        submission.status = target;
        if target == OvertimeStatus::Cancelled && previous != OvertimeStatus::Cancelled {
            submission.audit.set(StampKind::Cancelled, stamp.clone());
        }
        submission.audit.edited = Some(stamp);
        submission.version += 1;

        let entry = HistoryEntry {
            changed_at: now,
            changed_by: actor.email.clone(),
            changes: diff,
            reason: None,
            status_changed: (target != previous).then_some(StatusChanged {
                from: previous,
                to: target,
            }),
        };
        Ok((entry, target != previous))
    }

    pub async fn correct(
        &self,
        actor: &Actor,
        id: Uuid,
        request: CorrectionRequest,
    ) -> Result<Outcome, ActionError> {
        let mut submission = self.load(id, CORRECT).await?;
        can_transition(actor, &submission, Transition::Correct).into_result()?;
        state_machine::check_correctable(&submission)?;

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(ActionError::ReasonRequired);
        }

        let (mut entry, status_changed) =
            Self::rewrite(actor, &mut submission, request.changes, request.mark_as_cancelled)?;
        entry.reason = Some(reason.to_string());
        let changed_fields = entry.changes.len();
        submission.correction_history.push(entry);

        self.replace(&submission, CORRECT).await?;

        log::info!(
            "Overtime submission {} corrected by {} ({} fields{})",
            submission.internal_id,
            actor.email,
            changed_fields,
            if status_changed {
                format!(", now {}", submission.status)
            } else {
                String::new()
            }
        );
        self.committed().await;

        Ok(Outcome::Corrected)
    }

    pub async fn edit(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: SubmissionChanges,
    ) -> Result<Outcome, ActionError> {
        let mut submission = self.load(id, UPDATE).await?;
        can_transition(actor, &submission, Transition::Edit).into_result()?;
        state_machine::check_editable(&submission)?;

        let (entry, _) = Self::rewrite(actor, &mut submission, changes, false)?;
        submission.edit_history.push(entry);

        self.replace(&submission, UPDATE).await?;

        log::info!(
            "Overtime submission {} updated by {}",
            submission.internal_id,
            actor.email
        );
        self.committed().await;

        Ok(Outcome::Updated)
    }

    /// Close an approved production submission with its actual output.
    pub async fn complete(
        &self,
        actor: &Actor,
        id: Uuid,
        actual_articles: Vec<Article>,
    ) -> Result<Outcome, ActionError> {
        let mut submission = self.load(id, COMPLETE).await?;
        can_transition(actor, &submission, Transition::Complete).into_result()?;
        let plan = state_machine::plan_complete(&submission)?;
        let outcome = plan.outcome;

        plan.into_change(actor, Utc::now(), None)
            .apply(&mut submission);
        if let Some(production) = submission.details.production.as_mut() {
            production.actual_articles = actual_articles;
        }

        self.replace(&submission, COMPLETE).await?;

        log::info!(
            "Production overtime {} completed by {}",
            submission.internal_id,
            actor.email
        );
        self.committed().await;

        Ok(outcome)
    }

    async fn update_days_off(
        &self,
        actor: &Actor,
        id: Uuid,
        action: &'static str,
        update: impl FnOnce(&mut Vec<ScheduledDayOff>, u32) -> Result<(), ActionError>,
    ) -> Result<Outcome, ActionError> {
        let mut submission = self.load(id, action).await?;
        can_transition(actor, &submission, Transition::ManageDaysOff).into_result()?;
        state_machine::check_days_off_editable(&submission)?;

        let production = submission
            .details
            .production
            .as_mut()
            .ok_or(ActionError::InvalidStatus)?;
        let before = serde_json::to_value(&production.employees_with_scheduled_day_off)
            .unwrap_or_default();
        update(
            &mut production.employees_with_scheduled_day_off,
            production.number_of_employees,
        )?;
        let after = serde_json::to_value(&production.employees_with_scheduled_day_off)
            .unwrap_or_default();

        let now = Utc::now();
        submission.audit.edited = Some(Stamp::new(actor.email.clone(), now));
        submission.edit_history.push(HistoryEntry {
            changed_at: now,
            changed_by: actor.email.clone(),
            changes: [(
                "employeesWithScheduledDayOff".to_string(),
                FieldChange {
                    from: before,
                    to: after,
                },
            )]
            .into(),
            reason: None,
            status_changed: None,
        });
        submission.version += 1;

        self.replace(&submission, action).await?;

        log::info!(
            "Scheduled days off of {} changed by {}",
            submission.internal_id,
            actor.email
        );
        self.committed().await;

        Ok(Outcome::Updated)
    }

    pub async fn add_employee_day_off(
        &self,
        actor: &Actor,
        id: Uuid,
        employee: ScheduledDayOff,
    ) -> Result<Outcome, ActionError> {
        self.update_days_off(actor, id, ADD_DAY_OFF, |days_off, headcount| {
            if days_off
                .iter()
                .any(|d| d.identifier.eq_ignore_ascii_case(&employee.identifier))
            {
                return Err(ActionError::EmployeeAlreadyExists);
            }
            if days_off.len() >= headcount as usize {
                return Err(ActionError::TooManyEmployeesWithScheduledDayOff);
            }
            days_off.push(employee);
            Ok(())
        })
        .await
    }

    pub async fn remove_employee_day_off(
        &self,
        actor: &Actor,
        id: Uuid,
        identifier: &str,
    ) -> Result<Outcome, ActionError> {
        self.update_days_off(actor, id, REMOVE_DAY_OFF, |days_off, _| {
            let index = days_off
                .iter()
                .position(|d| d.identifier.eq_ignore_ascii_case(identifier))
                .ok_or(ActionError::NotFoundEmployee)?;
            days_off.remove(index);
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<Outcome, ActionError> {
        let submission = self.load(id, DELETE).await?;
        can_transition(actor, &submission, Transition::Delete).into_result()?;

        let deleted = self
            .store
            .delete(id)
            .await
            .map_err(|e| ActionError::server(DELETE, e))?;
        if !deleted {
            return Err(ActionError::NotFound);
        }

        log::info!(
            "Overtime submission {} deleted by {}",
            submission.internal_id,
            actor.email
        );
        self.committed().await;

        Ok(Outcome::Deleted)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<OvertimeSubmission, ActionError> {
        let submission = self.load(id, GET).await?;
        if !can_view(actor, &submission) {
            return Err(ActionError::Unauthorized);
        }
        Ok(submission)
    }

    pub async fn list(
        &self,
        actor: &Actor,
        mut filter: SubmissionFilter,
    ) -> Result<Vec<OvertimeSubmission>, ActionError> {
        if !actor.sees_all() {
            filter.involving = Some(actor.email.clone());
        }
        self.store
            .find(&filter)
            .await
            .map_err(|e| ActionError::server(LIST, e))
    }

    /// Worked and picked-up hours of one employee, grouped by settlement state.
    /// `from`/`to` bound the work date inclusively.
    pub async fn hours_summary(
        &self,
        actor: &Actor,
        request: SummaryRequest,
    ) -> Result<HoursSummary, ActionError> {
        let SummaryRequest { employee, from, to } = request;
        let employee = employee.unwrap_or_else(|| actor.email.clone());
        if !actor.sees_all() && !employee.eq_ignore_ascii_case(&actor.email) {
            return Err(ActionError::Unauthorized);
        }

        let submissions = self
            .store
            .find(&SubmissionFilter {
                involving: Some(employee.clone()),
                ..Default::default()
            })
            .await
            .map_err(|e| ActionError::server(SUMMARY, e))?;

        let mut summary = HoursSummary {
            employee: employee.clone(),
            ..Default::default()
        };
        for submission in submissions
            .iter()
            .filter(|s| s.responsible_employee().eq_ignore_ascii_case(&employee))
            .filter(|s| within(s.work_date(), from, to))
        {
            let bucket = match submission.status {
                OvertimeStatus::Pending
                | OvertimeStatus::PendingPlantManager
                | OvertimeStatus::PendingDirector
                | OvertimeStatus::Draft => &mut summary.pending,
                OvertimeStatus::Approved => &mut summary.approved,
                OvertimeStatus::Accounted | OvertimeStatus::Completed => &mut summary.settled,
                OvertimeStatus::Rejected | OvertimeStatus::Cancelled => continue,
            };
            bucket.add(submission.details.hours);
        }
        summary.unsettled_balance = summary.approved.balance;

        Ok(summary)
    }
}

fn within(date: Option<NaiveDate>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    match date {
        Some(date) => from.is_none_or(|f| date >= f) && to.is_none_or(|t| date <= t),
        None => from.is_none() && to.is_none(),
    }
}

#[cfg(test)]
#[path = "overtime_tests.rs"]
mod overtime_tests;
