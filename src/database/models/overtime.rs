use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::macros::string_enum;

string_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum OvertimeStatus {
        Pending => "pending",
        PendingPlantManager => "pending-plant-manager",
        PendingDirector => "pending-director",
        Approved => "approved",
        Rejected => "rejected",
        Accounted => "accounted",
        Cancelled => "cancelled",
        Draft => "draft",
        Completed => "completed",
    }
}

impl OvertimeStatus {
    /// Financially or time settled. Only a hard delete may touch these.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Accounted | Self::Completed)
    }

    /// No forward transition is defined out of these states.
    pub fn is_closed(self) -> bool {
        self.is_settled() || matches!(self, Self::Rejected | Self::Cancelled)
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum SubmissionKind {
        Standard => "standard",
        OvertimeRequest => "overtime-request",
        Production => "production",
    }
}

string_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum HoursKind {
        Worked => "worked",
        Pickup => "pickup",
    }
}

/// Claimed hours. `Pickup` means a day-off taken against earlier overtime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hours {
    pub kind: HoursKind,
    pub amount: f64,
}

impl Hours {
    pub fn worked(amount: f64) -> Self {
        Self {
            kind: HoursKind::Worked,
            amount,
        }
    }

    pub fn pickup(amount: f64) -> Self {
        Self {
            kind: HoursKind::Pickup,
            amount,
        }
    }

    /// Legacy signed representation: pickups count negative.
    pub fn signed(&self) -> f64 {
        match self.kind {
            HoursKind::Worked => self.amount,
            HoursKind::Pickup => -self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub number: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledDayOff {
    pub identifier: String,
    pub name: Option<String>,
    pub agreed_day_off: NaiveDate,
    pub note: Option<String>,
}

/// Headcount planning and output tracking for production overtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionDetails {
    pub number_of_employees: u32,
    #[serde(default)]
    pub employees_with_scheduled_day_off: Vec<ScheduledDayOff>,
    #[serde(default)]
    pub planned_articles: Vec<Article>,
    #[serde(default)]
    pub actual_articles: Vec<Article>,
}

/// Who did something, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
    pub at: DateTime<Utc>,
    pub by: String,
}

impl Stamp {
    pub fn new(by: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self { at, by: by.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StampKind {
    Requested,
    Approved,
    SupervisorApproved,
    PlantManagerApproved,
    Rejected,
    Accounted,
    Cancelled,
    Completed,
}

impl StampKind {
    /// Column prefix in the `overtime_submissions` table (`<prefix>_at`, `<prefix>_by`).
    pub fn column_prefix(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::SupervisorApproved => "supervisor_approved",
            Self::PlantManagerApproved => "plant_manager_approved",
            Self::Rejected => "rejected",
            Self::Accounted => "accounted",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrail {
    pub requested: Option<Stamp>,
    pub approved: Option<Stamp>,
    pub supervisor_approved: Option<Stamp>,
    pub plant_manager_approved: Option<Stamp>,
    pub rejected: Option<Stamp>,
    pub rejection_reason: Option<String>,
    pub accounted: Option<Stamp>,
    pub cancelled: Option<Stamp>,
    pub completed: Option<Stamp>,
    pub edited: Option<Stamp>,
}

impl AuditTrail {
    pub fn get(&self, kind: StampKind) -> Option<&Stamp> {
        self.slot(kind).as_ref()
    }

    pub fn set(&mut self, kind: StampKind, stamp: Stamp) {
        *self.slot_mut(kind) = Some(stamp);
    }

    fn slot(&self, kind: StampKind) -> &Option<Stamp> {
        match kind {
            StampKind::Requested => &self.requested,
            StampKind::Approved => &self.approved,
            StampKind::SupervisorApproved => &self.supervisor_approved,
            StampKind::PlantManagerApproved => &self.plant_manager_approved,
            StampKind::Rejected => &self.rejected,
            StampKind::Accounted => &self.accounted,
            StampKind::Cancelled => &self.cancelled,
            StampKind::Completed => &self.completed,
        }
    }

    fn slot_mut(&mut self, kind: StampKind) -> &mut Option<Stamp> {
        match kind {
            StampKind::Requested => &mut self.requested,
            StampKind::Approved => &mut self.approved,
            StampKind::SupervisorApproved => &mut self.supervisor_approved,
            StampKind::PlantManagerApproved => &mut self.plant_manager_approved,
            StampKind::Rejected => &mut self.rejected,
            StampKind::Accounted => &mut self.accounted,
            StampKind::Cancelled => &mut self.cancelled,
            StampKind::Completed => &mut self.completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub from: OvertimeStatus,
    pub to: OvertimeStatus,
}

/// One entry of the edit or correction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    pub changes: BTreeMap<String, FieldChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_changed: Option<StatusChanged>,
}

/// The user-editable part of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetails {
    pub supervisor: String,
    pub responsible_employee: Option<String>,
    pub date: Option<NaiveDate>,
    pub work_start_time: Option<DateTime<Utc>>,
    pub work_end_time: Option<DateTime<Utc>>,
    pub hours: Hours,
    pub payment: bool,
    pub scheduled_day_off: Option<NaiveDate>,
    pub reason: Option<String>,
    pub note: Option<String>,
    pub production: Option<ProductionDetails>,
}

impl SubmissionDetails {
    pub fn validate(&self, kind: SubmissionKind) -> Result<(), String> {
        if self.supervisor.trim().is_empty() {
            return Err("supervisor required".to_string());
        }
        if !self.hours.amount.is_finite() || self.hours.amount < 0.0 {
            return Err("hours must be a non-negative number".to_string());
        }
        if !self.payment && self.scheduled_day_off.is_none() {
            return Err("scheduled day off required".to_string());
        }

        match kind {
            SubmissionKind::Standard => {
                if self.date.is_none() {
                    return Err("date required".to_string());
                }
                if self.work_start_time.is_some() || self.work_end_time.is_some() {
                    return Err("work time range not allowed".to_string());
                }
            }
            SubmissionKind::OvertimeRequest | SubmissionKind::Production => {
                if self.date.is_some() {
                    return Err("date not allowed for overtime requests".to_string());
                }
                match (self.work_start_time, self.work_end_time) {
                    (Some(start), Some(end)) if start < end => {}
                    (Some(_), Some(_)) => {
                        return Err("work end time must be after start time".to_string());
                    }
                    _ => return Err("work time range required".to_string()),
                }
            }
        }

        match (kind, &self.production) {
            (SubmissionKind::Production, None) => Err("production details required".to_string()),
            (SubmissionKind::Production, Some(production)) => {
                if production.employees_with_scheduled_day_off.len()
                    > production.number_of_employees as usize
                {
                    Err("too many employees with scheduled days off".to_string())
                } else {
                    Ok(())
                }
            }
            (_, Some(_)) => Err("production details not allowed".to_string()),
            (_, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OvertimeSubmission {
    pub id: Uuid,
    pub internal_id: String,
    pub kind: SubmissionKind,
    pub status: OvertimeStatus,
    pub submitted_by: String,
    #[serde(flatten)]
    pub details: SubmissionDetails,
    #[serde(flatten)]
    pub audit: AuditTrail,
    pub edit_history: Vec<HistoryEntry>,
    pub correction_history: Vec<HistoryEntry>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl OvertimeSubmission {
    /// Work date, derived from the start time for time-range submissions.
    pub fn work_date(&self) -> Option<NaiveDate> {
        self.details
            .date
            .or_else(|| self.details.work_start_time.map(|t| t.date_naive()))
    }

    pub fn responsible_employee(&self) -> &str {
        self.details
            .responsible_employee
            .as_deref()
            .unwrap_or(&self.submitted_by)
    }

    pub fn is_submitted_by(&self, email: &str) -> bool {
        self.submitted_by.eq_ignore_ascii_case(email)
    }

    pub fn is_supervised_by(&self, email: &str) -> bool {
        self.details.supervisor.eq_ignore_ascii_case(email)
    }

    pub fn involves(&self, email: &str) -> bool {
        self.is_submitted_by(email)
            || self.is_supervised_by(email)
            || self.responsible_employee().eq_ignore_ascii_case(email)
    }
}

/// A submission about to be inserted; the store assigns `id` and `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOvertimeSubmission {
    pub internal_id: String,
    pub kind: SubmissionKind,
    pub status: OvertimeStatus,
    pub submitted_by: String,
    pub details: SubmissionDetails,
    pub audit: AuditTrail,
    pub created_at: DateTime<Utc>,
}

impl NewOvertimeSubmission {
    pub fn into_submission(self, id: Uuid) -> OvertimeSubmission {
        OvertimeSubmission {
            id,
            internal_id: self.internal_id,
            kind: self.kind,
            status: self.status,
            submitted_by: self.submitted_by,
            details: self.details,
            audit: self.audit,
            edit_history: Vec::new(),
            correction_history: Vec::new(),
            version: 1,
            created_at: self.created_at,
        }
    }
}

/// Client payload for creating a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInput {
    #[serde(default = "default_kind")]
    pub kind: SubmissionKind,
    pub supervisor: String,
    pub responsible_employee: Option<String>,
    pub date: Option<NaiveDate>,
    pub work_start_time: Option<DateTime<Utc>>,
    pub work_end_time: Option<DateTime<Utc>>,
    pub hours: Hours,
    #[serde(default = "default_payment")]
    pub payment: bool,
    pub scheduled_day_off: Option<NaiveDate>,
    pub reason: Option<String>,
    pub note: Option<String>,
    pub production: Option<ProductionDetails>,
    /// Ignored: new submissions always start as pending.
    pub status: Option<OvertimeStatus>,
}

fn default_kind() -> SubmissionKind {
    SubmissionKind::Standard
}

fn default_payment() -> bool {
    true
}

impl SubmissionInput {
    pub fn into_details(self) -> SubmissionDetails {
        SubmissionDetails {
            supervisor: self.supervisor,
            responsible_employee: self.responsible_employee,
            date: self.date,
            work_start_time: self.work_start_time,
            work_end_time: self.work_end_time,
            hours: self.hours,
            payment: self.payment,
            scheduled_day_off: self.scheduled_day_off,
            reason: self.reason,
            note: self.note,
            production: self.production,
        }
    }
}

/// Accepts an explicit `null` as `Some(None)` so a change can clear a field.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update used by corrections and edits. Absent fields stay
/// untouched; `null` clears the optional ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionChanges {
    pub supervisor: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub responsible_employee: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub work_start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub work_end_time: Option<Option<DateTime<Utc>>>,
    pub hours: Option<Hours>,
    pub payment: Option<bool>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub scheduled_day_off: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub reason: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
    pub number_of_employees: Option<u32>,
    pub planned_articles: Option<Vec<Article>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilter {
    pub status: Option<OvertimeStatus>,
    pub kind: Option<SubmissionKind>,
    pub submitted_by: Option<String>,
    pub supervisor: Option<String>,
    /// Submitter, supervisor or responsible employee.
    pub involving: Option<String>,
    /// Two-digit year suffix of the internal id, e.g. `"26"`.
    pub year: Option<String>,
}

impl SubmissionFilter {
    pub fn matches(&self, submission: &OvertimeSubmission) -> bool {
        self.status.is_none_or(|s| submission.status == s)
            && self.kind.is_none_or(|k| submission.kind == k)
            && self
                .submitted_by
                .as_deref()
                .is_none_or(|e| submission.is_submitted_by(e))
            && self
                .supervisor
                .as_deref()
                .is_none_or(|e| submission.is_supervised_by(e))
            && self
                .involving
                .as_deref()
                .is_none_or(|e| submission.involves(e))
            && self.year.as_deref().is_none_or(|y| {
                submission
                    .internal_id
                    .rsplit_once('/')
                    .is_some_and(|(_, suffix)| suffix == y)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursBucket {
    pub worked: f64,
    pub pickup: f64,
    pub balance: f64,
}

impl HoursBucket {
    pub fn add(&mut self, hours: Hours) {
        match hours.kind {
            HoursKind::Worked => self.worked += hours.amount,
            HoursKind::Pickup => self.pickup += hours.amount,
        }
        self.balance += hours.signed();
    }
}

/// Settlement view of one employee's submissions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursSummary {
    pub employee: String,
    pub pending: HoursBucket,
    pub approved: HoursBucket,
    pub settled: HoursBucket,
    pub unsettled_balance: f64,
}
