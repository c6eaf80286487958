//! Field-level diffing for the edit and correction audit trails.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::database::models::{FieldChange, SubmissionChanges, SubmissionDetails};

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn track<T>(diff: &mut BTreeMap<String, FieldChange>, field: &str, target: &mut T, new: Option<T>)
where
    T: Serialize + PartialEq,
{
    if let Some(new) = new {
        if *target != new {
            diff.insert(
                field.to_string(),
                FieldChange {
                    from: to_json(target),
                    to: to_json(&new),
                },
            );
            *target = new;
        }
    }
}

/// Apply `changes` to `details` and return only the fields that differed.
pub fn apply_changes(
    details: &mut SubmissionDetails,
    changes: SubmissionChanges,
) -> Result<BTreeMap<String, FieldChange>, String> {
    let mut diff = BTreeMap::new();

    track(&mut diff, "supervisor", &mut details.supervisor, changes.supervisor);
    track(
        &mut diff,
        "responsibleEmployee",
        &mut details.responsible_employee,
        changes.responsible_employee,
    );
    track(&mut diff, "date", &mut details.date, changes.date);
    track(
        &mut diff,
        "workStartTime",
        &mut details.work_start_time,
        changes.work_start_time,
    );
    track(
        &mut diff,
        "workEndTime",
        &mut details.work_end_time,
        changes.work_end_time,
    );
    track(&mut diff, "hours", &mut details.hours, changes.hours);
    track(&mut diff, "payment", &mut details.payment, changes.payment);
    track(
        &mut diff,
        "scheduledDayOff",
        &mut details.scheduled_day_off,
        changes.scheduled_day_off,
    );
    track(&mut diff, "reason", &mut details.reason, changes.reason);
    track(&mut diff, "note", &mut details.note, changes.note);

    if changes.number_of_employees.is_some() || changes.planned_articles.is_some() {
        let production = details
            .production
            .as_mut()
            .ok_or_else(|| "production details not allowed".to_string())?;
        track(
            &mut diff,
            "numberOfEmployees",
            &mut production.number_of_employees,
            changes.number_of_employees,
        );
        track(
            &mut diff,
            "plannedArticles",
            &mut production.planned_articles,
            changes.planned_articles,
        );
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Hours, ProductionDetails};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn details() -> SubmissionDetails {
        SubmissionDetails {
            supervisor: "boss@plant.test".to_string(),
            responsible_employee: None,
            date: NaiveDate::from_ymd_opt(2026, 10, 3),
            work_start_time: None,
            work_end_time: None,
            hours: Hours::worked(2.0),
            payment: true,
            scheduled_day_off: None,
            reason: Some("line stop".to_string()),
            note: None,
            production: None,
        }
    }

    #[test]
    fn test_only_differing_fields_are_recorded() {
        let mut current = details();
        let diff = apply_changes(
            &mut current,
            SubmissionChanges {
                supervisor: Some("boss@plant.test".to_string()),
                hours: Some(Hours::worked(3.5)),
                note: Some(Some("approved verbally".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(diff.len(), 2);
        assert_eq!(diff["hours"].from, json!({"kind": "worked", "amount": 2.0}));
        assert_eq!(diff["hours"].to, json!({"kind": "worked", "amount": 3.5}));
        assert_eq!(diff["note"].from, serde_json::Value::Null);
        assert_eq!(diff["note"].to, json!("approved verbally"));
        assert_eq!(current.hours, Hours::worked(3.5));
    }

    #[test]
    fn test_identical_changes_produce_empty_diff() {
        let mut current = details();
        let diff = apply_changes(
            &mut current,
            SubmissionChanges {
                payment: Some(true),
                reason: Some(Some("line stop".to_string())),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(diff.is_empty());
        assert_eq!(current, details());
    }

    #[test]
    fn test_explicit_null_clears_optional_field() {
        let changes: SubmissionChanges =
            serde_json::from_value(json!({ "reason": null, "note": "kept" })).unwrap();
        assert_eq!(changes.reason, Some(None));
        assert_eq!(changes.scheduled_day_off, None);

        let mut current = details();
        let diff = apply_changes(&mut current, changes).unwrap();

        assert_eq!(current.reason, None);
        assert_eq!(diff["reason"].from, json!("line stop"));
        assert_eq!(diff["reason"].to, serde_json::Value::Null);
        assert_eq!(current.note.as_deref(), Some("kept"));
    }

    #[test]
    fn test_production_fields_require_production_payload() {
        let mut current = details();
        let result = apply_changes(
            &mut current,
            SubmissionChanges {
                number_of_employees: Some(4),
                ..Default::default()
            },
        );
        assert_eq!(result, Err("production details not allowed".to_string()));

        current.production = Some(ProductionDetails {
            number_of_employees: 2,
            ..Default::default()
        });
        let diff = apply_changes(
            &mut current,
            SubmissionChanges {
                number_of_employees: Some(4),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(diff["numberOfEmployees"].to, json!(4));
    }
}
