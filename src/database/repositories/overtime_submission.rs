use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::Query,
    types::Json,
};
use uuid::Uuid;

use crate::database::{
    models::{
        AuditTrail, HistoryEntry, NewOvertimeSubmission, OvertimeSubmission, Stamp, StampKind,
        SubmissionDetails, SubmissionFilter,
    },
    store::{StatusChange, SubmissionStore},
    utils::sql,
};

/// Stamp kinds with their own `<prefix>_at` / `<prefix>_by` column pair.
const STAMP_KINDS: [StampKind; 8] = [
    StampKind::Requested,
    StampKind::Approved,
    StampKind::SupervisorApproved,
    StampKind::PlantManagerApproved,
    StampKind::Rejected,
    StampKind::Accounted,
    StampKind::Cancelled,
    StampKind::Completed,
];

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

fn audit_columns() -> Vec<String> {
    STAMP_KINDS
        .iter()
        .map(|kind| kind.column_prefix())
        .chain(["edited"])
        .flat_map(|prefix| [format!("{}_at", prefix), format!("{}_by", prefix)])
        .chain(["rejection_reason".to_string()])
        .collect()
}

/// Binds values in the order of [`audit_columns`].
fn bind_audit<'q>(mut query: PgQuery<'q>, audit: &'q AuditTrail) -> PgQuery<'q> {
    let stamps = STAMP_KINDS
        .iter()
        .map(|kind| audit.get(*kind))
        .chain([audit.edited.as_ref()]);
    for stamp in stamps {
        query = query
            .bind(stamp.map(|s| s.at))
            .bind(stamp.map(|s| s.by.as_str()));
    }
    query.bind(audit.rejection_reason.as_deref())
}

fn stamp_from_row(row: &PgRow, prefix: &str) -> Result<Option<Stamp>, sqlx::Error> {
    let at: Option<DateTime<Utc>> = row.try_get(format!("{}_at", prefix).as_str())?;
    let by: Option<String> = row.try_get(format!("{}_by", prefix).as_str())?;
    Ok(at.zip(by).map(|(at, by)| Stamp { at, by }))
}

fn submission_from_row(row: &PgRow) -> Result<OvertimeSubmission, sqlx::Error> {
    let mut audit = AuditTrail {
        rejection_reason: row.try_get("rejection_reason")?,
        edited: stamp_from_row(row, "edited")?,
        ..Default::default()
    };
    for kind in STAMP_KINDS {
        if let Some(stamp) = stamp_from_row(row, kind.column_prefix())? {
            audit.set(kind, stamp);
        }
    }

    let Json(details): Json<SubmissionDetails> = row.try_get("details")?;
    let Json(edit_history): Json<Vec<HistoryEntry>> = row.try_get("edit_history")?;
    let Json(correction_history): Json<Vec<HistoryEntry>> = row.try_get("correction_history")?;

    Ok(OvertimeSubmission {
        id: row.try_get("id")?,
        internal_id: row.try_get("internal_id")?,
        kind: row.try_get("kind")?,
        status: row.try_get("status")?,
        submitted_by: row.try_get("submitted_by")?,
        details,
        audit,
        edit_history,
        correction_history,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Postgres-backed submissions collection.
///
/// Document-shaped parts (details, histories) live in JSONB columns; status
/// and stamps are plain columns so status transitions stay a single
/// conditional `UPDATE`.
#[derive(Clone)]
pub struct OvertimeSubmissionRepository {
    pool: PgPool,
}

impl OvertimeSubmissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for OvertimeSubmissionRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OvertimeSubmission>> {
        let row = sqlx::query("SELECT * FROM overtime_submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(submission_from_row).transpose()?)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<OvertimeSubmission>> {
        let rows = sqlx::query("SELECT * FROM overtime_submissions WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(submission_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn find(&self, filter: &SubmissionFilter) -> Result<Vec<OvertimeSubmission>> {
        let mut query = "SELECT * FROM overtime_submissions".to_string();
        let mut params: Vec<String> = Vec::new();
        let mut conditions = vec![];

        if let Some(status) = filter.status {
            conditions.push(format!("status = ${}", params.len() + 1));
            params.push(status.to_string());
        }

        if let Some(kind) = filter.kind {
            conditions.push(format!("kind = ${}", params.len() + 1));
            params.push(kind.to_string());
        }

        if let Some(email) = &filter.submitted_by {
            conditions.push(format!("lower(submitted_by) = lower(${})", params.len() + 1));
            params.push(email.clone());
        }

        if let Some(email) = &filter.supervisor {
            conditions.push(format!(
                "lower(details->>'supervisor') = lower(${})",
                params.len() + 1
            ));
            params.push(email.clone());
        }

        if let Some(email) = &filter.involving {
            let n = params.len() + 1;
            conditions.push(format!(
                "(lower(submitted_by) = lower(${n}) \
                 OR lower(details->>'supervisor') = lower(${n}) \
                 OR lower(COALESCE(details->>'responsibleEmployee', submitted_by)) = lower(${n}))"
            ));
            params.push(email.clone());
        }

        if let Some(year) = &filter.year {
            conditions.push(format!("split_part(internal_id, '/', 2) = ${}", params.len() + 1));
            params.push(year.clone());
        }

        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        query.push_str(" ORDER BY created_at DESC");

        let mut prepared = sqlx::query(&query);
        for param in params {
            prepared = prepared.bind(param);
        }

        let rows = prepared.fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(submission_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert(&self, submission: NewOvertimeSubmission) -> Result<OvertimeSubmission> {
        let columns = audit_columns();
        let query = sql(&format!(
            r#"
            INSERT INTO
                overtime_submissions (
                    id,
                    internal_id,
                    kind,
                    status,
                    submitted_by,
                    details,
                    {},
                    version,
                    created_at
                )
            VALUES
                (?, ?, ?, ?, ?, ?, {}, 1, ?)
            RETURNING
                *
        "#,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        ));

        let prepared = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&submission.internal_id)
            .bind(submission.kind)
            .bind(submission.status)
            .bind(&submission.submitted_by)
            .bind(Json(&submission.details));
        let row = bind_audit(prepared, &submission.audit)
            .bind(submission.created_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(submission_from_row(&row)?)
    }

    async fn replace(&self, submission: &OvertimeSubmission) -> Result<bool> {
        let assignments = audit_columns()
            .iter()
            .map(|column| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");
        let query = sql(&format!(
            r#"
            UPDATE overtime_submissions
            SET
                kind = ?,
                status = ?,
                submitted_by = ?,
                details = ?,
                {},
                edit_history = ?,
                correction_history = ?,
                version = ?
            WHERE
                id = ?
                AND version = ?
        "#,
            assignments
        ));

        let prepared = sqlx::query(&query)
            .bind(submission.kind)
            .bind(submission.status)
            .bind(&submission.submitted_by)
            .bind(Json(&submission.details));
        let result = bind_audit(prepared, &submission.audit)
            .bind(Json(&submission.edit_history))
            .bind(Json(&submission.correction_history))
            .bind(submission.version)
            .bind(submission.id)
            .bind(submission.version - 1)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn apply_status_change(&self, ids: &[Uuid], change: &StatusChange) -> Result<Vec<Uuid>> {
        let mut assignments = vec![
            "status = ?".to_string(),
            "edited_at = ?".to_string(),
            "edited_by = ?".to_string(),
        ];
        for kind in &change.stamps {
            let prefix = kind.column_prefix();
            assignments.push(format!("{}_at = ?", prefix));
            assignments.push(format!("{}_by = ?", prefix));
        }
        if change.rejection_reason.is_some() {
            assignments.push("rejection_reason = ?".to_string());
        }

        let query = sql(&format!(
            r#"
            UPDATE overtime_submissions
            SET
                {},
                version = version + 1
            WHERE
                id = ANY(?)
                AND status = ?
            RETURNING
                id
        "#,
            assignments.join(", ")
        ));

        let mut prepared = sqlx::query_scalar::<_, Uuid>(&query)
            .bind(change.to)
            .bind(change.at)
            .bind(&change.actor);
        for _ in &change.stamps {
            prepared = prepared.bind(change.at).bind(&change.actor);
        }
        if let Some(reason) = &change.rejection_reason {
            prepared = prepared.bind(reason);
        }

        let modified = prepared
            .bind(ids)
            .bind(change.from)
            .fetch_all(&self.pool)
            .await?;

        Ok(modified)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM overtime_submissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn next_internal_sequence(&self, year_suffix: &str) -> Result<u32> {
        // The counter row is seeded from existing ids on first use of a year.
        let sequence: i32 = sqlx::query_scalar(&sql(
            r#"
            INSERT INTO
                internal_id_counters (year_suffix, last_sequence)
            VALUES
                (
                    ?,
                    COALESCE(
                        (
                            SELECT MAX(split_part(internal_id, '/', 1)::INTEGER)
                            FROM overtime_submissions
                            WHERE split_part(internal_id, '/', 2) = ?
                        ),
                        0
                    ) + 1
                )
            ON CONFLICT (year_suffix) DO UPDATE
            SET last_sequence = internal_id_counters.last_sequence + 1
            RETURNING
                last_sequence
        "#,
        ))
        .bind(year_suffix)
        .bind(year_suffix)
        .fetch_one(&self.pool)
        .await?;

        Ok(u32::try_from(sequence)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_audit_columns_cover_every_stamp() {
        let columns = audit_columns();
        assert_eq!(columns.len(), (STAMP_KINDS.len() + 1) * 2 + 1);
        assert_eq!(columns[0], "requested_at");
        assert!(columns.contains(&"plant_manager_approved_by".to_string()));
        assert!(columns.contains(&"edited_at".to_string()));
        assert_eq!(columns.last().map(String::as_str), Some("rejection_reason"));
    }
}
