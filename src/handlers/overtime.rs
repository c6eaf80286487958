use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::{
    Article, OvertimeStatus, ScheduledDayOff, SubmissionChanges, SubmissionFilter, SubmissionInput,
    SubmissionKind,
};
use crate::error::{ActionError, AppError};
use crate::handlers::shared::{ApiResponse, Mutated};
use crate::middleware::RequestIdExt;
use crate::services::overtime::{CorrectionRequest, OvertimeService, SummaryRequest};
use crate::services::policy::Actor;
use crate::services::state_machine::Outcome;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub submitted_by: Option<String>,
    pub supervisor: Option<String>,
    pub year: Option<String>,
}

impl SubmissionQuery {
    fn into_filter(self) -> Result<SubmissionFilter, AppError> {
        let status = self
            .status
            .map(|s| s.parse::<OvertimeStatus>())
            .transpose()
            .map_err(AppError::BadRequest)?;
        let kind = self
            .kind
            .map(|k| k.parse::<SubmissionKind>())
            .transpose()
            .map_err(AppError::BadRequest)?;

        Ok(SubmissionFilter {
            status,
            kind,
            submitted_by: self.submitted_by,
            supervisor: self.supervisor,
            involving: None,
            year: self.year,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    #[serde(default)]
    pub actual_articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<Uuid>,
    #[serde(default)]
    pub reason: String,
}

fn log_failure(req: &HttpRequest, action: &str, actor: &Actor, error: &ActionError) {
    log::info!(
        "{} by {} refused: {} (correlation_id={})",
        action,
        actor.email,
        error,
        req.correlation_id().unwrap_or_default()
    );
}

fn mutated(
    req: &HttpRequest,
    action: &str,
    actor: &Actor,
    result: Result<Outcome, ActionError>,
) -> Result<HttpResponse, ActionError> {
    match result {
        Ok(outcome) => Ok(HttpResponse::Ok().json(Mutated::from(outcome))),
        Err(error) => {
            log_failure(req, action, actor, &error);
            Err(error)
        }
    }
}

/// Create a new overtime submission
pub async fn insert_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    input: web::Json<SubmissionInput>,
) -> Result<HttpResponse, ActionError> {
    match service.insert(&actor, input.into_inner()).await {
        Ok(inserted) => Ok(HttpResponse::Created().json(inserted)),
        Err(error) => {
            log_failure(&req, "insert", &actor, &error);
            Err(error)
        }
    }
}

/// List submissions visible to the caller, with optional filtering
pub async fn get_submissions(
    actor: Actor,
    service: web::Data<OvertimeService>,
    query: web::Query<SubmissionQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = query.into_inner().into_filter()?;
    let submissions = service.list(&actor, filter).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(submissions)))
}

pub async fn get_submission(
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let submission = service.get(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(submission)))
}

/// Hours balance of one employee (the caller by default)
pub async fn get_hours_summary(
    actor: Actor,
    service: web::Data<OvertimeService>,
    query: web::Query<SummaryRequest>,
) -> Result<HttpResponse, AppError> {
    let summary = service
        .hours_summary(&actor, query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

pub async fn update_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
    changes: web::Json<SubmissionChanges>,
) -> Result<HttpResponse, ActionError> {
    let result = service
        .edit(&actor, path.into_inner(), changes.into_inner())
        .await;
    mutated(&req, "update", &actor, result)
}

pub async fn delete_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let result = service.delete(&actor, path.into_inner()).await;
    mutated(&req, "delete", &actor, result)
}

pub async fn approve_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let result = service.approve(&actor, path.into_inner()).await;
    mutated(&req, "approve", &actor, result)
}

pub async fn reject_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
    body: Option<web::Json<RejectRequest>>,
) -> Result<HttpResponse, ActionError> {
    let reason = body.map(|b| b.into_inner().reason).unwrap_or_default();
    let result = service.reject(&actor, path.into_inner(), &reason).await;
    mutated(&req, "reject", &actor, result)
}

pub async fn mark_as_accounted(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let result = service.mark_as_accounted(&actor, path.into_inner()).await;
    mutated(&req, "mark as accounted", &actor, result)
}

pub async fn cancel_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ActionError> {
    let result = service.cancel(&actor, path.into_inner()).await;
    mutated(&req, "cancel", &actor, result)
}

/// Corrections carry a mandatory reason and land in the correction history
pub async fn correct_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
    body: web::Json<CorrectionRequest>,
) -> Result<HttpResponse, ActionError> {
    let result = service
        .correct(&actor, path.into_inner(), body.into_inner())
        .await;
    mutated(&req, "correct", &actor, result)
}

pub async fn complete_submission(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
    body: web::Json<CompleteRequest>,
) -> Result<HttpResponse, ActionError> {
    let result = service
        .complete(&actor, path.into_inner(), body.into_inner().actual_articles)
        .await;
    mutated(&req, "complete", &actor, result)
}

pub async fn add_employee_day_off(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<Uuid>,
    body: web::Json<ScheduledDayOff>,
) -> Result<HttpResponse, ActionError> {
    let result = service
        .add_employee_day_off(&actor, path.into_inner(), body.into_inner())
        .await;
    mutated(&req, "add employee day off", &actor, result)
}

pub async fn remove_employee_day_off(
    req: HttpRequest,
    actor: Actor,
    service: web::Data<OvertimeService>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, ActionError> {
    let (id, identifier) = path.into_inner();
    let result = service
        .remove_employee_day_off(&actor, id, &identifier)
        .await;
    mutated(&req, "remove employee day off", &actor, result)
}

pub async fn bulk_approve(
    actor: Actor,
    service: web::Data<OvertimeService>,
    body: web::Json<BulkRequest>,
) -> Result<HttpResponse, ActionError> {
    let outcome = service.bulk_approve(&actor, &body.ids).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn bulk_reject(
    actor: Actor,
    service: web::Data<OvertimeService>,
    body: web::Json<BulkRequest>,
) -> Result<HttpResponse, ActionError> {
    let outcome = service.bulk_reject(&actor, &body.ids, &body.reason).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn bulk_mark_as_accounted(
    actor: Actor,
    service: web::Data<OvertimeService>,
    body: web::Json<BulkRequest>,
) -> Result<HttpResponse, ActionError> {
    let outcome = service.bulk_mark_as_accounted(&actor, &body.ids).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

pub async fn bulk_cancel(
    actor: Actor,
    service: web::Data<OvertimeService>,
    body: web::Json<BulkRequest>,
) -> Result<HttpResponse, ActionError> {
    let outcome = service.bulk_cancel(&actor, &body.ids).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
