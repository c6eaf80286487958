use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::handlers::shared::ApiResponse;

/// Expected business-rule failures of the submission mutators.
///
/// The `Display` text is the stable error code sent to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("invalid status")]
    InvalidStatus,

    #[error("cannot cancel")]
    CannotCancel,

    #[error("cannot correct accounted")]
    CannotCorrectAccounted,

    #[error("no valid submissions")]
    NoValidSubmissions,

    #[error("reason required")]
    ReasonRequired,

    #[error("no changes")]
    NoChanges,

    #[error("not inserted")]
    NotInserted,

    #[error("not found employee")]
    NotFoundEmployee,

    #[error("employee already exists")]
    EmployeeAlreadyExists,

    #[error("too many employees with scheduled days off")]
    TooManyEmployeesWithScheduledDayOff,

    #[error("{0}")]
    Validation(String),

    #[error("{0} server action error")]
    ServerAction(&'static str),
}

impl ActionError {
    /// Log an unexpected failure with full detail and hide it behind the
    /// generic `<action> server action error` code.
    pub fn server(action: &'static str, error: impl std::fmt::Display) -> Self {
        log::error!("{} failed: {:#}", action, error);
        ActionError::ServerAction(action)
    }

    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl ResponseError for ActionError {
    fn status_code(&self) -> StatusCode {
        match self {
            ActionError::Unauthorized => StatusCode::FORBIDDEN,
            ActionError::NotFound | ActionError::NotFoundEmployee => StatusCode::NOT_FOUND,
            ActionError::InvalidStatus
            | ActionError::CannotCancel
            | ActionError::CannotCorrectAccounted
            | ActionError::NoValidSubmissions
            | ActionError::EmployeeAlreadyExists
            | ActionError::TooManyEmployeesWithScheduledDayOff => StatusCode::CONFLICT,
            ActionError::ReasonRequired | ActionError::NoChanges | ActionError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ActionError::NotInserted | ActionError::ServerAction(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.code() }))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error{}", .0.as_ref().map_or("".to_string(), |s| format!(": {}", s)))]
    InternalServerError(Option<String>),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        log::error!(
            "Request failed with status {}: {}",
            status_code,
            error_message
        );

        HttpResponse::build(status_code).json(ApiResponse::<()>::error(&error_message))
    }
}

impl From<ActionError> for AppError {
    fn from(error: ActionError) -> Self {
        match error {
            ActionError::Unauthorized => AppError::Forbidden(error.code()),
            ActionError::NotFound | ActionError::NotFoundEmployee => {
                AppError::NotFound(error.code())
            }
            ActionError::NotInserted | ActionError::ServerAction(_) => {
                AppError::InternalServerError(Some(error.code()))
            }
            other => AppError::BadRequest(other.code()),
        }
    }
}
