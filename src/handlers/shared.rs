use serde::{Deserialize, Serialize};

use crate::services::state_machine::Outcome;

/// Envelope of read endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    // Error response (no data)
    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.to_string()),
        }
    }
}

/// Body of a successful single-submission mutation: `{"success": "<tag>"}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Mutated {
    pub success: Outcome,
}

impl From<Outcome> for Mutated {
    fn from(success: Outcome) -> Self {
        Self { success }
    }
}
