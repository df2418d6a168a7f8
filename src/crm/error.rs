use axum::{response::IntoResponse, Json};

use crate::pocketbase::PocketBaseError;

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Select a lead to log the call.")]
    NoLeadSelected,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Backend(#[from] PocketBaseError),
    #[error("Call logged, but the lead was not updated: {reason}. Retry the pending update.")]
    PartialWrite { call_log_id: String, reason: String },
    #[error("POCKETBASE_URL is not configured")]
    NotConfigured,
}

impl CrmError {
    /// True for failures raised before any request reached the backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::NoLeadSelected | Self::Validation(_) | Self::NotConfigured
        )
    }

    /// Text rendered inline next to the triggering form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(e) => e.message(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for CrmError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self {
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::NoLeadSelected | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::Backend(e) => e
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .filter(|s| s.is_client_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::PartialWrite { .. } => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.user_message() }))).into_response()
    }
}
