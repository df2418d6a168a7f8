//! GC outreach pipeline: leads, call logs and the dashboard over them.

pub mod error;
pub mod forms;
pub mod handlers;
pub mod mutations;
pub mod queries;
pub mod stats;
pub mod types;
pub mod ui;
pub mod workspace;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::CrmError;
pub use forms::{CallForm, LeadForm};
pub use mutations::{MutationStatus, PendingLeadUpdate};
pub use stats::PipelineStats;
pub use types::{CallLog, Lead, LeadStatus};
pub use workspace::{CrmWorkspace, DashboardView};

use handlers::{
    handle_api_call_logs, handle_api_leads, handle_api_stats, handle_create_lead, handle_index,
    handle_log_call, handle_retry_pending, handle_sign_in, handle_sign_out, handle_sign_up,
    handle_update_lead,
};

pub fn configure_crm_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handle_index))
        .route("/auth/sign-in", post(handle_sign_in))
        .route("/auth/sign-up", post(handle_sign_up))
        .route("/auth/sign-out", post(handle_sign_out))
        .route("/leads", post(handle_create_lead))
        .route("/leads/:id", post(handle_update_lead))
        .route("/calls", post(handle_log_call))
        .route("/calls/pending/retry", post(handle_retry_pending))
        .route("/api/leads", get(handle_api_leads))
        .route("/api/call-logs", get(handle_api_call_logs))
        .route("/api/stats", get(handle_api_stats))
}
