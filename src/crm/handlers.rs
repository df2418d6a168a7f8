use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect},
    Form, Json,
};
use log::debug;
use std::sync::Arc;

use crate::core::session::AuthPhase;
use crate::core::shared::state::{AppState, Backend};

use super::error::CrmError;
use super::forms::{CallForm, CredentialsForm, DatedSubmission, LeadForm, StatusUpdateForm};
use super::stats::PipelineStats;
use super::ui;

fn backend(state: &AppState) -> Result<&Backend, CrmError> {
    state.backend.as_ref().ok_or(CrmError::NotConfigured)
}

async fn require_user(backend: &Backend) -> Result<(), CrmError> {
    match backend.session.user_id().await {
        Some(_) => Ok(()),
        None => Err(CrmError::NotAuthenticated),
    }
}

fn back_to_dashboard() -> Redirect {
    Redirect::to("/")
}

pub async fn handle_index(State(state): State<Arc<AppState>>) -> Html<String> {
    let Some(backend) = &state.backend else {
        return Html(ui::render_missing_config());
    };

    match backend.session.phase().await {
        AuthPhase::Checking => Html(ui::render_checking()),
        AuthPhase::Anonymous => Html(ui::render_auth_screen(&backend.session.feedback().await)),
        AuthPhase::Authenticated => match backend.crm.dashboard().await {
            Some(view) => Html(ui::render_dashboard(&view)),
            // Signed out between the phase check and the render.
            None => Html(ui::render_auth_screen(&backend.session.feedback().await)),
        },
    }
}

pub async fn handle_sign_in(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Redirect {
    if let Some(backend) = &state.backend {
        backend.session.sign_in(&form.email, &form.password).await;
    }
    back_to_dashboard()
}

pub async fn handle_sign_up(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CredentialsForm>,
) -> Redirect {
    if let Some(backend) = &state.backend {
        backend.session.sign_up(&form.email, &form.password).await;
    }
    back_to_dashboard()
}

pub async fn handle_sign_out(State(state): State<Arc<AppState>>) -> Redirect {
    if let Some(backend) = &state.backend {
        backend.session.sign_out().await;
        backend.crm.reset().await;
    }
    back_to_dashboard()
}

pub async fn handle_create_lead(
    State(state): State<Arc<AppState>>,
    Form(submission): Form<DatedSubmission<LeadForm>>,
) -> Redirect {
    if let Some(backend) = &state.backend {
        match submission.parse() {
            Ok(form) => {
                if let Err(e) = backend.crm.submit_lead(form).await {
                    debug!("Lead form rejected: {e}");
                }
            }
            Err((form, e)) => backend.crm.reject_lead(form, e).await,
        }
    }
    back_to_dashboard()
}

pub async fn handle_update_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(submission): Form<DatedSubmission<StatusUpdateForm>>,
) -> Redirect {
    if let Some(backend) = &state.backend {
        match submission.parse() {
            Ok(form) => {
                if let Err(e) = backend.crm.submit_status(&id, form).await {
                    debug!("Lead {id} update rejected: {e}");
                }
            }
            Err((_, e)) => backend.crm.reject_status(e).await,
        }
    }
    back_to_dashboard()
}

pub async fn handle_log_call(
    State(state): State<Arc<AppState>>,
    Form(submission): Form<DatedSubmission<CallForm>>,
) -> Redirect {
    if let Some(backend) = &state.backend {
        match submission.parse() {
            Ok(form) => {
                if let Err(e) = backend.crm.submit_call(form).await {
                    debug!("Call form rejected: {e}");
                }
            }
            Err((form, e)) => backend.crm.reject_call(form, e).await,
        }
    }
    back_to_dashboard()
}

pub async fn handle_retry_pending(State(state): State<Arc<AppState>>) -> Redirect {
    if let Some(backend) = &state.backend {
        if let Err(e) = backend.crm.retry_pending_updates().await {
            debug!("Pending lead updates still failing: {e}");
        }
    }
    back_to_dashboard()
}

pub async fn handle_api_leads(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, CrmError> {
    let backend = backend(&state)?;
    require_user(backend).await?;

    let leads = backend.crm.leads().await;
    Ok(Json(serde_json::json!({
        "items": leads.data.as_ref(),
        "error": leads.error,
    })))
}

pub async fn handle_api_call_logs(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, CrmError> {
    let backend = backend(&state)?;
    require_user(backend).await?;

    let logs = backend.crm.call_logs().await;
    Ok(Json(serde_json::json!({
        "items": logs.data.as_ref(),
        "error": logs.error,
    })))
}

pub async fn handle_api_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, CrmError> {
    let backend = backend(&state)?;
    require_user(backend).await?;

    let leads = backend.crm.leads().await;
    let stats = PipelineStats::from_leads(&leads.data);
    let pending = backend.crm.pending_updates().await;
    Ok(Json(serde_json::json!({
        "stats": stats,
        "pending_lead_updates": pending,
        "error": leads.error,
    })))
}
