use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::error::CrmError;
use super::forms::{CallForm, LeadForm, StatusUpdateForm};
use super::mutations::{
    self, MutationStatus, MutationTracker, PendingLeadUpdate, PendingLeadUpdates,
};
use super::queries::{self, QueryCache, QueryResult};
use super::stats::PipelineStats;
use super::types::{CallLog, Lead};
use crate::core::session::AuthSession;
use crate::pocketbase::{AuthRecord, PocketBaseClient};

/// Everything the dashboard needs for one render.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub user: AuthRecord,
    pub leads: QueryResult<Vec<Lead>>,
    pub call_logs: QueryResult<Vec<CallLog>>,
    pub stats: PipelineStats,
    pub lead_form: LeadForm,
    pub call_form: CallForm,
    pub create_lead: MutationStatus,
    pub update_lead: MutationStatus,
    pub log_call: MutationStatus,
    pub retry_pending: MutationStatus,
    pub pending: Vec<PendingLeadUpdate>,
}

/// Form state, mutation flags and cached reads of the signed-in operator.
#[derive(Debug)]
pub struct CrmWorkspace {
    client: Arc<PocketBaseClient>,
    session: Arc<AuthSession>,
    cache: QueryCache,
    pending: PendingLeadUpdates,
    lead_form: RwLock<LeadForm>,
    call_form: RwLock<CallForm>,
    create_lead: MutationTracker,
    update_lead: MutationTracker,
    log_call: MutationTracker,
    retry_pending: MutationTracker,
}

impl CrmWorkspace {
    pub fn new(client: Arc<PocketBaseClient>, session: Arc<AuthSession>, cache_ttl: Duration) -> Self {
        Self {
            client,
            session,
            cache: QueryCache::new(cache_ttl),
            pending: PendingLeadUpdates::default(),
            lead_form: RwLock::new(LeadForm::default()),
            call_form: RwLock::new(CallForm::default()),
            create_lead: MutationTracker::default(),
            update_lead: MutationTracker::default(),
            log_call: MutationTracker::default(),
            retry_pending: MutationTracker::default(),
        }
    }

    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    pub async fn leads(&self) -> QueryResult<Vec<Lead>> {
        let user_id = self.session.user_id().await;
        queries::leads_query(&self.client, &self.cache, user_id.as_deref()).await
    }

    pub async fn call_logs(&self) -> QueryResult<Vec<CallLog>> {
        let user_id = self.session.user_id().await;
        queries::call_logs_query(&self.client, &self.cache, user_id.as_deref()).await
    }

    pub async fn lead_form(&self) -> LeadForm {
        self.lead_form.read().await.clone()
    }

    pub async fn call_form(&self) -> CallForm {
        self.call_form.read().await.clone()
    }

    /// Pending lead updates of the signed-in operator.
    pub async fn pending_updates(&self) -> Vec<PendingLeadUpdate> {
        match self.session.user_id().await {
            Some(owner) => self.pending.for_owner(&owner).await,
            None => Vec::new(),
        }
    }

    /// Across all operators, for health reporting.
    pub async fn pending_count(&self) -> usize {
        self.pending.len().await
    }

    /// `None` while nobody is signed in.
    pub async fn dashboard(&self) -> Option<DashboardView> {
        let user = self.session.user().await?;
        let leads = self.leads().await;
        let call_logs = self.call_logs().await;
        let stats = PipelineStats::from_leads(&leads.data);
        let pending = self.pending.for_owner(&user.id).await;

        Some(DashboardView {
            user,
            leads,
            call_logs,
            stats,
            lead_form: self.lead_form().await,
            call_form: self.call_form().await,
            create_lead: self.create_lead.status().await,
            update_lead: self.update_lead.status().await,
            log_call: self.log_call.status().await,
            retry_pending: self.retry_pending.status().await,
            pending,
        })
    }

    /// Keeps the submitted values, then resets the form once the lead exists.
    pub async fn submit_lead(&self, form: LeadForm) -> Result<Lead, CrmError> {
        *self.lead_form.write().await = form.clone();
        let user_id = self.session.user_id().await;

        let lead = self
            .create_lead
            .run(
                "Create lead",
                mutations::create_lead(&self.client, &self.cache, user_id.as_deref(), &form),
            )
            .await?;

        *self.lead_form.write().await = LeadForm::default();
        Ok(lead)
    }

    /// Keeps a lead form that could not be sent and shows why.
    pub async fn reject_lead(&self, form: LeadForm, error: CrmError) {
        *self.lead_form.write().await = form;
        let _ = self
            .create_lead
            .run::<Lead, _>("Create lead", async move { Err(error) })
            .await;
    }

    pub async fn reject_status(&self, error: CrmError) {
        let _ = self
            .update_lead
            .run::<Lead, _>("Update lead", async move { Err(error) })
            .await;
    }

    pub async fn reject_call(&self, form: CallForm, error: CrmError) {
        *self.call_form.write().await = form;
        let _ = self
            .log_call
            .run::<CallLog, _>("Log call", async move { Err(error) })
            .await;
    }

    pub async fn submit_status(&self, id: &str, form: StatusUpdateForm) -> Result<Lead, CrmError> {
        self.update_lead
            .run(
                "Update lead",
                mutations::update_lead(&self.client, &self.cache, id, form.status, form.next_action),
            )
            .await
    }

    pub async fn submit_call(&self, form: CallForm) -> Result<CallLog, CrmError> {
        *self.call_form.write().await = form.clone();
        let user_id = self.session.user_id().await;

        let log = self
            .log_call
            .run(
                "Log call",
                mutations::log_call(
                    &self.client,
                    &self.cache,
                    &self.pending,
                    user_id.as_deref(),
                    &form,
                ),
            )
            .await?;

        *self.call_form.write().await = CallForm::default();
        Ok(log)
    }

    pub async fn retry_pending_updates(&self) -> Result<usize, CrmError> {
        let user_id = self.session.user_id().await;
        self.retry_pending
            .run(
                "Retry pending lead updates",
                mutations::retry_pending(
                    &self.client,
                    &self.cache,
                    &self.pending,
                    user_id.as_deref(),
                ),
            )
            .await
    }

    /// Back to the initial forms and idle flags, e.g. after signing out.
    pub async fn reset(&self) {
        *self.lead_form.write().await = LeadForm::default();
        *self.call_form.write().await = CallForm::default();
        self.create_lead.reset().await;
        self.update_lead.reset().await;
        self.log_call.reset().await;
        self.retry_pending.reset().await;
    }
}
