use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::future::Future;
use tokio::sync::RwLock;

use super::error::CrmError;
use super::forms::{CallForm, LeadForm};
use super::queries::{Entity, QueryCache};
use super::types::{
    non_empty, CallLog, Lead, LeadCallUpdate, LeadStatus, LeadStatusUpdate, NewCallLogRecord,
    NewLeadRecord,
};
use crate::pocketbase::schema::{CALL_LOGS, LEADS};
use crate::pocketbase::PocketBaseClient;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Error(String),
    Success,
}

impl MutationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Pending/error/success flags of one mutation.
#[derive(Debug, Default)]
pub struct MutationTracker {
    status: RwLock<MutationStatus>,
}

impl MutationTracker {
    pub async fn status(&self) -> MutationStatus {
        self.status.read().await.clone()
    }

    pub async fn run<T, Fut>(&self, name: &str, mutation: Fut) -> Result<T, CrmError>
    where
        Fut: Future<Output = Result<T, CrmError>>,
    {
        *self.status.write().await = MutationStatus::Pending;
        let result = mutation.await;
        let next = match &result {
            Ok(_) => {
                info!("{name} succeeded");
                MutationStatus::Success
            }
            Err(e) => {
                if e.is_local() {
                    warn!("{name} rejected: {e}");
                } else {
                    error!("{name} failed: {e}");
                }
                MutationStatus::Error(e.user_message())
            }
        };
        *self.status.write().await = next;
        result
    }

    pub async fn reset(&self) {
        *self.status.write().await = MutationStatus::Idle;
    }
}

/// A call log whose follow-up lead update did not go through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingLeadUpdate {
    /// The operator whose call it was; only they see or retry it.
    pub owner: String,
    pub call_log_id: String,
    pub lead_id: String,
    pub update: LeadCallUpdate,
    pub last_error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PendingLeadUpdates {
    entries: RwLock<Vec<PendingLeadUpdate>>,
}

impl PendingLeadUpdates {
    pub async fn for_owner(&self, owner: &str) -> Vec<PendingLeadUpdate> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.owner == owner)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn push(&self, entry: PendingLeadUpdate) {
        self.entries.write().await.push(entry);
    }

    async fn remove(&self, call_log_id: &str) {
        self.entries.write().await.retain(|e| e.call_log_id != call_log_id);
    }

    async fn record_failure(&self, call_log_id: &str, message: String) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.call_log_id == call_log_id) {
            entry.last_error = message;
            entry.failed_at = Utc::now();
        }
    }
}

pub async fn create_lead(
    client: &PocketBaseClient,
    cache: &QueryCache,
    user_id: Option<&str>,
    form: &LeadForm,
) -> Result<Lead, CrmError> {
    let owner = user_id.ok_or(CrmError::NotAuthenticated)?;
    let company = non_empty(&form.company)
        .ok_or_else(|| CrmError::Validation("Company is required".to_string()))?;

    let record = NewLeadRecord {
        owner: owner.to_string(),
        company,
        contact_name: non_empty(&form.contact_name),
        trade: non_empty(&form.trade),
        phone: non_empty(&form.phone),
        email: non_empty(&form.email),
        status: form.status,
        next_action: form.next_action,
        notes: non_empty(&form.notes),
    };

    let lead: Lead = client.create(LEADS, &record).await?;
    cache.invalidate(Entity::Leads).await;
    Ok(lead)
}

pub async fn update_lead(
    client: &PocketBaseClient,
    cache: &QueryCache,
    id: &str,
    status: LeadStatus,
    next_action: Option<NaiveDate>,
) -> Result<Lead, CrmError> {
    let body = LeadStatusUpdate {
        status,
        next_action,
    };
    let lead: Lead = client.update(LEADS, id, &body).await?;
    cache.invalidate(Entity::Leads).await;
    Ok(lead)
}

/// Creates the call log, then copies outcome, notes and next action onto
/// the lead. The two writes are not atomic: when the second fails the call
/// log is kept, queued in `pending` and reported as `PartialWrite`.
pub async fn log_call(
    client: &PocketBaseClient,
    cache: &QueryCache,
    pending: &PendingLeadUpdates,
    user_id: Option<&str>,
    form: &CallForm,
) -> Result<CallLog, CrmError> {
    let lead_id = non_empty(&form.lead).ok_or(CrmError::NoLeadSelected)?;
    let owner = user_id.ok_or(CrmError::NotAuthenticated)?;

    let notes = non_empty(&form.notes);
    let record = NewCallLogRecord {
        owner: owner.to_string(),
        lead: lead_id.clone(),
        outcome: form.outcome.clone(),
        notes: notes.clone(),
        next_action: form.next_action,
    };
    let call_log: CallLog = client.create(CALL_LOGS, &record).await?;

    let update = LeadCallUpdate {
        last_outcome: form.outcome.clone(),
        next_action: form.next_action,
        notes,
    };

    match client.update::<Lead, _>(LEADS, &lead_id, &update).await {
        Ok(_) => {
            cache.invalidate(Entity::Leads).await;
            cache.invalidate(Entity::CallLogs).await;
            Ok(call_log)
        }
        Err(e) => {
            warn!(
                "Call log {} saved but lead {lead_id} update failed: {e}",
                call_log.id
            );
            pending
                .push(PendingLeadUpdate {
                    owner: owner.to_string(),
                    call_log_id: call_log.id.clone(),
                    lead_id,
                    update,
                    last_error: e.message(),
                    failed_at: Utc::now(),
                })
                .await;
            cache.invalidate(Entity::CallLogs).await;
            Err(CrmError::PartialWrite {
                call_log_id: call_log.id,
                reason: e.message(),
            })
        }
    }
}

/// Re-sends the signed-in operator's queued lead updates. Returns how many
/// went through; if any still fail, the last failure is returned after all
/// were attempted.
pub async fn retry_pending(
    client: &PocketBaseClient,
    cache: &QueryCache,
    pending: &PendingLeadUpdates,
    user_id: Option<&str>,
) -> Result<usize, CrmError> {
    let owner = user_id.ok_or(CrmError::NotAuthenticated)?;
    let mut applied = 0;
    let mut last_error = None;

    for entry in pending.for_owner(owner).await {
        match client
            .update::<Lead, _>(LEADS, &entry.lead_id, &entry.update)
            .await
        {
            Ok(_) => {
                pending.remove(&entry.call_log_id).await;
                applied += 1;
            }
            Err(e) => {
                pending.record_failure(&entry.call_log_id, e.message()).await;
                last_error = Some(e);
            }
        }
    }

    if applied > 0 {
        cache.invalidate(Entity::Leads).await;
    }

    match last_error {
        Some(e) => Err(CrmError::Backend(e)),
        None => Ok(applied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::queries::leads_query;
    use crate::pocketbase::AuthStore;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn client_for(server: &mockito::ServerGuard) -> PocketBaseClient {
        PocketBaseClient::new(&server.url(), Arc::new(AuthStore::new()), Duration::from_secs(5))
            .unwrap()
    }

    fn cache() -> QueryCache {
        QueryCache::new(Duration::from_secs(300))
    }

    fn lead_body(id: &str) -> String {
        json!({ "id": id, "owner": "u1", "company": "Acme", "status": "New" }).to_string()
    }

    #[tokio::test]
    async fn test_create_lead_requires_user_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let client = client_for(&server);

        let form = LeadForm {
            company: "Acme".to_string(),
            ..Default::default()
        };
        let err = create_lead(&client, &cache(), None, &form).await.unwrap_err();

        assert!(matches!(err, CrmError::NotAuthenticated));
        assert_eq!(err.to_string(), "Not authenticated");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_lead_with_only_company() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/collections/leads/records")
            .match_body(Matcher::Json(json!({
                "owner": "u1",
                "company": "Acme",
                "status": "New",
                "next_action": null
            })))
            .with_status(200)
            .with_body(lead_body("l1"))
            .create_async()
            .await;
        let client = client_for(&server);

        let form = LeadForm {
            company: " Acme ".to_string(),
            ..Default::default()
        };
        let lead = create_lead(&client, &cache(), Some("u1"), &form).await.unwrap();

        mock.assert_async().await;
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.contact_name, None);
        assert_eq!(lead.next_action, None);
    }

    #[tokio::test]
    async fn test_update_lead_sends_null_for_cleared_date_and_invalidates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/api/collections/leads/records/l1")
            .match_body(Matcher::Json(json!({ "status": "Connected", "next_action": null })))
            .with_status(200)
            .with_body(lead_body("l1"))
            .create_async()
            .await;
        let list = server
            .mock("GET", "/api/collections/leads/records")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"items":[]}"#)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        let cache = cache();
        leads_query(&client, &cache, Some("u1")).await;

        update_lead(&client, &cache, "l1", LeadStatus::Connected, None)
            .await
            .unwrap();
        leads_query(&client, &cache, Some("u1")).await;

        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_log_call_without_lead_is_rejected_locally() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;
        let client = client_for(&server);

        let err = log_call(
            &client,
            &cache(),
            &PendingLeadUpdates::default(),
            Some("u1"),
            &CallForm::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Select a lead to log the call.");
        let err = log_call(
            &client,
            &cache(),
            &PendingLeadUpdates::default(),
            None,
            &CallForm {
                lead: "l1".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CrmError::NotAuthenticated));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_log_call_writes_log_then_lead() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/api/collections/call_logs/records")
            .match_body(Matcher::Json(json!({
                "owner": "u1",
                "lead": "l1",
                "outcome": "Connected",
                "notes": "Left voicemail",
                "next_action": "2025-06-02"
            })))
            .with_status(200)
            .with_body(
                json!({ "id": "c1", "owner": "u1", "lead": "l1", "outcome": "Connected", "notes": "Left voicemail" })
                    .to_string(),
            )
            .create_async()
            .await;
        let update = server
            .mock("PATCH", "/api/collections/leads/records/l1")
            .match_body(Matcher::Json(json!({
                "last_outcome": "Connected",
                "next_action": "2025-06-02",
                "notes": "Left voicemail"
            })))
            .with_status(200)
            .with_body(lead_body("l1"))
            .create_async()
            .await;

        let client = client_for(&server);
        let pending = PendingLeadUpdates::default();
        let form = CallForm {
            lead: "l1".to_string(),
            outcome: "Connected".to_string(),
            notes: "Left voicemail".to_string(),
            next_action: NaiveDate::from_ymd_opt(2025, 6, 2),
        };
        let log = log_call(&client, &cache(), &pending, Some("u1"), &form)
            .await
            .unwrap();

        create.assert_async().await;
        update.assert_async().await;
        assert_eq!(log.lead, "l1");
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_lead_update_queues_pending_and_retry_clears_it() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/collections/call_logs/records")
            .with_status(200)
            .with_body(json!({ "id": "c1", "owner": "u1", "lead": "l1", "outcome": "No answer" }).to_string())
            .create_async()
            .await;
        let failing = server
            .mock("PATCH", "/api/collections/leads/records/l1")
            .with_status(500)
            .with_body(r#"{"code":500,"message":"Something went wrong.","data":{}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let cache = cache();
        let pending = PendingLeadUpdates::default();
        let form = CallForm {
            lead: "l1".to_string(),
            outcome: "No answer".to_string(),
            ..Default::default()
        };

        let err = log_call(&client, &cache, &pending, Some("u1"), &form)
            .await
            .unwrap_err();
        match &err {
            CrmError::PartialWrite { call_log_id, reason } => {
                assert_eq!(call_log_id, "c1");
                assert_eq!(reason, "Something went wrong.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(pending.len().await, 1);
        let queued = &pending.for_owner("u1").await[0];
        assert_eq!(queued.owner, "u1");
        assert!(pending.for_owner("u2").await.is_empty());
        assert_eq!(queued.update.notes, None);
        assert_eq!(queued.update.last_outcome, "No answer");

        failing.remove_async().await;
        let fixed = server
            .mock("PATCH", "/api/collections/leads/records/l1")
            .with_status(200)
            .with_body(lead_body("l1"))
            .create_async()
            .await;

        let applied = retry_pending(&client, &cache, &pending, Some("u1")).await.unwrap();
        fixed.assert_async().await;
        assert_eq!(applied, 1);
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn test_tracker_records_outcome() {
        let tracker = MutationTracker::default();
        assert_eq!(tracker.status().await, MutationStatus::Idle);

        let ok: Result<u8, CrmError> = tracker.run("noop", async { Ok(1) }).await;
        assert!(ok.is_ok());
        assert!(tracker.status().await.is_success());

        let _ = tracker
            .run::<u8, _>("reject", async { Err(CrmError::NoLeadSelected) })
            .await;
        assert_eq!(
            tracker.status().await.error(),
            Some("Select a lead to log the call.")
        );
    }
}
