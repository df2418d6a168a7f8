//! Operator auth session over the PocketBase auth store.
//!
//! The session owns a watcher task subscribed to the store's change channel;
//! dropping the session aborts the task, which ends the subscription.

use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::pocketbase::{AuthRecord, AuthStore, PocketBaseClient, USERS_COLLECTION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Checking,
    Anonymous,
    Authenticated,
}

/// Inline feedback for the auth form. Only the email is remembered between
/// renders, never the password.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthFeedback {
    pub email: String,
    pub message: String,
    pub error: String,
}

#[derive(Debug, Default)]
struct SessionState {
    ready: bool,
    user: Option<AuthRecord>,
    feedback: AuthFeedback,
}

#[derive(Debug)]
pub struct AuthSession {
    client: Arc<PocketBaseClient>,
    state: Arc<RwLock<SessionState>>,
    watcher: JoinHandle<()>,
}

impl AuthSession {
    pub fn new(client: Arc<PocketBaseClient>) -> Self {
        let state = Arc::new(RwLock::new(SessionState::default()));
        let watcher = spawn_watcher(
            Arc::clone(client.auth_store()),
            client.auth_store().subscribe(),
            Arc::clone(&state),
        );

        Self {
            client,
            state,
            watcher,
        }
    }

    /// Settles the initial `Checking` phase. A persisted session that still
    /// looks valid is refreshed silently; an expired or rejected one is
    /// cleared.
    pub async fn start(&self) {
        let store = self.client.auth_store();

        if store.is_valid().await {
            if let Err(e) = self.client.auth_refresh(USERS_COLLECTION).await {
                warn!("Session refresh failed, signing out: {e}");
                store.clear().await;
            }
        } else if store.record().await.is_some() {
            info!("Persisted session expired");
            store.clear().await;
        }

        let user = store.record().await;
        let mut state = self.state.write().await;
        state.user = user;
        state.ready = true;
        info!("Auth session ready ({:?})", phase_of(&state));
    }

    pub async fn phase(&self) -> AuthPhase {
        phase_of(&*self.state.read().await)
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.ready
    }

    pub async fn user(&self) -> Option<AuthRecord> {
        self.state.read().await.user.clone()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.state.read().await.user.as_ref().map(|u| u.id.clone())
    }

    pub async fn feedback(&self) -> AuthFeedback {
        self.state.read().await.feedback.clone()
    }

    async fn begin(&self, email: &str) {
        let mut state = self.state.write().await;
        state.feedback = AuthFeedback {
            email: email.to_string(),
            ..Default::default()
        };
    }

    async fn fail(&self, message: String) {
        self.state.write().await.feedback.error = message;
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> bool {
        let email = email.trim();
        self.begin(email).await;

        match self
            .client
            .auth_with_password(USERS_COLLECTION, email, password)
            .await
        {
            Ok(record) => {
                info!("Signed in as {}", record.id);
                self.state.write().await.user = Some(record);
                true
            }
            Err(e) => {
                warn!("Sign-in failed: {e}");
                self.fail(non_blank(e.message(), "Sign-in failed")).await;
                false
            }
        }
    }

    /// Creates the account, then signs in with the same credentials. The
    /// password doubles as the confirmation value.
    pub async fn sign_up(&self, email: &str, password: &str) -> bool {
        let email = email.trim();
        self.begin(email).await;

        if email.is_empty() || password.is_empty() {
            self.fail("Enter email and password".to_string()).await;
            return false;
        }

        let result = async {
            self.client.create_user(email, password, password).await?;
            self.client
                .auth_with_password(USERS_COLLECTION, email, password)
                .await
        }
        .await;

        match result {
            Ok(record) => {
                info!("Created account {}", record.id);
                let mut state = self.state.write().await;
                state.user = Some(record);
                state.feedback.message = "Account created and signed in.".to_string();
                true
            }
            Err(e) => {
                warn!("Sign-up failed: {e}");
                self.fail(non_blank(e.message(), "Sign-up failed")).await;
                false
            }
        }
    }

    /// Local only: no backend round-trip is needed.
    pub async fn sign_out(&self) {
        self.client.auth_store().clear().await;
        let mut state = self.state.write().await;
        state.user = None;
        state.feedback = AuthFeedback::default();
        info!("Signed out");
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

fn phase_of(state: &SessionState) -> AuthPhase {
    match (state.ready, &state.user) {
        (false, _) => AuthPhase::Checking,
        (true, Some(_)) => AuthPhase::Authenticated,
        (true, None) => AuthPhase::Anonymous,
    }
}

fn non_blank(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn spawn_watcher(
    store: Arc<AuthStore>,
    mut changes: broadcast::Receiver<crate::pocketbase::AuthChange>,
    state: Arc<RwLock<SessionState>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    state.write().await.user = change.record().cloned();
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Auth watcher lagged behind by {n} changes");
                    state.write().await.user = store.record().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
