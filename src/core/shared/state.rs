use log::info;
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::session::AuthSession;
use crate::crm::workspace::CrmWorkspace;
use crate::pocketbase::{AuthStore, PocketBaseClient, PocketBaseError};

/// The backend connection and everything bound to it. Passed explicitly
/// through `AppState` rather than held in a global.
#[derive(Debug, Clone)]
pub struct Backend {
    pub client: Arc<PocketBaseClient>,
    pub session: Arc<AuthSession>,
    pub crm: Arc<CrmWorkspace>,
}

impl Backend {
    pub async fn connect(config: &AppConfig, base_url: &str) -> Result<Self, PocketBaseError> {
        let store = match &config.session_file {
            Some(path) => AuthStore::with_file(path).await?,
            None => AuthStore::new(),
        };
        let client = Arc::new(PocketBaseClient::new(
            base_url,
            Arc::new(store),
            config.request_timeout,
        )?);
        let session = Arc::new(AuthSession::new(Arc::clone(&client)));
        let crm = Arc::new(CrmWorkspace::new(
            Arc::clone(&client),
            Arc::clone(&session),
            config.cache_ttl,
        ));

        Ok(Self {
            client,
            session,
            crm,
        })
    }
}

#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    /// `None` when no backend URL is configured.
    pub backend: Option<Backend>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self, PocketBaseError> {
        let backend = match config.pocketbase_url.clone() {
            Some(url) => {
                info!("Using PocketBase at {url}");
                Some(Backend::connect(&config, &url).await?)
            }
            None => None,
        };
        Ok(Self { config, backend })
    }

    /// Settles the session's initial check. No-op without a backend.
    pub async fn start_session(&self) {
        if let Some(backend) = &self.backend {
            backend.session.start().await;
        }
    }
}
