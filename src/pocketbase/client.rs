use log::{debug, trace};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::auth_store::{AuthRecord, AuthStore};
use super::error::{api_error, PocketBaseError};

pub const USERS_COLLECTION: &str = "users";

/// Page size used when walking a collection with `get_full_list`.
pub const FULL_LIST_BATCH: usize = 500;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub expand: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    record: AuthRecord,
}

/// Typed handle to a PocketBase instance. Built once at startup and shared
/// through `AppState`; tests build one per mock server.
#[derive(Debug)]
pub struct PocketBaseClient {
    client: Client,
    base_url: String,
    auth: Arc<AuthStore>,
}

impl PocketBaseClient {
    pub fn new(
        base_url: &str,
        auth: Arc<AuthStore>,
        timeout: Duration,
    ) -> Result<Self, PocketBaseError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PocketBaseError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth_store(&self) -> &Arc<AuthStore> {
        &self.auth
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{}/records", self.base_url, collection)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PocketBaseError> {
        let request = match self.auth.token().await {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            trace!("PocketBase error body: {body}");
            return Err(api_error(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PocketBaseError::Parse(e.to_string()))
    }

    pub async fn auth_with_password(
        &self,
        collection: &str,
        identity: &str,
        password: &str,
    ) -> Result<AuthRecord, PocketBaseError> {
        debug!("Password auth against collection {collection}");
        let url = format!(
            "{}/api/collections/{}/auth-with-password",
            self.base_url, collection
        );
        let body = serde_json::json!({ "identity": identity, "password": password });

        // Sent without the stored token so a stale session cannot taint the attempt.
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| PocketBaseError::Parse(e.to_string()))?;
        self.auth.save(auth.token, auth.record.clone()).await?;
        Ok(auth.record)
    }

    pub async fn auth_refresh(&self, collection: &str) -> Result<AuthRecord, PocketBaseError> {
        debug!("Refreshing session against collection {collection}");
        let url = format!("{}/api/collections/{}/auth-refresh", self.base_url, collection);
        let auth: AuthResponse = self.send(self.client.post(&url)).await?;
        self.auth.save(auth.token, auth.record.clone()).await?;
        Ok(auth.record)
    }

    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<AuthRecord, PocketBaseError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "passwordConfirm": password_confirm,
        });
        self.create(USERS_COLLECTION, &body).await
    }

    /// Walks every page of `collection` matching `options`.
    pub async fn get_full_list<T: DeserializeOwned>(
        &self,
        collection: &str,
        options: &ListOptions,
    ) -> Result<Vec<T>, PocketBaseError> {
        let url = self.records_url(collection);
        let mut items = Vec::new();
        let mut page = 1usize;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("page", page.to_string()),
                ("perPage", FULL_LIST_BATCH.to_string()),
                ("skipTotal", "1".to_string()),
            ];
            if let Some(filter) = &options.filter {
                query.push(("filter", filter.clone()));
            }
            if let Some(sort) = &options.sort {
                query.push(("sort", sort.clone()));
            }
            if let Some(expand) = &options.expand {
                query.push(("expand", expand.clone()));
            }

            let batch: ListPage<T> = self.send(self.client.get(&url).query(&query)).await?;
            let fetched = batch.items.len();
            items.extend(batch.items);

            if fetched < FULL_LIST_BATCH {
                break;
            }
            page += 1;
        }

        debug!("Fetched {} records from {collection}", items.len());
        Ok(items)
    }

    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        collection: &str,
        body: &B,
    ) -> Result<T, PocketBaseError> {
        debug!("Creating record in {collection}");
        let url = self.records_url(collection);
        self.send(self.client.post(&url).json(body)).await
    }

    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        collection: &str,
        id: &str,
        body: &B,
    ) -> Result<T, PocketBaseError> {
        debug!("Updating record {id} in {collection}");
        let url = format!("{}/{}", self.records_url(collection), id);
        self.send(self.client.patch(&url).json(body)).await
    }
}
