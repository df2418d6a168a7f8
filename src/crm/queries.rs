use log::{debug, warn};
use std::any::Any;
use std::cmp::{Ordering, Reverse};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::error::CrmError;
use super::types::{CallLog, Lead};
use crate::pocketbase::schema::{CALL_LOGS, LEADS};
use crate::pocketbase::{ListOptions, PocketBaseClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Leads,
    CallLogs,
}

impl Entity {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Leads => LEADS,
            Self::CallLogs => CALL_LOGS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub entity: Entity,
    pub owner: String,
}

impl QueryKey {
    pub fn new(entity: Entity, owner: &str) -> Self {
        Self {
            entity,
            owner: owner.to_string(),
        }
    }
}

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
    stale: bool,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    /// Bumped by every `invalidate`, so a load that started before the bump
    /// is stored as stale.
    generations: HashMap<Entity, u64>,
}

impl CacheState {
    fn generation(&self, entity: Entity) -> u64 {
        self.generations.get(&entity).copied().unwrap_or(0)
    }
}

/// What a read hands to the renderer: the best data available plus the error
/// of the last fetch, if it failed.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub data: Arc<T>,
    pub error: Option<String>,
}

impl<T: Default> QueryResult<T> {
    /// Result of a query that is not allowed to run yet (no signed-in user).
    pub fn disabled() -> Self {
        Self {
            data: Arc::new(T::default()),
            error: None,
        }
    }
}

/// In-process query cache keyed by (entity, owner).
pub struct QueryCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").field("ttl", &self.ttl).finish()
    }
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
        }
    }

    /// Serves `key` from cache while fresh, otherwise runs `loader`. When the
    /// loader fails the previous value stays in place and is returned with
    /// the error. A result whose load overlapped an `invalidate` is returned
    /// but kept stale, so the next read refetches.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, loader: F) -> QueryResult<T>
    where
        T: Default + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CrmError>>,
    {
        let (previous, generation) = {
            let state = self.state.read().await;
            let generation = state.generation(key.entity);
            match state.entries.get(&key) {
                Some(entry) => {
                    let value = Arc::clone(&entry.value).downcast::<T>().ok();
                    let fresh = !entry.stale && entry.fetched_at.elapsed() < self.ttl;
                    if fresh {
                        if let Some(data) = value {
                            return QueryResult { data, error: None };
                        }
                    }
                    (value, generation)
                }
                None => (None, generation),
            }
        };

        debug!("Fetching {:?} for owner {}", key.entity, key.owner);
        match loader().await {
            Ok(value) => {
                let data = Arc::new(value);
                let stored: Arc<dyn Any + Send + Sync> = data.clone();
                let mut state = self.state.write().await;
                let stale = state.generation(key.entity) != generation;
                if stale {
                    debug!("{:?} invalidated while loading", key.entity);
                }
                state.entries.insert(
                    key,
                    CacheEntry {
                        value: stored,
                        fetched_at: Instant::now(),
                        stale,
                    },
                );
                QueryResult { data, error: None }
            }
            Err(e) => {
                warn!("Fetching {:?} failed: {e}", key.entity);
                QueryResult {
                    data: previous.unwrap_or_default(),
                    error: Some(e.user_message()),
                }
            }
        }
    }

    /// Marks every key of `entity` stale, whatever its owner, including
    /// loads still in flight.
    pub async fn invalidate(&self, entity: Entity) {
        let mut state = self.state.write().await;
        *state.generations.entry(entity).or_insert(0) += 1;
        for (key, entry) in state.entries.iter_mut() {
            if key.entity == entity {
                entry.stale = true;
            }
        }
    }

    #[cfg(test)]
    async fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let state = self.state.read().await;
        state
            .entries
            .get(key)
            .and_then(|entry| Arc::clone(&entry.value).downcast::<T>().ok())
    }
}

/// Filter expression matching rows owned by `user_id`.
pub fn owner_filter(user_id: &str) -> String {
    let escaped = user_id.replace('\\', "\\\\").replace('"', "\\\"");
    format!("owner = \"{escaped}\"")
}

/// Dated leads first in ascending date order, undated leads last; leads on
/// the same date (or both undated) newest first.
pub fn order_leads(leads: &mut [Lead]) {
    leads.sort_by(|a, b| {
        let by_date = match (a.next_action, b.next_action) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| Reverse(a.created).cmp(&Reverse(b.created)))
    });
}

pub async fn leads_query(
    client: &PocketBaseClient,
    cache: &QueryCache,
    user_id: Option<&str>,
) -> QueryResult<Vec<Lead>> {
    let Some(user_id) = user_id else {
        return QueryResult::disabled();
    };

    cache
        .fetch(QueryKey::new(Entity::Leads, user_id), || async {
            let options = ListOptions {
                filter: Some(owner_filter(user_id)),
                sort: Some("next_action,-created".to_string()),
                expand: None,
            };
            let mut leads: Vec<Lead> = client.get_full_list(LEADS, &options).await?;
            order_leads(&mut leads);
            Ok(leads)
        })
        .await
}

pub async fn call_logs_query(
    client: &PocketBaseClient,
    cache: &QueryCache,
    user_id: Option<&str>,
) -> QueryResult<Vec<CallLog>> {
    let Some(user_id) = user_id else {
        return QueryResult::disabled();
    };

    cache
        .fetch(QueryKey::new(Entity::CallLogs, user_id), || async {
            let options = ListOptions {
                filter: Some(owner_filter(user_id)),
                sort: Some("-created".to_string()),
                expand: Some("lead".to_string()),
            };
            Ok(client.get_full_list(CALL_LOGS, &options).await?)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pocketbase::AuthStore;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn lead(id: &str, next: Option<(i32, u32, u32)>, created_day: u32) -> Lead {
        Lead {
            id: id.to_string(),
            owner: "u1".to_string(),
            company: format!("Company {id}"),
            contact_name: None,
            trade: None,
            phone: None,
            email: None,
            status: Default::default(),
            next_action: next.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            last_outcome: None,
            notes: None,
            created: Utc.with_ymd_and_hms(2025, 1, created_day, 0, 0, 0).unwrap(),
            updated: Utc.with_ymd_and_hms(2025, 1, created_day, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_order_leads_puts_undated_last_and_newest_first_on_ties() {
        let mut leads = vec![
            lead("undated-old", None, 1),
            lead("march-old", Some((2025, 3, 1)), 2),
            lead("undated-new", None, 9),
            lead("feb", Some((2025, 2, 1)), 3),
            lead("march-new", Some((2025, 3, 1)), 8),
        ];
        order_leads(&mut leads);
        let ids: Vec<&str> = leads.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["feb", "march-new", "march-old", "undated-new", "undated-old"]
        );
    }

    #[test]
    fn test_owner_filter_escapes_quotes() {
        assert_eq!(owner_filter("abc"), r#"owner = "abc""#);
        assert_eq!(owner_filter(r#"a"b"#), r#"owner = "a\"b""#);
    }

    #[tokio::test]
    async fn test_cache_serves_fresh_entries_and_refetches_after_invalidate() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let key = QueryKey::new(Entity::Leads, "u1");

        for _ in 0..2 {
            let result = cache
                .fetch(key.clone(), || async {
                    calls.fetch_add(1, AtomicOrdering::SeqCst);
                    Ok(vec![1u8, 2, 3])
                })
                .await;
            assert_eq!(*result.data, vec![1, 2, 3]);
        }
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        cache.invalidate(Entity::CallLogs).await;
        cache.fetch(key.clone(), || async { Ok(vec![9u8]) }).await;
        assert_eq!(*cache.peek::<Vec<u8>>(&key).await.unwrap(), vec![1, 2, 3]);

        cache.invalidate(Entity::Leads).await;
        let result = cache.fetch(key.clone(), || async { Ok(vec![4u8]) }).await;
        assert_eq!(*result.data, vec![4]);
    }

    #[tokio::test]
    async fn test_invalidate_during_load_forces_next_refetch() {
        let cache = Arc::new(QueryCache::new(Duration::from_secs(60)));
        let key = QueryKey::new(Entity::Leads, "u1");
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started) = tokio::sync::oneshot::channel::<()>();

        let in_flight = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .fetch(key, || async move {
                        let _ = started_tx.send(());
                        let _ = gate.await;
                        Ok(vec![1u8])
                    })
                    .await
            })
        };

        started.await.unwrap();
        cache.invalidate(Entity::Leads).await;
        release.send(()).unwrap();
        assert_eq!(*in_flight.await.unwrap().data, vec![1]);

        let next = cache.fetch(key.clone(), || async { Ok(vec![1u8, 2]) }).await;
        assert_eq!(*next.data, vec![1, 2]);

        let cached = cache
            .fetch(key, || async { Ok(vec![9u8]) })
            .await;
        assert_eq!(*cached.data, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_previous_data() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = QueryKey::new(Entity::CallLogs, "u1");

        cache.fetch(key.clone(), || async { Ok(vec![7u8]) }).await;
        cache.invalidate(Entity::CallLogs).await;

        let result = cache
            .fetch(key.clone(), || async {
                Err::<Vec<u8>, _>(CrmError::Validation("backend down".to_string()))
            })
            .await;
        assert_eq!(*result.data, vec![7]);
        assert_eq!(result.error.as_deref(), Some("backend down"));
    }

    #[tokio::test]
    async fn test_queries_are_disabled_without_user() {
        let client = PocketBaseClient::new(
            "http://127.0.0.1:9",
            Arc::new(AuthStore::new()),
            Duration::from_secs(1),
        )
        .unwrap();
        let cache = QueryCache::new(Duration::from_secs(60));

        let leads = leads_query(&client, &cache, None).await;
        assert!(leads.data.is_empty());
        assert!(leads.error.is_none());

        let logs = call_logs_query(&client, &cache, None).await;
        assert!(logs.data.is_empty());
    }

    #[tokio::test]
    async fn test_leads_query_scopes_to_owner() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/collections/leads/records")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("filter".into(), r#"owner = "u1""#.into()),
                mockito::Matcher::UrlEncoded("sort".into(), "next_action,-created".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"items":[
                    {"id":"a","owner":"u1","company":"A","next_action":"","created":"2025-01-02 00:00:00.000Z"},
                    {"id":"b","owner":"u1","company":"B","next_action":"2025-02-01 00:00:00.000Z","created":"2025-01-01 00:00:00.000Z"}
                ]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client =
            PocketBaseClient::new(&server.url(), Arc::new(AuthStore::new()), Duration::from_secs(5))
                .unwrap();
        let cache = QueryCache::new(Duration::from_secs(60));

        let result = leads_query(&client, &cache, Some("u1")).await;
        let again = leads_query(&client, &cache, Some("u1")).await;

        mock.assert_async().await;
        assert!(result.error.is_none());
        let ids: Vec<&str> = again.data.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
