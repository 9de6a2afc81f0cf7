//! Debounced reindex scheduling.
//!
//! A persisted [`SyncMarker`] records the last sync attempt. When it is stale
//! the scheduler first overwrites it with the current time (the claim) and
//! only then runs the reindex. The claim is never rolled back: a failed
//! reindex waits a full staleness window before the next attempt.
//!
//! This is a debounce, not a lock. Two calls that both read a stale marker
//! before either claims will both reindex.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::ReindexRunner;
use crate::db::DocumentStore;
use crate::errors::AppError;
use crate::models::{SyncMarker, SYNC_MARKER_COLLECTION, SYNC_MARKER_ID};

#[derive(Debug)]
pub enum ResyncOutcome {
    /// Marker was fresh; nothing was written or reindexed
    Skipped,
    /// Claim was written and every tracked collection was reindexed
    Ran(Result<(), AppError>),
}

impl ResyncOutcome {
    /// Collapse into a result suitable for job logging.
    pub fn into_result(self) -> Result<&'static str, AppError> {
        match self {
            ResyncOutcome::Skipped => Ok("skipped"),
            ResyncOutcome::Ran(Ok(())) => Ok("reindexed"),
            ResyncOutcome::Ran(Err(e)) => Err(e),
        }
    }
}

#[derive(Clone)]
pub struct ResyncScheduler {
    store: Arc<dyn DocumentStore>,
    runner: ReindexRunner,
    collections: Vec<String>,
    staleness: chrono::Duration,
}

impl ResyncScheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        runner: ReindexRunner,
        collections: Vec<String>,
        staleness: chrono::Duration,
    ) -> Self {
        Self {
            store,
            runner,
            collections,
            staleness,
        }
    }

    pub async fn maybe_resync(&self) -> Result<ResyncOutcome, AppError> {
        self.maybe_resync_at(Utc::now()).await
    }

    /// Run the resync protocol as if the current time were `now`.
    ///
    /// Errors reading the marker or writing the claim are returned before any
    /// reindex starts.
    pub async fn maybe_resync_at(&self, now: DateTime<Utc>) -> Result<ResyncOutcome, AppError> {
        let marker = self
            .store
            .get_document(SYNC_MARKER_COLLECTION, SYNC_MARKER_ID)
            .await?
            .map(|record| SyncMarker::from_fields(&record.fields));

        if !SyncMarker::is_due(marker.as_ref(), now, self.staleness) {
            tracing::debug!(
                "Search index resync skipped, last sync at {:?}",
                marker.and_then(|m| m.last_sync_time)
            );
            return Ok(ResyncOutcome::Skipped);
        }

        self.store
            .set_document(
                SYNC_MARKER_COLLECTION,
                SYNC_MARKER_ID,
                SyncMarker::at(now).to_fields(),
            )
            .await?;
        tracing::info!("Search index resync claimed at {}", now.to_rfc3339());

        Ok(ResyncOutcome::Ran(
            self.runner.reindex_all(&self.collections).await,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchIndexClient;
    use crate::test_support::{seed, ObservedIndex, ObservedStore, TestIndex, TestStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::Mutex;

    use crate::models::IndexObject;
    use crate::search::SearchHit;

    fn tracked() -> Vec<String> {
        vec!["users".to_string(), "decks".to_string()]
    }

    fn scheduler(
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn SearchIndexClient>,
    ) -> ResyncScheduler {
        ResyncScheduler::new(
            store.clone(),
            ReindexRunner::new(store, index),
            tracked(),
            Duration::hours(24),
        )
    }

    async fn write_marker(store: &TestStore, at: DateTime<Utc>) {
        store
            .inner
            .set_document(SYNC_MARKER_COLLECTION, SYNC_MARKER_ID, SyncMarker::at(at).to_fields())
            .await
            .unwrap();
    }

    async fn read_marker(store: &TestStore) -> Option<DateTime<Utc>> {
        store
            .inner
            .get_document(SYNC_MARKER_COLLECTION, SYNC_MARKER_ID)
            .await
            .unwrap()
            .and_then(|r| SyncMarker::from_fields(&r.fields).last_sync_time)
    }

    #[tokio::test]
    async fn test_fresh_marker_skips_without_side_effects() {
        let store = TestStore::new().await;
        let now = Utc::now();
        let last = now - Duration::hours(23);
        write_marker(&store, last).await;
        let observed_store = ObservedStore::wrap(store.shared());
        let index = ObservedIndex::wrap(TestIndex::new().shared());

        let outcome = scheduler(observed_store.clone(), index.clone())
            .maybe_resync_at(now)
            .await
            .unwrap();

        assert!(matches!(outcome, ResyncOutcome::Skipped));
        assert_eq!(observed_store.set_calls(), 0);
        assert!(index.replaced_indexes().is_empty());
        assert_eq!(
            read_marker(&store).await.map(|t| t.timestamp_millis()),
            Some(last.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_stale_marker_claims_and_reindexes_each_collection_once() {
        let store = TestStore::new().await;
        let now = Utc::now();
        write_marker(&store, now - Duration::hours(25)).await;
        seed(&store, "users", "abc123", json!({ "name": "x" })).await;
        seed(&store, "decks", "d1", json!({ "title": "Verbs" })).await;
        let index = ObservedIndex::wrap(TestIndex::new().shared());

        let outcome = scheduler(store.shared(), index.clone())
            .maybe_resync_at(now)
            .await
            .unwrap();

        assert!(matches!(outcome, ResyncOutcome::Ran(Ok(()))));
        let mut replaced = index.replaced_indexes();
        replaced.sort();
        assert_eq!(replaced, vec!["decks", "users"]);
        assert_eq!(
            read_marker(&store).await.map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );
        let users = index.all_objects("users").await.unwrap();
        assert_eq!(
            serde_json::to_value(&users[0]).unwrap(),
            json!({ "name": "x", "objectID": "abc123" })
        );
    }

    #[tokio::test]
    async fn test_absent_marker_is_due() {
        let store = TestStore::new().await;
        let index = ObservedIndex::wrap(TestIndex::new().shared());
        let now = Utc::now();

        let outcome = scheduler(store.shared(), index.clone())
            .maybe_resync_at(now)
            .await
            .unwrap();

        assert!(matches!(outcome, ResyncOutcome::Ran(Ok(()))));
        assert_eq!(index.replaced_indexes().len(), 2);
        assert!(read_marker(&store).await.is_some());
    }

    #[tokio::test]
    async fn test_marker_without_time_is_due() {
        let store = TestStore::new().await;
        seed(&store, SYNC_MARKER_COLLECTION, SYNC_MARKER_ID, json!({ "lastSyncTime": null })).await;
        let index = ObservedIndex::wrap(TestIndex::new().shared());

        let outcome = scheduler(store.shared(), index)
            .maybe_resync_at(Utc::now())
            .await
            .unwrap();

        assert!(matches!(outcome, ResyncOutcome::Ran(_)));
    }

    #[tokio::test]
    async fn test_second_call_after_claim_is_skipped() {
        let store = TestStore::new().await;
        let index = ObservedIndex::wrap(TestIndex::new().shared());
        let scheduler = scheduler(store.shared(), index.clone());
        let now = Utc::now();

        scheduler.maybe_resync_at(now).await.unwrap();
        let second = scheduler
            .maybe_resync_at(now + Duration::minutes(5))
            .await
            .unwrap();

        assert!(matches!(second, ResyncOutcome::Skipped));
        assert_eq!(index.replaced_indexes().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_reindex_keeps_claim() {
        let store = TestStore::new().await;
        let now = Utc::now();
        write_marker(&store, now - Duration::hours(30)).await;
        let index = ObservedIndex::wrap(TestIndex::new().shared());
        index.fail_index("decks");
        let scheduler = scheduler(store.shared(), index.clone());

        let outcome = scheduler.maybe_resync_at(now).await.unwrap();
        assert!(matches!(outcome, ResyncOutcome::Ran(Err(AppError::Index(_)))));
        assert_eq!(
            read_marker(&store).await.map(|t| t.timestamp_millis()),
            Some(now.timestamp_millis())
        );

        let retry = scheduler
            .maybe_resync_at(now + Duration::hours(1))
            .await
            .unwrap();
        assert!(matches!(retry, ResyncOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_failed_claim_prevents_reindex() {
        let store = TestStore::new().await;
        let observed_store = ObservedStore::wrap(store.shared());
        observed_store.fail_set();
        let index = ObservedIndex::wrap(TestIndex::new().shared());

        let result = scheduler(observed_store, index.clone())
            .maybe_resync_at(Utc::now())
            .await;

        assert!(matches!(result, Err(AppError::Store(_))));
        assert!(index.replaced_indexes().is_empty());
    }

    /// Index that records the stored marker at the moment each replace begins.
    struct MarkerProbe {
        store: Arc<dyn DocumentStore>,
        inner: Arc<dyn SearchIndexClient>,
        seen: Mutex<Vec<Option<DateTime<Utc>>>>,
    }

    #[async_trait]
    impl SearchIndexClient for MarkerProbe {
        async fn replace_all(
            &self,
            index_name: &str,
            objects: Vec<IndexObject>,
        ) -> Result<(), AppError> {
            let marker = self
                .store
                .get_document(SYNC_MARKER_COLLECTION, SYNC_MARKER_ID)
                .await?
                .and_then(|r| SyncMarker::from_fields(&r.fields).last_sync_time);
            self.seen.lock().unwrap().push(marker);
            self.inner.replace_all(index_name, objects).await
        }

        async fn all_objects(&self, index_name: &str) -> Result<Vec<IndexObject>, AppError> {
            self.inner.all_objects(index_name).await
        }

        async fn search(
            &self,
            index_name: &str,
            query: &str,
            limit: usize,
        ) -> Result<Vec<SearchHit>, AppError> {
            self.inner.search(index_name, query, limit).await
        }
    }

    #[tokio::test]
    async fn test_claim_is_written_before_reindex() {
        let store = TestStore::new().await;
        let now = Utc::now();
        write_marker(&store, now - Duration::days(3)).await;
        let test_index = TestIndex::new();
        let probe = Arc::new(MarkerProbe {
            store: store.shared(),
            inner: test_index.shared(),
            seen: Mutex::new(Vec::new()),
        });

        scheduler(store.shared(), probe.clone())
            .maybe_resync_at(now)
            .await
            .unwrap();

        let seen = probe.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen
            .iter()
            .all(|t| t.map(|t| t.timestamp_millis()) == Some(now.timestamp_millis())));
    }
}
