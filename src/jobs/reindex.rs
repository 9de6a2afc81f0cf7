//! Full reindex of store collections into the search index.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::db::DocumentStore;
use crate::errors::AppError;
use crate::models::IndexObject;
use crate::search::SearchIndexClient;

/// Copies whole collections into the index of the same name.
///
/// Not incremental: every run re-reads the full collection and replaces the
/// index wholesale, so repeated runs over unchanged data are no-ops in effect.
#[derive(Clone)]
pub struct ReindexRunner {
    store: Arc<dyn DocumentStore>,
    index: Arc<dyn SearchIndexClient>,
}

impl ReindexRunner {
    pub fn new(store: Arc<dyn DocumentStore>, index: Arc<dyn SearchIndexClient>) -> Self {
        Self { store, index }
    }

    /// Reindex one collection, returning the number of objects pushed.
    pub async fn reindex(&self, collection: &str) -> Result<usize, AppError> {
        let records = self.store.get_all(collection).await?;
        let objects: Vec<IndexObject> = records.into_iter().map(IndexObject::from).collect();
        let count = objects.len();

        self.index.replace_all(collection, objects).await?;

        tracing::info!("Reindexed {} with {} objects", collection, count);
        Ok(count)
    }

    /// Reindex every collection concurrently and wait for all of them.
    ///
    /// Returns the first error in collection order.
    pub async fn reindex_all(&self, collections: &[String]) -> Result<(), AppError> {
        let results = join_all(collections.iter().map(|c| self.reindex(c))).await;

        let mut first_error = None;
        for (collection, result) in collections.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!("Reindex of {} failed: {}", collection, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
