//! Batched collection purge.
//!
//! Drains every record matching a [`PurgeQuery`] in identifier-ordered pages,
//! deleting each page in one atomic commit. Pages are independent: a failure
//! leaves earlier pages deleted, and re-running the same purge resumes.

use std::sync::Arc;

use crate::db::{DocumentStore, QueryHandle};
use crate::errors::AppError;
use crate::models::PurgeQuery;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Totals for one completed purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Non-empty pages deleted
    pub pages: usize,
    pub deleted: usize,
}

#[derive(Clone)]
pub struct CollectionPurger {
    store: Arc<dyn DocumentStore>,
    page_size: usize,
}

impl CollectionPurger {
    pub fn new(store: Arc<dyn DocumentStore>, page_size: usize) -> Self {
        Self { store, page_size }
    }

    pub async fn purge(&self, query: &PurgeQuery) -> Result<PurgeReport, AppError> {
        let mut report = PurgeReport::default();
        if self.page_size == 0 {
            return Ok(report);
        }

        let handle: QueryHandle = self
            .store
            .query(&query.collection, &query.field, &query.value);
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .store
                .page(&handle, cursor.as_deref(), self.page_size)
                .await?;

            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.id.clone());

            let ids: Vec<String> = page.into_iter().map(|r| r.id).collect();
            self.store.delete_many(&query.collection, &ids).await?;

            report.pages += 1;
            report.deleted += ids.len();
            tracing::debug!(
                "Purge {}: page {} deleted {} records",
                query,
                report.pages,
                ids.len()
            );

            // Each page boundary is a scheduling point.
            tokio::task::yield_now().await;
        }

        tracing::info!(
            "Purge {} complete: {} records in {} pages",
            query,
            report.deleted,
            report.pages
        );
        Ok(report)
    }
}
