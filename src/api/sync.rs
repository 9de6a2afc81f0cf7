//! Search index sync trigger.

use axum::{extract::State, response::Response, Extension};
use uuid::Uuid;

use super::accepted;
use crate::auth::Principal;
use crate::jobs::{spawn_detached, ResyncOutcome};
use crate::AppState;

pub const RESYNC_JOB: &str = "resync";

/// POST /syncSearchIndexes - Reindex tracked collections if the last sync is stale.
pub async fn sync_search_indexes(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Response {
    let job_id = Uuid::new_v4();
    tracing::info!(subject = %principal.subject, %job_id, "Search index sync requested");

    let scheduler = state.scheduler.clone();
    spawn_detached(RESYNC_JOB, job_id, async move {
        scheduler
            .maybe_resync()
            .await
            .and_then(ResyncOutcome::into_result)
    });

    accepted(RESYNC_JOB, job_id)
}
