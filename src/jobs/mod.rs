//! Background jobs triggered by requests.
//!
//! Jobs run detached from the request that started them; their outcome is
//! only observable through the log.

mod purge;
mod reindex;
mod resync;

pub use purge::*;
pub use reindex::*;
pub use resync::*;

use std::fmt::Debug;
use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::errors::AppError;

/// Spawn `job` on the runtime and detach it from the caller.
///
/// The outcome is logged inside a `job` span carrying `kind` and `job_id`.
/// The handle may be dropped; it is returned so tests can await completion.
pub fn spawn_detached<F, T>(kind: &'static str, job_id: Uuid, job: F) -> JoinHandle<()>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Debug + Send + 'static,
{
    let span = tracing::info_span!("job", kind, %job_id);

    tokio::spawn(
        async move {
            tracing::info!("Job started");
            match job.await {
                Ok(outcome) => tracing::info!(?outcome, "Job finished"),
                Err(e) => tracing::error!("Job failed: {}", e),
            }
        }
        .instrument(span),
    )
}
