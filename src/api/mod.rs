//! HTTP trigger surface.
//!
//! Protected handlers only start background jobs; they answer `202 Accepted`
//! before the job does any store or index work.

mod purge;
mod search;
mod sync;

pub use purge::*;
pub use search::*;
pub use sync::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Body of a `202 Accepted` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub job: &'static str,
}

/// Acknowledge a job that continues in the background.
pub fn accepted(job: &'static str, job_id: Uuid) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(JobAccepted { job_id, job })),
    )
        .into_response()
}
