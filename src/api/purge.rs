//! Dependent-record purge triggers.

use axum::{
    extract::{Path, State},
    response::Response,
    Extension,
};
use uuid::Uuid;

use super::accepted;
use crate::auth::Principal;
use crate::errors::AppError;
use crate::jobs::spawn_detached;
use crate::models::PurgeQuery;
use crate::AppState;

/// Which records a purge route deletes, keyed by one path parameter.
#[derive(Debug, Clone, Copy)]
pub struct PurgeTarget {
    pub job: &'static str,
    pub collection: &'static str,
    pub field: &'static str,
    /// Path parameter name, as reported to the caller when missing
    pub param: &'static str,
}

pub const CARD_SPACED_REP_DATA: PurgeTarget = PurgeTarget {
    job: "purge-card-spaced-rep-data",
    collection: "spacedRepData",
    field: "cardId",
    param: "cardId",
};

pub const DECK_SPACED_REP_DATA: PurgeTarget = PurgeTarget {
    job: "purge-deck-spaced-rep-data",
    collection: "spacedRepData",
    field: "deckId",
    param: "deckId",
};

pub const DECK_CARDS: PurgeTarget = PurgeTarget {
    job: "purge-deck-cards",
    collection: "cards",
    field: "deckId",
    param: "deckId",
};

fn missing_parameter(target: PurgeTarget) -> AppError {
    AppError::BadRequest(format!("Please provide a {}.", target.param))
}

fn start_purge(
    state: &AppState,
    principal: &Principal,
    target: PurgeTarget,
    value: String,
) -> Result<Response, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(missing_parameter(target));
    }

    let query = PurgeQuery::new(target.collection, target.field, value);
    let job_id = Uuid::new_v4();
    tracing::info!(subject = %principal.subject, %job_id, "Purge of {} requested", query);

    let purger = state.purger.clone();
    spawn_detached(target.job, job_id, async move { purger.purge(&query).await });

    Ok(accepted(target.job, job_id))
}

/// POST /deleteCardSpacedRepData/{cardId}
pub async fn delete_card_spaced_rep_data(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(card_id): Path<String>,
) -> Result<Response, AppError> {
    start_purge(&state, &principal, CARD_SPACED_REP_DATA, card_id)
}

/// POST /deleteDeckSpacedRepData/{deckId}
pub async fn delete_deck_spaced_rep_data(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(deck_id): Path<String>,
) -> Result<Response, AppError> {
    start_purge(&state, &principal, DECK_SPACED_REP_DATA, deck_id)
}

/// POST /deleteDeckCards/{deckId}
pub async fn delete_deck_cards(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(deck_id): Path<String>,
) -> Result<Response, AppError> {
    start_purge(&state, &principal, DECK_CARDS, deck_id)
}

/// POST /deleteCardSpacedRepData without a card id.
pub async fn card_id_missing() -> AppError {
    missing_parameter(CARD_SPACED_REP_DATA)
}

/// POST /deleteDeckSpacedRepData or /deleteDeckCards without a deck id.
pub async fn deck_id_missing() -> AppError {
    missing_parameter(DECK_SPACED_REP_DATA)
}
