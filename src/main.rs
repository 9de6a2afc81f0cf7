//! Corbii server
//!
//! Keeps the search index in step with the document store and purges
//! dependent records when their parent is deleted. Both jobs run in the
//! background after the triggering request has been acknowledged.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod jobs;
mod models;
mod search;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{IdentityVerifier, TrustedTokenVerifier};
use config::{Config, LogFormat};
use db::{DocumentStore, SqliteDocumentStore};
use jobs::{CollectionPurger, ReindexRunner, ResyncScheduler};
use search::{SearchIndexClient, TantivySearchIndex};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<dyn SearchIndexClient>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub purger: CollectionPurger,
    pub scheduler: ResyncScheduler,
}

impl AppState {
    /// Wire the jobs to the given collaborators.
    pub fn new(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        index: Arc<dyn SearchIndexClient>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let purger = CollectionPurger::new(store.clone(), config.purge_page_size);
        let scheduler = ResyncScheduler::new(
            store.clone(),
            ReindexRunner::new(store, index.clone()),
            config.indexed_collections.clone(),
            config.resync_staleness,
        );

        Self {
            index,
            verifier,
            purger,
            scheduler,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let (text_layer, json_layer) = match config.log_format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .init();

    tracing::info!("Starting Corbii server");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Indexed collections: {:?}", config.indexed_collections);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.trusted_tokens.is_empty() {
        tracing::warn!(
            "No trusted tokens configured (CORBII_TRUSTED_TOKENS). All protected requests will be rejected!"
        );
    }

    // Initialize document store
    let pool = db::init_database(&config.db_path).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool));

    // Initialize search index
    let index: Arc<dyn SearchIndexClient> = Arc::new(TantivySearchIndex::open(&config.index_path)?);

    let verifier: Arc<dyn IdentityVerifier> =
        Arc::new(TrustedTokenVerifier::new(config.trusted_tokens.clone()));

    let state = AppState::new(&config, store, index, verifier);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let verifier = state.verifier.clone();

    let protected_routes = Router::new()
        .route("/syncSearchIndexes", post(api::sync_search_indexes))
        .route(
            "/deleteCardSpacedRepData/{cardId}",
            post(api::delete_card_spaced_rep_data),
        )
        .route("/deleteCardSpacedRepData", post(api::card_id_missing))
        .route("/deleteCardSpacedRepData/", post(api::card_id_missing))
        .route(
            "/deleteDeckSpacedRepData/{deckId}",
            post(api::delete_deck_spaced_rep_data),
        )
        .route("/deleteDeckSpacedRepData", post(api::deck_id_missing))
        .route("/deleteDeckSpacedRepData/", post(api::deck_id_missing))
        .route("/deleteDeckCards/{deckId}", post(api::delete_deck_cards))
        .route("/deleteDeckCards", post(api::deck_id_missing))
        .route("/deleteDeckCards/", post(api::deck_id_missing))
        .route("/search/{index}", get(api::search_index))
        // Apply bearer auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::bearer_auth_layer(verifier.clone(), req, next)
        }));

    // Status routes (no auth required)
    let status_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check));

    Router::new()
        .merge(protected_routes)
        .merge(status_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Corbii server is up."
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod test_support;
