use std::sync::Arc;

use quill_infra::db::migrations::run_migrations;
use quill_infra::db::preferences_repo::{get_preference, set_preference};
use quill_infra::db::{Database, DbPoolError, StoreError};
use rand::rngs::OsRng;
use rand::RngCore;
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::notify::subscribe_log_notifier;
use crate::render::{AuthorHasher, CommentRenderer, MarkdownRenderer, RenderError};
use crate::state::AppState;

pub const SESSION_KEY_PREFERENCE: &str = "session-key";
const SESSION_KEY_BYTES: usize = 24;

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("database error: {0}")]
    Database(#[from] DbPoolError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("hash config error: {0}")]
    Hash(#[from] RenderError),
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub async fn build_state(config: AppConfig) -> Result<AppState, WiringError> {
    let db = Database::connect(&config.database_url, config.db_timeout).await?;
    run_migrations(&db).await?;
    let session_key = load_session_key(&db).await?;

    let hasher = AuthorHasher::from_spec(&config.hash_algorithm, &config.hash_salt)?;
    let renderer = CommentRenderer::new(MarkdownRenderer::new(), hasher);
    let client = Client::builder().timeout(config.request_timeout).build()?;

    let mut events = EventBus::new();
    if config.notify_log {
        subscribe_log_notifier(&mut events);
    }

    Ok(AppState {
        config: Arc::new(config),
        db,
        http_client: client,
        renderer: Arc::new(renderer),
        events: Arc::new(events),
        session_key: Arc::from(session_key),
    })
}

/// Reads the persisted session key, creating it on first start.
pub async fn load_session_key(db: &Database) -> Result<String, StoreError> {
    match get_preference(db, SESSION_KEY_PREFERENCE).await {
        Ok(key) => return Ok(key),
        Err(StoreError::NotFound) => {}
        Err(err) => return Err(err),
    }
    let mut bytes = [0u8; SESSION_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let key = hex::encode(bytes);
    match set_preference(db, SESSION_KEY_PREFERENCE, &key).await {
        Ok(()) => {
            info!("generated new session key");
            Ok(key)
        }
        // Another instance stored one first.
        Err(StoreError::Conflict(_)) => get_preference(db, SESSION_KEY_PREFERENCE).await,
        Err(err) => Err(err),
    }
}
