use std::sync::Arc;

use quill_infra::db::Database;
use reqwest::Client;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::render::CommentRenderer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub http_client: Client,
    pub renderer: Arc<CommentRenderer>,
    pub events: Arc<EventBus>,
    /// Hex secret signing edit cookies, persisted as the `session-key` preference.
    pub session_key: Arc<str>,
}
