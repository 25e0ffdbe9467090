use quill_core::types::timestamp::now_secs;
use quill_infra::db::comments_repo::{purge_moderated, purge_stale_deleted};
use tracing::info;

use crate::jobs::JobError;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub moderated: u64,
    pub stale_deleted: u64,
}

/// Drops comments that waited for a moderator longer than the configured
/// age, then deleted placeholders nothing refers to any more.
pub async fn run(state: &AppState) -> Result<PurgeStats, JobError> {
    let older_than = state.config.moderation.purge_after.as_secs_f64();
    let moderated = purge_moderated(&state.db, older_than, now_secs()).await?;
    let stale_deleted = purge_stale_deleted(&state.db).await?;
    let stats = PurgeStats {
        moderated,
        stale_deleted,
    };
    info!(?stats, "purge complete");
    Ok(stats)
}
