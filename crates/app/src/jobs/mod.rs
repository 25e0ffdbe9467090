pub mod scheduler;
pub mod tasks;

use quill_infra::db::StoreError;
use thiserror::Error;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub async fn start(state: AppState, purge_now: bool) -> Result<(), JobError> {
    if purge_now {
        info!("running purge before scheduler");
        tasks::purge::run(&state).await?;
    }

    let purge_interval = state.config.purge_interval;
    let purge_state = state.clone();
    scheduler::run_interval("purge", purge_interval, move || {
        let state = purge_state.clone();
        async move {
            if let Err(err) = tasks::purge::run(&state).await {
                warn!(error = %err, "purge failed");
            }
            Ok(())
        }
    })
    .await
}
