use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub modules: HealthModules,
}

#[derive(Debug, Serialize)]
pub struct HealthModules {
    pub database: DatabaseStatus,
    pub moderation: ModuleStatus,
    pub guard: ModuleStatus,
    pub admin: AdminStatus,
}

#[derive(Debug, Serialize)]
pub struct ModuleStatus {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub reachable: bool,
}

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub configured: bool,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reachable = match state.db.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "database ping failed");
            false
        }
    };
    let admin_configured = state
        .config
        .admin_token
        .as_ref()
        .is_some_and(|value| !value.is_empty());

    let (status, label) = if reachable {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    (
        status,
        Json(HealthResponse {
            status: label,
            modules: HealthModules {
                database: DatabaseStatus { reachable },
                moderation: ModuleStatus {
                    enabled: state.config.moderation.enabled,
                },
                guard: ModuleStatus {
                    enabled: state.config.guard.enabled,
                },
                admin: AdminStatus {
                    configured: admin_configured,
                },
            },
        }),
    )
}
