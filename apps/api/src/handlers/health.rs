use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::{HealthDependencyStatus, HealthResponse};
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = match state.store_health.ping().await {
        Ok(()) => HealthDependencyStatus {
            backend: state.storage_backend,
            status: "ok",
            detail: None,
        },
        Err(error) => HealthDependencyStatus {
            backend: state.storage_backend,
            status: "error",
            detail: Some(error.to_string()),
        },
    };

    let ready = store.status == "ok";
    let (http_status, status) = if ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            store,
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use axum::http::StatusCode;
    use ledgerline_infrastructure::InMemoryStore;

    use super::health_handler;
    use crate::state::AppState;

    #[tokio::test]
    async fn reports_ready_when_the_store_answers() {
        let state = AppState::from_store(InMemoryStore::new(), "memory");

        let (status, payload) = health_handler(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(payload.ready);
        assert_eq!(payload.status, "ok");
        assert_eq!(payload.store.backend, "memory");
    }
}
