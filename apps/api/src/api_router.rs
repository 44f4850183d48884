use axum::Router;
use axum::middleware::from_fn;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route(
            "/api/users",
            get(handlers::users::list_users_handler).post(handlers::users::create_user_handler),
        )
        .route(
            "/api/users/{user_id}",
            get(handlers::users::get_user_handler)
                .put(handlers::users::edit_user_handler)
                .delete(handlers::users::delete_user_handler),
        )
        .route(
            "/api/audit-log",
            get(handlers::audit::list_audit_log_handler),
        )
        .layer(from_fn(middleware::assign_request_context))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
