use axum::Json;
use axum::extract::{Query, State};
use ledgerline_application::{AUDIT_LOG_DEFAULT_LIMIT, AuditLogQuery};
use ledgerline_domain::DbEventName;
use serde::Deserialize;

use crate::dto::AuditLogEntryResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogListQuery {
    pub model_name: Option<String>,
    pub original_id: Option<i64>,
    pub db_event_name: Option<String>,
    pub request_id: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Query(query): Query<AuditLogListQuery>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    let db_event_name = query
        .db_event_name
        .as_deref()
        .map(str::parse::<DbEventName>)
        .transpose()?;

    let entries = state
        .audit_log_service
        .list_entries(AuditLogQuery {
            model_name: query.model_name,
            original_id: query.original_id,
            db_event_name,
            request_id: query.request_id,
            limit: query.limit.unwrap_or(AUDIT_LOG_DEFAULT_LIMIT),
        })
        .await?
        .into_iter()
        .map(AuditLogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
