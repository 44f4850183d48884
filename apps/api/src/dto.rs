use std::collections::BTreeMap;

use ledgerline_application::AuditLogEntry;
use ledgerline_domain::{User, UserForm};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../bindings/health-response.ts")]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub store: HealthDependencyStatus,
}

/// One runtime dependency health status.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../../bindings/health-dependency-status.ts")]
pub struct HealthDependencyStatus {
    pub backend: &'static str,
    pub status: &'static str,
    pub detail: Option<String>,
}

/// Incoming payload for creating or editing a user.
///
/// Missing fields are treated as empty so they surface as field errors.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(export, export_to = "../../../bindings/user-form-request.ts")]
pub struct UserFormRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl From<UserFormRequest> for UserForm {
    fn from(value: UserFormRequest) -> Self {
        UserForm::new(value.first_name, value.last_name)
    }
}

/// API representation of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "../../../bindings/user-response.ts")]
pub struct UserResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.id().as_i64(),
            first_name: value.first_name().as_str().to_owned(),
            last_name: value.last_name().as_str().to_owned(),
        }
    }
}

/// API representation of one audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "../../../bindings/audit-log-entry-response.ts")]
pub struct AuditLogEntryResponse {
    #[ts(type = "number")]
    pub id: i64,
    pub request_id: String,
    pub model_name: String,
    #[ts(type = "number | null")]
    pub original_id: Option<i64>,
    pub db_event_name: String,
    pub history: Option<BTreeMap<String, String>>,
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(value: AuditLogEntry) -> Self {
        Self {
            id: value.id.as_i64(),
            request_id: value.request_id,
            model_name: value.model_name,
            original_id: value.original_id,
            db_event_name: value.db_event_name.as_str().to_owned(),
            history: value.history.map(|history| {
                history
                    .iter()
                    .map(|(field, previous)| (field.to_owned(), previous.to_owned()))
                    .collect()
            }),
            created_at: value.created_at,
        }
    }
}
