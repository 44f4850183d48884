//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod user;

pub use audit::{
    AUDIT_LOG_MODEL_NAME, AuditHistory, AuditLog, AuditLogId, AuditedEntity, DbEventName,
    NewAuditLog,
};
pub use user::{
    FIRST_NAME_MAX_LENGTH, LAST_NAME_MAX_LENGTH, NewUser, USER_FIELD_FIRST_NAME,
    USER_FIELD_LAST_NAME, USER_MODEL_NAME, User, UserForm, UserId,
};
