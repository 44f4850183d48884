//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_log_service;
mod change_interceptor;
mod storage_ports;
mod unit_of_work;
mod user_service;

#[cfg(test)]
mod test_support;

pub use audit_log_service::AuditLogService;
pub use change_interceptor::{AuditPolicy, ChangeInterceptor};
pub use storage_ports::{
    AUDIT_LOG_DEFAULT_LIMIT, AUDIT_LOG_MAX_LIMIT, AuditLogEntry, AuditLogQuery,
    AuditLogRepository, StoreHealth, StoreTransaction, UnitOfWorkStore, UserRepository,
};
pub use unit_of_work::{
    CommitHook, CommitOutcome, Entity, MAX_FLUSH_PASSES, ModifiedEntity, NewEntity,
    PendingChanges, UnitOfWork,
};
pub use user_service::UserService;
