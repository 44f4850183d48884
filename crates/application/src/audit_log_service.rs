use std::sync::Arc;

use ledgerline_core::AppResult;

use crate::{AuditLogEntry, AuditLogQuery, AuditLogRepository};

/// Read-only access to the audit trail.
#[derive(Clone)]
pub struct AuditLogService {
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditLogService {
    /// Creates a service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    /// Lists audit entries matching the query.
    pub async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        self.repository.list_entries(query).await
    }
}
