//! Ports implemented by storage adapters.

use async_trait::async_trait;

use ledgerline_core::AppResult;
use ledgerline_domain::{
    AuditHistory, AuditLogId, DbEventName, NewAuditLog, NewUser, User, UserId,
};

/// Default number of audit entries returned by one listing.
pub const AUDIT_LOG_DEFAULT_LIMIT: usize = 500;

/// Hard cap on audit entries returned by one listing.
pub const AUDIT_LOG_MAX_LIMIT: usize = 5_000;

/// Storage engine seen by the unit of work.
#[async_trait]
pub trait UnitOfWorkStore: Send + Sync {
    /// Loads the committed state of a user.
    async fn load_user(&self, user_id: UserId) -> AppResult<Option<User>>;

    /// Opens a transaction that commits or rolls back as a whole.
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}

/// One in-flight store transaction.
///
/// Audit rows can only be inserted; no operation updates or removes them.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Inserts a user and returns the identifier the store assigned.
    async fn insert_user(&mut self, user: &NewUser) -> AppResult<UserId>;

    /// Writes the current values of an existing user.
    async fn update_user(&mut self, user: &User) -> AppResult<()>;

    /// Removes a user.
    async fn delete_user(&mut self, user_id: UserId) -> AppResult<()>;

    /// Appends an audit row and returns the identifier the store assigned.
    async fn insert_audit_log(&mut self, entry: &NewAuditLog) -> AppResult<AuditLogId>;

    /// Makes every write of this transaction visible atomically.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discards every write of this transaction.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Liveness probe for the storage engine.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Performs a cheap round-trip against the store.
    async fn ping(&self) -> AppResult<()>;
}

/// Read-only user queries.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Lists every user ordered by identifier.
    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// Finds one user.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<User>>;
}

/// Filters for reading the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Only entries about this model.
    pub model_name: Option<String>,
    /// Only entries about this entity identifier.
    pub original_id: Option<i64>,
    /// Only entries for this lifecycle event.
    pub db_event_name: Option<DbEventName>,
    /// Only entries written by this request.
    pub request_id: Option<String>,
    /// Upper bound on returned entries.
    pub limit: usize,
}

impl AuditLogQuery {
    /// Returns the limit clamped to `1..=AUDIT_LOG_MAX_LIMIT`.
    #[must_use]
    pub fn capped_limit(&self) -> usize {
        self.limit.clamp(1, AUDIT_LOG_MAX_LIMIT)
    }
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        Self {
            model_name: None,
            original_id: None,
            db_event_name: None,
            request_id: None,
            limit: AUDIT_LOG_DEFAULT_LIMIT,
        }
    }
}

/// Audit trail read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    /// Store-assigned identifier.
    pub id: AuditLogId,
    /// Correlation id of the request that caused the change.
    pub request_id: String,
    /// Audited model tag.
    pub model_name: String,
    /// Audited entity identifier.
    pub original_id: Option<i64>,
    /// Recorded lifecycle event.
    pub db_event_name: DbEventName,
    /// Decoded field history.
    pub history: Option<AuditHistory>,
    /// RFC 3339 timestamp assigned by the store.
    pub created_at: String,
}

/// Read-only audit trail queries.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists entries matching the query, oldest first.
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>>;
}
