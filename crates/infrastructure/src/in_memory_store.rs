use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use ledgerline_application::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, StoreHealth, StoreTransaction,
    UnitOfWorkStore, UserRepository,
};
use ledgerline_core::{AppError, AppResult};
use ledgerline_domain::{AuditLog, AuditLogId, NewAuditLog, NewUser, User, UserId};

#[derive(Debug, Default)]
struct StoreState {
    users: BTreeMap<UserId, User>,
    audit_logs: BTreeMap<AuditLogId, StoredAuditLog>,
    next_user_id: i64,
    next_audit_log_id: i64,
}

#[derive(Debug, Clone)]
struct StoredAuditLog {
    row: AuditLog,
    created_at: String,
}

/// Process-local storage engine.
///
/// Transactions buffer their writes and apply them under a single write lock
/// on commit. Identifiers are drawn when a row is inserted, so rolled back
/// inserts leave gaps the same way database sequences do.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnitOfWorkStore for InMemoryStore {
    async fn load_user(&self, user_id: UserId) -> AppResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            state: self.state.clone(),
            operations: Vec::new(),
        }))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<User>> {
        self.load_user(user_id).await
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryStore {
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let state = self.state.read().await;

        state
            .audit_logs
            .values()
            .filter(|stored| matches_query(&stored.row, &query))
            .take(query.capped_limit())
            .map(|stored| {
                Ok(AuditLogEntry {
                    id: stored.row.id(),
                    request_id: stored.row.request_id().to_owned(),
                    model_name: stored.row.model_name().to_owned(),
                    original_id: stored.row.original_id(),
                    db_event_name: stored.row.db_event_name(),
                    history: stored.row.decoded_history()?,
                    created_at: stored.created_at.clone(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl StoreHealth for InMemoryStore {
    async fn ping(&self) -> AppResult<()> {
        let _state = self.state.read().await;
        Ok(())
    }
}

fn matches_query(row: &AuditLog, query: &AuditLogQuery) -> bool {
    query
        .model_name
        .as_deref()
        .is_none_or(|model_name| row.model_name() == model_name)
        && query
            .original_id
            .is_none_or(|original_id| row.original_id() == Some(original_id))
        && query
            .db_event_name
            .is_none_or(|db_event_name| row.db_event_name() == db_event_name)
        && query
            .request_id
            .as_deref()
            .is_none_or(|request_id| row.request_id() == request_id)
}

#[derive(Debug)]
enum Operation {
    InsertUser(User),
    UpdateUser(User),
    DeleteUser(UserId),
    InsertAuditLog(AuditLog),
}

struct InMemoryTransaction {
    state: Arc<RwLock<StoreState>>,
    operations: Vec<Operation>,
}

impl InMemoryTransaction {
    /// Returns whether the user is visible to this transaction.
    async fn user_exists(&self, user_id: UserId) -> bool {
        let mut exists = self.state.read().await.users.contains_key(&user_id);
        for operation in &self.operations {
            match operation {
                Operation::InsertUser(user) if user.id() == user_id => exists = true,
                Operation::DeleteUser(deleted_id) if *deleted_id == user_id => exists = false,
                _ => {}
            }
        }
        exists
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert_user(&mut self, user: &NewUser) -> AppResult<UserId> {
        let user_id = {
            let mut state = self.state.write().await;
            state.next_user_id += 1;
            UserId::from_i64(state.next_user_id)
        };

        self.operations
            .push(Operation::InsertUser(user.clone().into_user(user_id)));
        Ok(user_id)
    }

    async fn update_user(&mut self, user: &User) -> AppResult<()> {
        if !self.user_exists(user.id()).await {
            return Err(user_not_found(user.id()));
        }

        self.operations.push(Operation::UpdateUser(user.clone()));
        Ok(())
    }

    async fn delete_user(&mut self, user_id: UserId) -> AppResult<()> {
        if !self.user_exists(user_id).await {
            return Err(user_not_found(user_id));
        }

        self.operations.push(Operation::DeleteUser(user_id));
        Ok(())
    }

    async fn insert_audit_log(&mut self, entry: &NewAuditLog) -> AppResult<AuditLogId> {
        let audit_log_id = {
            let mut state = self.state.write().await;
            state.next_audit_log_id += 1;
            AuditLogId::from_i64(state.next_audit_log_id)
        };

        self.operations.push(Operation::InsertAuditLog(
            entry.clone().into_audit_log(audit_log_id),
        ));
        Ok(audit_log_id)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let InMemoryTransaction {
            state: shared,
            operations,
        } = *self;
        let mut state = shared.write().await;

        let mut users = state.users.clone();
        let mut audit_logs = Vec::new();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        for operation in operations {
            match operation {
                Operation::InsertUser(user) => {
                    users.insert(user.id(), user);
                }
                Operation::UpdateUser(user) => {
                    let Some(stored) = users.get_mut(&user.id()) else {
                        return Err(user_not_found(user.id()));
                    };
                    *stored = user;
                }
                Operation::DeleteUser(user_id) => {
                    if users.remove(&user_id).is_none() {
                        return Err(user_not_found(user_id));
                    }
                }
                Operation::InsertAuditLog(row) => audit_logs.push(StoredAuditLog {
                    row,
                    created_at: created_at.clone(),
                }),
            }
        }

        debug!(
            audit_rows = audit_logs.len(),
            "applied in-memory transaction"
        );
        state.users = users;
        state
            .audit_logs
            .extend(audit_logs.into_iter().map(|stored| (stored.row.id(), stored)));

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        debug!(
            discarded = self.operations.len(),
            "discarded in-memory transaction"
        );
        Ok(())
    }
}

fn user_not_found(user_id: UserId) -> AppError {
    AppError::NotFound(format!("user '{user_id}' was not found"))
}
