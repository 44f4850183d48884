use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use ledgerline_core::{AppError, AppResult, NonEmptyString};
use ledgerline_domain::{AuditLog, AuditLogId, NewAuditLog, NewUser, User, UserId};

use crate::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, StoreTransaction, UnitOfWorkStore,
    UserRepository,
};

#[derive(Default)]
struct FakeState {
    users: BTreeMap<UserId, User>,
    audit_logs: Vec<AuditLog>,
    next_user_id: i64,
    next_audit_log_id: i64,
    transactions_opened: usize,
    commits: usize,
    rollbacks: usize,
}

/// Store double that buffers transactional writes and applies them on commit.
#[derive(Clone, Default)]
pub(crate) struct FakeStore {
    state: Arc<Mutex<FakeState>>,
    fail_audit_inserts: bool,
}

impl FakeStore {
    pub(crate) async fn with_users(users: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().await;
            for (first_name, last_name) in users {
                state.next_user_id += 1;
                let user_id = UserId::from_i64(state.next_user_id);
                state
                    .users
                    .insert(user_id, user(user_id.as_i64(), first_name, last_name));
            }
        }
        store
    }

    pub(crate) fn failing_audit_inserts(mut self) -> Self {
        self.fail_audit_inserts = true;
        self
    }

    pub(crate) async fn users(&self) -> Vec<User> {
        self.state.lock().await.users.values().cloned().collect()
    }

    pub(crate) async fn audit_logs(&self) -> Vec<AuditLog> {
        self.state.lock().await.audit_logs.clone()
    }

    pub(crate) async fn transactions_opened(&self) -> usize {
        self.state.lock().await.transactions_opened
    }

    pub(crate) async fn commits(&self) -> usize {
        self.state.lock().await.commits
    }

    pub(crate) async fn rollbacks(&self) -> usize {
        self.state.lock().await.rollbacks
    }
}

pub(crate) fn user(id: i64, first_name: &str, last_name: &str) -> User {
    User::new(
        UserId::from_i64(id),
        NonEmptyString::new(first_name).unwrap_or_else(|_| unreachable!()),
        NonEmptyString::new(last_name).unwrap_or_else(|_| unreachable!()),
    )
}

#[async_trait]
impl UnitOfWorkStore for FakeStore {
    async fn load_user(&self, user_id: UserId) -> AppResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        self.state.lock().await.transactions_opened += 1;
        Ok(Box::new(FakeTransaction {
            state: self.state.clone(),
            fail_audit_inserts: self.fail_audit_inserts,
            operations: Vec::new(),
        }))
    }
}

#[async_trait]
impl UserRepository for FakeStore {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.users().await)
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<User>> {
        self.load_user(user_id).await
    }
}

#[async_trait]
impl AuditLogRepository for FakeStore {
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let state = self.state.lock().await;
        state
            .audit_logs
            .iter()
            .filter(|row| {
                query
                    .model_name
                    .as_deref()
                    .is_none_or(|model_name| row.model_name() == model_name)
            })
            .filter(|row| {
                query
                    .original_id
                    .is_none_or(|original_id| row.original_id() == Some(original_id))
            })
            .filter(|row| {
                query
                    .db_event_name
                    .is_none_or(|db_event_name| row.db_event_name() == db_event_name)
            })
            .filter(|row| {
                query
                    .request_id
                    .as_deref()
                    .is_none_or(|request_id| row.request_id() == request_id)
            })
            .take(query.capped_limit())
            .map(|row| {
                Ok(AuditLogEntry {
                    id: row.id(),
                    request_id: row.request_id().to_owned(),
                    model_name: row.model_name().to_owned(),
                    original_id: row.original_id(),
                    db_event_name: row.db_event_name(),
                    history: row.decoded_history()?,
                    created_at: "2026-01-01T00:00:00Z".to_owned(),
                })
            })
            .collect()
    }
}

enum FakeOperation {
    InsertUser(User),
    UpdateUser(User),
    DeleteUser(UserId),
    InsertAuditLog(AuditLog),
}

struct FakeTransaction {
    state: Arc<Mutex<FakeState>>,
    fail_audit_inserts: bool,
    operations: Vec<FakeOperation>,
}

#[async_trait]
impl StoreTransaction for FakeTransaction {
    async fn insert_user(&mut self, user: &NewUser) -> AppResult<UserId> {
        let user_id = {
            let mut state = self.state.lock().await;
            state.next_user_id += 1;
            UserId::from_i64(state.next_user_id)
        };
        self.operations
            .push(FakeOperation::InsertUser(user.clone().into_user(user_id)));
        Ok(user_id)
    }

    async fn update_user(&mut self, user: &User) -> AppResult<()> {
        if !self.state.lock().await.users.contains_key(&user.id()) {
            return Err(AppError::NotFound(format!(
                "user '{}' was not found",
                user.id()
            )));
        }
        self.operations.push(FakeOperation::UpdateUser(user.clone()));
        Ok(())
    }

    async fn delete_user(&mut self, user_id: UserId) -> AppResult<()> {
        self.operations.push(FakeOperation::DeleteUser(user_id));
        Ok(())
    }

    async fn insert_audit_log(&mut self, entry: &NewAuditLog) -> AppResult<AuditLogId> {
        if self.fail_audit_inserts {
            return Err(AppError::Storage("audit insert rejected".to_owned()));
        }

        let audit_log_id = {
            let mut state = self.state.lock().await;
            state.next_audit_log_id += 1;
            AuditLogId::from_i64(state.next_audit_log_id)
        };
        self.operations.push(FakeOperation::InsertAuditLog(
            entry.clone().into_audit_log(audit_log_id),
        ));
        Ok(audit_log_id)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let transaction = *self;
        let mut state = transaction.state.lock().await;
        for operation in transaction.operations {
            match operation {
                FakeOperation::InsertUser(user) | FakeOperation::UpdateUser(user) => {
                    state.users.insert(user.id(), user);
                }
                FakeOperation::DeleteUser(user_id) => {
                    state.users.remove(&user_id);
                }
                FakeOperation::InsertAuditLog(row) => state.audit_logs.push(row),
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.state.lock().await.rollbacks += 1;
        Ok(())
    }
}
