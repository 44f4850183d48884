//! Change tracking and transactional flush of staged entities.
//!
//! A [`UnitOfWork`] collects new, modified and deleted entities for one
//! request and writes them in a single store transaction. A [`CommitHook`]
//! observes the change set before the flush and the persisted entities after
//! it, and may stage more entities into the same transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use ledgerline_core::{AppError, AppResult, RequestContext};
use ledgerline_domain::{AuditLog, AuditedEntity, NewAuditLog, NewUser, User, UserId};

use crate::{StoreTransaction, UnitOfWorkStore};

/// Upper bound on flush passes in one commit.
pub const MAX_FLUSH_PASSES: usize = 8;

/// Entity that exists in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// A user row.
    User(User),
    /// An audit row.
    AuditLog(AuditLog),
}

impl Entity {
    /// Returns the auditable view of this entity. Audit rows have none.
    #[must_use]
    pub fn as_audited(&self) -> Option<&dyn AuditedEntity> {
        match self {
            Self::User(user) => Some(user),
            Self::AuditLog(_) => None,
        }
    }
}

/// Entity staged for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewEntity {
    /// A user without an identifier yet.
    User(NewUser),
    /// An audit row without an identifier yet.
    AuditLog(NewAuditLog),
}

impl NewEntity {
    /// Returns the auditable view of this entity. Audit rows have none.
    #[must_use]
    pub fn as_audited(&self) -> Option<&dyn AuditedEntity> {
        match self {
            Self::User(user) => Some(user),
            Self::AuditLog(_) => None,
        }
    }
}

/// Entity whose in-memory values may differ from what was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedEntity {
    /// Values as loaded from the store.
    pub original: Entity,
    /// Values that will be written.
    pub current: Entity,
}

/// Change set visible to [`CommitHook::before_flush`]. The three sets are disjoint.
#[derive(Debug, Clone, Copy)]
pub struct PendingChanges<'a> {
    /// Entities staged for insertion.
    pub new: &'a [NewEntity],
    /// Loaded entities handed out for mutation.
    pub modified: &'a [ModifiedEntity],
    /// Entities marked for deletion, with their stored values.
    pub deleted: &'a [Entity],
}

/// Observer of the commit lifecycle.
///
/// Entities returned from either hook are inserted in the same transaction
/// as the change that triggered them. An error aborts the whole commit.
pub trait CommitHook: Send + Sync {
    /// Called once per commit with the pending change set, before anything is written.
    fn before_flush(
        &self,
        context: &RequestContext,
        changes: &PendingChanges<'_>,
    ) -> AppResult<Vec<NewEntity>>;

    /// Called after each flush pass with the entities that pass inserted.
    fn after_flush(
        &self,
        context: &RequestContext,
        persisted: &[Entity],
    ) -> AppResult<Vec<NewEntity>>;
}

/// Entities inserted by a successful commit.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    persisted: Vec<Entity>,
}

impl CommitOutcome {
    /// Returns every inserted entity in insertion order.
    #[must_use]
    pub fn persisted(&self) -> &[Entity] {
        &self.persisted
    }

    /// Returns the users inserted by the commit.
    pub fn created_users(&self) -> impl Iterator<Item = &User> {
        self.persisted.iter().filter_map(|entity| match entity {
            Entity::User(user) => Some(user),
            Entity::AuditLog(_) => None,
        })
    }

    /// Returns the audit rows inserted by the commit.
    pub fn audit_logs(&self) -> impl Iterator<Item = &AuditLog> {
        self.persisted.iter().filter_map(|entity| match entity {
            Entity::AuditLog(audit_log) => Some(audit_log),
            Entity::User(_) => None,
        })
    }
}

#[derive(Debug)]
struct TrackedUser {
    original: User,
    current: User,
    handed_out: bool,
}

/// Request-scoped change tracker.
pub struct UnitOfWork {
    store: Arc<dyn UnitOfWorkStore>,
    hook: Arc<dyn CommitHook>,
    context: RequestContext,
    new: Vec<NewEntity>,
    identity_map: BTreeMap<UserId, TrackedUser>,
    deleted: Vec<Entity>,
}

impl UnitOfWork {
    /// Creates an empty unit of work bound to one request.
    #[must_use]
    pub fn new(
        store: Arc<dyn UnitOfWorkStore>,
        hook: Arc<dyn CommitHook>,
        context: RequestContext,
    ) -> Self {
        Self {
            store,
            hook,
            context,
            new: Vec::new(),
            identity_map: BTreeMap::new(),
            deleted: Vec::new(),
        }
    }

    /// Returns the request this unit of work belongs to.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Stages a new user for insertion.
    pub fn add_user(&mut self, user: NewUser) {
        self.new.push(NewEntity::User(user));
    }

    /// Returns a user for reading. Does not mark it as modified.
    pub async fn get_user(&mut self, user_id: UserId) -> AppResult<Option<&User>> {
        Ok(self.tracked(user_id).await?.map(|tracked| &tracked.current))
    }

    /// Returns a user for mutation. The user joins the modified set.
    pub async fn get_user_mut(&mut self, user_id: UserId) -> AppResult<Option<&mut User>> {
        Ok(self.tracked(user_id).await?.map(|tracked| {
            tracked.handed_out = true;
            &mut tracked.current
        }))
    }

    /// Marks a user for deletion.
    ///
    /// Pending in-memory mutations of the same user are discarded; the
    /// deleted set carries the values as stored.
    pub async fn delete_user(&mut self, user_id: UserId) -> AppResult<()> {
        if self.tracked(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
        }

        if let Some(tracked) = self.identity_map.remove(&user_id) {
            self.deleted.push(Entity::User(tracked.original));
        }

        Ok(())
    }

    /// Returns whether anything is staged.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.new.is_empty()
            || !self.deleted.is_empty()
            || self.identity_map.values().any(|tracked| tracked.handed_out)
    }

    /// Writes every staged change and every hook-staged entity atomically.
    pub async fn commit(mut self) -> AppResult<CommitOutcome> {
        let modified = self.modified_entities();
        if self.new.is_empty() && modified.is_empty() && self.deleted.is_empty() {
            return Ok(CommitOutcome::default());
        }

        let staged = self.hook.before_flush(
            &self.context,
            &PendingChanges {
                new: &self.new,
                modified: &modified,
                deleted: &self.deleted,
            },
        )?;
        let mut pending = std::mem::take(&mut self.new);
        pending.extend(staged);

        let mut transaction = self.store.begin().await?;
        let flushed = flush(
            transaction.as_mut(),
            self.hook.as_ref(),
            &self.context,
            pending,
            &modified,
            &self.deleted,
        )
        .await;

        match flushed {
            Ok(persisted) => {
                transaction.commit().await?;
                info!(
                    request_id = %self.context.request_id(),
                    inserted = persisted.len(),
                    modified = modified.len(),
                    deleted = self.deleted.len(),
                    "unit of work committed"
                );
                Ok(CommitOutcome { persisted })
            }
            Err(error) => {
                if let Err(rollback_error) = transaction.rollback().await {
                    warn!(
                        request_id = %self.context.request_id(),
                        error = %rollback_error,
                        "rollback after failed flush also failed"
                    );
                }
                Err(error)
            }
        }
    }

    async fn tracked(&mut self, user_id: UserId) -> AppResult<Option<&mut TrackedUser>> {
        if self.is_deleted(user_id) {
            return Ok(None);
        }

        if !self.identity_map.contains_key(&user_id) {
            let Some(user) = self.store.load_user(user_id).await? else {
                return Ok(None);
            };
            self.identity_map.insert(
                user_id,
                TrackedUser {
                    original: user.clone(),
                    current: user,
                    handed_out: false,
                },
            );
        }

        Ok(self.identity_map.get_mut(&user_id))
    }

    fn is_deleted(&self, user_id: UserId) -> bool {
        self.deleted
            .iter()
            .any(|entity| matches!(entity, Entity::User(user) if user.id() == user_id))
    }

    fn modified_entities(&self) -> Vec<ModifiedEntity> {
        self.identity_map
            .values()
            .filter(|tracked| tracked.handed_out)
            .map(|tracked| ModifiedEntity {
                original: Entity::User(tracked.original.clone()),
                current: Entity::User(tracked.current.clone()),
            })
            .collect()
    }
}

async fn flush(
    transaction: &mut dyn StoreTransaction,
    hook: &dyn CommitHook,
    context: &RequestContext,
    mut pending: Vec<NewEntity>,
    modified: &[ModifiedEntity],
    deleted: &[Entity],
) -> AppResult<Vec<Entity>> {
    let mut persisted_total = Vec::new();

    for pass in 1..=MAX_FLUSH_PASSES {
        let mut persisted = Vec::with_capacity(pending.len());
        for entity in pending.drain(..) {
            persisted.push(insert(transaction, entity).await?);
        }

        if pass == 1 {
            for change in modified {
                match (&change.original, &change.current) {
                    (Entity::User(original), Entity::User(current)) => {
                        if original != current {
                            transaction.update_user(current).await?;
                        }
                    }
                    _ => return Err(append_only_violation()),
                }
            }

            for entity in deleted {
                match entity {
                    Entity::User(user) => transaction.delete_user(user.id()).await?,
                    Entity::AuditLog(_) => return Err(append_only_violation()),
                }
            }
        }

        let staged = hook.after_flush(context, &persisted)?;
        persisted_total.extend(persisted);
        if staged.is_empty() {
            return Ok(persisted_total);
        }
        pending = staged;
    }

    Err(AppError::Internal(format!(
        "commit hooks kept staging entities after {MAX_FLUSH_PASSES} flush passes"
    )))
}

async fn insert(transaction: &mut dyn StoreTransaction, entity: NewEntity) -> AppResult<Entity> {
    match entity {
        NewEntity::User(user) => {
            let user_id = transaction.insert_user(&user).await?;
            Ok(Entity::User(user.into_user(user_id)))
        }
        NewEntity::AuditLog(entry) => {
            let audit_log_id = transaction.insert_audit_log(&entry).await?;
            Ok(Entity::AuditLog(entry.into_audit_log(audit_log_id)))
        }
    }
}

fn append_only_violation() -> AppError {
    AppError::Internal("audit rows are append-only".to_owned())
}
