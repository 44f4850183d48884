use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use ledgerline_application::{
    AuditLogEntry, AuditLogQuery, AuditLogRepository, StoreHealth, StoreTransaction,
    UnitOfWorkStore, UserRepository,
};
use ledgerline_core::{AppError, AppResult, NonEmptyString};
use ledgerline_domain::{
    AuditHistory, AuditLogId, DbEventName, NewAuditLog, NewUser, User, UserId,
};

/// Schema migrations for the PostgreSQL store.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// PostgreSQL-backed storage engine.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|error| AppError::Storage(format!("failed to connect to database: {error}")))?;

        Ok(Self::new(pool))
    }

    /// Applies pending schema migrations.
    pub async fn migrate(&self) -> AppResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|error| AppError::Storage(format!("failed to run migrations: {error}")))
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    first_name: String,
    last_name: String,
}

impl UserRow {
    fn into_user(self) -> AppResult<User> {
        Ok(User::new(
            UserId::from_i64(self.id),
            NonEmptyString::new(self.first_name)?,
            NonEmptyString::new(self.last_name)?,
        ))
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: i64,
    request_id: String,
    model_name: String,
    original_id: Option<i64>,
    db_event_name: String,
    history: Option<String>,
    created_at: String,
}

impl AuditLogRow {
    fn into_entry(self) -> AppResult<AuditLogEntry> {
        Ok(AuditLogEntry {
            id: AuditLogId::from_i64(self.id),
            request_id: self.request_id,
            model_name: self.model_name,
            original_id: self.original_id,
            db_event_name: self.db_event_name.parse::<DbEventName>()?,
            history: self
                .history
                .as_deref()
                .map(AuditHistory::from_json)
                .transpose()?,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl UnitOfWorkStore for PostgresStore {
    async fn load_user(&self, user_id: UserId) -> AppResult<Option<User>> {
        find_user_row(&self.pool, user_id).await
    }

    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        let transaction = self.pool.begin().await.map_err(|error| {
            AppError::Storage(format!("failed to begin transaction: {error}"))
        })?;

        Ok(Box::new(PostgresTransaction { transaction }))
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list users: {error}")))?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn find_user(&self, user_id: UserId) -> AppResult<Option<User>> {
        find_user_row(&self.pool, user_id).await
    }
}

async fn find_user_row(pool: &PgPool, user_id: UserId) -> AppResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, first_name, last_name
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id.as_i64())
    .fetch_optional(pool)
    .await
    .map_err(|error| AppError::Storage(format!("failed to load user '{user_id}': {error}")))?
    .map(UserRow::into_user)
    .transpose()
}

#[async_trait]
impl AuditLogRepository for PostgresStore {
    async fn list_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let capped_limit = query.capped_limit() as i64;
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id,
                request_id,
                model_name,
                original_id,
                db_event_name,
                history,
                to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM audit_log
            WHERE ($1::TEXT IS NULL OR model_name = $1)
                AND ($2::BIGINT IS NULL OR original_id = $2)
                AND ($3::TEXT IS NULL OR db_event_name = $3)
                AND ($4::TEXT IS NULL OR request_id = $4)
            ORDER BY id ASC
            LIMIT $5
            "#,
        )
        .bind(query.model_name)
        .bind(query.original_id)
        .bind(query.db_event_name.map(|db_event_name| db_event_name.as_str()))
        .bind(query.request_id)
        .bind(capped_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list audit log entries: {error}")))?;

        rows.into_iter().map(AuditLogRow::into_entry).collect()
    }
}

#[async_trait]
impl StoreHealth for PostgresStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|error| AppError::Storage(format!("database ping failed: {error}")))
    }
}

/// One PostgreSQL transaction driven by the unit of work.
struct PostgresTransaction {
    transaction: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn insert_user(&mut self, user: &NewUser) -> AppResult<UserId> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (first_name, last_name)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(user.first_name().as_str())
        .bind(user.last_name().as_str())
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Storage(format!("failed to insert user: {error}")))?;

        Ok(UserId::from_i64(user_id))
    }

    async fn update_user(&mut self, user: &User) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3
            WHERE id = $1
            "#,
        )
        .bind(user.id().as_i64())
        .bind(user.first_name().as_str())
        .bind(user.last_name().as_str())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to update user '{}': {error}", user.id()))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "user '{}' was not found",
                user.id()
            )));
        }

        Ok(())
    }

    async fn delete_user(&mut self, user_id: UserId) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_i64())
        .execute(&mut *self.transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to delete user '{user_id}': {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "user '{user_id}' was not found"
            )));
        }

        Ok(())
    }

    async fn insert_audit_log(&mut self, entry: &NewAuditLog) -> AppResult<AuditLogId> {
        let audit_log_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO audit_log (request_id, model_name, original_id, db_event_name, history)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(entry.request_id().to_string())
        .bind(entry.model_name())
        .bind(entry.original_id())
        .bind(entry.db_event_name().as_str())
        .bind(entry.history())
        .fetch_one(&mut *self.transaction)
        .await
        .map_err(|error| AppError::Storage(format!("failed to insert audit log: {error}")))?;

        Ok(AuditLogId::from_i64(audit_log_id))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PostgresTransaction { transaction } = *self;
        transaction
            .commit()
            .await
            .map_err(|error| AppError::Storage(format!("failed to commit transaction: {error}")))
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let PostgresTransaction { transaction } = *self;
        transaction.rollback().await.map_err(|error| {
            AppError::Storage(format!("failed to roll back transaction: {error}"))
        })
    }
}
