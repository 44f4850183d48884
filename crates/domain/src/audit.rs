//! Audit trail entries and the field-history payload they carry.

use std::collections::BTreeMap;
use std::str::FromStr;

use ledgerline_core::{AppError, AppResult, RequestId};
use serde::{Deserialize, Serialize};

/// Model tag of audit rows themselves. Rows with this tag are never audited.
pub const AUDIT_LOG_MODEL_NAME: &str = "audit_log";

/// Read access to the audit-relevant view of an entity.
///
/// The set of fields that end up in history is decided by the caller's
/// tracked-field allowlist; this trait only resolves a field name to its
/// current value.
pub trait AuditedEntity {
    /// Stable model tag written to `AuditLog::model_name`.
    fn model_name(&self) -> &'static str;

    /// Store-assigned identifier, if the entity has been persisted.
    fn audit_id(&self) -> Option<i64>;

    /// Current value of a named field, or `None` if the entity has no such field.
    fn field_value(&self, field: &str) -> Option<&str>;
}

/// Store-assigned identifier for an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuditLogId(i64);

impl AuditLogId {
    /// Wraps an identifier assigned by the store.
    #[must_use]
    pub fn from_i64(value: i64) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// Lifecycle event an audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbEventName {
    /// Entity was inserted.
    Create,
    /// One or more tracked fields changed.
    Edit,
    /// Entity was removed.
    Delete,
}

impl DbEventName {
    /// Returns the storage string for this event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for DbEventName {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "edit" => Ok(Self::Edit),
            "delete" => Ok(Self::Delete),
            _ => Err(AppError::Validation(format!(
                "unknown db event name '{value}'"
            ))),
        }
    }
}

/// Field name to previous value mapping stored with `edit` and `delete` rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditHistory(BTreeMap<String, String>);

impl AuditHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Records the previous value of a field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Returns the recorded value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Returns whether no field was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of recorded fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(field, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    /// Encodes the history as compact JSON text.
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(&self.0).map_err(|error| {
            AppError::Serialization(format!("failed to encode audit history: {error}"))
        })
    }

    /// Decodes history previously produced by [`AuditHistory::to_json`].
    pub fn from_json(value: &str) -> AppResult<Self> {
        serde_json::from_str::<BTreeMap<String, String>>(value)
            .map(Self)
            .map_err(|error| {
                AppError::Serialization(format!("failed to decode audit history: {error}"))
            })
    }
}

impl<K, V> FromIterator<(K, V)> for AuditHistory
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

/// Audit row staged for insertion, not yet assigned an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditLog {
    request_id: RequestId,
    model_name: String,
    original_id: Option<i64>,
    db_event_name: DbEventName,
    history: Option<String>,
}

impl NewAuditLog {
    /// Creates a staged audit row, serializing history when present.
    pub fn new(
        request_id: RequestId,
        model_name: impl Into<String>,
        original_id: Option<i64>,
        db_event_name: DbEventName,
        history: Option<&AuditHistory>,
    ) -> AppResult<Self> {
        let model_name = model_name.into();
        if model_name.trim().is_empty() {
            return Err(AppError::Validation(
                "audit model name must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            request_id,
            model_name,
            original_id,
            db_event_name,
            history: history.map(AuditHistory::to_json).transpose()?,
        })
    }

    /// Returns the correlation id of the request that caused the change.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the audited model tag.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model_name.as_str()
    }

    /// Returns the audited entity's identifier.
    #[must_use]
    pub fn original_id(&self) -> Option<i64> {
        self.original_id
    }

    /// Returns the recorded lifecycle event.
    #[must_use]
    pub fn db_event_name(&self) -> DbEventName {
        self.db_event_name
    }

    /// Returns the serialized history, if any.
    #[must_use]
    pub fn history(&self) -> Option<&str> {
        self.history.as_deref()
    }

    /// Attaches the identifier the store assigned on insert.
    #[must_use]
    pub fn into_audit_log(self, id: AuditLogId) -> AuditLog {
        AuditLog {
            id,
            request_id: self.request_id.to_string(),
            model_name: self.model_name,
            original_id: self.original_id,
            db_event_name: self.db_event_name,
            history: self.history,
        }
    }
}

/// Persisted audit row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    id: AuditLogId,
    request_id: String,
    model_name: String,
    original_id: Option<i64>,
    db_event_name: DbEventName,
    history: Option<String>,
}

impl AuditLog {
    /// Rebuilds an audit row from stored values.
    #[must_use]
    pub fn new(
        id: AuditLogId,
        request_id: impl Into<String>,
        model_name: impl Into<String>,
        original_id: Option<i64>,
        db_event_name: DbEventName,
        history: Option<String>,
    ) -> Self {
        Self {
            id,
            request_id: request_id.into(),
            model_name: model_name.into(),
            original_id,
            db_event_name,
            history,
        }
    }

    /// Returns the store-assigned identifier.
    #[must_use]
    pub fn id(&self) -> AuditLogId {
        self.id
    }

    /// Returns the correlation id of the request that caused the change.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.request_id.as_str()
    }

    /// Returns the audited model tag.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model_name.as_str()
    }

    /// Returns the audited entity's identifier.
    #[must_use]
    pub fn original_id(&self) -> Option<i64> {
        self.original_id
    }

    /// Returns the recorded lifecycle event.
    #[must_use]
    pub fn db_event_name(&self) -> DbEventName {
        self.db_event_name
    }

    /// Returns the serialized history, if any.
    #[must_use]
    pub fn history(&self) -> Option<&str> {
        self.history.as_deref()
    }

    /// Decodes the stored history.
    pub fn decoded_history(&self) -> AppResult<Option<AuditHistory>> {
        self.history
            .as_deref()
            .map(AuditHistory::from_json)
            .transpose()
    }
}
