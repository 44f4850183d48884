//! Audit trail synthesis from unit-of-work lifecycle events.

use std::collections::BTreeMap;

use tracing::debug;

use ledgerline_core::{AppError, AppResult, RequestContext};
use ledgerline_domain::{
    AuditHistory, AuditedEntity, DbEventName, NewAuditLog, USER_FIELD_FIRST_NAME,
    USER_FIELD_LAST_NAME, USER_MODEL_NAME,
};

use crate::{CommitHook, Entity, NewEntity, PendingChanges};

/// Explicit allowlist of audited models and the fields tracked for each.
///
/// Fields that are not listed never show up in audit history, even if the
/// entity exposes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPolicy {
    tracked_fields: BTreeMap<String, Vec<String>>,
}

impl AuditPolicy {
    /// Creates a policy that audits nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            tracked_fields: BTreeMap::new(),
        }
    }

    /// Adds a model and its tracked fields, replacing any earlier entry for it.
    #[must_use]
    pub fn track(mut self, model_name: &str, fields: &[&str]) -> Self {
        self.tracked_fields.insert(
            model_name.to_owned(),
            fields.iter().map(|field| (*field).to_owned()).collect(),
        );
        self
    }

    /// Returns the tracked fields of a model, or `None` if it is not audited.
    #[must_use]
    pub fn tracked_fields(&self, model_name: &str) -> Option<&[String]> {
        self.tracked_fields.get(model_name).map(Vec::as_slice)
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::empty().track(
            USER_MODEL_NAME,
            &[USER_FIELD_FIRST_NAME, USER_FIELD_LAST_NAME],
        )
    }
}

/// Commit hook that stages one audit row per audited create, edit and delete.
#[derive(Debug, Clone, Default)]
pub struct ChangeInterceptor {
    policy: AuditPolicy,
}

impl ChangeInterceptor {
    /// Creates an interceptor for the given policy.
    #[must_use]
    pub fn new(policy: AuditPolicy) -> Self {
        Self { policy }
    }

    /// Returns the tracked-field policy.
    #[must_use]
    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    fn audit_row(
        &self,
        context: &RequestContext,
        entity: &dyn AuditedEntity,
        db_event_name: DbEventName,
        history: Option<&AuditHistory>,
    ) -> AppResult<NewEntity> {
        let row = NewAuditLog::new(
            context.request_id(),
            entity.model_name(),
            entity.audit_id(),
            db_event_name,
            history,
        )?;

        debug!(
            request_id = %context.request_id(),
            model_name = row.model_name(),
            original_id = ?row.original_id(),
            db_event_name = row.db_event_name().as_str(),
            "staged audit row"
        );

        Ok(NewEntity::AuditLog(row))
    }
}

impl CommitHook for ChangeInterceptor {
    fn before_flush(
        &self,
        context: &RequestContext,
        changes: &PendingChanges<'_>,
    ) -> AppResult<Vec<NewEntity>> {
        let mut staged = Vec::new();

        for change in changes.modified {
            let (Some(original), Some(current)) =
                (change.original.as_audited(), change.current.as_audited())
            else {
                continue;
            };
            let Some(fields) = self.policy.tracked_fields(current.model_name()) else {
                continue;
            };

            let history = changed_fields(fields, original, current)?;
            if history.is_empty() {
                continue;
            }
            staged.push(self.audit_row(context, current, DbEventName::Edit, Some(&history))?);
        }

        for entity in changes.deleted {
            let Some(entity) = entity.as_audited() else {
                continue;
            };
            let Some(fields) = self.policy.tracked_fields(entity.model_name()) else {
                continue;
            };

            let history = snapshot(fields, entity)?;
            staged.push(self.audit_row(context, entity, DbEventName::Delete, Some(&history))?);
        }

        Ok(staged)
    }

    fn after_flush(
        &self,
        context: &RequestContext,
        persisted: &[Entity],
    ) -> AppResult<Vec<NewEntity>> {
        let mut staged = Vec::new();

        for entity in persisted {
            let Some(entity) = entity.as_audited() else {
                continue;
            };
            if self.policy.tracked_fields(entity.model_name()).is_none() {
                continue;
            }

            staged.push(self.audit_row(context, entity, DbEventName::Create, None)?);
        }

        Ok(staged)
    }
}

/// Previous values of the tracked fields that differ between the two states.
fn changed_fields(
    fields: &[String],
    original: &dyn AuditedEntity,
    current: &dyn AuditedEntity,
) -> AppResult<AuditHistory> {
    let mut history = AuditHistory::new();
    for field in fields {
        let before = tracked_value(original, field)?;
        let after = tracked_value(current, field)?;
        if before != after {
            history.insert(field.as_str(), before);
        }
    }

    Ok(history)
}

fn snapshot(fields: &[String], entity: &dyn AuditedEntity) -> AppResult<AuditHistory> {
    let mut history = AuditHistory::new();
    for field in fields {
        history.insert(field.as_str(), tracked_value(entity, field)?);
    }

    Ok(history)
}

fn tracked_value<'a>(entity: &'a dyn AuditedEntity, field: &str) -> AppResult<&'a str> {
    entity.field_value(field).ok_or_else(|| {
        AppError::Internal(format!(
            "tracked field '{field}' is not defined on model '{}'",
            entity.model_name()
        ))
    })
}
