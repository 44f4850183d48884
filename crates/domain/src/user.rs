//! User domain types and validation rules.

use ledgerline_core::{AppError, AppResult, FieldErrors, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::AuditedEntity;

/// Model tag stamped on audit rows about users.
pub const USER_MODEL_NAME: &str = "user";

/// Name of the first-name field as it appears in audit history.
pub const USER_FIELD_FIRST_NAME: &str = "first_name";

/// Name of the last-name field as it appears in audit history.
pub const USER_FIELD_LAST_NAME: &str = "last_name";

/// Maximum first name length, in characters.
pub const FIRST_NAME_MAX_LENGTH: usize = 80;

/// Maximum last name length, in characters.
pub const LAST_NAME_MAX_LENGTH: usize = 120;

/// Store-assigned identifier for a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
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

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Raw user form submission, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserForm {
    /// Submitted first name.
    pub first_name: String,
    /// Submitted last name.
    pub last_name: String,
}

impl UserForm {
    /// Creates a form submission from raw values.
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Validates every field and reports all failures at once.
    pub fn validate(self) -> AppResult<NewUser> {
        let mut errors = FieldErrors::new();
        let first_name = required_field(
            &mut errors,
            USER_FIELD_FIRST_NAME,
            self.first_name,
            FIRST_NAME_MAX_LENGTH,
        );
        let last_name = required_field(
            &mut errors,
            USER_FIELD_LAST_NAME,
            self.last_name,
            LAST_NAME_MAX_LENGTH,
        );

        match (first_name, last_name) {
            (Some(first_name), Some(last_name)) => Ok(NewUser::new(first_name, last_name)),
            _ => Err(AppError::InvalidFields(errors)),
        }
    }
}

fn required_field(
    errors: &mut FieldErrors,
    field: &str,
    value: String,
    max_length: usize,
) -> Option<NonEmptyString> {
    if value.chars().count() > max_length {
        errors.add(field, format!("must not exceed {max_length} characters"));
        return None;
    }

    match NonEmptyString::new(value) {
        Ok(value) => Some(value),
        Err(_) => {
            errors.add(field, "this field is required");
            None
        }
    }
}

/// Validated values for a user that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    first_name: NonEmptyString,
    last_name: NonEmptyString,
}

impl NewUser {
    /// Creates a new user from already validated names.
    #[must_use]
    pub fn new(first_name: NonEmptyString, last_name: NonEmptyString) -> Self {
        Self {
            first_name,
            last_name,
        }
    }

    /// Returns the first name.
    #[must_use]
    pub fn first_name(&self) -> &NonEmptyString {
        &self.first_name
    }

    /// Returns the last name.
    #[must_use]
    pub fn last_name(&self) -> &NonEmptyString {
        &self.last_name
    }

    /// Attaches the identifier the store assigned on insert.
    #[must_use]
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

/// Persisted user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    first_name: NonEmptyString,
    last_name: NonEmptyString,
}

impl User {
    /// Rebuilds a user from stored values.
    #[must_use]
    pub fn new(id: UserId, first_name: NonEmptyString, last_name: NonEmptyString) -> Self {
        Self {
            id,
            first_name,
            last_name,
        }
    }

    /// Returns the store-assigned identifier.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the first name.
    #[must_use]
    pub fn first_name(&self) -> &NonEmptyString {
        &self.first_name
    }

    /// Returns the last name.
    #[must_use]
    pub fn last_name(&self) -> &NonEmptyString {
        &self.last_name
    }

    /// Replaces the first name.
    pub fn set_first_name(&mut self, first_name: NonEmptyString) {
        self.first_name = first_name;
    }

    /// Replaces the last name.
    pub fn set_last_name(&mut self, last_name: NonEmptyString) {
        self.last_name = last_name;
    }

    /// Assigns both names from a validated submission.
    pub fn apply(&mut self, values: NewUser) {
        self.set_first_name(values.first_name);
        self.set_last_name(values.last_name);
    }
}

impl AuditedEntity for User {
    fn model_name(&self) -> &'static str {
        USER_MODEL_NAME
    }

    fn audit_id(&self) -> Option<i64> {
        Some(self.id.as_i64())
    }

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            USER_FIELD_FIRST_NAME => Some(self.first_name.as_str()),
            USER_FIELD_LAST_NAME => Some(self.last_name.as_str()),
            _ => None,
        }
    }
}

impl AuditedEntity for NewUser {
    fn model_name(&self) -> &'static str {
        USER_MODEL_NAME
    }

    fn audit_id(&self) -> Option<i64> {
        None
    }

    fn field_value(&self, field: &str) -> Option<&str> {
        match field {
            USER_FIELD_FIRST_NAME => Some(self.first_name.as_str()),
            USER_FIELD_LAST_NAME => Some(self.last_name.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ada() -> User {
        UserForm::new("Ada", "Lovelace")
            .validate()
            .unwrap_or_else(|_| unreachable!())
            .into_user(UserId::from_i64(1))
    }

    #[test]
    fn valid_form_is_accepted() {
        let user = ada();
        assert_eq!(user.first_name().as_str(), "Ada");
        assert_eq!(user.last_name().as_str(), "Lovelace");
    }

    #[test]
    fn empty_fields_are_reported_per_field() {
        let result = UserForm::new("", "   ").validate();
        let Err(AppError::InvalidFields(errors)) = result else {
            panic!("expected field errors");
        };

        assert_eq!(errors.get(USER_FIELD_FIRST_NAME), Some("this field is required"));
        assert_eq!(errors.get(USER_FIELD_LAST_NAME), Some("this field is required"));
    }

    #[test]
    fn only_the_failing_field_is_reported() {
        let result = UserForm::new("", "Lovelace").validate();
        let Err(AppError::InvalidFields(errors)) = result else {
            panic!("expected field errors");
        };

        assert!(errors.get(USER_FIELD_FIRST_NAME).is_some());
        assert!(errors.get(USER_FIELD_LAST_NAME).is_none());
    }

    #[test]
    fn overlong_first_name_is_rejected() {
        let long = "a".repeat(FIRST_NAME_MAX_LENGTH + 1);
        assert!(UserForm::new(long, "Lovelace").validate().is_err());
        let max = "a".repeat(FIRST_NAME_MAX_LENGTH);
        assert!(UserForm::new(max, "Lovelace").validate().is_ok());
    }

    #[test]
    fn tracked_fields_are_exposed_by_name() {
        let user = ada();
        assert_eq!(user.model_name(), USER_MODEL_NAME);
        assert_eq!(user.audit_id(), Some(1));
        assert_eq!(user.field_value(USER_FIELD_FIRST_NAME), Some("Ada"));
        assert_eq!(user.field_value(USER_FIELD_LAST_NAME), Some("Lovelace"));
        assert_eq!(user.field_value("email"), None);
    }

    #[test]
    fn apply_replaces_both_names() {
        let mut user = ada();
        let values = UserForm::new("Augusta", "Byron")
            .validate()
            .unwrap_or_else(|_| unreachable!());
        user.apply(values);

        assert_eq!(user.first_name().as_str(), "Augusta");
        assert_eq!(user.last_name().as_str(), "Byron");
        assert_eq!(user.id(), UserId::from_i64(1));
    }

    proptest! {
        #[test]
        fn non_blank_names_within_limits_always_validate(
            first in "[A-Za-z][A-Za-z ]{0,40}",
            last in "[A-Za-z][A-Za-z ]{0,40}",
        ) {
            let validated = UserForm::new(first.clone(), last.clone()).validate();
            prop_assert!(validated.is_ok());
            let validated = validated.unwrap_or_else(|_| unreachable!());
            prop_assert_eq!(validated.first_name().as_str(), first.as_str());
            prop_assert_eq!(validated.last_name().as_str(), last.as_str());
        }

        #[test]
        fn whitespace_only_names_never_validate(blank in "[ \t]{0,10}") {
            prop_assert!(UserForm::new(blank.clone(), "Lovelace").validate().is_err());
            prop_assert!(UserForm::new("Ada", blank).validate().is_err());
        }
    }
}
