//! User CRUD use-cases.
//!
//! Every write goes through a [`UnitOfWork`]; auditing happens in the injected
//! commit hook and is invisible here.

use std::sync::Arc;

use ledgerline_core::{AppError, AppResult, RequestContext};
use ledgerline_domain::{User, UserForm, UserId};

use crate::{CommitHook, UnitOfWork, UnitOfWorkStore, UserRepository};

/// Application service for listing, creating, editing and deleting users.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UnitOfWorkStore>,
    user_repository: Arc<dyn UserRepository>,
    commit_hook: Arc<dyn CommitHook>,
}

impl UserService {
    /// Creates a new user service.
    #[must_use]
    pub fn new(
        store: Arc<dyn UnitOfWorkStore>,
        user_repository: Arc<dyn UserRepository>,
        commit_hook: Arc<dyn CommitHook>,
    ) -> Self {
        Self {
            store,
            user_repository,
            commit_hook,
        }
    }

    /// Lists all users.
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.user_repository.list_users().await
    }

    /// Returns one user.
    pub async fn find_user(&self, user_id: UserId) -> AppResult<User> {
        self.user_repository
            .find_user(user_id)
            .await?
            .ok_or_else(|| user_not_found(user_id))
    }

    /// Validates a submission and stores a new user.
    pub async fn create_user(&self, context: &RequestContext, form: UserForm) -> AppResult<User> {
        let values = form.validate()?;

        let mut unit_of_work = self.unit_of_work(context);
        unit_of_work.add_user(values);
        let outcome = unit_of_work.commit().await?;

        outcome
            .created_users()
            .next()
            .cloned()
            .ok_or_else(|| AppError::Internal("user insert returned no record".to_owned()))
    }

    /// Loads a user, validates a submission and applies it in place.
    pub async fn edit_user(
        &self,
        context: &RequestContext,
        user_id: UserId,
        form: UserForm,
    ) -> AppResult<User> {
        let mut unit_of_work = self.unit_of_work(context);
        let user = unit_of_work
            .get_user_mut(user_id)
            .await?
            .ok_or_else(|| user_not_found(user_id))?;

        let values = form.validate()?;
        user.apply(values);
        let updated = user.clone();

        unit_of_work.commit().await?;
        Ok(updated)
    }

    /// Deletes a user.
    pub async fn delete_user(&self, context: &RequestContext, user_id: UserId) -> AppResult<()> {
        let mut unit_of_work = self.unit_of_work(context);
        unit_of_work.delete_user(user_id).await?;
        unit_of_work.commit().await?;
        Ok(())
    }

    fn unit_of_work(&self, context: &RequestContext) -> UnitOfWork {
        UnitOfWork::new(
            self.store.clone(),
            self.commit_hook.clone(),
            context.clone(),
        )
    }
}

fn user_not_found(user_id: UserId) -> AppError {
    AppError::NotFound(format!("user '{user_id}' was not found"))
}

#[cfg(test)]
mod tests;
