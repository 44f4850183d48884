use std::sync::Arc;

use ledgerline_core::{AppError, RequestContext};
use ledgerline_domain::{DbEventName, UserForm, UserId};

use crate::test_support::FakeStore;
use crate::{AuditLogQuery, AuditLogService, ChangeInterceptor};

use super::UserService;

fn service(store: &FakeStore) -> UserService {
    UserService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(ChangeInterceptor::default()),
    )
}

#[tokio::test]
async fn create_user_returns_stored_user_and_audits_it() {
    let store = FakeStore::default();
    let service = service(&store);
    let context = RequestContext::begin();

    let created = service
        .create_user(&context, UserForm::new("Ada", "Lovelace"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(created.id(), UserId::from_i64(1));
    assert_eq!(created.last_name().as_str(), "Lovelace");

    let listed = service.list_users().await.unwrap_or_else(|_| unreachable!());
    assert_eq!(listed, vec![created]);

    let rows = store.audit_logs().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].request_id(), context.request_id().to_string());
}

#[tokio::test]
async fn invalid_create_writes_nothing() {
    let store = FakeStore::default();
    let service = service(&store);

    let result = service
        .create_user(&RequestContext::begin(), UserForm::new("", "Lovelace"))
        .await;

    assert!(matches!(
        result,
        Err(AppError::InvalidFields(errors)) if errors.get("first_name").is_some()
    ));
    assert!(store.users().await.is_empty());
    assert!(store.audit_logs().await.is_empty());
    assert_eq!(store.transactions_opened().await, 0);
}

#[tokio::test]
async fn edit_user_applies_values_and_records_diff() {
    let store = FakeStore::with_users(&[("Ada", "Lovelace")]).await;
    let service = service(&store);

    let updated = service
        .edit_user(
            &RequestContext::begin(),
            UserId::from_i64(1),
            UserForm::new("Ada", "Byron"),
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(updated.last_name().as_str(), "Byron");

    let entries = AuditLogService::new(Arc::new(store.clone()))
        .list_entries(AuditLogQuery {
            db_event_name: Some(DbEventName::Edit),
            ..AuditLogQuery::default()
        })
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(entries.len(), 1);
    let history = entries[0]
        .history
        .as_ref()
        .unwrap_or_else(|| unreachable!());
    assert_eq!(history.get("last_name"), Some("Lovelace"));
    assert_eq!(history.get("first_name"), None);
}

#[tokio::test]
async fn edit_of_missing_user_is_not_found_before_validation() {
    let store = FakeStore::default();
    let service = service(&store);

    let result = service
        .edit_user(
            &RequestContext::begin(),
            UserId::from_i64(42),
            UserForm::new("", ""),
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn invalid_edit_leaves_user_untouched() {
    let store = FakeStore::with_users(&[("Ada", "Lovelace")]).await;
    let service = service(&store);

    let result = service
        .edit_user(
            &RequestContext::begin(),
            UserId::from_i64(1),
            UserForm::new("Ada", "   "),
        )
        .await;

    assert!(matches!(result, Err(AppError::InvalidFields(_))));
    let user = service
        .find_user(UserId::from_i64(1))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(user.last_name().as_str(), "Lovelace");
    assert!(store.audit_logs().await.is_empty());
}

#[tokio::test]
async fn delete_user_removes_it_and_records_snapshot() {
    let store = FakeStore::with_users(&[("Grace", "Hopper")]).await;
    let service = service(&store);

    let result = service
        .delete_user(&RequestContext::begin(), UserId::from_i64(1))
        .await;

    assert!(result.is_ok());
    assert!(matches!(
        service.find_user(UserId::from_i64(1)).await,
        Err(AppError::NotFound(_))
    ));
    let rows = store.audit_logs().await;
    assert_eq!(rows[0].db_event_name(), DbEventName::Delete);
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_request_ids() {
    let store = FakeStore::default();
    let service = service(&store);

    let first = RequestContext::begin();
    let second = RequestContext::begin();
    let (left, right) = tokio::join!(
        service.create_user(&first, UserForm::new("Ada", "Lovelace")),
        service.create_user(&second, UserForm::new("Grace", "Hopper")),
    );
    let left = left.unwrap_or_else(|_| unreachable!());
    let right = right.unwrap_or_else(|_| unreachable!());

    let rows = store.audit_logs().await;
    let request_of = |user_id: UserId| {
        rows.iter()
            .find(|row| row.original_id() == Some(user_id.as_i64()))
            .map(|row| row.request_id().to_owned())
    };
    assert_eq!(request_of(left.id()), Some(first.request_id().to_string()));
    assert_eq!(request_of(right.id()), Some(second.request_id().to_string()));
}
