use std::sync::Arc;

use ledgerline_application::{
    AuditLogRepository, AuditLogService, ChangeInterceptor, StoreHealth, UnitOfWorkStore,
    UserRepository, UserService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub audit_log_service: AuditLogService,
    pub store_health: Arc<dyn StoreHealth>,
    pub storage_backend: &'static str,
}

impl AppState {
    /// Wires the services around one storage engine.
    pub fn from_store<S>(store: S, storage_backend: &'static str) -> Self
    where
        S: UnitOfWorkStore + UserRepository + AuditLogRepository + StoreHealth + 'static,
    {
        let store = Arc::new(store);

        Self {
            user_service: UserService::new(
                store.clone(),
                store.clone(),
                Arc::new(ChangeInterceptor::default()),
            ),
            audit_log_service: AuditLogService::new(store.clone()),
            store_health: store,
            storage_backend,
        }
    }
}
