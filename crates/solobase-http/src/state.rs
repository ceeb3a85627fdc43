//! Shared application state threaded through every request handler.

use solobase_auth::AuthService;
use solobase_core::AppContext;
use solobase_extensions::ExtensionRegistry;
use solobase_iam::AuthorizationService;
use solobase_storage::StorageService;

/// Everything a request handler needs: the process context plus every
/// domain service, all cheaply `Clone`-able.
#[derive(Clone)]
pub struct AppState {
    /// Process-scoped config and readonly flag.
    pub ctx: AppContext,
    /// Authentication: login, bearer issuance/verification.
    pub auth: AuthService,
    /// Authorization: role resolution, path policy, rate limiting.
    pub authz: AuthorizationService,
    /// Bucket/object/quota/token orchestration.
    pub storage: StorageService,
    /// Extension lifecycle and request dispatch.
    pub extensions: ExtensionRegistry,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
