//! Extension registry: lifecycle state machine plus request dispatch with
//! panic recovery at the boundary between the host and extension code.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use futures::FutureExt;
use solobase_db::{Extension, ExtensionRepo, ExtensionState};
use tracing::{error, info};

use crate::error::{ExtensionError, ExtensionResult};
use crate::router::ExtensionRouter;

/// Registers extensions, tracks their lifecycle, and dispatches requests
/// to the mounted router that owns a path.
#[derive(Clone)]
pub struct ExtensionRegistry {
    repo: ExtensionRepo,
    routers: Arc<DashMap<String, Arc<ExtensionRouter>>>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("mounted", &self.routers.len())
            .finish_non_exhaustive()
    }
}

impl ExtensionRegistry {
    /// Build a registry over the extension repository.
    #[must_use]
    pub fn new(repo: ExtensionRepo) -> Self {
        Self {
            repo,
            routers: Arc::new(DashMap::new()),
        }
    }

    /// Register an extension's persisted row if this is its first time
    /// starting, run any schema migrations newer than its applied
    /// `schema_version`, then transition it to `initialized`.
    ///
    /// A migration failure leaves the extension `errored` rather than
    /// poisoning the whole process; other extensions are unaffected.
    pub async fn register(
        &self,
        app_id: &str,
        name: &str,
        version: &str,
        migrations: &[(i64, &str)],
    ) -> ExtensionResult<Extension> {
        self.repo.register(app_id, name, version).await?;

        if let Err(e) = self.repo.run_migrations(name, migrations).await {
            error!(extension = name, error = %e, "extension migration failed, marking errored");
            self.transition(name, ExtensionState::Errored).await?;
            return Err(ExtensionError::MigrationFailed { name: name.to_owned(), source: e });
        }

        self.transition(name, ExtensionState::Initialized).await?;
        Ok(self.repo.get(name).await?.ok_or_else(|| ExtensionError::NotRegistered(name.to_owned()))?)
    }

    /// Mount an extension's router and transition it to `running`.
    ///
    /// The extension must already be `initialized` or `stopped`.
    pub async fn start(&self, name: &str, router: ExtensionRouter) -> ExtensionResult<()> {
        let extension = self.require(name).await?;
        self.require_transition(&extension, ExtensionState::Running)?;

        self.routers.insert(name.to_owned(), Arc::new(router));
        self.transition(name, ExtensionState::Running).await?;
        info!(extension = name, "extension started");
        Ok(())
    }

    /// Unmount an extension's router and transition it to `stopped`.
    pub async fn stop(&self, name: &str) -> ExtensionResult<()> {
        let extension = self.require(name).await?;
        self.require_transition(&extension, ExtensionState::Stopped)?;

        self.routers.remove(name);
        self.transition(name, ExtensionState::Stopped).await?;
        info!(extension = name, "extension stopped");
        Ok(())
    }

    /// Toggle the operator-facing enabled flag without changing lifecycle
    /// state; a disabled-but-running extension keeps serving until an
    /// operator also calls [`Self::stop`].
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> ExtensionResult<()> {
        self.require(name).await?;
        Ok(self.repo.set_enabled(name, enabled).await?)
    }

    /// List every registered extension.
    pub async fn list(&self) -> ExtensionResult<Vec<Extension>> {
        Ok(self.repo.list().await?)
    }

    /// Find the mounted router owning `path`, if any.
    #[must_use]
    pub fn router_for_path(&self, path: &str) -> Option<Arc<ExtensionRouter>> {
        self.routers.iter().find(|entry| entry.value().matches(path)).map(|entry| entry.value().clone())
    }

    /// Dispatch a request to the router owning its path, recovering from
    /// a panicking handler by marking the extension `errored` and
    /// returning a 500 rather than taking down the whole process.
    pub async fn dispatch(&self, path: &str, req: http::Request<Bytes>) -> Option<http::Response<Bytes>> {
        let router = self.router_for_path(path)?;
        let name = router.name().to_owned();

        let result = AssertUnwindSafe(router.call(req)).catch_unwind().await;

        match result {
            Ok(resp) => Some(resp),
            Err(_) => {
                error!(extension = %name, "extension handler panicked, marking errored");
                if let Err(e) = self.transition(&name, ExtensionState::Errored).await {
                    error!(extension = %name, error = %e, "failed to persist errored state after panic");
                }
                self.routers.remove(&name);
                Some(
                    http::Response::builder()
                        .status(500)
                        .body(Bytes::from_static(b"extension handler failed"))
                        .expect("static response is always valid"),
                )
            }
        }
    }

    async fn require(&self, name: &str) -> ExtensionResult<Extension> {
        self.repo.get(name).await?.ok_or_else(|| ExtensionError::NotRegistered(name.to_owned()))
    }

    fn require_transition(&self, extension: &Extension, to: ExtensionState) -> ExtensionResult<()> {
        if is_valid_transition(extension.state, to) {
            Ok(())
        } else {
            Err(ExtensionError::InvalidTransition {
                name: extension.name.clone(),
                from: extension.state,
                to,
            })
        }
    }

    async fn transition(&self, name: &str, to: ExtensionState) -> ExtensionResult<()> {
        Ok(self.repo.set_state(name, to).await?)
    }
}

fn is_valid_transition(from: ExtensionState, to: ExtensionState) -> bool {
    use ExtensionState::{Errored, Initialized, Running, Stopped, Unregistered};
    matches!(
        (from, to),
        (Unregistered, Initialized)
            | (Initialized, Running)
            | (Running, Stopped)
            | (Stopped, Running)
            | (Errored, Initialized)
            | (Running, Errored)
            | (Initialized, Errored)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use solobase_db::Repos;

    async fn registry() -> ExtensionRegistry {
        let pool = solobase_db::connect("sqlite::memory:").await.unwrap();
        let repos = Repos::new(pool);
        ExtensionRegistry::new(repos.extensions)
    }

    struct PanicHandler;

    #[async_trait::async_trait]
    impl crate::router::ExtensionHandler for PanicHandler {
        async fn handle(&self, _req: http::Request<Bytes>) -> http::Response<Bytes> {
            panic!("boom");
        }
    }

    struct OkHandler;

    #[async_trait::async_trait]
    impl crate::router::ExtensionHandler for OkHandler {
        async fn handle(&self, _req: http::Request<Bytes>) -> http::Response<Bytes> {
            http::Response::builder().status(200).body(Bytes::from("ok")).unwrap()
        }
    }

    #[tokio::test]
    async fn test_should_run_pending_migrations_on_register() {
        let registry = registry().await;
        let migrations: &[(i64, &str)] =
            &[(1, "CREATE TABLE ext_notes_items (id TEXT PRIMARY KEY)"), (2, "ALTER TABLE ext_notes_items ADD COLUMN title TEXT")];

        let extension = registry.register("solobase", "notes", "0.1.0", migrations).await.unwrap();
        assert_eq!(extension.schema_version, 2);
        assert_eq!(extension.state, ExtensionState::Initialized);
    }

    #[tokio::test]
    async fn test_should_mark_extension_errored_on_migration_failure() {
        let registry = registry().await;
        let migrations: &[(i64, &str)] = &[(1, "this is not valid sql")];

        let err = registry.register("solobase", "broken", "0.1.0", migrations).await.unwrap_err();
        assert!(matches!(err, ExtensionError::MigrationFailed { .. }));

        let extensions = registry.list().await.unwrap();
        assert_eq!(extensions[0].state, ExtensionState::Errored);
    }

    #[tokio::test]
    async fn test_should_register_and_start_an_extension() {
        let registry = registry().await;
        registry.register("solobase", "notes", "0.1.0", &[]).await.unwrap();
        registry.start("notes", ExtensionRouter::new("notes", OkHandler)).await.unwrap();

        let extensions = registry.list().await.unwrap();
        assert_eq!(extensions[0].state, ExtensionState::Running);
    }

    #[tokio::test]
    async fn test_should_reject_invalid_transition() {
        let registry = registry().await;
        let err = registry.start("nonexistent", ExtensionRouter::new("nonexistent", OkHandler)).await.unwrap_err();
        assert!(matches!(err, ExtensionError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_should_dispatch_to_mounted_router() {
        let registry = registry().await;
        registry.register("solobase", "notes", "0.1.0", &[]).await.unwrap();
        registry.start("notes", ExtensionRouter::new("notes", OkHandler)).await.unwrap();

        let req = http::Request::builder().uri("/api/ext/notes/list").body(Bytes::new()).unwrap();
        let resp = registry.dispatch("/api/ext/notes/list", req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_should_recover_from_a_panicking_handler() {
        let registry = registry().await;
        registry.register("solobase", "flaky", "0.1.0", &[]).await.unwrap();
        registry.start("flaky", ExtensionRouter::new("flaky", PanicHandler)).await.unwrap();

        let req = http::Request::builder().uri("/api/ext/flaky/do").body(Bytes::new()).unwrap();
        let resp = registry.dispatch("/api/ext/flaky/do", req).await.unwrap();
        assert_eq!(resp.status(), 500);

        // the router was unmounted, so a second dispatch finds nothing to route to
        let req2 = http::Request::builder().uri("/api/ext/flaky/do").body(Bytes::new()).unwrap();
        assert!(registry.dispatch("/api/ext/flaky/do", req2).await.is_none());

        let extensions = registry.list().await.unwrap();
        assert_eq!(extensions[0].state, ExtensionState::Errored);
    }

    #[tokio::test]
    async fn test_should_return_none_for_unrouted_path() {
        let registry = registry().await;
        let req = http::Request::builder().uri("/api/ext/nobody/x").body(Bytes::new()).unwrap();
        assert!(registry.dispatch("/api/ext/nobody/x", req).await.is_none());
    }
}
