//! The routable unit an extension registers with the gateway.
//!
//! Mirrors the host platform's own service-router pattern: an extension
//! declares a name and a mount prefix, and the registry dispatches the
//! first router whose prefix matches the incoming path.

use async_trait::async_trait;
use bytes::Bytes;

/// An HTTP handler implemented by an extension.
#[async_trait]
pub trait ExtensionHandler: Send + Sync + 'static {
    /// Handle one request already routed to this extension.
    async fn handle(&self, req: http::Request<Bytes>) -> http::Response<Bytes>;
}

/// Wraps an extension's handler with the path prefixes it owns.
pub struct ExtensionRouter {
    name: String,
    mount_prefix: String,
    admin_mount_prefix: String,
    handler: Box<dyn ExtensionHandler>,
}

impl std::fmt::Debug for ExtensionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRouter")
            .field("name", &self.name)
            .field("mount_prefix", &self.mount_prefix)
            .field("admin_mount_prefix", &self.admin_mount_prefix)
            .finish_non_exhaustive()
    }
}

impl ExtensionRouter {
    /// Build a router for an extension named `name`, mounted under
    /// `/api/ext/<name>` and `/admin/ext/<name>`.
    pub fn new(name: impl Into<String>, handler: impl ExtensionHandler) -> Self {
        let name = name.into();
        Self {
            mount_prefix: format!("/api/ext/{name}"),
            admin_mount_prefix: format!("/admin/ext/{name}"),
            name,
            handler: Box::new(handler),
        }
    }

    /// Extension name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this router owns `path`.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.mount_prefix) || path.starts_with(&self.admin_mount_prefix)
    }

    /// Dispatch a request to the wrapped handler.
    pub async fn call(&self, req: http::Request<Bytes>) -> http::Response<Bytes> {
        self.handler.handle(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl ExtensionHandler for EchoHandler {
        async fn handle(&self, _req: http::Request<Bytes>) -> http::Response<Bytes> {
            http::Response::builder().status(200).body(Bytes::from("ok")).unwrap()
        }
    }

    #[test]
    fn test_should_match_api_and_admin_prefixes() {
        let router = ExtensionRouter::new("notes", EchoHandler);
        assert!(router.matches("/api/ext/notes/list"));
        assert!(router.matches("/admin/ext/notes/config"));
        assert!(!router.matches("/api/ext/other/list"));
    }

    #[tokio::test]
    async fn test_should_dispatch_to_handler() {
        let router = ExtensionRouter::new("notes", EchoHandler);
        let req = http::Request::builder()
            .uri("/api/ext/notes/list")
            .body(Bytes::new())
            .unwrap();
        let resp = router.call(req).await;
        assert_eq!(resp.status(), 200);
    }
}
