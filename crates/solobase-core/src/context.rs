//! Process-scoped application state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;

/// Single process-scoped container passed explicitly to every component at
/// construction time (Design Note §9). Nothing in Solobase reaches for a
/// package-level global or `lazy_static`-style singleton; anything that
/// needs to be shared — config, the readonly flag, the JWT secret — flows
/// through an `AppContext` handed down from the composition root.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<Config>,
    readonly: Arc<AtomicBool>,
}

impl AppContext {
    /// Build a new context from a loaded configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let readonly = AtomicBool::new(config.readonly_mode);
        Self {
            config: Arc::new(config),
            readonly: Arc::new(readonly),
        }
    }

    /// Borrow the process configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the server is currently rejecting writes.
    ///
    /// This starts at `config.readonly_mode` but can be flipped at runtime
    /// by an operator toggling maintenance mode, which is why it lives
    /// behind an atomic rather than being read straight off `config`.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.readonly.load(Ordering::Acquire)
    }

    /// Enter or leave readonly/maintenance mode.
    pub fn set_readonly(&self, readonly: bool) {
        self.readonly.store(readonly, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::from_env_reader(|key| {
            if key == "JWT_SECRET" {
                Some("s3cr3t".to_owned())
            } else {
                None
            }
        })
        .unwrap()
    }

    #[test]
    fn test_should_reflect_configured_readonly_mode() {
        let mut config = test_config();
        config.readonly_mode = true;
        let ctx = AppContext::new(config);
        assert!(ctx.is_readonly());
    }

    #[test]
    fn test_should_toggle_readonly_at_runtime() {
        let ctx = AppContext::new(test_config());
        assert!(!ctx.is_readonly());
        ctx.set_readonly(true);
        assert!(ctx.is_readonly());
        ctx.set_readonly(false);
        assert!(!ctx.is_readonly());
    }

    #[test]
    fn test_should_share_state_across_clones() {
        let ctx = AppContext::new(test_config());
        let clone = ctx.clone();
        ctx.set_readonly(true);
        assert!(clone.is_readonly());
    }
}
