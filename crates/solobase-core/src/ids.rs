//! Common identifier newtypes shared across services.

use std::fmt;

/// Tenant identifier used to isolate objects across deployments that share a
/// database (spec §3, "App ID"). Unlike an AWS account id this carries no
/// format constraint — it is an opaque operator-chosen string defaulting to
/// `"solobase"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AppId(String);

impl AppId {
    /// Default app id used when `APP_ID` is not set.
    pub const DEFAULT: &str = "solobase";

    /// Create a new app id from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the app id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AppId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_use_default_app_id() {
        assert_eq!(AppId::default().as_str(), "solobase");
    }

    #[test]
    fn test_should_create_custom_app_id() {
        let id = AppId::new("acme-prod");
        assert_eq!(id.as_str(), "acme-prod");
        assert_eq!(id.to_string(), "acme-prod");
    }
}
