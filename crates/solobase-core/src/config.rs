//! Configuration management for Solobase services.
//!
//! All configuration is driven by environment variables (spec §6). Every
//! component receives an explicit, already-validated [`Config`] value from
//! the composition root; there are no implicit env reads below it (Design
//! Note §9).

use std::time::Duration;

use crate::error::CoreError;
use crate::ids::AppId;

/// Relational database backend selection (`DATABASE_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// Embedded SQLite file.
    Sqlite,
    /// Postgres server.
    Postgres,
}

impl DatabaseKind {
    fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" => Ok(Self::Postgres),
            other => Err(CoreError::Config(format!(
                "invalid DATABASE_TYPE: {other} (expected \"sqlite\" or \"postgres\")"
            ))),
        }
    }
}

/// Blob storage backend selection (`STORAGE_TYPE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageKind {
    /// Local filesystem, rooted at `root`.
    Local {
        /// Writable root directory for blobs.
        root: String,
    },
    /// S3-compatible object store.
    S3 {
        /// Target bucket name.
        bucket: String,
        /// AWS region (or region-shaped identifier for compatible stores).
        region: String,
        /// Optional custom endpoint (non-AWS S3-compatible services).
        endpoint: Option<String>,
        /// Whether to address the bucket path-style rather than virtual-hosted.
        path_style: bool,
        /// Whether to use TLS when talking to the endpoint.
        use_ssl: bool,
    },
}

/// Rate limiting configuration for the IAM middleware chain (spec §4.7).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sustained requests allowed per window.
    pub refill_per_minute: u32,
    /// Burst capacity above the sustained rate.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refill_per_minute: 120,
            burst: 30,
        }
    }
}

/// Top-level configuration for a Solobase server process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database backend kind.
    pub database_kind: DatabaseKind,
    /// Connection URL/DSN for the database.
    pub database_url: String,
    /// Blob storage backend configuration.
    pub storage: StorageKind,
    /// Tenant identifier isolating objects sharing one database.
    pub app_id: AppId,
    /// Secret used to sign bearer tokens. Required; startup fails if empty.
    pub jwt_secret: String,
    /// Optional bootstrap admin email.
    pub default_admin_email: Option<String>,
    /// Optional bootstrap admin password.
    pub default_admin_password: Option<String>,
    /// HTTP bind port.
    pub port: u16,
    /// Deployment environment label (`development`, `production`, ...).
    pub environment: String,
    /// When true, all write endpoints return 503.
    pub readonly_mode: bool,
    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Session/bearer token lifetime.
    pub session_timeout: Duration,
    /// Graceful shutdown deadline (spec §5, default 30s).
    pub shutdown_deadline: Duration,
    /// Default upload/download token TTL (spec §5, default 15 minutes).
    pub token_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] if a required value is missing or
    /// malformed — notably an empty or absent `JWT_SECRET`, which must fail
    /// loudly at startup (spec §4.6, §6, exit code 1).
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_env_reader(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary lookup function.
    ///
    /// This indirection keeps environment reads confined to this single
    /// module while remaining testable without mutating the real process
    /// environment.
    pub fn from_env_reader(get: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let database_kind = DatabaseKind::parse(&get("DATABASE_TYPE").unwrap_or_else(|| "sqlite".to_owned()))?;

        let database_url = get("DATABASE_URL").unwrap_or_else(|| match database_kind {
            DatabaseKind::Sqlite => "sqlite://solobase.db".to_owned(),
            DatabaseKind::Postgres => build_postgres_url(&get),
        });

        let storage_type = get("STORAGE_TYPE").unwrap_or_else(|| "local".to_owned());
        let storage = match storage_type.as_str() {
            "local" => {
                let root = get("STORAGE_ROOT").unwrap_or_else(|| "./data/blobs".to_owned());
                StorageKind::Local { root }
            }
            "s3" => {
                let bucket = get("STORAGE_S3_BUCKET")
                    .ok_or_else(|| CoreError::Config("STORAGE_S3_BUCKET is required when STORAGE_TYPE=s3".to_owned()))?;
                let region = get("STORAGE_S3_REGION").unwrap_or_else(|| "us-east-1".to_owned());
                let endpoint = get("STORAGE_S3_ENDPOINT");
                let path_style = parse_bool(get("STORAGE_S3_PATH_STYLE").as_deref(), false);
                let use_ssl = parse_bool(get("STORAGE_S3_SSL").as_deref(), true);
                StorageKind::S3 {
                    bucket,
                    region,
                    endpoint,
                    path_style,
                    use_ssl,
                }
            }
            other => {
                return Err(CoreError::Config(format!(
                    "invalid STORAGE_TYPE: {other} (expected \"local\" or \"s3\")"
                )));
            }
        };

        let app_id = AppId::new(get("APP_ID").unwrap_or_else(|| AppId::DEFAULT.to_owned()));

        let jwt_secret = get("JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() {
            return Err(CoreError::Config(
                "JWT_SECRET is required and must not be empty".to_owned(),
            ));
        }

        let port = get("PORT")
            .map(|v| {
                v.parse::<u16>()
                    .map_err(|_| CoreError::Config(format!("invalid PORT: {v}")))
            })
            .transpose()?
            .unwrap_or(8080);

        let environment = get("ENVIRONMENT").unwrap_or_else(|| "development".to_owned());
        let readonly_mode = parse_bool(get("READONLY_MODE").as_deref(), false);

        let rate_limit = RateLimitConfig {
            refill_per_minute: get("RATE_LIMIT_PER_MINUTE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            burst: get("RATE_LIMIT_BURST").and_then(|v| v.parse().ok()).unwrap_or(30),
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_owned()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let session_timeout_secs: u64 = get("SESSION_TIMEOUT_SECONDS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        Ok(Self {
            database_kind,
            database_url,
            storage,
            app_id,
            jwt_secret,
            default_admin_email: get("DEFAULT_ADMIN_EMAIL"),
            default_admin_password: get("DEFAULT_ADMIN_PASSWORD"),
            port,
            environment,
            readonly_mode,
            rate_limit,
            cors_origins,
            session_timeout: Duration::from_secs(session_timeout_secs),
            shutdown_deadline: Duration::from_secs(30),
            token_ttl: Duration::from_secs(15 * 60),
        })
    }
}

fn build_postgres_url(get: &impl Fn(&str) -> Option<String>) -> String {
    let host = get("DATABASE_HOST").unwrap_or_else(|| "localhost".to_owned());
    let port = get("DATABASE_PORT").unwrap_or_else(|| "5432".to_owned());
    let name = get("DATABASE_NAME").unwrap_or_else(|| "solobase".to_owned());
    let user = get("DATABASE_USER").unwrap_or_else(|| "postgres".to_owned());
    let pass = get("DATABASE_PASSWORD").unwrap_or_default();
    let sslmode = get("DATABASE_SSLMODE").unwrap_or_else(|| "disable".to_owned());
    format!("postgres://{user}:{pass}@{host}:{port}/{name}?sslmode={sslmode}")
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_should_fail_without_jwt_secret() {
        let err = Config::from_env_reader(env_of(&[])).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_should_build_default_local_config() {
        let config = Config::from_env_reader(env_of(&[("JWT_SECRET", "s3cr3t")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.app_id.as_str(), "solobase");
        assert!(!config.readonly_mode);
        assert_eq!(config.storage, StorageKind::Local { root: "./data/blobs".to_owned() });
    }

    #[test]
    fn test_should_reject_empty_jwt_secret() {
        let err = Config::from_env_reader(env_of(&[("JWT_SECRET", "")])).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_should_require_s3_bucket_for_s3_storage() {
        let err = Config::from_env_reader(env_of(&[
            ("JWT_SECRET", "s3cr3t"),
            ("STORAGE_TYPE", "s3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_should_build_s3_storage_config() {
        let config = Config::from_env_reader(env_of(&[
            ("JWT_SECRET", "s3cr3t"),
            ("STORAGE_TYPE", "s3"),
            ("STORAGE_S3_BUCKET", "my-bucket"),
            ("STORAGE_S3_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert_eq!(
            config.storage,
            StorageKind::S3 {
                bucket: "my-bucket".to_owned(),
                region: "eu-west-1".to_owned(),
                endpoint: None,
                path_style: false,
                use_ssl: true,
            }
        );
    }

    #[test]
    fn test_should_parse_readonly_mode() {
        let config = Config::from_env_reader(env_of(&[
            ("JWT_SECRET", "s3cr3t"),
            ("READONLY_MODE", "true"),
        ]))
        .unwrap();
        assert!(config.readonly_mode);
    }

    #[test]
    fn test_should_reject_invalid_database_type() {
        let err = Config::from_env_reader(env_of(&[
            ("JWT_SECRET", "s3cr3t"),
            ("DATABASE_TYPE", "mysql"),
        ]))
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn test_should_parse_cors_origins() {
        let config = Config::from_env_reader(env_of(&[
            ("JWT_SECRET", "s3cr3t"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ]))
        .unwrap();
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
    }
}
