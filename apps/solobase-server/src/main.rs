//! Solobase Server - multi-tenant storage/auth/extension-platform backend.
//!
//! # Usage
//!
//! ```text
//! JWT_SECRET=change-me PORT=8080 solobase-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `JWT_SECRET` | *(required)* | HMAC secret signing bearer tokens |
//! | `DATABASE_TYPE` | `sqlite` | `sqlite` or `postgres` |
//! | `DATABASE_URL` | `sqlite://solobase.db` | Connection URL |
//! | `STORAGE_TYPE` | `local` | `local` or `s3` |
//! | `STORAGE_ROOT` | `./data/blobs` | Local blob backend root |
//! | `APP_ID` | `solobase` | Tenant identifier |
//! | `PORT` | `8080` | HTTP bind port |
//! | `READONLY_MODE` | `false` | Reject writes at startup |
//! | `DEFAULT_ADMIN_EMAIL` / `DEFAULT_ADMIN_PASSWORD` | *(unset)* | Bootstrap admin, created once if no users exist |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod bootstrap;
mod sweepers;

use std::sync::Arc;

use anyhow::{Context, Result};
use solobase_auth::AuthService;
use solobase_core::{AppContext, Config, StorageKind};
use solobase_db::Repos;
use solobase_extensions::ExtensionRegistry;
use solobase_http::{AppState, SolobaseService};
use solobase_iam::AuthorizationService;
use solobase_storage::blob::{BlobBackend, LocalFsBackend, S3CompatibleBackend};
use solobase_storage::{BlobReaper, QuotaAccountant, StorageService, TokenService};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level).with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("solobase-server: fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(&std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()))?;
    info!(version = VERSION, environment = %config.environment, port = config.port, "starting solobase-server");

    let pool = solobase_db::connect(&config.database_url).await.context("failed to connect to database")?;
    let repos = Repos::new(pool);

    let blobs = build_blob_backend(&config.storage).await?;

    let token_ttl = chrono::Duration::from_std(config.token_ttl).unwrap_or(chrono::Duration::minutes(15));
    let quota = QuotaAccountant::new(repos.buckets.clone(), repos.quotas.clone(), repos.user_quotas.clone());
    let tokens = TokenService::new(repos.tokens.clone(), quota.clone(), token_ttl);
    let storage = StorageService::new(repos.clone(), blobs.clone(), quota.clone(), tokens.clone());

    let session_timeout =
        chrono::Duration::from_std(config.session_timeout).unwrap_or(chrono::Duration::hours(1));
    let auth = AuthService::new(repos.users.clone(), &config.jwt_secret, session_timeout);
    let authz = AuthorizationService::new(repos.roles.clone(), repos.user_quotas.clone(), config.rate_limit);
    let extensions = ExtensionRegistry::new(repos.extensions.clone());

    bootstrap::ensure_builtin_roles(&repos, &auth, &config).await?;

    let ctx = AppContext::new(config.clone());
    let reaper = BlobReaper::new(repos, blobs);
    let state = AppState { ctx, auth, authz, storage, extensions };

    sweepers::spawn(quota, tokens, reaper);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = solobase_http::shutdown::bind(&addr).await?;
    info!(%addr, "listening");

    let service = SolobaseService::new(state);
    solobase_http::shutdown::serve(listener, service, config.shutdown_deadline).await
}

async fn build_blob_backend(storage: &StorageKind) -> Result<Arc<dyn BlobBackend>> {
    match storage {
        StorageKind::Local { root } => {
            let backend = LocalFsBackend::open(root.clone()).await.context("failed to open local blob store")?;
            Ok(Arc::new(backend))
        }
        StorageKind::S3 { bucket, region, endpoint, path_style, use_ssl } => {
            let client = build_s3_client(region, endpoint.as_deref(), *path_style, *use_ssl).await;
            Ok(Arc::new(S3CompatibleBackend::new(client, bucket.clone())))
        }
    }
}

async fn build_s3_client(region: &str, endpoint: Option<&str>, path_style: bool, use_ssl: bool) -> aws_sdk_s3::Client {
    let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new(region.to_owned()))
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared_config).force_path_style(path_style);

    if let Some(endpoint) = endpoint {
        let scheme = if use_ssl { "https" } else { "http" };
        let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_owned()
        } else {
            format!("{scheme}://{endpoint}")
        };
        builder = builder.endpoint_url(endpoint_url);
    }

    aws_sdk_s3::Client::from_conf(builder.build())
}
