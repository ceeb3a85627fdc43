//! Idempotent startup bootstrap: ensures the built-in `admin`, `user`, and
//! `admin_viewer` roles and the canonical `/admin/*` policy ruleset exist,
//! and (if configured) creates the first admin user when the tenant has
//! none yet.

use anyhow::Result;
use solobase_auth::AuthService;
use solobase_core::Config;
use solobase_db::{DbError, PathPolicy, PolicyEffect, Repos, Role};
use tracing::info;

/// Priority for the built-in policies: lower than any operator-authored
/// policy so a narrower deny still wins, but present as a safety net for
/// the built-in roles themselves.
const BUILTIN_POLICY_PRIORITY: i64 = 0;

/// Ensure a role exists by name, creating it if absent. Tolerates a
/// concurrent creation race by re-fetching on conflict.
async fn ensure_role(repos: &Repos, app_id: &str, name: &str) -> Result<Role> {
    if let Some(role) = repos.roles.get_by_name(app_id, name).await? {
        return Ok(role);
    }

    match repos.roles.create(app_id, name).await {
        Ok(role) => {
            info!(app_id, role = name, "created built-in role");
            Ok(role)
        }
        Err(DbError::Conflict) => repos
            .roles
            .get_by_name(app_id, name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("{name} role creation raced but the row is missing")),
        Err(e) => Err(e.into()),
    }
}

/// Ensure `role_name` carries `(path_glob, method, effect)` at the given
/// priority, adding it only if no identical policy already exists.
async fn ensure_policy(
    repos: &Repos,
    app_id: &str,
    role_name: &str,
    path_glob: &str,
    method: &str,
    effect: PolicyEffect,
    priority: i64,
) -> Result<()> {
    let existing: Vec<PathPolicy> = repos.roles.policies_for_roles(app_id, &[role_name.to_owned()]).await?;
    if existing.iter().any(|p| p.path_glob == path_glob && p.method == method && p.effect == effect) {
        return Ok(());
    }

    repos.roles.add_policy(app_id, role_name, path_glob, method, effect, priority).await?;
    info!(app_id, role = role_name, path_glob, method, "added built-in policy");
    Ok(())
}

/// Ensure the built-in `admin`, `user`, and `admin_viewer` roles and the
/// canonical `/admin/*` ruleset exist, and create the configured bootstrap
/// admin user if the tenant has no users yet. Safe to call on every
/// startup.
///
/// The ruleset: `admin` is allowed everything under `/admin/*`;
/// `admin_viewer` is allowed `GET` only; `user` is denied the whole prefix,
/// matching the default-deny decision the path-policy engine already emits
/// for unmatched admin paths but made explicit here for clarity.
pub async fn ensure_builtin_roles(repos: &Repos, auth: &AuthService, config: &Config) -> Result<()> {
    let app_id = config.app_id.as_str();

    let admin = ensure_role(repos, app_id, "admin").await?;
    ensure_role(repos, app_id, "user").await?;
    ensure_role(repos, app_id, "admin_viewer").await?;

    ensure_policy(repos, app_id, "admin", "/**", "*", PolicyEffect::Allow, BUILTIN_POLICY_PRIORITY).await?;
    ensure_policy(repos, app_id, "admin_viewer", "/admin/*", "GET", PolicyEffect::Allow, BUILTIN_POLICY_PRIORITY)
        .await?;
    ensure_policy(repos, app_id, "user", "/admin/*", "*", PolicyEffect::Deny, BUILTIN_POLICY_PRIORITY).await?;

    let (Some(email), Some(password)) = (&config.default_admin_email, &config.default_admin_password) else {
        return Ok(());
    };

    if !auth.needs_bootstrap(app_id).await? {
        return Ok(());
    }

    let user = auth.register(app_id, email, password, None).await?;
    repos.roles.assign(&user.id, &admin.id).await?;
    info!(app_id, email, "bootstrapped default admin user");

    Ok(())
}
