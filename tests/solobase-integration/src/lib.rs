//! End-to-end tests driving a real solobase-server stack (in-memory sqlite,
//! tempdir blob store) over actual HTTP, rather than calling service methods
//! directly. Each test boots its own isolated server on an OS-assigned port.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use solobase_auth::AuthService;
use solobase_core::{AppContext, Config};
use solobase_db::Repos;
use solobase_extensions::ExtensionRegistry;
use solobase_http::{AppState, SolobaseService};
use solobase_iam::AuthorizationService;
use solobase_storage::blob::LocalFsBackend;
use solobase_storage::{QuotaAccountant, StorageService, TokenService};

/// A running test server plus the tempdir its blobs live in, kept alive for
/// the harness's lifetime so the directory isn't cleaned up mid-test.
pub struct TestServer {
    pub base_url: String,
    pub repos: Repos,
    _blob_dir: tempfile::TempDir,
}

/// Boot an isolated solobase server: in-memory sqlite, tempdir blobs, bound
/// to an OS-assigned localhost port. Returns once the listener is ready to
/// accept connections.
pub async fn spawn_test_server() -> TestServer {
    let config = Config::from_env_reader(|key| match key {
        "JWT_SECRET" => Some("test-secret".to_owned()),
        "DATABASE_URL" => Some("sqlite::memory:".to_owned()),
        "PORT" => Some("0".to_owned()),
        _ => None,
    })
    .expect("test config");

    let pool = solobase_db::connect(&config.database_url).await.expect("connect");
    let repos = Repos::new(pool);

    let blob_dir = tempfile::tempdir().expect("tempdir");
    let blobs = Arc::new(LocalFsBackend::open(blob_dir.path()).await.expect("open blob store"));

    let quota = QuotaAccountant::new(repos.buckets.clone(), repos.quotas.clone(), repos.user_quotas.clone());
    let tokens = TokenService::new(repos.tokens.clone(), quota.clone(), ChronoDuration::minutes(15));
    let storage = StorageService::new(repos.clone(), blobs, quota, tokens);

    let auth = AuthService::new(repos.users.clone(), &config.jwt_secret, ChronoDuration::hours(1));
    let authz = AuthorizationService::new(repos.roles.clone(), repos.user_quotas.clone(), config.rate_limit);
    let extensions = ExtensionRegistry::new(repos.extensions.clone());

    repos.roles.create(config.app_id.as_str(), "admin").await.expect("create admin role");
    repos
        .roles
        .add_policy(config.app_id.as_str(), "admin", "/**", "*", solobase_db::PolicyEffect::Allow, 0)
        .await
        .expect("add admin policy");

    repos.roles.create(config.app_id.as_str(), "user").await.expect("create user role");
    repos
        .roles
        .add_policy(
            config.app_id.as_str(),
            "user",
            "/api/storage/**",
            "*",
            solobase_db::PolicyEffect::Allow,
            0,
        )
        .await
        .expect("add user policy");
    repos
        .roles
        .add_policy(config.app_id.as_str(), "user", "/api/auth/me", "GET", solobase_db::PolicyEffect::Allow, 0)
        .await
        .expect("add user self policy");

    let ctx = AppContext::new(config.clone());
    let state = AppState { ctx, auth, authz, storage, extensions };

    let listener = solobase_http::shutdown::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let service = SolobaseService::new(state);

    tokio::spawn(async move {
        let _ = solobase_http::shutdown::serve(listener, service, Duration::from_secs(5)).await;
    });

    TestServer { base_url: format!("http://{addr}"), repos, _blob_dir: blob_dir }
}

impl TestServer {
    /// Register a user and assign it a role by name, returning the user id.
    pub async fn seed_user(&self, email: &str, password: &str, role_name: &str) -> String {
        let auth = AuthService::new(
            self.repos.users.clone(),
            "test-secret",
            ChronoDuration::hours(1),
        );
        let user = auth.register("solobase", email, password, None).await.expect("register");
        let role = self
            .repos
            .roles
            .get_by_name("solobase", role_name)
            .await
            .expect("lookup role")
            .expect("role exists");
        self.repos.roles.assign(&user.id, &role.id).await.expect("assign role");
        user.id
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// S1: login, request an upload token, complete the upload, download
    /// the bytes back.
    #[tokio::test]
    async fn test_should_login_upload_and_download() {
        let server = spawn_test_server().await;
        server.seed_user("admin@example.com", "Passw0rd!", "admin").await;

        server
            .repos
            .buckets
            .create("solobase", "images", "placeholder", Some(10 * 1024 * 1024), false)
            .await
            .unwrap();

        let client = reqwest::Client::new();

        let login: serde_json::Value = client
            .post(format!("{}/api/auth/login", server.base_url))
            .json(&json!({"email": "admin@example.com", "password": "Passw0rd!"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = login["token"].as_str().unwrap().to_owned();

        let upload: serde_json::Value = client
            .post(format!("{}/api/storage/upload/request", server.base_url))
            .bearer_auth(&token)
            .json(&json!({"bucket": "images", "key": "a.txt", "expected_bytes": 5}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let upload_token = upload["token"].as_str().unwrap().to_owned();

        let object: serde_json::Value = client
            .put(format!("{}/api/storage/upload/{upload_token}", server.base_url))
            .bearer_auth(&token)
            .body("hello")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let object_id = object["id"].as_str().unwrap().to_owned();

        let downloaded = client
            .get(format!("{}/api/storage/objects/{object_id}", server.base_url))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(downloaded.status(), reqwest::StatusCode::OK);
        assert_eq!(downloaded.text().await.unwrap(), "hello");
    }

    /// A `user`-role subject is denied the admin-only health endpoint under
    /// the canonical `/admin/*` path policy, while admin's wildcard policy
    /// still reaches it. Testable Property #6, not the ownership isolation
    /// S4 covers (see `test_should_isolate_object_ownership_s4` below).
    #[tokio::test]
    async fn test_should_deny_non_admin_role_the_admin_health_endpoint() {
        let server = spawn_test_server().await;
        server.seed_user("admin@example.com", "Passw0rd!", "admin").await;
        server.seed_user("viewer@example.com", "Passw0rd!", "user").await;

        let client = reqwest::Client::new();

        let admin_login: serde_json::Value = client
            .post(format!("{}/api/auth/login", server.base_url))
            .json(&json!({"email": "admin@example.com", "password": "Passw0rd!"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let admin_token = admin_login["token"].as_str().unwrap().to_owned();

        let viewer_login: serde_json::Value = client
            .post(format!("{}/api/auth/login", server.base_url))
            .json(&json!({"email": "viewer@example.com", "password": "Passw0rd!"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let viewer_token = viewer_login["token"].as_str().unwrap().to_owned();

        // the `user` role has no policy for the admin-only health endpoint
        let viewer_resp = client
            .get(format!("{}/api/admin/storage/health", server.base_url))
            .bearer_auth(&viewer_token)
            .send()
            .await
            .unwrap();
        assert_eq!(viewer_resp.status(), reqwest::StatusCode::FORBIDDEN);

        let admin_resp = client
            .get(format!("{}/api/admin/storage/health", server.base_url))
            .bearer_auth(&admin_token)
            .send()
            .await
            .unwrap();
        assert_eq!(admin_resp.status(), reqwest::StatusCode::OK);
    }

    /// S4: a non-owning user is denied access to another user's object;
    /// admin can still reach it.
    #[tokio::test]
    async fn test_should_isolate_object_ownership_s4() {
        let server = spawn_test_server().await;
        server.seed_user("admin@example.com", "Passw0rd!", "admin").await;
        server.seed_user("u1@example.com", "Passw0rd!", "user").await;
        server.seed_user("u2@example.com", "Passw0rd!", "user").await;

        server.repos.buckets.create("solobase", "photos", "u1", Some(10 * 1024 * 1024), false).await.unwrap();

        let client = reqwest::Client::new();

        let login = |email: &'static str| {
            let client = client.clone();
            let base_url = server.base_url.clone();
            async move {
                let resp: serde_json::Value = client
                    .post(format!("{base_url}/api/auth/login"))
                    .json(&json!({"email": email, "password": "Passw0rd!"}))
                    .send()
                    .await
                    .unwrap()
                    .json()
                    .await
                    .unwrap();
                resp["token"].as_str().unwrap().to_owned()
            }
        };

        let u1_token = login("u1@example.com").await;
        let u2_token = login("u2@example.com").await;
        let admin_token = login("admin@example.com").await;

        let upload: serde_json::Value = client
            .post(format!("{}/api/storage/upload/request", server.base_url))
            .bearer_auth(&u1_token)
            .json(&json!({"bucket": "photos", "key": "o.txt", "expected_bytes": 5}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let upload_token = upload["token"].as_str().unwrap().to_owned();

        let object: serde_json::Value = client
            .put(format!("{}/api/storage/upload/{upload_token}", server.base_url))
            .bearer_auth(&u1_token)
            .body("hello")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let object_id = object["id"].as_str().unwrap().to_owned();

        let u2_resp = client
            .get(format!("{}/api/storage/objects/{object_id}", server.base_url))
            .bearer_auth(&u2_token)
            .send()
            .await
            .unwrap();
        assert_eq!(u2_resp.status(), reqwest::StatusCode::FORBIDDEN);

        let admin_resp = client
            .get(format!("{}/api/storage/objects/{object_id}", server.base_url))
            .bearer_auth(&admin_token)
            .send()
            .await
            .unwrap();
        assert_eq!(admin_resp.status(), reqwest::StatusCode::OK);
    }

    /// A missing or malformed bearer token is rejected before any policy or
    /// handler logic runs.
    #[tokio::test]
    async fn test_should_reject_requests_without_a_bearer_token() {
        let server = spawn_test_server().await;

        let client = reqwest::Client::new();
        let resp = client.get(format!("{}/api/auth/me", server.base_url)).send().await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }
}
