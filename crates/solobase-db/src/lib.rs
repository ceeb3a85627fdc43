//! Persistence layer: schema migrations and per-aggregate repositories.
//!
//! A single [`sqlx::Any`] pool backs both supported database kinds so the
//! rest of Solobase never forks on backend. Repository methods return
//! domain row types from [`models`]; nothing above this crate sees a raw
//! `sqlx::Row`.

mod error;
mod models;
mod pool;
mod repo;
mod util;

pub use error::{DbError, DbResult};
pub use models::{
    Bucket, DownloadToken, Extension, ExtensionState, Object, PathPolicy, PolicyEffect,
    QuotaReservation, ReservationState, Role, TokenState, UploadToken, User, UserQuota,
    UserQuotaReservation,
};
pub use pool::connect;
pub use repo::{
    BucketRepo, ExtensionRepo, ObjectRepo, QuotaRepo, RoleRepo, TokenRepo, UserQuotaRepo, UserRepo,
};

/// A handle bundling every repository over a shared pool, built once at
/// startup and cloned cheaply into each service that needs it.
#[derive(Debug, Clone)]
pub struct Repos {
    /// Bucket repository.
    pub buckets: BucketRepo,
    /// Object repository.
    pub objects: ObjectRepo,
    /// Quota reservation repository.
    pub quotas: QuotaRepo,
    /// Upload/download token repository.
    pub tokens: TokenRepo,
    /// User repository.
    pub users: UserRepo,
    /// Role and path-policy repository.
    pub roles: RoleRepo,
    /// Extension registry repository.
    pub extensions: ExtensionRepo,
    /// App+user scope quota repository.
    pub user_quotas: UserQuotaRepo,
}

impl Repos {
    /// Build every repository over the same pool.
    #[must_use]
    pub fn new(pool: sqlx::AnyPool) -> Self {
        Self {
            buckets: BucketRepo::new(pool.clone()),
            objects: ObjectRepo::new(pool.clone()),
            quotas: QuotaRepo::new(pool.clone()),
            tokens: TokenRepo::new(pool.clone()),
            users: UserRepo::new(pool.clone()),
            roles: RoleRepo::new(pool.clone()),
            extensions: ExtensionRepo::new(pool.clone()),
            user_quotas: UserQuotaRepo::new(pool),
        }
    }
}
