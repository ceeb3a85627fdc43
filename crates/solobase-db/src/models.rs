//! Row types returned by the repository layer.

use chrono::{DateTime, Utc};

/// A registered user account.
#[derive(Debug, Clone)]
pub struct User {
    /// Primary key.
    pub id: String,
    /// Tenant isolation key.
    pub app_id: String,
    /// Login email, unique per `app_id`.
    pub email: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Optional display name.
    pub display_name: Option<String>,
    /// Whether the account can authenticate.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A named role granted to one or more users.
#[derive(Debug, Clone)]
pub struct Role {
    /// Primary key.
    pub id: String,
    /// Tenant isolation key.
    pub app_id: String,
    /// Role name, unique per `app_id`.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Effect of a path policy match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEffect {
    /// Grant access.
    Allow,
    /// Deny access, overriding any allow at the same or lower priority.
    Deny,
}

impl PolicyEffect {
    /// Parse from the stored column value.
    #[must_use]
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }

    /// Serialize to the stored column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// A single route-authorization rule bound to a role.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    /// Primary key.
    pub id: String,
    /// Tenant isolation key.
    pub app_id: String,
    /// Role this policy applies to.
    pub role_name: String,
    /// Glob pattern matched against the request path.
    pub path_glob: String,
    /// HTTP method, or `"*"` for any.
    pub method: String,
    /// Allow or deny.
    pub effect: PolicyEffect,
    /// Higher priority wins when multiple policies match; deny wins ties.
    pub priority: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A storage bucket: the top-level namespace objects live under.
#[derive(Debug, Clone)]
pub struct Bucket {
    /// Primary key.
    pub id: String,
    /// Tenant isolation key.
    pub app_id: String,
    /// Bucket name, unique per `app_id`.
    pub name: String,
    /// User id that created the bucket.
    pub owner_user_id: String,
    /// Optional byte quota. `None` means unlimited.
    pub quota_bytes: Option<i64>,
    /// Bytes currently committed to objects in this bucket.
    pub used_bytes: i64,
    /// When true, any authenticated caller may read objects in this bucket
    /// regardless of ownership; writes still require the usual policy.
    pub public: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Soft-delete timestamp; `None` while live.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A stored object (file or folder marker) within a bucket.
#[derive(Debug, Clone)]
pub struct Object {
    /// Primary key.
    pub id: String,
    /// Owning bucket id.
    pub bucket_id: String,
    /// Full key, including any folder prefix.
    pub object_key: String,
    /// User id that owns this object (the uploader, or the mover on a
    /// cross-bucket move). Used by the ownership check gating direct
    /// id-addressed access.
    pub user_id: String,
    /// Tenant isolation key, copied from the owning bucket at write time.
    pub app_id: String,
    /// Id of the folder marker this object lives directly under, if its
    /// key has a materialized parent folder. `None` for root-level objects
    /// or objects whose parent folder was never explicitly created.
    pub parent_folder_id: Option<String>,
    /// Content-addressed hash of the blob (SHA-256, hex).
    pub content_hash: String,
    /// Size in bytes. Zero for folder markers.
    pub size_bytes: i64,
    /// Client-supplied content type, if any.
    pub content_type: Option<String>,
    /// Whether this row represents a folder marker rather than a blob.
    pub is_folder: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update (overwrite/rename) timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp; `None` while live.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Reservation state in the quota accountant's CAS lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationState {
    /// Bytes are held but not yet committed.
    Reserved,
    /// Reservation was committed to `used_bytes`.
    Committed,
    /// Reservation was released without committing.
    Released,
}

impl ReservationState {
    /// Parse from the stored column value.
    #[must_use]
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "reserved" => Some(Self::Reserved),
            "committed" => Some(Self::Committed),
            "released" => Some(Self::Released),
            _ => None,
        }
    }

    /// Serialize to the stored column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Committed => "committed",
            Self::Released => "released",
        }
    }
}

/// A quota reservation held against a bucket's byte budget.
#[derive(Debug, Clone)]
pub struct QuotaReservation {
    /// Primary key.
    pub id: String,
    /// Bucket this reservation is held against.
    pub bucket_id: String,
    /// Bytes reserved.
    pub reserved_bytes: i64,
    /// Current lifecycle state.
    pub state: ReservationState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry; the reservation sweeper releases past this point.
    pub expires_at: DateTime<Utc>,
}

/// Lifecycle state of an upload token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Issued, awaiting a matching upload.
    Issued,
    /// Consumed by a completed upload.
    Consumed,
    /// Expired without being consumed.
    Expired,
}

impl TokenState {
    /// Parse from the stored column value.
    #[must_use]
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "issued" => Some(Self::Issued),
            "consumed" => Some(Self::Consumed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Serialize to the stored column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Consumed => "consumed",
            Self::Expired => "expired",
        }
    }
}

/// A single-use credential that gates one resumable upload.
#[derive(Debug, Clone)]
pub struct UploadToken {
    /// Primary key, also the bearer token value presented by the client.
    pub id: String,
    /// Target bucket.
    pub bucket_id: String,
    /// Target object key.
    pub object_key: String,
    /// Bucket-scope quota reservation backing this upload.
    pub reservation_id: String,
    /// App+user-scope quota reservation backing this upload.
    pub user_reservation_id: String,
    /// User the token was issued to.
    pub issued_to_user: String,
    /// Current lifecycle state.
    pub state: TokenState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

/// A credential that gates one object download.
#[derive(Debug, Clone)]
pub struct DownloadToken {
    /// Primary key, also the bearer token value presented by the client.
    pub id: String,
    /// Source bucket.
    pub bucket_id: String,
    /// Source object key.
    pub object_key: String,
    /// User the token was issued to.
    pub issued_to_user: String,
    /// Whether the token is invalidated after first use.
    pub single_use: bool,
    /// When the token was consumed, if ever.
    pub consumed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
}

/// Lifecycle state of a registered extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    /// Registered but never started.
    Unregistered,
    /// Migrations applied, routes not yet mounted.
    Initialized,
    /// Routes mounted and serving traffic.
    Running,
    /// Stopped by an operator; routes unmounted.
    Stopped,
    /// A lifecycle transition failed.
    Errored,
}

impl ExtensionState {
    /// Parse from the stored column value.
    #[must_use]
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "unregistered" => Some(Self::Unregistered),
            "initialized" => Some(Self::Initialized),
            "running" => Some(Self::Running),
            "stopped" => Some(Self::Stopped),
            "errored" => Some(Self::Errored),
            _ => None,
        }
    }

    /// Serialize to the stored column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        }
    }
}

/// A registered extension and its persisted lifecycle state.
#[derive(Debug, Clone)]
pub struct Extension {
    /// Extension name, unique process-wide.
    pub name: String,
    /// Tenant isolation key.
    pub app_id: String,
    /// Extension-reported version string.
    pub version: String,
    /// Whether the extension is currently enabled by an operator.
    pub enabled: bool,
    /// Current lifecycle state.
    pub state: ExtensionState,
    /// Table prefix used for this extension's own schema (`ext_<name>_`).
    pub table_prefix: String,
    /// Highest applied entry in this extension's own migration set.
    pub schema_version: i64,
    /// First-registration timestamp.
    pub installed_at: DateTime<Utc>,
    /// Last state-change timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A byte quota tracked against an `(app_id, user_id)` pair, independent of
/// any single bucket's own quota.
#[derive(Debug, Clone)]
pub struct UserQuota {
    /// Tenant isolation key.
    pub app_id: String,
    /// User this quota is scoped to.
    pub user_id: String,
    /// Optional byte quota. `None` means unlimited.
    pub quota_bytes: Option<i64>,
    /// Bytes currently committed to objects this user owns.
    pub used_bytes: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A quota reservation held against an `(app_id, user_id)` byte budget,
/// mirroring [`QuotaReservation`]'s CAS lifecycle at a different scope.
#[derive(Debug, Clone)]
pub struct UserQuotaReservation {
    /// Primary key.
    pub id: String,
    /// Tenant isolation key.
    pub app_id: String,
    /// User this reservation is held against.
    pub user_id: String,
    /// Bytes reserved.
    pub reserved_bytes: i64,
    /// Current lifecycle state.
    pub state: ReservationState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry; the reservation sweeper releases past this point.
    pub expires_at: DateTime<Utc>,
}
