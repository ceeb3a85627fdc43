//! Blob storage, quota accounting, token issuance, and the storage service
//! that orchestrates them.
//!
//! Module-to-component mapping:
//! - [`blob`] is C1, the Blob Backend.
//! - `solobase_db::{Object, ObjectRepo}` (re-exported via [`service`]) is C2,
//!   the Object Metadata Store.
//! - [`quota`] is C3, the Quota Accountant.
//! - [`token`] is C4, the Token Service.
//! - [`service`] is C5, the Storage Service.

pub mod blob;
mod checksums;
mod error;
mod quota;
mod reaper;
mod service;
mod token;
mod validation;

#[cfg(test)]
mod integration_tests;

pub use checksums::{sha256_hex, StreamingHasher};
pub use error::{StorageError, StorageResult};
pub use quota::QuotaAccountant;
pub use reaper::{BlobReaper, ReapStats};
pub use service::{Caller, DownloadedObject, IntegrityReport, StorageService};
pub use token::TokenService;
pub use validation::{validate_bucket_name, validate_object_key};
