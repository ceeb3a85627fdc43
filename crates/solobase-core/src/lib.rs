//! Core types, configuration, and process-scoped state shared across all
//! Solobase crates.
//!
//! This crate provides the foundational building blocks used by every other
//! Solobase component: environment-driven configuration, a common error
//! taxonomy, and [`AppContext`], the single process-scoped container that
//! replaces package-level globals (session secrets, IAM policy tables, the
//! read-only flag) per the composition-root design note.

mod config;
mod context;
mod error;
mod ids;

pub use config::{Config, DatabaseKind, RateLimitConfig, StorageKind};
pub use context::AppContext;
pub use error::{CoreError, CoreResult};
pub use ids::AppId;
