//! Request lifecycle engine for club and fund requests.
//!
//! A request moves from submission through department and club review to collection and
//! return. This crate owns the rules for that movement: a fixed status vocabulary (with a
//! normalizer for legacy free-text statuses), a role-gated transition table, presentation
//! lookups, and a controller that commits transitions with compare-and-swap so that racing
//! reviewers never overwrite each other.
//!
//! Persistence and identity are injected through the [`RequestStore`] and [`RoleResolver`]
//! traits. An in-memory store ships with the crate; a PostgreSQL store is available behind the
//! `postgres` feature.

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod request;

// Re-export commonly used types
pub use config::ControllerConfig;
pub use controller::LifecycleController;
pub use error::{ClubdeskError, Result};
pub use manager::{
    InMemoryRequestStore, RequestFilter, RequestStore, RoleResolver, StaticRoleResolver,
};
#[cfg(feature = "postgres")]
pub use manager::postgres::{PoolProvider, PostgresRequestStore, TestDbPools};
#[cfg(feature = "metrics")]
pub use crate::metrics::LifecycleMetrics;
pub use request::*;

/// Get the clubdesk database migrator
///
/// Returns a migrator that can be run against a connection pool.
#[cfg(feature = "postgres")]
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}
