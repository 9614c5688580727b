//! CareBridge store: an embedded, versioned relational store for care
//! coordination data.
//!
//! Layers, bottom to top:
//! - [`db::sqlite`] opens the database and walks schema migrations;
//! - [`db::engine`] is the generic transactional record engine
//!   (CRUD, batches, pagination, aggregates, search);
//! - [`cache`] keeps hot entity lists in memory with coarse invalidation;
//! - [`audit`] appends an audit trail and watches for access anomalies;
//! - [`db::repository`] exposes typed repositories per entity;
//! - [`store::CareStore`] wires it all together and adds backup/restore.

pub mod audit;
pub mod cache;
pub mod config;
pub mod db;
pub mod events;
pub mod models;
pub mod store;

pub use db::DatabaseError;
pub use events::{ChangeOp, StoreEvent};
pub use store::CareStore;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// built-in default filter. Safe to call once per process.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
