/// Registry access
///
/// The monitor reads a snapshot of projects and writes back one status per
/// project. Everything else about projects belongs to the dashboard.
pub mod migrations;
pub mod repository;

pub use repository::LibsqlRegistry;

use anyhow::Result;
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::monitoring::types::{StatusValue, Target, TargetId};

/// Narrow read/update contract the monitor needs from the project registry
///
/// Implementations must be safe to call concurrently from many units; the
/// monitor takes no lock around them.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Snapshot of all projects: id, live URL, name and current status
    async fn list_targets(&self) -> Result<Vec<Target>>;

    /// Set one project's status, keyed by id
    async fn update_status(&self, id: TargetId, status: &StatusValue) -> Result<()>;
}

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}
