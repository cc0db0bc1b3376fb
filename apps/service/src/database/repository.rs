use anyhow::{Result, anyhow};
use async_trait::async_trait;
use libsql::params;

use super::{Registry, unix_now};
use crate::monitoring::types::{StatusValue, Target, TargetId};
use crate::pool::{LibsqlManager, LibsqlPool};

/// LibSQL-backed project registry
pub struct LibsqlRegistry {
    pool: LibsqlPool,
}

impl LibsqlRegistry {
    /// Create a new registry from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl Registry for LibsqlRegistry {
    async fn list_targets(&self) -> Result<Vec<Target>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT id, live_url, name, status FROM projects ORDER BY id", ()).await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            let status: String = row.get(3)?;
            targets.push(Target {
                id: row.get(0)?,
                live_url: row.get::<Option<String>>(1)?,
                name: row.get(2)?,
                status: StatusValue::from(status),
            });
        }

        Ok(targets)
    }

    async fn update_status(&self, id: TargetId, status: &StatusValue) -> Result<()> {
        let conn = self.get_conn().await?;
        let changed = conn
            .execute(
                "UPDATE projects SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), unix_now(), id],
            )
            .await?;

        if changed == 0 {
            return Err(anyhow!("project {} no longer exists", id));
        }

        Ok(())
    }
}
