use std::path::Path;

use anyhow::Result;
use libsql::{Builder, Connection};
use tokio::sync::{Mutex, MutexGuard};

const SYSTEM_MIGRATIONS: &[(&str, &str)] = &[(
    "system/000_migrations_table.sql",
    include_str!("migrations/system/000_migrations_table.sql"),
)];

pub struct Database {
    conn: Connection,
    tx_lock: Mutex<()>,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Serializes multi-statement writes; the single libsql connection has no
    /// nested transaction support.
    pub async fn lock_for_transaction(&self) -> MutexGuard<'_, ()> {
        self.tx_lock.lock().await
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        match conn.execute(query, libsql::params![name]).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!("migration {} already applied, skipping", name);
            return Ok(());
        }

        tracing::info!("applying migration: {}", name);
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(cfg: &crate::config::Config, data_dir: &Path) -> Result<Self> {
        Self::open(data_dir.join(cfg.app.get_db())).await
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Builder::new_local(path.as_ref()).build().await?;
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in crate::store::migrations() {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            conn,
            tx_lock: Mutex::new(()),
        })
    }
}
