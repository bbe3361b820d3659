use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Acquire, Row};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// One numbered migration script, embedded at compile time so the binary
/// carries its own schema and needs no separate file deployment step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: include_str!("../../../migrations/0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "kb_fts",
        sql: include_str!("../../../migrations/0002_kb_fts.sql"),
    },
];

/// Pooled SQLite store handle. Callers acquire a short-lived connection per
/// request/task from `pool` rather than holding one across suspension points.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        info!(db_url, "connected to store");

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory store for tests: a fresh schema on every call, isolated per pool.
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("failed to open in-memory sqlite database")?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Applies outstanding migrations in ascending version order, each inside
    /// its own transaction, recording progress in `schema_migrations`.
    async fn migrate(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create schema_migrations table")?;

        let applied: Vec<i64> = sqlx::query("SELECT version FROM schema_migrations")
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(|row| row.get::<i64, _>("version"))
            .collect();

        for migration in MIGRATIONS {
            if applied.contains(&migration.version) {
                continue;
            }
            let mut tx = conn.begin().await?;
            sqlx::raw_sql(migration.sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {} ({}) failed", migration.version, migration.name))?;
            sqlx::query(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
            )
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            info!(version = migration.version, name = migration.name, "applied migration");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_apply_idempotently() {
        let db = Database::new_in_memory().await.expect("in-memory store");
        db.migrate().await.expect("second migrate pass is a no-op");

        let count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM schema_migrations")
            .fetch_one(&db.pool)
            .await
            .unwrap()
            .get("c");
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn instruments_table_exists_after_migration() {
        let db = Database::new_in_memory().await.expect("in-memory store");
        sqlx::query("SELECT COUNT(*) FROM instruments")
            .fetch_one(&db.pool)
            .await
            .expect("instruments table should exist");
    }
}
