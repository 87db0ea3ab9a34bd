//! Split-pool SQLite access in WAL mode.
//!
//! Every turn funnels its writes (messages, the exchange memory, tool
//! output memories, session touch) and every compression cycle's replace
//! transaction through a single writer connection, while retrieval
//! candidate scans and session lookups run on a wider read-only pool.
//! WAL keeps readers unblocked while a replace transaction is in flight.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use engram_types::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

/// Read/write pool pair over one SQLite file.
#[derive(Clone)]
pub struct DatabasePool {
    /// Read-only pool, sized by [`DatabaseConfig::reader_connections`].
    pub reader: SqlitePool,
    /// Single-connection pool; all mutations serialize through it.
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open the database at `url`, creating it if missing, and run
    /// migrations.
    ///
    /// Migrations run on the writer before the reader pool opens, so a
    /// reader never observes a partially migrated schema. Foreign keys
    /// are enforced on every connection; the summary replace transaction
    /// relies on them to reject orphaned memories.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(config.reader_connections)
            .connect_with(options.read_only(true))
            .await?;

        debug!(url, readers = config.reader_connections, "database open");
        Ok(Self { reader, writer })
    }

    /// Open `engram.db` under `data_dir`.
    pub async fn open(data_dir: &Path, config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let url = format!("sqlite://{}?mode=rwc", data_dir.join("engram.db").display());
        Self::connect(&url, config).await
    }
}

/// Resolve the data directory: `ENGRAM_DATA_DIR` if set, else `~/.engram`.
pub fn default_data_dir() -> PathBuf {
    match std::env::var("ENGRAM_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".engram")
        }
    }
}
