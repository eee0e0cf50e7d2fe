//! libSQL storage layer for the page cache.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the root
//! container: a `partitions` table (one row per platform plus `common`) and a
//! `pages` table of compressed page blobs keyed by `(partition, command)`.
//!
//! **Access rules:**
//! - `tldr --update`: read-write via [`Storage::open`], the only writer
//! - page lookups: read-only via [`Storage::open_readonly`]
//!
//! Readers running in another process see either the old or the new root,
//! never a mix: every root mutation happens inside a SQLite transaction and
//! the database runs in WAL mode, so an open write transaction never blocks
//! readers and open readers never block a commit.

mod migrations;

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Transaction, params};
use tldr_shared::{Result, TldrError};
use uuid::Uuid;

/// How long a connection waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TldrError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(store_err)?;

        let conn = db.connect().map_err(store_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(store_err)?;
        enable_wal(&conn).await?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(store_err)?;

        let conn = db.connect().map_err(store_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(store_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        TldrError::Store(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(TldrError::Store(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Root container
    // -----------------------------------------------------------------------

    /// Remove the root container (every partition and page) in one transaction.
    pub async fn delete_root(&self) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(store_err)?;
        clear_root(&tx).await?;
        tx.commit().await.map_err(store_err)?;
        tracing::debug!("old root container removed");
        Ok(())
    }

    /// Open a write transaction holding a fresh root with the given partitions.
    ///
    /// Any existing root must already be gone; use [`Storage::replace_root`]
    /// or [`Storage::swap_root`] to replace one.
    pub async fn create_root(&self, partitions: &[String]) -> Result<RootWriter> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(store_err)?;
        RootWriter::begin(tx, partitions).await
    }

    /// Delete the existing root, then open a transaction creating the new one.
    ///
    /// The delete is committed on its own: if the process dies before
    /// [`RootWriter::commit`], the cache is left empty.
    pub async fn replace_root(&self, partitions: &[String]) -> Result<RootWriter> {
        self.delete_root().await?;
        self.create_root(partitions).await
    }

    /// Delete and recreate the root inside a single transaction.
    ///
    /// Until [`RootWriter::commit`] succeeds, the old root stays visible and a
    /// failure rolls back to it.
    pub async fn swap_root(&self, partitions: &[String]) -> Result<RootWriter> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(store_err)?;
        clear_root(&tx).await?;
        RootWriter::begin(tx, partitions).await
    }

    // -----------------------------------------------------------------------
    // Page lookups
    // -----------------------------------------------------------------------

    /// Get the stored blob for `key` in `partition`. Absence is `None`.
    pub async fn get(&self, partition: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content FROM pages WHERE partition = ?1 AND command = ?2",
                params![partition, key],
            )
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<Vec<u8>>(0).map_err(store_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    /// Whether the root container holds no pages at all.
    pub async fn is_empty(&self) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT EXISTS(SELECT 1 FROM pages)", params![])
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(store_err)? == 0),
            Ok(None) => Ok(true),
            Err(e) => Err(store_err(e)),
        }
    }

    /// Partition names of the current root, alphabetically.
    pub async fn partitions(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT name FROM partitions ORDER BY name", params![])
            .await
            .map_err(store_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            results.push(row.get::<String>(0).map_err(store_err)?);
        }
        Ok(results)
    }

    /// Command names stored in `partition`, alphabetically.
    pub async fn list_commands(&self, partition: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT command FROM pages WHERE partition = ?1 ORDER BY command",
                params![partition],
            )
            .await
            .map_err(store_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            results.push(row.get::<String>(0).map_err(store_err)?);
        }
        Ok(results)
    }

    /// Page count per partition, including empty partitions.
    pub async fn partition_counts(&self) -> Result<Vec<(String, u64)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT p.name, COUNT(g.command)
                 FROM partitions p
                 LEFT JOIN pages g ON g.partition = p.name
                 GROUP BY p.name
                 ORDER BY p.name",
                params![],
            )
            .await
            .map_err(store_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            let name = row.get::<String>(0).map_err(store_err)?;
            let count = row.get::<i64>(1).map_err(store_err)?;
            results.push((name, u64::try_from(count).unwrap_or(0)));
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Update log
    // -----------------------------------------------------------------------

    /// Record a finished update. Returns the generated record ID.
    pub async fn record_update(&self, started_at: DateTime<Utc>, stats_json: &str) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO update_log (id, started_at, finished_at, stats_json)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), started_at.to_rfc3339(), now.as_str(), stats_json],
            )
            .await
            .map_err(store_err)?;
        Ok(id)
    }

    /// The most recent update record, if any.
    pub async fn last_update(&self) -> Result<Option<UpdateRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, stats_json
                 FROM update_log ORDER BY finished_at DESC, id DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(UpdateRecord {
                id: row.get::<String>(0).map_err(store_err)?,
                started_at: parse_timestamp(&row.get::<String>(1).map_err(store_err)?)?,
                finished_at: parse_timestamp(&row.get::<String>(2).map_err(store_err)?)?,
                stats_json: row.get::<String>(3).map_err(store_err)?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// RootWriter
// ---------------------------------------------------------------------------

/// An open write transaction populating a new root container.
pub struct RootWriter {
    tx: Transaction,
    partitions: HashSet<String>,
    written: usize,
}

impl RootWriter {
    async fn begin(tx: Transaction, partitions: &[String]) -> Result<Self> {
        for name in partitions {
            tx.execute(
                "INSERT INTO partitions (name) VALUES (?1)",
                params![name.as_str()],
            )
            .await
            .map_err(|e| TldrError::Store(format!("failed to create partition '{name}': {e}")))?;
        }

        Ok(Self {
            tx,
            partitions: partitions.iter().cloned().collect(),
            written: 0,
        })
    }

    /// Insert or overwrite `key` in `partition`.
    pub async fn put(&mut self, partition: &str, key: &str, value: &[u8]) -> Result<()> {
        if !self.partitions.contains(partition) {
            return Err(TldrError::Store(format!(
                "partition '{partition}' does not exist"
            )));
        }

        self.tx
            .execute(
                "INSERT INTO pages (partition, command, content) VALUES (?1, ?2, ?3)
                 ON CONFLICT(partition, command) DO UPDATE SET content = excluded.content",
                params![partition, key, value.to_vec()],
            )
            .await
            .map_err(store_err)?;
        self.written += 1;
        Ok(())
    }

    /// Commit the new root. Returns the number of pages written.
    pub async fn commit(self) -> Result<usize> {
        let written = self.written;
        self.tx.commit().await.map_err(store_err)?;
        Ok(written)
    }

    /// Abandon the new root.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(store_err)
    }
}

/// A row of the `update_log` table.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    /// Record identifier (UUID v7).
    pub id: String,
    /// When the update started.
    pub started_at: DateTime<Utc>,
    /// When the update committed.
    pub finished_at: DateTime<Utc>,
    /// Serialized update statistics.
    pub stats_json: String,
}

/// Switch the database file to write-ahead logging. The mode persists in the file.
async fn enable_wal(conn: &Connection) -> Result<()> {
    let mut rows = conn
        .query("PRAGMA journal_mode = WAL", params![])
        .await
        .map_err(store_err)?;

    let mode = match rows.next().await.map_err(store_err)? {
        Some(row) => row.get::<String>(0).map_err(store_err)?,
        None => String::new(),
    };
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(mode = %mode, "could not enable WAL journal mode");
    }
    Ok(())
}

async fn clear_root(tx: &Transaction) -> Result<()> {
    tx.execute("DELETE FROM pages", params![])
        .await
        .map_err(|e| TldrError::Store(format!("failed to remove old pages: {e}")))?;
    tx.execute("DELETE FROM partitions", params![])
        .await
        .map_err(|e| TldrError::Store(format!("failed to remove old partitions: {e}")))?;
    Ok(())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TldrError::Store(format!("invalid date: {e}")))
}

fn store_err(e: libsql::Error) -> TldrError {
    TldrError::Store(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("tldr_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
        assert!(storage.is_empty().await.unwrap());
        assert!(storage.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("tldr_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn put_get_and_overwrite() {
        let storage = test_storage().await;
        let mut root = storage
            .replace_root(&names(&["linux", "common"]))
            .await
            .expect("replace root");

        root.put("linux", "ls", b"first").await.expect("put");
        root.put("linux", "ls", b"second").await.expect("overwrite");
        root.put("common", "tar", b"tar page").await.expect("put common");
        assert_eq!(root.commit().await.expect("commit"), 3);

        assert_eq!(
            storage.get("linux", "ls").await.unwrap().as_deref(),
            Some(&b"second"[..])
        );
        assert_eq!(
            storage.get("common", "tar").await.unwrap().as_deref(),
            Some(&b"tar page"[..])
        );
        assert!(storage.get("common", "ls").await.unwrap().is_none());
        assert!(!storage.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn put_into_unknown_partition_fails() {
        let storage = test_storage().await;
        let mut root = storage.replace_root(&names(&["common"])).await.unwrap();
        let err = root.put("plan9", "acme", b"x").await.unwrap_err();
        assert!(err.to_string().contains("plan9"));
        root.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn replace_root_drops_old_partitions_and_pages() {
        let storage = test_storage().await;

        let mut root = storage.replace_root(&names(&["linux", "common"])).await.unwrap();
        root.put("linux", "old", b"1").await.unwrap();
        root.commit().await.unwrap();

        let mut root = storage.replace_root(&names(&["osx", "common"])).await.unwrap();
        root.put("osx", "new", b"2").await.unwrap();
        root.commit().await.unwrap();

        assert_eq!(storage.partitions().await.unwrap(), vec!["common", "osx"]);
        assert!(storage.get("linux", "old").await.unwrap().is_none());
        assert_eq!(storage.list_commands("osx").await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn rolled_back_swap_keeps_old_root() {
        let storage = test_storage().await;

        let mut root = storage.replace_root(&names(&["common"])).await.unwrap();
        root.put("common", "tar", b"kept").await.unwrap();
        root.commit().await.unwrap();

        let mut root = storage.swap_root(&names(&["common"])).await.unwrap();
        root.put("common", "other", b"discarded").await.unwrap();
        root.rollback().await.unwrap();

        assert_eq!(
            storage.get("common", "tar").await.unwrap().as_deref(),
            Some(&b"kept"[..])
        );
        assert!(storage.get("common", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_then_uncommitted_create_leaves_empty_cache() {
        let storage = test_storage().await;

        let mut root = storage.replace_root(&names(&["common"])).await.unwrap();
        root.put("common", "tar", b"page").await.unwrap();
        root.commit().await.unwrap();

        let root = storage.replace_root(&names(&["common"])).await.unwrap();
        root.rollback().await.unwrap();

        assert!(storage.is_empty().await.unwrap());
        assert!(storage.partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partition_counts_include_empty_partitions() {
        let storage = test_storage().await;
        let mut root = storage
            .replace_root(&names(&["linux", "osx", "common"]))
            .await
            .unwrap();
        root.put("linux", "ls", b"a").await.unwrap();
        root.put("linux", "ps", b"b").await.unwrap();
        root.put("common", "tar", b"c").await.unwrap();
        root.commit().await.unwrap();

        let counts = storage.partition_counts().await.unwrap();
        assert_eq!(
            counts,
            vec![
                ("common".to_string(), 1),
                ("linux".to_string(), 2),
                ("osx".to_string(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn update_log_roundtrip() {
        let storage = test_storage().await;
        assert!(storage.last_update().await.unwrap().is_none());

        let started = Utc::now();
        let id = storage
            .record_update(started, r#"{"stored": 3}"#)
            .await
            .expect("record update");

        let record = storage.last_update().await.unwrap().expect("record");
        assert_eq!(record.id, id);
        assert!(record.stats_json.contains("stored"));
        assert!(record.finished_at >= record.started_at);
    }

    #[tokio::test]
    async fn open_enables_wal() {
        let storage = test_storage().await;
        let mut rows = storage
            .conn
            .query("PRAGMA journal_mode", params![])
            .await
            .unwrap();
        let row = rows.next().await.unwrap().expect("journal mode row");
        assert_eq!(row.get::<String>(0).unwrap().to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn reader_sees_old_root_until_swap_commits() {
        let tmp = std::env::temp_dir().join(format!("tldr_test_{}.db", Uuid::now_v7()));
        let writer = Storage::open(&tmp).await.unwrap();
        let mut root = writer.replace_root(&names(&["common"])).await.unwrap();
        root.put("common", "tar", b"old").await.unwrap();
        root.commit().await.unwrap();

        let reader = Storage::open_readonly(&tmp).await.unwrap();

        // Large enough for the writer to spill its page cache to disk.
        let body = vec![b'x'; 1536];
        let mut root = writer.swap_root(&names(&["linux", "common"])).await.unwrap();
        for i in 0..6000 {
            root.put("linux", &format!("cmd{i}"), &body).await.unwrap();
        }

        assert_eq!(
            reader.get("common", "tar").await.unwrap().as_deref(),
            Some(&b"old"[..])
        );
        assert!(!reader.is_empty().await.unwrap());

        // An open reader statement must not block the commit.
        let mut cursor = reader
            .conn
            .query("SELECT command FROM pages", params![])
            .await
            .unwrap();
        assert!(cursor.next().await.unwrap().is_some());
        assert_eq!(root.commit().await.unwrap(), 6000);
        drop(cursor);

        assert!(reader.get("common", "tar").await.unwrap().is_none());
        assert_eq!(reader.list_commands("linux").await.unwrap().len(), 6000);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("tldr_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        let mut root = rw.replace_root(&names(&["common"])).await.unwrap();
        root.put("common", "tar", b"page").await.unwrap();
        root.commit().await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get("common", "tar").await.unwrap().is_some());

        let result = ro.delete_root().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
