//! Local snapshot cache.
//!
//! The last successful download is kept as one JSON blob under a single key
//! in an embedded `SQLite` key-value table. Each blob is stored with its
//! BLAKE3 digest; a blob that fails to parse or to verify is treated as
//! corrupted and removed.
//!
//! [`CacheStore::load`] and [`CacheStore::save`] never fail. Caching only
//! speeds up startup, so every storage failure is logged and absorbed. The
//! `try_*` variants expose the underlying [`StorageError`].

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result, StorageError};
use crate::point::Point;

/// Key under which the snapshot is stored.
pub const STORAGE_KEY: &str = "donde-ayudo-data";

/// The cached `{timestamp, data}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was written.
    pub timestamp: DateTime<Utc>,
    /// The cached points.
    pub data: Vec<Point>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    timestamp: DateTime<Utc>,
    data: &'a [Point],
}

/// What is currently in the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Database location.
    pub path: PathBuf,
    /// Whether a blob is stored under [`STORAGE_KEY`].
    pub present: bool,
    /// Whether the stored blob parses and matches its digest.
    pub valid: bool,
    /// Snapshot timestamp, when valid.
    pub timestamp: Option<DateTime<Utc>>,
    /// Number of cached points, when valid.
    pub points: Option<usize>,
    /// Size of the stored blob in bytes.
    pub size_bytes: usize,
    /// Configured quota in bytes.
    pub quota_bytes: usize,
    /// Stored BLAKE3 digest, hex encoded.
    pub digest: Option<String>,
    /// When the row was last written.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Snapshot cache backed by `SQLite`.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    conn: Connection,
    max_bytes: usize,
}

/// Delete a database file together with its WAL and shared-memory files.
fn remove_database_files(path: &Path) -> std::io::Result<()> {
    std::fs::remove_file(path)?;
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        // Absent side files are fine.
        let _ = std::fs::remove_file(PathBuf::from(side));
    }
    Ok(())
}

fn digest(value: &str) -> String {
    blake3::hash(value.as_bytes()).to_hex().to_string()
}

impl CacheStore {
    /// Open or create the cache database at `path`.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// cannot be initialized.
    pub fn open(path: impl AsRef<Path>, max_bytes: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening cache database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Cache database ready at {}", path.display());
        Ok(Self {
            path,
            conn,
            max_bytes,
        })
    }

    /// Create an in-memory cache, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(max_bytes: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            max_bytes,
        })
    }

    /// Open the cache at `path`, recovering from an unusable file.
    ///
    /// A database that cannot be opened is deleted and recreated. If that
    /// fails too (unwritable directory, say), the cache lives in memory for
    /// this run only.
    ///
    /// # Errors
    ///
    /// Returns an error only if not even an in-memory database can be
    /// created.
    pub fn open_or_recover(path: impl AsRef<Path>, max_bytes: usize) -> Result<Self> {
        let path = path.as_ref();

        let first = match Self::open(path, max_bytes) {
            Ok(store) => return Ok(store),
            Err(err) => err,
        };
        warn!("Cache at {} is unusable: {}", path.display(), first);

        // Recreate from scratch; the snapshot is disposable.
        if path.is_file() {
            match remove_database_files(path) {
                Ok(()) => match Self::open(path, max_bytes) {
                    Ok(store) => {
                        info!("Recreated cache database at {}", path.display());
                        return Ok(store);
                    }
                    Err(err) => warn!("Recreating cache failed: {}", err),
                },
                Err(err) => warn!("Failed to remove {}: {}", path.display(), err),
            }
        }

        warn!("Using an in-memory cache for this run");
        Self::open_in_memory(max_bytes)
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured quota in bytes.
    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn read_row(&self) -> std::result::Result<Option<(String, String)>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT value, digest FROM kv_store WHERE key = ?1",
                [STORAGE_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    fn verify(value: &str, stored_digest: &str) -> std::result::Result<Snapshot, StorageError> {
        if digest(value) != stored_digest {
            return Err(StorageError::Corrupted {
                key: STORAGE_KEY.to_string(),
                message: "digest mismatch".to_string(),
            });
        }
        serde_json::from_str(value).map_err(|e| StorageError::Corrupted {
            key: STORAGE_KEY.to_string(),
            message: e.to_string(),
        })
    }

    /// Read the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the blob does not parse or
    /// verify, or [`StorageError::Database`] if the read fails.
    pub fn try_load(&self) -> std::result::Result<Option<Snapshot>, StorageError> {
        match self.read_row()? {
            Some((value, stored_digest)) => Self::verify(&value, &stored_digest).map(Some),
            None => Ok(None),
        }
    }

    /// Read the snapshot, or `None` if absent or unreadable.
    ///
    /// A corrupted blob is removed so the next load starts clean.
    pub fn load(&self) -> Option<Snapshot> {
        match self.try_load() {
            Ok(snapshot) => {
                if let Some(s) = &snapshot {
                    debug!("Loaded {} cached points from {}", s.data.len(), s.timestamp);
                }
                snapshot
            }
            Err(err @ StorageError::Corrupted { .. }) => {
                warn!("Discarding cache: {}", err);
                if let Err(e) = self.clear() {
                    warn!("Failed to clear corrupted cache: {}", e);
                }
                None
            }
            Err(err) => {
                warn!("Failed to read cache: {}", err);
                None
            }
        }
    }

    /// Replace the snapshot with `points`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] if the serialized snapshot is
    /// larger than the quota, or a serialization or database error.
    pub fn try_save(&self, points: &[Point]) -> std::result::Result<DateTime<Utc>, StorageError> {
        let timestamp = Utc::now();
        let value = serde_json::to_string(&SnapshotRef {
            timestamp,
            data: points,
        })?;

        // Checked before writing so the previous snapshot survives
        if value.len() > self.max_bytes {
            return Err(StorageError::QuotaExceeded {
                size: value.len(),
                quota: self.max_bytes,
            });
        }

        self.conn.execute(
            r"
            INSERT OR REPLACE INTO kv_store (key, value, digest, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                STORAGE_KEY,
                value,
                digest(&value),
                timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
            ],
        )?;

        debug!("Cached {} points ({} bytes)", points.len(), value.len());
        Ok(timestamp)
    }

    /// Replace the snapshot, logging instead of failing.
    pub fn save(&self, points: &[Point]) {
        if let Err(err) = self.try_save(points) {
            warn!("Cache write skipped: {}", err);
        }
    }

    /// Remove the snapshot. Returns whether one was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> std::result::Result<bool, StorageError> {
        let deleted = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", [STORAGE_KEY])?;
        Ok(deleted > 0)
    }

    /// Describe the stored snapshot without modifying it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn status(&self) -> std::result::Result<CacheStatus, StorageError> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT value, digest, updated_at FROM kv_store WHERE key = ?1",
                [STORAGE_KEY],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let mut status = CacheStatus {
            path: self.path.clone(),
            present: false,
            valid: false,
            timestamp: None,
            points: None,
            size_bytes: 0,
            quota_bytes: self.max_bytes,
            digest: None,
            updated_at: None,
        };

        if let Some((value, stored_digest, updated_at)) = row {
            status.present = true;
            status.size_bytes = value.len();
            status.updated_at = NaiveDateTime::parse_from_str(&updated_at, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc());
            if let Ok(snapshot) = Self::verify(&value, &stored_digest) {
                status.valid = true;
                status.timestamp = Some(snapshot.timestamp);
                status.points = Some(snapshot.data.len());
            }
            status.digest = Some(stored_digest);
        }

        Ok(status)
    }
}
