//! Session snapshots and the stores that hold them.
//!
//! A [`SessionSnapshot`] captures everything needed to resume a session:
//! the roleplay clock, the scene, all three memory tiers, the user's history
//! and the full [`EmotionalCore`]. Two stores are provided behind
//! [`SnapshotStore`]:
//!
//! - [`JsonSnapshotFile`]: one pretty-printed JSON file, written atomically
//!   through a `.tmp` sibling.
//! - [`SqliteSnapshotStore`]: a single-table SQLite database with an optional
//!   CRC-32 checksum per row.
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS snapshots (
//!     slot       TEXT PRIMARY KEY,
//!     data       BLOB NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     checksum   TEXT
//! );
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::emotion::EmotionalCore;
use crate::error::{ReverieError, Result};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Slot used when none is given.
pub const DEFAULT_SLOT: &str = "default";

/// Earliest and latest story years a snapshot may carry.
const MIN_ROLEPLAY_YEAR: i32 = 1;
const MAX_ROLEPLAY_YEAR: i32 = 9999;

/// Everything needed to resume a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Format version.
    pub version: u32,
    /// Wall-clock save time.
    pub saved_at: DateTime<Utc>,
    /// Roleplay clock.
    pub roleplay_time: NaiveDateTime,
    /// Scene location.
    pub location: String,
    /// Scene action.
    pub current_action: String,
    /// Last narrative action extracted from a reply.
    pub last_narrative_action: Option<String>,
    /// Dynamic-memory buffer, oldest first.
    pub dynamic_memories: Vec<String>,
    /// Active-memory buffer, oldest first.
    pub active_memories: Vec<String>,
    /// Active-memory insert counter.
    pub active_message_count: u64,
    /// Long-term entries, oldest first.
    pub long_term_memories: Vec<String>,
    /// What the character has said to the user.
    pub user_history: Vec<String>,
    /// Full affective state.
    pub emotional_core: EmotionalCore,
}

impl SessionSnapshot {
    /// Check version and every persisted invariant.
    ///
    /// # Errors
    /// Returns [`ReverieError::CorruptSnapshot`] describing the first
    /// violation.
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(ReverieError::CorruptSnapshot {
                reason: format!(
                    "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                    self.version
                ),
            });
        }
        let year = self.roleplay_time.year();
        if !(MIN_ROLEPLAY_YEAR..=MAX_ROLEPLAY_YEAR).contains(&year) {
            return Err(ReverieError::CorruptSnapshot {
                reason: format!("roleplay time {} is out of range", self.roleplay_time),
            });
        }
        self.emotional_core
            .check_invariants()
            .map_err(|reason| ReverieError::CorruptSnapshot { reason })
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = serde_json::from_slice(bytes).map_err(|e| {
            ReverieError::CorruptSnapshot {
                reason: format!("unreadable snapshot: {e}"),
            }
        })?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Somewhere a session snapshot can be saved and loaded.
pub trait SnapshotStore: Send {
    /// Persist `snapshot`, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if encoding or writing fails.
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;

    /// Load the stored snapshot, or `None` if nothing was saved yet.
    ///
    /// # Errors
    /// Returns [`ReverieError::CorruptSnapshot`] for unreadable or
    /// inconsistent data, or an I/O / database error.
    fn load(&self) -> Result<Option<SessionSnapshot>>;
}

/// Build the store selected by `config.backend`. `"none"` yields `None`.
///
/// # Errors
/// Returns an error if the SQLite database cannot be opened, or
/// [`ReverieError::Config`] for an unknown backend.
pub fn open_store(config: &PersistenceConfig) -> Result<Option<Box<dyn SnapshotStore>>> {
    match config.backend.as_str() {
        "json" => Ok(Some(Box::new(JsonSnapshotFile::new(&config.path)))),
        "sqlite" => Ok(Some(Box::new(SqliteSnapshotStore::open(&config.path, config)?))),
        "none" => Ok(None),
        other => Err(ReverieError::Config(format!(
            "unknown persistence backend '{other}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// JSON file
// ---------------------------------------------------------------------------

/// A snapshot kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonSnapshotFile {
    path: PathBuf,
}

impl JsonSnapshotFile {
    /// Store at `path`. Nothing is touched until the first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonSnapshotFile {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.tmp_path();

        let written = fs::write(&tmp, &json).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %cleanup, "No temporary save file to remove");
            }
            return Err(e.into());
        }

        info!(
            path = %self.path.display(),
            bytes = json.len(),
            "Saved session snapshot"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionSnapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = SessionSnapshot::decode(&bytes)?;
        info!(path = %self.path.display(), "Loaded session snapshot");
        Ok(Some(snapshot))
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

fn crc32_hex(data: &[u8]) -> String {
    let crc = crc32_compute(data);
    format!("{crc:08x}")
}

/// CRC-32 (ISO 3309 / ITU-T V.42).
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 == 1 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }
    !crc
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS snapshots (
    slot       TEXT PRIMARY KEY,
    data       BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    checksum   TEXT
);";

/// Snapshots kept in SQLite, one row per slot.
pub struct SqliteSnapshotStore {
    conn: Connection,
    slot: String,
    checksum_enabled: bool,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteSnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSnapshotStore")
            .field("db_path", &self.db_path)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl SqliteSnapshotStore {
    /// Open (or create) a database at `path`.
    ///
    /// # Errors
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn open(path: impl AsRef<Path>, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "Snapshot database opened"
        );

        Ok(Self {
            conn,
            slot: DEFAULT_SLOT.to_owned(),
            checksum_enabled: config.checksum_enabled,
            db_path,
        })
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            slot: DEFAULT_SLOT.to_owned(),
            checksum_enabled: config.checksum_enabled,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Use `slot` instead of the default row.
    #[must_use]
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    /// Remove this store's slot. Returns whether a row was deleted.
    ///
    /// # Errors
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn delete(&self) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM snapshots WHERE slot = ?1", params![self.slot])?;
        Ok(deleted > 0)
    }

    /// Run `PRAGMA integrity_check`.
    ///
    /// # Errors
    /// Returns [`ReverieError::Database`] on SQLite failures.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    #[cfg(test)]
    fn corrupt_for_test(&self) -> Result<()> {
        self.conn.execute(
            "UPDATE snapshots SET data = CAST('{\"version\":1}' AS BLOB) WHERE slot = ?1",
            params![self.slot],
        )?;
        Ok(())
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let start = Instant::now();
        let json = serde_json::to_vec(snapshot)?;
        let checksum = self.checksum_enabled.then(|| crc32_hex(&json));
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO snapshots (slot, data, updated_at, checksum)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slot) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at,
                checksum = excluded.checksum",
            params![self.slot, json, now, checksum],
        )?;

        debug!(
            slot = %self.slot,
            bytes = json.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Saved session snapshot"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionSnapshot>> {
        let start = Instant::now();
        let row: Option<(Vec<u8>, Option<String>)> = self
            .conn
            .prepare_cached("SELECT data, checksum FROM snapshots WHERE slot = ?1")?
            .query_row(params![self.slot], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;

        let Some((data, stored_checksum)) = row else {
            return Ok(None);
        };

        if self.checksum_enabled {
            if let Some(expected) = stored_checksum {
                let actual = crc32_hex(&data);
                if expected != actual {
                    warn!(
                        slot = %self.slot,
                        expected = %expected,
                        actual = %actual,
                        "Snapshot checksum mismatch"
                    );
                    return Err(ReverieError::CorruptSnapshot {
                        reason: format!("checksum mismatch (expected {expected}, got {actual})"),
                    });
                }
            }
        }

        let snapshot = SessionSnapshot::decode(&data)?;
        debug!(
            slot = %self.slot,
            elapsed_us = start.elapsed().as_micros(),
            "Loaded session snapshot"
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionSnapshot {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            roleplay_time: crate::config::ContextConfig::default().clock_start,
            location: "Park".into(),
            current_action: "Relaxing".into(),
            last_narrative_action: Some("*shrugs*".into()),
            dynamic_memories: vec!["a".into(), "b".into()],
            active_memories: vec!["project".into()],
            active_message_count: 7,
            long_term_memories: vec!["school".into()],
            user_history: vec!["Poppy said: 'Hi'".into()],
            emotional_core: EmotionalCore::default(),
        }
    }

    #[test]
    fn crc32_basic() {
        assert_eq!(crc32_compute(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn far_future_roleplay_time_is_corrupt() {
        let mut snap = sample();
        snap.roleplay_time = NaiveDateTime::MAX;
        assert!(matches!(
            snap.validate(),
            Err(ReverieError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn sqlite_round_trip() {
        let store = SqliteSnapshotStore::open_in_memory(&PersistenceConfig::default())
            .expect("open");
        assert!(store.load().expect("load").is_none());
        let snap = sample();
        store.save(&snap).expect("save");
        assert_eq!(store.load().expect("load"), Some(snap));
        assert!(store.integrity_check().expect("check"));
        assert!(store.delete().expect("delete"));
    }

    #[test]
    fn sqlite_checksum_mismatch_is_corrupt() {
        let store = SqliteSnapshotStore::open_in_memory(&PersistenceConfig::default())
            .expect("open");
        store.save(&sample()).expect("save");
        store.corrupt_for_test().expect("corrupt");
        assert!(matches!(
            store.load(),
            Err(ReverieError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn wrong_version_is_corrupt() {
        let mut snap = sample();
        snap.version = 99;
        assert!(matches!(
            snap.validate(),
            Err(ReverieError::CorruptSnapshot { .. })
        ));
    }
}
