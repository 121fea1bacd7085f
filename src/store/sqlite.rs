//! Durable store on a single SQLite file.
//!
//! One connection behind a mutex, driven from `spawn_blocking`. Embeddings are stored
//! as native-endian `f32` blobs, timestamps as microseconds since the Unix epoch.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use tracing::{debug, info, warn};

use super::error::{StoreError, StoreResult};
use super::{ItemStore, MatchStore, PendingQueue, check_dimension, new_record_id};
use crate::model::{
    Category, Item, ItemStatus, Match, MatchStatus, NewMatch, NewPendingEntry, PendingEntry,
    PendingReason,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS items (
        category TEXT NOT NULL,
        id TEXT NOT NULL,
        description TEXT NOT NULL,
        embedding BLOB,
        status TEXT NOT NULL,
        owner_user_id TEXT,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (category, id)
    );
    CREATE INDEX IF NOT EXISTS idx_items_category_status ON items (category, status);

    CREATE TABLE IF NOT EXISTS matches (
        id TEXT PRIMARY KEY,
        lost_id TEXT NOT NULL,
        found_id TEXT NOT NULL,
        score REAL NOT NULL,
        owner_user_id TEXT,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (lost_id, found_id)
    );
    CREATE INDEX IF NOT EXISTS idx_matches_owner ON matches (owner_user_id);
    CREATE INDEX IF NOT EXISTS idx_matches_found ON matches (found_id);

    CREATE TABLE IF NOT EXISTS pending (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        doc_id TEXT,
        description TEXT,
        category TEXT,
        user_id TEXT,
        timestamp INTEGER NOT NULL,
        reason_code TEXT NOT NULL,
        reason_detail TEXT NOT NULL
    );
";

const ITEM_COLUMNS: &str =
    "category, id, description, embedding, status, owner_user_id, created_at";
const MATCH_COLUMNS: &str = "id, lost_id, found_id, score, owner_user_id, status, created_at";
const PENDING_COLUMNS: &str =
    "id, doc_id, description, category, user_id, timestamp, reason_code, reason_detail";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    dimension: Option<usize>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("dimension", &self.dimension)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
                reason: format!("failed to create {}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        info!(path = %path.display(), "Opened SQLite store");
        Self::from_connection(conn)
    }

    /// Private database that disappears with the store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimension: None,
            closed: AtomicBool::new(false),
        })
    }

    /// Rejects embeddings whose length is not `dimension`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend {
            reason: format!("blocking task failed: {e}"),
        })?
    }

    fn close_all(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("SQLite store closed");
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(table: &'static str, micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| StoreError::Corrupt {
        table,
        reason: format!("timestamp out of range: {micros}"),
    })
}

fn encode_embedding(embedding: &[f32]) -> &[u8] {
    bytemuck::cast_slice(embedding)
}

fn decode_embedding(bytes: &[u8]) -> StoreResult<Vec<f32>> {
    if bytes.len() % size_of::<f32>() != 0 {
        return Err(StoreError::Corrupt {
            table: "items",
            reason: format!("embedding blob of {} bytes", bytes.len()),
        });
    }

    // Blobs come back unaligned; fall back to a copying decode.
    match bytemuck::try_cast_slice::<u8, f32>(bytes) {
        Ok(values) => Ok(values.to_vec()),
        Err(_) => Ok(bytes
            .chunks_exact(size_of::<f32>())
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()),
    }
}

fn parse_column<T: std::str::FromStr>(table: &'static str, value: &str) -> StoreResult<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| StoreError::Corrupt {
        table,
        reason: e.to_string(),
    })
}

struct RawItem {
    category: String,
    id: String,
    description: String,
    embedding: Option<Vec<u8>>,
    status: String,
    owner_user_id: Option<String>,
    created_at: i64,
}

impl RawItem {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            category: row.get(0)?,
            id: row.get(1)?,
            description: row.get(2)?,
            embedding: row.get(3)?,
            status: row.get(4)?,
            owner_user_id: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> StoreResult<Item> {
        Ok(Item {
            id: self.id,
            category: parse_column("items", &self.category)?,
            description: self.description,
            embedding: self.embedding.as_deref().map(decode_embedding).transpose()?,
            status: parse_column("items", &self.status)?,
            owner_user_id: self.owner_user_id,
            created_at: from_micros("items", self.created_at)?,
        })
    }
}

struct RawMatch {
    id: String,
    lost_id: String,
    found_id: String,
    score: f64,
    owner_user_id: Option<String>,
    status: String,
    created_at: i64,
}

impl RawMatch {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            lost_id: row.get(1)?,
            found_id: row.get(2)?,
            score: row.get(3)?,
            owner_user_id: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn decode(self) -> StoreResult<Match> {
        Ok(Match {
            id: self.id,
            lost_id: self.lost_id,
            found_id: self.found_id,
            score: self.score as f32,
            owner_user_id: self.owner_user_id,
            status: parse_column::<MatchStatus>("matches", &self.status)?,
            created_at: from_micros("matches", self.created_at)?,
        })
    }
}

struct RawPending {
    id: String,
    doc_id: Option<String>,
    description: Option<String>,
    category: Option<String>,
    user_id: Option<String>,
    timestamp: i64,
    reason_code: String,
    reason_detail: String,
}

impl RawPending {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            doc_id: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            user_id: row.get(4)?,
            timestamp: row.get(5)?,
            reason_code: row.get(6)?,
            reason_detail: row.get(7)?,
        })
    }

    fn decode(self) -> StoreResult<PendingEntry> {
        Ok(PendingEntry {
            id: self.id,
            doc_id: self.doc_id,
            description: self.description,
            category: self.category,
            user_id: self.user_id,
            timestamp: from_micros("pending", self.timestamp)?,
            reason: PendingReason::new(
                parse_column("pending", &self.reason_code)?,
                self.reason_detail,
            ),
        })
    }
}

fn query_matches(
    conn: &Connection,
    filter: &str,
    value: &str,
) -> StoreResult<Vec<Match>> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE {filter} = ?1 ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![value], RawMatch::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(RawMatch::decode).collect()
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn insert(&self, item: Item) -> StoreResult<()> {
        if let Some(embedding) = &item.embedding {
            check_dimension(self.dimension, embedding)?;
        }

        self.with_conn(move |conn| {
            let result = conn.execute(
                &format!("INSERT INTO items ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    item.category.as_str(),
                    item.id,
                    item.description,
                    item.embedding.as_deref().map(encode_embedding),
                    item.status.as_str(),
                    item.owner_user_id,
                    to_micros(item.created_at),
                ],
            );

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_constraint_violation(&e) => Err(StoreError::ItemExists {
                    category: item.category,
                    id: item.id,
                }),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get(&self, category: Category, id: &str) -> StoreResult<Item> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {ITEM_COLUMNS} FROM items WHERE category = ?1 AND id = ?2"),
                    params![category.as_str(), id],
                    RawItem::from_row,
                )
                .optional()?;

            match raw {
                Some(raw) => raw.decode(),
                None => Err(StoreError::ItemNotFound { category, id }),
            }
        })
        .await
    }

    async fn update_embedding(
        &self,
        category: Category,
        id: &str,
        embedding: Vec<f32>,
    ) -> StoreResult<()> {
        check_dimension(self.dimension, &embedding)?;

        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE items SET embedding = ?1 WHERE category = ?2 AND id = ?3",
                params![encode_embedding(&embedding), category.as_str(), id],
            )?;

            if changed == 0 {
                return Err(StoreError::ItemNotFound { category, id });
            }
            Ok(())
        })
        .await
    }

    async fn scan(&self, category: Category, status: ItemStatus) -> StoreResult<Vec<Item>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items
                 WHERE category = ?1 AND status = ?2
                 ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map(params![category.as_str(), status.as_str()], RawItem::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawItem::decode).collect()
        })
        .await
    }

    async fn set_status(
        &self,
        category: Category,
        id: &str,
        expected: ItemStatus,
        new: ItemStatus,
    ) -> StoreResult<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE items SET status = ?1 WHERE category = ?2 AND id = ?3 AND status = ?4",
                params![new.as_str(), category.as_str(), id, expected.as_str()],
            )?;
            if changed > 0 {
                return Ok(true);
            }

            let exists = conn
                .query_row(
                    "SELECT 1 FROM items WHERE category = ?1 AND id = ?2",
                    params![category.as_str(), id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            if exists {
                Ok(false)
            } else {
                Err(StoreError::ItemNotFound { category, id })
            }
        })
        .await
    }

    async fn close(&self) -> StoreResult<()> {
        self.close_all();
        Ok(())
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn insert(&self, new: NewMatch) -> StoreResult<Match> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let last: Option<i64> =
                tx.query_row("SELECT MAX(created_at) FROM matches", [], |row| row.get(0))?;
            let now = to_micros(Utc::now());
            let created_micros = last.map_or(now, |last| last.max(now));

            let id = new_record_id();
            let result = tx.execute(
                &format!("INSERT INTO matches ({MATCH_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    id,
                    new.lost_id,
                    new.found_id,
                    f64::from(new.score),
                    new.owner_user_id,
                    new.status.as_str(),
                    created_micros,
                ],
            );

            match result {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(StoreError::DuplicateMatch {
                        lost_id: new.lost_id,
                        found_id: new.found_id,
                    });
                }
                Err(e) => return Err(e.into()),
            }
            tx.commit()?;

            let created_at = from_micros("matches", created_micros)?;
            Ok(new.into_match(id, created_at))
        })
        .await
    }

    async fn query_by_lost_id(&self, lost_id: &str) -> StoreResult<Vec<Match>> {
        let lost_id = lost_id.to_string();
        self.with_conn(move |conn| query_matches(conn, "lost_id", &lost_id))
            .await
    }

    async fn query_by_found_id(&self, found_id: &str) -> StoreResult<Vec<Match>> {
        let found_id = found_id.to_string();
        self.with_conn(move |conn| query_matches(conn, "found_id", &found_id))
            .await
    }

    async fn query_by_user(&self, user_id: &str) -> StoreResult<Vec<Match>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| query_matches(conn, "owner_user_id", &user_id))
            .await
    }

    async fn close(&self) -> StoreResult<()> {
        self.close_all();
        Ok(())
    }
}

#[async_trait]
impl PendingQueue for SqliteStore {
    async fn insert(&self, entry: NewPendingEntry) -> StoreResult<PendingEntry> {
        self.with_conn(move |conn| {
            let mut stored = entry.into_entry(new_record_id());
            stored.timestamp = from_micros("pending", to_micros(stored.timestamp))?;
            conn.execute(
                &format!(
                    "INSERT INTO pending ({PENDING_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    stored.id,
                    stored.doc_id,
                    stored.description,
                    stored.category,
                    stored.user_id,
                    to_micros(stored.timestamp),
                    stored.reason.code.as_str(),
                    stored.reason.detail,
                ],
            )?;
            Ok(stored)
        })
        .await
    }

    async fn scan_all(&self) -> StoreResult<Vec<PendingEntry>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PENDING_COLUMNS} FROM pending ORDER BY seq"))?;
            let mut entries = Vec::new();
            // A bad row is left in place for inspection; it must not block the rest.
            for row in stmt.query_map([], RawPending::from_row)? {
                let decoded = row.map_err(StoreError::from).and_then(RawPending::decode);
                match decoded {
                    Ok(entry) => entries.push(entry),
                    Err(err) => warn!(error = %err, "Skipping undecodable pending row"),
                }
            }
            Ok(entries)
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM pending WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn close(&self) -> StoreResult<()> {
        self.close_all();
        Ok(())
    }
}
