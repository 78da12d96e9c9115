//! libSQL backend for the ticket store.
//!
//! One row per ticket: the full record as a JSON `payload` column plus
//! indexed scalar columns for filtering. The `search_blob` column is the
//! lowercased concatenation of description, fio and organization, built in
//! Rust because SQLite's LOWER() does not fold Cyrillic.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, params};
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::pipeline::types::TicketRecord;
use crate::store::{TicketFilter, TicketStats, TicketStore};

const DEFAULT_LIST_LIMIT: usize = 50;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS tickets (
        message_id TEXT PRIMARY KEY,
        processed_at TEXT NOT NULL,
        sentiment TEXT NOT NULL,
        category TEXT NOT NULL,
        answered INTEGER NOT NULL DEFAULT 0,
        search_blob TEXT NOT NULL,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tickets_processed_at ON tickets(processed_at);
    CREATE INDEX IF NOT EXISTS idx_tickets_sentiment ON tickets(sentiment);
    CREATE INDEX IF NOT EXISTS idx_tickets_category ON tickets(category);
"#;

/// libSQL ticket store.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<libsql::Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialise the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Open(format!("cannot create database dir: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("cannot open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(format!("cannot create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "ticket store opened");
        Ok(store)
    }

    /// Create an in-memory store (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Open(format!("cannot create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(format!("cannot create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(SCHEMA)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(())
    }
}

/// Lowercased search text for the LIKE filter.
fn search_blob(record: &TicketRecord) -> String {
    let mut parts = vec![record.description.to_lowercase()];
    if let Some(fio) = &record.fio {
        parts.push(fio.to_lowercase());
    }
    if let Some(org) = &record.organization {
        parts.push(org.to_lowercase());
    }
    parts.join(" ")
}

#[async_trait]
impl TicketStore for LibSqlStore {
    async fn append(&self, record: &TicketRecord) -> Result<(), StorageError> {
        let payload = serde_json::to_string(record)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO tickets \
                 (message_id, processed_at, sentiment, category, answered, search_blob, payload) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.message_id.as_str(),
                    record.processed_at.to_rfc3339(),
                    record.sentiment.label.as_str(),
                    record.classification.category.as_str(),
                    i64::from(record.answered),
                    search_blob(record),
                    payload,
                ],
            )
            .await
            .map_err(|e| StorageError::Query(format!("append: {e}")))?;

        debug!(message_id = %record.message_id, "ticket stored");
        Ok(())
    }

    async fn get(&self, message_id: &str) -> Result<Option<TicketRecord>, StorageError> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload FROM tickets WHERE message_id = ?1",
                params![message_id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("get: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let payload: String = row
                    .get(0)
                    .map_err(|e| StorageError::Query(format!("get row: {e}")))?;
                let record = serde_json::from_str(&payload)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("get: {e}"))),
        }
    }

    async fn list(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>, StorageError> {
        let mut sql = String::from("SELECT payload FROM tickets");
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<libsql::Value> = Vec::new();

        if let Some(sentiment) = filter.sentiment {
            args.push(libsql::Value::from(sentiment.as_str()));
            clauses.push(format!("sentiment = ?{}", args.len()));
        }
        if let Some(category) = &filter.category {
            args.push(libsql::Value::from(category.as_str()));
            clauses.push(format!("category = ?{}", args.len()));
        }
        if let Some(search) = &filter.search {
            args.push(libsql::Value::from(format!(
                "%{}%",
                search.to_lowercase()
            )));
            clauses.push(format!("search_blob LIKE ?{}", args.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY processed_at DESC");

        let limit = filter.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        args.push(libsql::Value::from(limit as i64));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));

        let mut rows = self
            .conn
            .query(&sql, args)
            .await
            .map_err(|e| StorageError::Query(format!("list: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let payload: String = match row.get(0) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "skipping ticket row");
                    continue;
                }
            };
            match serde_json::from_str(&payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "skipping unparseable ticket payload"),
            }
        }
        Ok(records)
    }

    async fn stats(&self) -> Result<TicketStats, StorageError> {
        let mut stats = TicketStats::default();

        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM tickets", ())
            .await
            .map_err(|e| StorageError::Query(format!("stats total: {e}")))?;
        if let Ok(Some(row)) = rows.next().await {
            stats.total = row.get::<i64>(0).unwrap_or(0) as u64;
        }

        let mut rows = self
            .conn
            .query(
                "SELECT sentiment, COUNT(*) FROM tickets GROUP BY sentiment",
                (),
            )
            .await
            .map_err(|e| StorageError::Query(format!("stats sentiment: {e}")))?;
        while let Ok(Some(row)) = rows.next().await {
            if let (Ok(label), Ok(count)) = (row.get::<String>(0), row.get::<i64>(1)) {
                stats.by_sentiment.insert(label, count as u64);
            }
        }

        let mut rows = self
            .conn
            .query(
                "SELECT category, COUNT(*) FROM tickets GROUP BY category",
                (),
            )
            .await
            .map_err(|e| StorageError::Query(format!("stats category: {e}")))?;
        while let Ok(Some(row)) = rows.next().await {
            if let (Ok(category), Ok(count)) = (row.get::<String>(0), row.get::<i64>(1)) {
                stats.by_category.insert(category, count as u64);
            }
        }

        Ok(stats)
    }

    async fn mark_answered(&self, message_id: &str) -> Result<(), StorageError> {
        self.conn
            .execute(
                "UPDATE tickets SET answered = 1, \
                 payload = json_set(payload, '$.answered', json('true')) \
                 WHERE message_id = ?1",
                params![message_id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("mark_answered: {e}")))?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
