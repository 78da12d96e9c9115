//! Ticket persistence behind the `TicketStore` seam.
//!
//! The worker appends, the API reads. Store failures are logged by callers
//! and never abort a poll cycle.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageError;
use crate::pipeline::types::{SentimentLabel, TicketRecord};

mod libsql_backend;

pub use libsql_backend::LibSqlStore;

/// List filter; set fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub sentiment: Option<SentimentLabel>,
    pub category: Option<String>,
    /// Case-insensitive substring over description, fio and organization.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketStats {
    pub total: u64,
    pub by_sentiment: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Insert a ticket; re-appending the same message id overwrites the row.
    async fn append(&self, record: &TicketRecord) -> Result<(), StorageError>;

    /// Look up one ticket by message id.
    async fn get(&self, message_id: &str) -> Result<Option<TicketRecord>, StorageError>;

    /// Filtered list, newest first by processing timestamp.
    async fn list(&self, filter: &TicketFilter) -> Result<Vec<TicketRecord>, StorageError>;

    /// Totals plus per-sentiment and per-category counts.
    async fn stats(&self) -> Result<TicketStats, StorageError>;

    /// Flip the answered flag. Unknown ids are a no-op.
    async fn mark_answered(&self, message_id: &str) -> Result<(), StorageError>;
}
