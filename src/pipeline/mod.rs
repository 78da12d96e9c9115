//! Message processing pipeline.
//!
//! One inbound mail message flows through extraction, summarization,
//! classification and sentiment scoring before a reply is generated; the
//! orchestrator in `processor` merges the stage outputs into a
//! `TicketRecord` and records the message id in the dedup ledger.

pub mod classify;
pub mod extract;
pub mod processor;
pub mod sentiment;
pub mod summarize;
pub mod types;
