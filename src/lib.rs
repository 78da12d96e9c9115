//! SupportDesk — support-inbox triage for ЭРИС gas detection equipment.

pub mod api;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod error;
pub mod kb;
pub mod ledger;
pub mod mail;
pub mod notify;
pub mod pipeline;
pub mod reply;
pub mod store;
pub mod worker;
