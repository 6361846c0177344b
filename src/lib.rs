//! Tradebook Library
//!
//! Core components of the tradebook trade journal: configuration loading,
//! the persistent trade ledger, the signed Mercado Bitcoin client, and the
//! pre-trade briefing channel.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
