//! SQLite-backed generational response cache.
//!
//! This module provides a persistent cache of response snapshots grouped into
//! named generations, using SQLite with async access via tokio-rusqlite. It
//! supports:
//!
//! - Keys derived from the normalized request identity (method + URL)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-generation promotion and eviction

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use generations::{Generation, GenerationInfo, GenerationState};
