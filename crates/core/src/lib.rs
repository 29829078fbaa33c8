//! Core types and shared functionality for the NaturIA offline intermediary.
//!
//! This crate provides:
//! - Generational response cache with SQLite backend
//! - Local history and preference store
//! - Request classification and synthesized offline responses
//! - Species API wire types
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod species;
pub mod store;

pub use cache::{CacheDb, Generation, GenerationInfo, GenerationState};
pub use config::AppConfig;
pub use error::Error;
pub use request::{Classification, Destination, InterceptedRequest, RequestMode};
pub use response::{ResponseSnapshot, ResponseSource, Served};
pub use species::{ApiReply, DangerLevel, SoundInfo, SoundLookup, SoundReply, SpeciesKind, SpeciesResult};
pub use store::{HistoryEntry, Theme};
