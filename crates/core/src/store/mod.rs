//! Local persistent store: lookup history and user preferences.
//!
//! Lives in the same SQLite database as the response cache but is never
//! touched by generation promotion or purging.

pub mod history;
pub mod preferences;

pub use history::{HistoryEntry, MAX_HISTORY};
pub use preferences::{INSTALL_DISMISSED_KEY, THEME_KEY, Theme};
