//! Common library for the Aura application
//!
//! This crate provides the shared infrastructure used by the Aura service:
//! configuration loading, the flat-file conversation and mood store, and the
//! credential registry.
//!
//! ```rust,no_run
//! use common::store::{ConversationStore, JsonFileStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = JsonFileStore::open("data").await?;
//!     store.append_mood(Some("alice"), "happy").await?;
//!     println!("{} mood entries", store.read_moods(Some("alice")).await.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod store;

pub use store::{ConversationEntry, ConversationStore, MoodEntry};
