//! Kalpataru Storage crate - local key-value persistence and the conversation log.
//!
//! Provides a WAL-mode SQLite database with migrations, a `KeyValueStore`
//! abstraction over it, and the write-through `HistoryStore` that owns the
//! ordered sequence of conversation turns.

pub mod db;
pub mod history;
pub mod kv;
pub mod migrations;

pub use db::Database;
pub use history::HistoryStore;
pub use kv::KeyValueStore;
