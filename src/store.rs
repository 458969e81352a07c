//! Durable storage for chat messages and nickname colors.
//!
//! The fan-out hub never touches storage; only the request handlers for posting,
//! history, login, and profile updates do.  All methods block, so async callers run
//! them on `tokio::task::spawn_blocking`.
mod err;
mod mem;
mod postgres;

pub use err::StoreErr;
pub use mem::MemStore;
pub use postgres::PgPool;

use crate::message::ChatMessage;

/// How many messages one page of history holds
pub const HISTORY_PAGE: i64 = 30;

pub type Result<T> = std::result::Result<T, StoreErr>;

pub trait Store: Send + Sync {
    /// Record a message and return the id the database assigned it
    fn append_message(&self, content: &str, pod: &str, nickname: &str) -> Result<i64>;

    /// Insert or replace the color stored for `nickname`
    fn upsert_user_color(&self, nickname: &str, color: &str) -> Result<()>;

    fn select_user_color(&self, nickname: &str) -> Result<Option<String>>;

    /// Newest first, at most `limit` messages, only ids below `before_id` when given
    fn select_history(&self, before_id: Option<i64>, limit: i64) -> Result<Vec<ChatMessage>>;
}
