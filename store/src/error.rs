//! Error types for store operations.

use thiserror::Error;

/// Errors surfaced by [`EventLogStore`](crate::EventLogStore) operations.
///
/// Note that the append hot path never returns these: disk and rotation
/// failures inside the writer task are logged and swallowed by design.
/// They only surface from explicit lifecycle calls such as
/// [`hydrate`](crate::EventLogStore::hydrate).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the log directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store lifecycle was driven out of order.
    #[error("Store lifecycle error: {0}")]
    Lifecycle(String),
}
