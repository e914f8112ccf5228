//! Data source abstraction between the UI loop and the backend.
//!
//! The UI loop is synchronous and must never block on the network. It
//! submits [`Request`]s to a [`DataSource`] and drains [`Reply`]s from it on
//! every tick. [`BackendSource`] performs the requests on a tokio runtime;
//! [`ChannelSource`] is fed by hand, for tests and embedding.

mod backend;
mod channel;
mod request;

pub use backend::{fetch_statistics, BackendSource};
pub use channel::ChannelSource;
pub use request::{markdown_file_name, Reply, Request, Slot, Update};

use std::fmt::Debug;

/// Trait for exchanging requests and replies with a backend.
///
/// # Example
///
/// ```
/// use slowquery_console::source::{ChannelSource, DataSource, Request};
///
/// let (_tx, mut source) = ChannelSource::create("memory");
/// source.submit(1, Request::RdsInstances);
/// assert!(source.poll().is_none());
/// ```
pub trait DataSource: Send + Debug {
    /// Queue a request. `seq` is echoed in the reply.
    ///
    /// This method must not block.
    fn submit(&mut self, seq: u64, request: Request);

    /// Poll for the next reply.
    ///
    /// Returns `Some(reply)` if one is available, `None` otherwise.
    /// This method should be non-blocking.
    fn poll(&mut self) -> Option<Reply>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Check if the source itself has failed (as opposed to a request).
    fn error(&self) -> Option<&str>;
}
