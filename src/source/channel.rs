//! Channel-based data source.
//!
//! Replies are pushed through a tokio channel instead of being produced by
//! a backend. Submitted requests are recorded so a driver (a test, or an
//! embedding application) can answer them.

use tokio::sync::mpsc;

use super::{DataSource, Reply, Request};

/// A data source fed by an in-memory channel.
///
/// # Example
///
/// ```
/// use slowquery_console::source::{ChannelSource, DataSource, Reply, Request, Update};
///
/// let (tx, mut source) = ChannelSource::create("memory");
/// source.submit(1, Request::MonitorStatus);
/// assert_eq!(source.take_submitted(), vec![(1, Request::MonitorStatus)]);
///
/// tx.send(Reply::answer(1, Update::RdsInstances(Ok(Vec::new())))).unwrap();
/// assert!(source.poll().is_some());
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<Reply>,
    description: String,
    submitted: Vec<(u64, Request)>,
    disconnected: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// # Arguments
    ///
    /// * `receiver` - The receiving end of a reply channel
    /// * `source_description` - A description of where replies come from
    pub fn new(receiver: mpsc::UnboundedReceiver<Reply>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            submitted: Vec::new(),
            disconnected: false,
        }
    }

    /// Create a channel pair for sending replies to a ChannelSource.
    pub fn create(source_description: &str) -> (mpsc::UnboundedSender<Reply>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, source_description))
    }

    /// Requests submitted since the last call, in submission order.
    pub fn take_submitted(&mut self) -> Vec<(u64, Request)> {
        std::mem::take(&mut self.submitted)
    }
}

impl DataSource for ChannelSource {
    fn submit(&mut self, seq: u64, request: Request) {
        self.submitted.push((seq, request));
    }

    fn poll(&mut self) -> Option<Reply> {
        match self.receiver.try_recv() {
            Ok(reply) => Some(reply),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.disconnected = true;
                None
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.disconnected.then_some("Reply channel closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Update;

    #[test]
    fn test_channel_source_poll() {
        let (tx, mut source) = ChannelSource::create("test");

        // Nothing sent yet
        assert!(source.poll().is_none());

        tx.send(Reply::answer(3, Update::RdsInstances(Ok(Vec::new()))))
            .unwrap();
        let reply = source.poll().unwrap();
        assert_eq!(reply.seq, Some(3));

        // Drained
        assert!(source.poll().is_none());
        assert!(source.error().is_none());

        drop(tx);
        assert!(source.poll().is_none());
        assert_eq!(source.error(), Some("Reply channel closed"));
    }

    #[test]
    fn test_submitted_requests_are_recorded() {
        let (_tx, mut source) = ChannelSource::create("test");
        source.submit(1, Request::AwsInfo);
        source.submit(2, Request::RdsInstances);

        let submitted = source.take_submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[1], (2, Request::RdsInstances));
        assert!(source.take_submitted().is_empty());
        assert_eq!(source.description(), "channel: test");
    }
}
