use crate::poller::NodeId;
use snafu::Snafu;

/// Errors returned by the resource report poller.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum PollerError {
    /// The membership source added a node which is already known.
    /// This signals a bug in the source of truth and cannot be recovered from.
    #[snafu(display("Node with id '{}' was added twice", node_id))]
    NodeAddedTwice { node_id: NodeId },
    /// The poller is already running.
    #[snafu(display("The resource report poller has already been started"))]
    AlreadyStarted,
    /// Failed to build the poller loop runtime.
    #[snafu(display("Failed to build the poller runtime. Error {}", source))]
    Runtime { source: std::io::Error },
    /// Failed to spawn the poller loop thread.
    #[snafu(display("Failed to spawn the poller thread '{}'. Error {}", name, source))]
    SpawnWorker {
        name: String,
        source: std::io::Error,
    },
}

impl PollerError {
    /// Check if this error is an invariant violation rather than an operational failure.
    /// Such errors must not be absorbed: the caller is expected to terminate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NodeAddedTwice { .. })
    }
}
