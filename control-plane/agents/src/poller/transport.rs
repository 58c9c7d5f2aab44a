use super::{NodeAddress, ResourceReport};
use snafu::Snafu;

/// Outcome of a resource report request which did not yield a report.
#[derive(Debug, Snafu)]
#[allow(missing_docs)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum PullError {
    /// The node's resources have not changed since its last report.
    /// This is not a failure, there is simply nothing to forward.
    #[snafu(display("Resources not changed"))]
    Unchanged,
    /// The request did not complete in time.
    #[snafu(display("Timed out after {:?} waiting for the resource report", timeout))]
    Timeout { timeout: std::time::Duration },
    /// The node could not be reached.
    #[snafu(display("Failed to reach node at '{}'. Error {}", endpoint, source))]
    Unreachable {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The node replied with an unexpected status.
    #[snafu(display("Node replied with unexpected status {}", status))]
    Status { status: u16 },
    /// The node address does not make a valid endpoint.
    #[snafu(display("Invalid node address '{}'. Error {}", address, source))]
    InvalidAddress {
        address: String,
        source: url::ParseError,
    },
    /// The reply could not be understood.
    #[snafu(display("Invalid resource report reply: {}", reason))]
    BadReply { reason: String },
    /// The transport panicked while requesting the report.
    #[snafu(display("Resource report request panicked: {}", reason))]
    Panicked { reason: String },
}

impl PullError {
    /// Check if this is the "nothing changed since the last report" outcome.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// Transport used to request the resource report of a node.
#[async_trait::async_trait]
pub trait ReportTransport: Send + Sync {
    /// Request the resource report of the node at `address`.
    /// When `full_report` is false the node may answer with `PullError::Unchanged`.
    async fn request_report(
        &self,
        address: &NodeAddress,
        full_report: bool,
    ) -> Result<ResourceReport, PullError>;
}

/// Receiver of every successfully pulled resource report.
/// It's called from the poller loop, so it should not block.
pub trait ReportSink: Send + Sync {
    /// Handle a received report.
    fn on_report(&self, report: ResourceReport);
}

impl<F> ReportSink for F
where
    F: Fn(ResourceReport) + Send + Sync,
{
    fn on_report(&self, report: ResourceReport) {
        self(report)
    }
}
