use super::{NodeAddress, NodeId};

/// Registration epoch of a node.
/// Each time a node is added it gets a new epoch, which allows telling apart the
/// bookkeeping of a re-added node from leftovers of its previous incarnation.
pub(crate) type Epoch = u64;

/// Polling bookkeeping of a single node.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct PullState {
    node_id: NodeId,
    address: NodeAddress,
    epoch: Epoch,
    /// Epoch milliseconds at which the node becomes eligible for its next pull.
    /// None means the node has not been successfully pulled, and so a full report is needed.
    next_pull_time: Option<i64>,
}

impl PullState {
    /// New state for a node which has never been pulled.
    pub(crate) fn new(node_id: NodeId, address: NodeAddress, epoch: Epoch) -> Self {
        Self {
            node_id,
            address,
            epoch,
            next_pull_time: None,
        }
    }
    /// Get the node id.
    pub(crate) fn node_id(&self) -> &NodeId {
        &self.node_id
    }
    /// Get the node address.
    pub(crate) fn address(&self) -> &NodeAddress {
        &self.address
    }
    /// Get the registration epoch.
    pub(crate) fn epoch(&self) -> Epoch {
        self.epoch
    }
    /// Get the next pull time.
    pub(crate) fn next_pull_time(&self) -> Option<i64> {
        self.next_pull_time
    }
    /// The next pull must ask for the complete report rather than a delta.
    pub(crate) fn needs_full_report(&self) -> bool {
        self.next_pull_time.is_none()
    }
    /// Check if the node is not yet eligible for a pull at `now`.
    pub(crate) fn is_pending(&self, now: i64) -> bool {
        matches!(self.next_pull_time, Some(next) if now < next)
    }
    /// Demand a full report on the next pull, which is then due immediately.
    pub(crate) fn reset(&mut self) {
        self.next_pull_time = None;
    }
    /// Schedule the next incremental pull.
    pub(crate) fn schedule(&mut self, next_pull_time: i64) {
        self.next_pull_time = Some(next_pull_time);
    }
}
