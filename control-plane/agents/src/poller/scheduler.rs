//! Bookkeeping of which node is pulled next.
//!
//! Nodes waiting for a pull live in a plain FIFO queue rather than a priority queue:
//! new nodes are pushed to the front and nodes whose pull completed are pushed to the
//! back. With a constant poll period this keeps the queue roughly ordered by due time,
//! which is what allows the dispatch scan to stop at the first node which is not due.
//!
//! Removing a node only removes it from the registry. Leftover queue entries are dropped
//! when they reach the front of the queue.

use super::{
    state::{Epoch, PullState},
    NodeAddress, NodeId,
};
use crate::errors::PollerError;
use std::collections::{HashMap, VecDeque};

/// A node which is currently part of the cluster.
#[derive(Debug)]
struct Registration {
    epoch: Epoch,
}

/// Registry of the nodes to poll, with their pull queue and in-flight pulls.
#[derive(Debug)]
pub(crate) struct PullScheduler {
    max_concurrent_pulls: usize,
    poll_period_ms: i64,
    /// Live nodes.
    nodes: HashMap<NodeId, Registration>,
    /// Nodes awaiting their next pull, may contain entries of removed nodes.
    to_pull: VecDeque<PullState>,
    /// Pulls dispatched to the transport and not yet completed, by registration epoch.
    in_flight: HashMap<Epoch, PullState>,
    next_epoch: Epoch,
}

impl PullScheduler {
    /// Create a new empty `Self`.
    pub(crate) fn new(max_concurrent_pulls: usize, poll_period_ms: i64) -> Self {
        Self {
            max_concurrent_pulls,
            poll_period_ms,
            nodes: HashMap::new(),
            to_pull: VecDeque::new(),
            in_flight: HashMap::new(),
            next_epoch: 0,
        }
    }

    /// Register a new node which must be pulled as soon as possible, with a full report.
    pub(crate) fn node_added(
        &mut self,
        node_id: &NodeId,
        address: NodeAddress,
    ) -> Result<(), PollerError> {
        if self.nodes.contains_key(node_id) {
            return Err(PollerError::NodeAddedTwice {
                node_id: node_id.clone(),
            });
        }
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        self.nodes.insert(node_id.clone(), Registration { epoch });
        self.to_pull
            .push_front(PullState::new(node_id.clone(), address, epoch));
        tracing::debug!(node.id = %node_id, "Node was added");
        Ok(())
    }

    /// Forget about a node.
    /// Its queued entry or in-flight pull is dropped lazily.
    pub(crate) fn node_removed(&mut self, node_id: &NodeId) -> bool {
        let removed = self.nodes.remove(node_id).is_some();
        tracing::debug!(
            node.id = %node_id,
            remaining = self.nodes.len(),
            "Node removed"
        );
        removed
    }

    /// Take the nodes which should be pulled now, within the concurrency budget.
    /// The returned nodes are accounted as in flight until `pull_complete` is called.
    pub(crate) fn next_pulls(&mut self, now: i64) -> Vec<PullState> {
        let mut pulls = vec![];
        while self.in_flight.len() < self.max_concurrent_pulls {
            let Some(front) = self.to_pull.front() else {
                break;
            };
            if front.is_pending(now) {
                break;
            }
            let Some(state) = self.to_pull.pop_front() else {
                break;
            };
            if !self.is_live(&state) {
                tracing::debug!(
                    node.id = %state.node_id(),
                    "Node was already removed from the cluster. Ignoring."
                );
                continue;
            }
            self.in_flight.insert(state.epoch(), state.clone());
            pulls.push(state);
        }
        pulls
    }

    /// Account for the completion of the pull of `state`, completed at `now`.
    /// The node is queued again unless it was removed in the meantime.
    pub(crate) fn pull_complete(&mut self, mut state: PullState, need_full_report: bool, now: i64) {
        self.in_flight.remove(&state.epoch());

        if !self.is_live(&state) {
            tracing::debug!(
                node.id = %state.node_id(),
                "Pull finished, but node was already removed from the cluster. Ignoring."
            );
            return;
        }

        // On errors we don't trust the node's incremental state anymore.
        if need_full_report {
            state.reset();
        } else {
            state.schedule(now.saturating_add(self.poll_period_ms));
        }
        self.to_pull.push_back(state);
    }

    /// Abandon all in-flight pulls.
    /// The nodes which are still live go back to the front of the queue, and their next pull
    /// asks for a full report, as the outcome of the abandoned pull is unknown.
    pub(crate) fn requeue_in_flight(&mut self) {
        let mut abandoned = self.in_flight.drain().map(|(_, s)| s).collect::<Vec<_>>();
        abandoned.sort_by_key(|s| std::cmp::Reverse(s.epoch()));
        for mut state in abandoned {
            if self.is_live(&state) {
                state.reset();
                self.to_pull.push_front(state);
            }
        }
    }

    /// Number of live nodes.
    pub(crate) fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
    /// Number of pulls in flight.
    pub(crate) fn inflight_pulls(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if `state` belongs to the current registration of its node.
    fn is_live(&self, state: &PullState) -> bool {
        self.nodes
            .get(state.node_id())
            .map(|r| r.epoch == state.epoch())
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn queued(&self) -> Vec<&NodeId> {
        self.to_pull.iter().map(|s| s.node_id()).collect()
    }
}
