use agents::poller::{NodeId, ReportSink, ResourceReport};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// Latest resource report of each cluster node.
/// Only nodes which are currently part of the cluster are tracked, so a late report of a
/// removed node does not bring it back.
#[derive(Debug, Default)]
pub(crate) struct ClusterResources {
    nodes: RwLock<HashMap<NodeId, Option<ResourceReport>>>,
}

impl ClusterResources {
    /// Start tracking the given node, which has no report yet.
    pub(crate) fn track(&self, node_id: &NodeId) {
        self.nodes.write().entry(node_id.clone()).or_insert(None);
    }
    /// Stop tracking the given node and drop its report.
    pub(crate) fn forget(&self, node_id: &NodeId) {
        self.nodes.write().remove(node_id);
    }
    /// Get the latest report of the given node.
    #[cfg(test)]
    pub(crate) fn report(&self, node_id: &NodeId) -> Option<ResourceReport> {
        self.nodes.read().get(node_id).cloned().flatten()
    }

    /// Summarise the resources of the whole cluster.
    pub(crate) fn summary(&self) -> ClusterSummary {
        let nodes = self.nodes.read();
        let mut summary = ClusterSummary {
            nodes: nodes.len(),
            ..Default::default()
        };
        for report in nodes.values().flatten() {
            summary.reporting += 1;
            for (resource, amount) in &report.resources_total {
                *summary.total.entry(resource.clone()).or_default() += amount;
            }
            for (resource, amount) in &report.resources_available {
                *summary.available.entry(resource.clone()).or_default() += amount;
            }
        }
        summary
    }
}

impl ReportSink for ClusterResources {
    fn on_report(&self, report: ResourceReport) {
        let mut nodes = self.nodes.write();
        match nodes.get_mut(&report.node_id) {
            Some(latest) => *latest = Some(report),
            None => {
                tracing::debug!(node.id = %report.node_id, "Dropping report of an unknown node");
            }
        }
    }
}

/// Resources of the whole cluster.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ClusterSummary {
    /// Number of known nodes.
    pub(crate) nodes: usize,
    /// Number of nodes which have reported at least once.
    pub(crate) reporting: usize,
    pub(crate) total: BTreeMap<String, f64>,
    pub(crate) available: BTreeMap<String, f64>,
}

impl std::fmt::Display for ClusterSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} nodes reporting", self.reporting, self.nodes)?;
        for (resource, total) in &self.total {
            let available = self.available.get(resource).copied().unwrap_or_default();
            write!(f, ", {resource}: {available}/{total}")?;
        }
        Ok(())
    }
}
