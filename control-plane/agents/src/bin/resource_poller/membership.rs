use agents::poller::{NodeId, NodeInfo};
use anyhow::Context;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Cluster membership source backed by a json file with the list of nodes.
#[derive(Debug, Clone)]
pub(crate) struct MembershipFile {
    path: PathBuf,
}

impl MembershipFile {
    /// Create a new `Self` for the file at `path`.
    pub(crate) fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
    /// Read the current cluster nodes.
    pub(crate) async fn read(&self) -> anyhow::Result<Vec<NodeInfo>> {
        let contents = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read membership file {:?}", self.path))?;
        serde_json::from_slice(&contents)
            .with_context(|| format!("Invalid membership file {:?}", self.path))
    }
}

/// Changes between two membership snapshots.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct MembershipDiff {
    pub(crate) removed: Vec<NodeId>,
    pub(crate) added: Vec<NodeInfo>,
}

impl MembershipDiff {
    pub(crate) fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// The last known cluster membership.
#[derive(Debug, Default)]
pub(crate) struct Membership {
    nodes: HashMap<NodeId, NodeInfo>,
}

impl Membership {
    /// Replace the known membership with the `snapshot`, returning what changed.
    /// A node whose address changed is removed and added again.
    pub(crate) fn update(&mut self, snapshot: Vec<NodeInfo>) -> MembershipDiff {
        let snapshot = snapshot
            .into_iter()
            .map(|node| (node.node_id.clone(), node))
            .collect::<HashMap<_, _>>();

        let mut diff = MembershipDiff::default();
        for (id, known) in &self.nodes {
            match snapshot.get(id) {
                Some(node) if node == known => {}
                Some(node) => {
                    diff.removed.push(id.clone());
                    diff.added.push(node.clone());
                }
                None => diff.removed.push(id.clone()),
            }
        }
        for (id, node) in &snapshot {
            if !self.nodes.contains_key(id) {
                diff.added.push(node.clone());
            }
        }
        diff.removed.sort();
        diff.added.sort_by(|a, b| a.node_id.cmp(&b.node_id));

        self.nodes = snapshot;
        diff
    }
}
