use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ID of a cluster node.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl NodeId {
    /// Get the id as a str.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}
impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}
impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> NodeId {
        id.clone()
    }
}
impl From<NodeId> for String {
    fn from(id: NodeId) -> String {
        id.0
    }
}

/// The endpoint of a node's resource report service.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct NodeAddress {
    /// Opaque routing identifier of the node.
    pub node_id: NodeId,
    /// Host address.
    pub ip_address: String,
    /// Service port.
    pub port: u16,
}

/// Formats as `host:port`, with IPv6 addresses in brackets.
impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ip_address.parse::<std::net::IpAddr>() {
            Ok(ip) => write!(f, "{}", std::net::SocketAddr::new(ip, self.port)),
            Err(_) => write!(f, "{}:{}", self.ip_address, self.port),
        }
    }
}

/// A cluster node, as published by the cluster membership source.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct NodeInfo {
    /// Id of the node.
    pub node_id: NodeId,
    /// Address of the node's manager service.
    pub node_manager_address: String,
    /// Port of the node's manager service.
    pub node_manager_port: u16,
}

impl NodeInfo {
    /// Create a new `Self`.
    pub fn new(node_id: impl Into<NodeId>, address: impl Into<String>, port: u16) -> Self {
        Self {
            node_id: node_id.into(),
            node_manager_address: address.into(),
            node_manager_port: port,
        }
    }
    /// Get the address used to reach the node.
    pub fn address(&self) -> NodeAddress {
        NodeAddress {
            node_id: self.node_id.clone(),
            ip_address: self.node_manager_address.clone(),
            port: self.node_manager_port,
        }
    }
}

/// Resource usage report of a node.
/// The poller itself never looks at the contents, it only forwards them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResourceReport {
    /// Id of the reporting node.
    pub node_id: NodeId,
    /// Total amount of each resource on the node.
    #[serde(default)]
    pub resources_total: HashMap<String, f64>,
    /// Currently available amount of each resource on the node.
    #[serde(default)]
    pub resources_available: HashMap<String, f64>,
    /// Pending demand for each resource on the node.
    #[serde(default)]
    pub resource_load: HashMap<String, f64>,
    /// Whether the available resources changed since the last report.
    #[serde(default)]
    pub resources_available_changed: bool,
}

impl ResourceReport {
    /// Create a new empty report for the given node.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Default::default()
        }
    }
}

