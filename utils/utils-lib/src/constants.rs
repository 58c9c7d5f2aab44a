/// Various common constants used by the control plane.

/// Default request timeout for a node resource report request.
pub const DEFAULT_REQ_TIMEOUT: &str = "5s";

/// Default connection timeout for a node connection.
pub const DEFAULT_CONN_TIMEOUT: &str = "1s";

/// The maximum number of resource report pulls which may be in flight at any given time,
/// across the whole cluster.
pub const MAX_CONCURRENT_RESOURCE_PULLS: usize = 100;

/// The period at which each node's resource report is pulled once the node has been
/// successfully polled.
pub const RESOURCE_REPORT_POLL_PERIOD: &str = "100ms";

/// The period at which the resource report poller checks for nodes which are due a pull.
/// This is independent of the per-node poll period.
pub const RESOURCE_REPORT_TICK_PERIOD: &str = "10ms";

/// The name of the resource report poller thread.
pub const RESOURCE_REPORT_POLLER_THREAD: &str = "resource_report_poller";

/// The http path which serves a node's resource report.
pub const RESOURCE_REPORT_PATH: &str = "/v1/resource-report";

/// The http header which carries the routing id of the target node.
pub const NODE_ID_HEADER: &str = "x-node-id";

/// The period at which the cluster membership source is re-read.
pub const MEMBERSHIP_POLL_PERIOD: &str = "1s";

/// The default cluster membership file.
pub const DEFAULT_MEMBERSHIP_FILE: &str = "/var/run/cluster/nodes.json";
