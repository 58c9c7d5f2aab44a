use agents::{
    errors::PollerError,
    poller::{
        Clock, NodeAddress, NodeId, NodeInfo, PollerConfig, PullError, ReportSink,
        ReportTransport, ResourceReport, ResourceReportPoller,
    },
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::oneshot;

const POLL_PERIOD: Duration = Duration::from_millis(100);
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A clock which only moves when told to.
#[derive(Debug, Default)]
struct ManualClock {
    now: AtomicI64,
}
impl ManualClock {
    fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

type Reply = Result<ResourceReport, PullError>;

/// Transport whose requests only complete when the test says so.
#[derive(Debug, Default)]
struct ScriptedTransport {
    requests: Mutex<Vec<(NodeId, bool)>>,
    pending: Mutex<HashMap<NodeId, oneshot::Sender<Reply>>>,
    /// Highest number of requests outstanding at the same time.
    max_outstanding: Mutex<usize>,
}

#[async_trait::async_trait]
impl ReportTransport for ScriptedTransport {
    async fn request_report(&self, address: &NodeAddress, full_report: bool) -> Reply {
        let (sender, receiver) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            // a request abandoned by a stopped poller leaves a closed sender behind
            if let Some(previous) = pending.insert(address.node_id.clone(), sender) {
                assert!(
                    previous.is_closed(),
                    "node {} pulled twice concurrently",
                    address.node_id
                );
            }
            let mut max = self.max_outstanding.lock();
            *max = (*max).max(pending.len());
            self.requests
                .lock()
                .push((address.node_id.clone(), full_report));
        }
        receiver.await.unwrap_or(Err(PullError::Status { status: 503 }))
    }
}

impl ScriptedTransport {
    fn requests(&self) -> Vec<(NodeId, bool)> {
        self.requests.lock().clone()
    }
    fn requests_of(&self, node: &str) -> Vec<bool> {
        self.requests
            .lock()
            .iter()
            .filter(|(id, _)| id.as_str() == node)
            .map(|(_, full)| *full)
            .collect()
    }
    fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }
    /// Complete the outstanding request of the given node.
    fn reply(&self, node: &str, reply: Reply) {
        let sender = self
            .pending
            .lock()
            .remove(&NodeId::from(node))
            .expect("request of the node should be outstanding");
        sender.send(reply).expect("request should still be awaited");
    }
}

/// Collects every report handed over by the poller.
#[derive(Debug, Default)]
struct Reports {
    reports: Mutex<Vec<ResourceReport>>,
}
impl ReportSink for Reports {
    fn on_report(&self, report: ResourceReport) {
        self.reports.lock().push(report);
    }
}
impl Reports {
    fn count(&self) -> usize {
        self.reports.lock().len()
    }
}

struct Cluster {
    poller: ResourceReportPoller,
    transport: Arc<ScriptedTransport>,
    reports: Arc<Reports>,
    clock: Arc<ManualClock>,
}

impl Cluster {
    fn new(max_concurrent_pulls: usize) -> Self {
        let transport = Arc::new(ScriptedTransport::default());
        let reports = Arc::new(Reports::default());
        let clock = Arc::new(ManualClock::default());
        clock.set(1_000);
        let config = PollerConfig::default()
            .with_max_concurrent_pulls(max_concurrent_pulls)
            .with_poll_period(POLL_PERIOD)
            .with_tick_period(Duration::from_millis(2));
        let poller = ResourceReportPoller::with_clock(
            config,
            transport.clone(),
            reports.clone(),
            clock.clone(),
        );
        Self {
            poller,
            transport,
            reports,
            clock,
        }
    }
    fn started(max_concurrent_pulls: usize) -> Self {
        let cluster = Self::new(max_concurrent_pulls);
        cluster.poller.start().expect("poller should start");
        cluster
    }
    fn add(&self, node: &str) {
        self.poller.node_added(&node_info(node)).unwrap();
    }
    fn remove(&self, node: &str) {
        self.poller.node_removed(&NodeId::from(node));
    }
}

fn node_info(node: &str) -> NodeInfo {
    NodeInfo::new(node, "10.1.0.1", 8076)
}

/// Wait until the condition is met, or panic after a while.
async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let result = tokio::time::timeout(WAIT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for: {what}");
}

/// Give the poller loop the chance to do something it should not do.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn admission_bound() {
    let cluster = Cluster::started(2);
    cluster.add("a");
    wait_for("a pulled", || cluster.transport.outstanding() == 1).await;
    cluster.add("b");
    wait_for("b pulled", || cluster.transport.outstanding() == 2).await;
    cluster.add("c");

    settle().await;
    assert_eq!(
        cluster.transport.requests(),
        vec![(NodeId::from("a"), true), (NodeId::from("b"), true)]
    );
    assert_eq!(cluster.poller.inflight_pulls(), 2);

    cluster.transport.reply("a", Ok(ResourceReport::new("a")));
    wait_for("c pulled", || cluster.transport.requests_of("c") == vec![true]).await;
    wait_for("report received", || cluster.reports.count() == 1).await;
    assert_eq!(cluster.reports.reports.lock()[0].node_id, NodeId::from("a"));
    assert_eq!(*cluster.transport.max_outstanding.lock(), 2);
}

#[tokio::test]
async fn newest_nodes_are_pulled_first() {
    let cluster = Cluster::new(2);
    cluster.add("a");
    cluster.add("b");
    cluster.add("c");
    cluster.poller.start().unwrap();

    wait_for("two nodes pulled", || cluster.transport.outstanding() == 2).await;
    settle().await;
    let mut requests = cluster.transport.requests();
    requests.sort();
    assert_eq!(
        requests,
        vec![(NodeId::from("b"), true), (NodeId::from("c"), true)]
    );
    assert_eq!(cluster.transport.requests_of("a"), Vec::<bool>::new());
}

/// Fails the very first request by panicking, and answers every other one.
#[derive(Debug, Default)]
struct PanickingTransport {
    requests: Mutex<Vec<(NodeId, bool)>>,
}

#[async_trait::async_trait]
impl ReportTransport for PanickingTransport {
    async fn request_report(&self, address: &NodeAddress, full_report: bool) -> Reply {
        let first = {
            let mut requests = self.requests.lock();
            requests.push((address.node_id.clone(), full_report));
            requests.len() == 1
        };
        if first {
            panic!("transport failure for node {}", address.node_id);
        }
        Ok(ResourceReport::new(address.node_id.clone()))
    }
}

#[tokio::test]
async fn panicking_transport_fails_only_its_pull() {
    let transport = Arc::new(PanickingTransport::default());
    let reports = Arc::new(Reports::default());
    let clock = Arc::new(ManualClock::default());
    clock.set(1_000);
    let config = PollerConfig::default()
        .with_max_concurrent_pulls(1)
        .with_poll_period(POLL_PERIOD)
        .with_tick_period(Duration::from_millis(2));
    let poller =
        ResourceReportPoller::with_clock(config, transport.clone(), reports.clone(), clock);
    poller.node_added(&node_info("a")).unwrap();
    poller.node_added(&node_info("b")).unwrap();
    poller.start().unwrap();

    wait_for("both nodes reported", || reports.count() == 2).await;
    wait_for("pulls completed", || poller.inflight_pulls() == 0).await;
    // the panicked node is demoted to a full report and retried after the other node
    assert_eq!(
        *transport.requests.lock(),
        vec![
            (NodeId::from("b"), true),
            (NodeId::from("a"), true),
            (NodeId::from("b"), true)
        ]
    );
    poller.stop();
}

#[tokio::test]
async fn failure_demands_full_report() {
    let cluster = Cluster::started(2);
    cluster.add("a");
    wait_for("a pulled", || cluster.transport.outstanding() == 1).await;

    cluster.transport.reply("a", Err(PullError::Status { status: 500 }));
    // the failed node is due again straight away, regardless of the clock
    wait_for("a pulled again", || {
        cluster.transport.requests_of("a") == vec![true, true]
    })
    .await;
    assert_eq!(cluster.reports.count(), 0);

    cluster.transport.reply("a", Ok(ResourceReport::new("a")));
    wait_for("report received", || cluster.reports.count() == 1).await;
    wait_for("a rescheduled", || cluster.poller.inflight_pulls() == 0).await;
    cluster.clock.set(1_000 + POLL_PERIOD.as_millis() as i64);
    wait_for("a pulled incrementally", || {
        cluster.transport.requests_of("a") == vec![true, true, false]
    })
    .await;
}

#[tokio::test]
async fn unchanged_is_not_forwarded() {
    let cluster = Cluster::started(2);
    cluster.add("b");
    wait_for("b pulled", || cluster.transport.outstanding() == 1).await;
    cluster.transport.reply("b", Ok(ResourceReport::new("b")));
    wait_for("b rescheduled", || cluster.poller.inflight_pulls() == 0).await;

    cluster.clock.set(1_100);
    wait_for("b pulled again", || cluster.transport.outstanding() == 1).await;
    assert_eq!(cluster.transport.requests_of("b"), vec![true, false]);

    cluster.transport.reply("b", Err(PullError::Unchanged));
    wait_for("b rescheduled", || cluster.poller.inflight_pulls() == 0).await;
    assert_eq!(cluster.reports.count(), 1);

    // next pull is due one poll period after the completion
    cluster.clock.set(1_199);
    settle().await;
    assert_eq!(cluster.transport.outstanding(), 0);
    cluster.clock.set(1_200);
    wait_for("b pulled a third time", || {
        cluster.transport.requests_of("b") == vec![true, false, false]
    })
    .await;
}

#[tokio::test]
async fn queued_removal_is_never_pulled() {
    let cluster = Cluster::new(1);
    cluster.add("a");
    cluster.add("b");
    cluster.remove("b");
    assert_eq!(cluster.poller.num_nodes(), 1);
    cluster.poller.start().unwrap();

    wait_for("a pulled", || cluster.transport.outstanding() == 1).await;
    cluster.transport.reply("a", Ok(ResourceReport::new("a")));
    wait_for("report received", || cluster.reports.count() == 1).await;
    settle().await;

    assert_eq!(cluster.transport.requests_of("b"), Vec::<bool>::new());
    assert_eq!(cluster.poller.inflight_pulls(), 0);
}

#[tokio::test]
async fn in_flight_removal() {
    let cluster = Cluster::started(1);
    cluster.add("a");
    wait_for("a pulled", || cluster.transport.outstanding() == 1).await;
    cluster.remove("a");

    cluster.transport.reply("a", Ok(ResourceReport::new("a")));
    wait_for("pull completed", || cluster.poller.inflight_pulls() == 0).await;

    cluster.clock.set(i64::MAX / 2);
    settle().await;
    assert_eq!(cluster.transport.requests_of("a"), vec![true]);
    assert_eq!(cluster.poller.num_nodes(), 0);
}

#[tokio::test]
async fn readded_node_is_fresh() {
    let cluster = Cluster::started(4);
    cluster.add("a");
    wait_for("a pulled", || cluster.transport.outstanding() == 1).await;
    cluster.transport.reply("a", Ok(ResourceReport::new("a")));
    wait_for("report received", || cluster.reports.count() == 1).await;

    cluster.remove("a");
    cluster.add("a");
    wait_for("a pulled again", || {
        cluster.transport.requests_of("a") == vec![true, true]
    })
    .await;
}

#[tokio::test]
async fn duplicate_add_is_fatal() {
    let cluster = Cluster::new(1);
    cluster
        .poller
        .initialize(&[node_info("a"), node_info("b")])
        .unwrap();
    let error = cluster.poller.node_added(&node_info("a")).unwrap_err();
    assert!(matches!(error, PollerError::NodeAddedTwice { .. }));
    assert!(error.is_fatal());
    assert_eq!(cluster.poller.num_nodes(), 2);
}

#[tokio::test]
async fn lifecycle() {
    let cluster = Cluster::new(2);
    // not started yet
    cluster.poller.stop();
    assert!(!cluster.poller.is_running());

    cluster.add("a");
    cluster.poller.start().unwrap();
    assert!(matches!(
        cluster.poller.start(),
        Err(PollerError::AlreadyStarted)
    ));
    wait_for("a pulled", || cluster.transport.outstanding() == 1).await;

    // the in-flight pull is abandoned with the loop
    cluster.poller.stop();
    assert!(!cluster.poller.is_running());
    assert_eq!(cluster.poller.inflight_pulls(), 0);
    assert!(cluster
        .transport
        .pending
        .lock()
        .values()
        .all(|sender| sender.is_closed()));

    cluster.poller.start().unwrap();
    wait_for("a pulled after restart", || {
        cluster.transport.requests_of("a") == vec![true, true]
    })
    .await;
    cluster.poller.stop();
}

#[tokio::test]
async fn rapid_start_stop() {
    let cluster = Cluster::new(2);
    cluster.add("a");
    for _ in 0..20 {
        cluster.poller.start().unwrap();
        cluster.poller.stop();
    }
    assert!(!cluster.poller.is_running());
    assert_eq!(cluster.poller.inflight_pulls(), 0);
    assert_eq!(cluster.poller.num_nodes(), 1);
}

#[tokio::test]
async fn membership_from_another_thread() {
    let cluster = Arc::new(Cluster::started(3));
    let adder = {
        let cluster = cluster.clone();
        std::thread::spawn(move || {
            for i in 0..10 {
                cluster.add(&format!("node-{i}"));
            }
        })
    };
    adder.join().unwrap();

    wait_for("budget used", || cluster.transport.outstanding() == 3).await;
    settle().await;
    assert_eq!(cluster.poller.inflight_pulls(), 3);
    assert_eq!(cluster.poller.num_nodes(), 10);

    // complete everything as it comes, until every node has reported once
    wait_for("all nodes reported", || {
        let pending = cluster
            .transport
            .pending
            .lock()
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        for id in pending {
            cluster
                .transport
                .reply(id.as_str(), Ok(ResourceReport::new(id.as_str())));
        }
        cluster.reports.count() >= 10
    })
    .await;
    assert_eq!(*cluster.transport.max_outstanding.lock(), 3);
    cluster.poller.stop();
}
