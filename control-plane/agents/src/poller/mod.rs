//! Resource report poller.
//!
//! Periodically pulls the resource report of every cluster node and hands the reports
//! over to a `ReportSink`, with at most `max_concurrent_pulls` pulls in flight.
//!
//! A node which was never pulled, or whose last pull failed, is asked for a full report.
//! Otherwise it's pulled again (incrementally) one poll period after its last pull
//! completed. Cluster membership is pushed in via `node_added` and `node_removed`, which
//! may be called from any thread.
//!
//! All the scheduling happens on a dedicated thread, which runs the poller loop.

mod clock;
mod config;
mod http;
mod scheduler;
mod state;
mod transport;
mod types;
mod worker;

pub use clock::{Clock, SystemClock};
pub use config::PollerConfig;
pub use http::HttpTransport;
pub use transport::{PullError, ReportSink, ReportTransport};
pub use types::{NodeAddress, NodeId, NodeInfo, ResourceReport};

use crate::errors::PollerError;
use parking_lot::Mutex;
use scheduler::PullScheduler;
use std::{sync::Arc, thread::JoinHandle};
use worker::{PollContext, PollEvent, PollTriggerEvent, PollWorker, Shared};

/// Polls the resource reports of all the cluster nodes.
pub struct ResourceReportPoller {
    context: Arc<PollContext>,
    /// The poller loop thread, if started.
    /// Start and stop are serialised through this lock.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ResourceReportPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceReportPoller")
            .field("context", &self.context)
            .finish()
    }
}

impl ResourceReportPoller {
    /// Create a new `Self` which pulls reports through `transport` and hands them over
    /// to `sink`.
    pub fn new(
        config: PollerConfig,
        transport: Arc<dyn ReportTransport>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self::with_clock(config, transport, sink, Arc::new(SystemClock::default()))
    }

    /// Same as `new`, but reading the time from the given clock.
    pub fn with_clock(
        config: PollerConfig,
        transport: Arc<dyn ReportTransport>,
        sink: Arc<dyn ReportSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let scheduler = PullScheduler::new(config.max_concurrent_pulls(), config.poll_period_ms());
        Self {
            context: Arc::new(PollContext {
                config,
                clock,
                transport,
                sink,
                shared: Mutex::new(Shared {
                    scheduler,
                    events: None,
                }),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Seed the poller with the nodes which are already part of the cluster.
    pub fn initialize<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a NodeInfo>,
    ) -> Result<(), PollerError> {
        nodes.into_iter().try_for_each(|node| self.node_added(node))
    }

    /// Start the poller loop on its own thread.
    pub fn start(&self) -> Result<(), PollerError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(PollerError::AlreadyStarted);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| PollerError::Runtime { source })?;

        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        let poll_worker = PollWorker::new(self.context.clone(), sender.clone(), receiver);
        let name = utils::RESOURCE_REPORT_POLLER_THREAD.to_string();

        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                runtime.block_on(poll_worker.poller());
            })
            .map_err(|source| PollerError::SpawnWorker { name, source })?;

        {
            let mut shared = self.context.shared.lock();
            shared.events = Some(sender);
            shared.notify(PollTriggerEvent::Started);
        }
        *worker = Some(handle);

        tracing::info!(
            max_concurrent_pulls = self.context.config.max_concurrent_pulls(),
            poll_period = ?self.context.config.poll_period(),
            "Started the resource report poller"
        );
        Ok(())
    }

    /// Stop the poller loop and wait for its thread to finish.
    /// Pulls which are still in flight are abandoned, and their nodes will be asked for a
    /// full report once the poller is started again.
    /// Does nothing if the poller is not running.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(handle) = worker.take() else {
            return;
        };

        if let Some(events) = self.context.shared.lock().events.take() {
            events.send(PollEvent::Shutdown).ok();
        }
        if handle.join().is_err() {
            tracing::error!("The resource report poller thread has panicked");
        }

        self.context.shared.lock().scheduler.requeue_in_flight();
        tracing::info!("Stopped the resource report poller");
    }

    /// Check if the poller loop is running.
    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Handle the addition of a node to the cluster.
    /// The node is pulled as soon as the concurrency budget allows it.
    ///
    /// A node which is already known is a bug in the membership source, and so
    /// `PollerError::NodeAddedTwice` should be treated as fatal.
    pub fn node_added(&self, node: &NodeInfo) -> Result<(), PollerError> {
        let mut shared = self.context.shared.lock();
        shared.scheduler.node_added(&node.node_id, node.address())?;
        shared.notify(PollTriggerEvent::NodeAdded);
        Ok(())
    }

    /// Handle the removal of a node from the cluster.
    /// An in-flight pull of the node is not cancelled, but the node is not pulled again.
    pub fn node_removed(&self, node_id: &NodeId) {
        self.context.shared.lock().scheduler.node_removed(node_id);
    }

    /// Number of nodes currently being polled.
    pub fn num_nodes(&self) -> usize {
        self.context.shared.lock().scheduler.num_nodes()
    }

    /// Number of pulls currently in flight.
    pub fn inflight_pulls(&self) -> usize {
        self.context.shared.lock().scheduler.inflight_pulls()
    }
}

impl Drop for ResourceReportPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
