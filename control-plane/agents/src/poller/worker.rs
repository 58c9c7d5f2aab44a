use super::{
    scheduler::PullScheduler, state::PullState, Clock, PollerConfig, PullError, ReportSink,
    ReportTransport, ResourceReport,
};
use futures::FutureExt;
use parking_lot::Mutex;
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Poll Event that identifies why the poller loop is woken up.
#[derive(Debug)]
pub(super) enum PollEvent {
    /// Tick period elapsed.
    TimedRun,
    /// Request triggered by another component.
    Triggered(PollTriggerEvent),
    /// A pull has completed and its node must be rescheduled.
    PullComplete(Box<PullCompletion>),
    /// Shutdown the poller loop.
    Shutdown,
}

/// Poll Trigger source.
#[derive(Debug, Clone)]
pub(super) enum PollTriggerEvent {
    /// A node was added, which must be pulled as soon as possible.
    NodeAdded,
    /// The poller loop has started.
    Started,
}

/// The completion of a pull, as posted back onto the poller loop.
#[derive(Debug)]
pub(super) struct PullCompletion {
    state: PullState,
    result: Result<ResourceReport, PullError>,
}

/// State shared between the poller loop and the membership api.
#[derive(Debug)]
pub(super) struct Shared {
    pub(super) scheduler: PullScheduler,
    /// Channel to the poller loop, if it's running.
    pub(super) events: Option<UnboundedSender<PollEvent>>,
}

impl Shared {
    /// Wake up the poller loop, if it's running.
    pub(super) fn notify(&self, event: PollTriggerEvent) {
        if let Some(events) = &self.events {
            events.send(PollEvent::Triggered(event)).ok();
        }
    }
}

/// Poll Context shared by the poller loop and the poller handle.
pub(super) struct PollContext {
    pub(super) config: PollerConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) transport: Arc<dyn ReportTransport>,
    pub(super) sink: Arc<dyn ReportSink>,
    pub(super) shared: Mutex<Shared>,
}

impl std::fmt::Debug for PollContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollContext")
            .field("config", &self.config)
            .field("shared", &self.shared)
            .finish()
    }
}

/// The poller loop.
/// All scheduling work happens here, one event at a time: periodic ticks, wake ups from
/// the membership api and the completion of pulls.
pub(super) struct PollWorker {
    context: Arc<PollContext>,
    events: UnboundedReceiver<PollEvent>,
    /// Used by the pulls to post their completion back onto the loop.
    sender: UnboundedSender<PollEvent>,
}

impl PollWorker {
    /// Create a new `Self` with the provided communication channel.
    pub(super) fn new(
        context: Arc<PollContext>,
        sender: UnboundedSender<PollEvent>,
        events: UnboundedReceiver<PollEvent>,
    ) -> Self {
        Self {
            context,
            events,
            sender,
        }
    }

    /// Run the loop until the shutdown event is received.
    pub(super) async fn poller(mut self) {
        let mut ticker = tokio::time::interval(self.context.config.tick_period());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                event = self.events.recv() => event.unwrap_or(PollEvent::Shutdown),
                _ = ticker.tick() => PollEvent::TimedRun,
            };
            match event {
                PollEvent::Shutdown => {
                    tracing::debug!(
                        "Resource report poller has stopped. This should only happen if the cluster has stopped"
                    );
                    return;
                }
                PollEvent::TimedRun => self.try_pull(),
                PollEvent::Triggered(trigger) => {
                    tracing::trace!(?trigger, "Poller triggered");
                    self.try_pull()
                }
                PollEvent::PullComplete(completion) => self.pull_complete(*completion),
            }
        }
    }

    /// Dispatch the pulls of all due nodes, within the concurrency budget.
    fn try_pull(&self) {
        let pulls = {
            let mut shared = self.context.shared.lock();
            let now = self.context.clock.now_millis();
            shared.scheduler.next_pulls(now)
        };
        for state in pulls {
            self.pull(state);
        }
    }

    /// Request the resource report of the node, without waiting for it.
    fn pull(&self, state: PullState) {
        let transport = self.context.transport.clone();
        let sender = self.sender.clone();
        let full_report = state.needs_full_report();
        tracing::trace!(node.id = %state.node_id(), full_report, "Pulling resource report");

        tokio::spawn(async move {
            // a panicking transport only fails this pull
            let result = AssertUnwindSafe(transport.request_report(state.address(), full_report))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(PullError::Panicked {
                        reason: panic_reason(panic.as_ref()),
                    })
                });
            let completion = PullCompletion { state, result };
            // the loop may be gone already, in which case the pull is abandoned
            sender
                .send(PollEvent::PullComplete(Box::new(completion)))
                .ok();
        });
    }

    /// Handle the outcome of a pull and reschedule its node.
    fn pull_complete(&self, completion: PullCompletion) {
        let PullCompletion { state, result } = completion;

        let need_full_report = match result {
            Ok(report) => {
                self.context.sink.on_report(report);
                false
            }
            Err(error) if error.is_unchanged() => {
                tracing::debug!(node.id = %state.node_id(), "Resources of node unchanged");
                false
            }
            Err(error) => {
                tracing::info!(
                    node.id = %state.node_id(),
                    %error,
                    "Couldn't get resource report from node"
                );
                true
            }
        };

        {
            let mut shared = self.context.shared.lock();
            let now = self.context.clock.now_millis();
            shared
                .scheduler
                .pull_complete(state, need_full_report, now);
        }

        self.try_pull();
    }
}

/// Get the message of a panic payload.
fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(reason) = panic.downcast_ref::<&str>() {
        reason.to_string()
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        reason.clone()
    } else {
        "unknown panic".to_string()
    }
}
