//! Process wide shutdown, triggered by SIGINT or SIGTERM.
//! Any number of tasks may wait for it, and a task which starts waiting after the
//! signal was received returns straight away.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::{future::Future, sync::Arc};
use tokio::{signal::unix::SignalKind, sync::oneshot};

type ShutdownSync = Arc<Mutex<Shutdown>>;

/// Shutdown Event handler.
pub struct Shutdown {
    /// Tasks waiting for the shutdown.
    listeners: Vec<oneshot::Sender<SignalKind>>,
    /// The signal which triggered the shutdown, once received.
    shutdown: Option<SignalKind>,
    /// The signals could not be listened for, so no shutdown will ever be received.
    failed: bool,
}

impl Shutdown {
    /// Get a sync wrapper of `Self`, with the task listening for `event` already spawned.
    fn new_sync(event: impl ShutdownEvent + 'static) -> ShutdownSync {
        let this = Arc::new(Mutex::new(Self {
            listeners: Vec::new(),
            shutdown: None,
            failed: false,
        }));
        tokio::spawn(Self::run(this.clone(), event));
        this
    }

    /// Get a channel to wait on, or the outcome if the shutdown event has already happened.
    fn shutdown_chan(&mut self) -> Result<oneshot::Receiver<SignalKind>, Option<SignalKind>> {
        match self.shutdown {
            Some(signal) => Err(Some(signal)),
            None if self.failed => Err(None),
            None => {
                let (send, receive) = oneshot::channel();
                self.listeners.push(send);
                Ok(receive)
            }
        }
    }

    /// Wait for the event and wake up every listener.
    /// If the event cannot be waited for, the listeners are dropped and see no signal.
    async fn run(this: ShutdownSync, event: impl ShutdownEvent) {
        let signal = match event.wait().await {
            Ok(signal) => signal,
            Err(error) => {
                tracing::error!(%error, "Failed to listen for the shutdown signals");
                let mut this = this.lock();
                this.failed = true;
                this.listeners.clear();
                return;
            }
        };

        let mut this = this.lock();
        this.shutdown = Some(signal);
        for sender in std::mem::take(&mut this.listeners) {
            // the listener may be gone already
            sender.send(signal).ok();
        }
    }

    /// Wait for the shutdown on `this`.
    fn wait_on(this: &ShutdownSync) -> impl Future<Output = Option<SignalKind>> {
        let chan = this.lock().shutdown_chan();
        async move {
            match chan {
                Ok(wait) => wait.await.ok(),
                Err(signal) => signal,
            }
        }
    }

    /// Returns a future that completes when SIGINT or SIGTERM is received, with the
    /// signal which triggered the shutdown.
    /// None is returned if the signals could not be listened for.
    /// Must be first called from within a tokio runtime.
    pub fn wait_sig() -> impl Future<Output = Option<SignalKind>> {
        lazy_static! {
            static ref INT_TERM: ShutdownSync = Shutdown::new_sync(IntTermEvent {});
        }
        Self::wait_on(&INT_TERM)
    }

    /// Helper over `Self::wait_sig` with no return.
    pub async fn wait() {
        let _ = Self::wait_sig().await;
    }
}

/// Internal Shutdown Event which returns which signal triggered it.
#[async_trait::async_trait]
trait ShutdownEvent: Send + Sync {
    async fn wait(&self) -> std::io::Result<SignalKind>;
}

/// Shutdown Event when INT | TERM are received.
struct IntTermEvent {}

#[async_trait::async_trait]
impl ShutdownEvent for IntTermEvent {
    async fn wait(&self) -> std::io::Result<SignalKind> {
        let mut sig_int = tokio::signal::unix::signal(SignalKind::interrupt())?;
        let mut sig_term = tokio::signal::unix::signal(SignalKind::terminate())?;

        let signal = tokio::select! {
            _ = sig_int.recv() => SignalKind::interrupt(),
            _ = sig_term.recv() => SignalKind::terminate(),
        };
        tracing::warn!(?signal, "Signalled");
        Ok(signal)
    }
}
