//! Event dispatch sink
//!
//! Subscribes to the session's event stream and hands each event to a
//! handler on its own worker task, so a slow device round trip never holds
//! up the stream. Stopping the sink does not wait for handlers in flight;
//! callers that want them done wait on [`DispatchHandle::idle`] first.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handlers::{handle_arrival, handle_decoded, handle_removal};
use super::validator::PayloadValidator;
use super::{ArrivalQuery, DispatchSettings};
use crate::acquisition::Session;
use crate::capture::{CaptureEvent, DataConfirmationMode};
use crate::notify::Notifier;

/// Counters for one sink lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub arrivals: u64,
    pub removals: u64,
    pub decoded: u64,
    /// Events dropped because the sink fell behind the stream
    pub lagged: u64,
}

impl DispatchStats {
    pub fn total(&self) -> u64 {
        self.arrivals + self.removals + self.decoded
    }
}

/// Reacts to device events for one open session
pub struct DispatchSink {
    session: Arc<Session>,
    notifier: Notifier,
    validator: Arc<dyn PayloadValidator>,
    queries: Arc<[ArrivalQuery]>,
    mode: DataConfirmationMode,
    in_flight: Arc<watch::Sender<usize>>,
}

impl DispatchSink {
    pub fn new(
        session: Arc<Session>,
        notifier: Notifier,
        validator: Arc<dyn PayloadValidator>,
        settings: &DispatchSettings,
    ) -> Self {
        debug!(?settings, "DispatchSink::new: called");
        Self {
            session,
            notifier,
            validator,
            queries: Arc::from(settings.arrival_queries()),
            mode: settings.confirmation_mode(),
            in_flight: Arc::new(watch::Sender::new(0)),
        }
    }

    /// Run the sink on its own task
    pub fn spawn(self, events: broadcast::Receiver<CaptureEvent>) -> DispatchHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let in_flight = self.in_flight.subscribe();
        let task = tokio::spawn(self.run(events, shutdown_rx));
        DispatchHandle {
            shutdown_tx: Some(shutdown_tx),
            in_flight,
            task,
        }
    }

    /// Dispatch events until the stream closes or shutdown is requested
    pub async fn run(
        self,
        mut events: broadcast::Receiver<CaptureEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> DispatchStats {
        info!("Event dispatch started");
        let mut stats = DispatchStats::default();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("DispatchSink::run: shutdown requested");
                    break;
                }
                received = events.recv() => match received {
                    Ok(event) => self.dispatch(event, &mut stats),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event dispatch fell behind, events dropped");
                        stats.lagged += skipped;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("DispatchSink::run: event stream closed");
                        break;
                    }
                },
            }
        }

        info!(?stats, "Event dispatch stopped");
        stats
    }

    fn dispatch(&self, event: CaptureEvent, stats: &mut DispatchStats) {
        debug!(kind = event.kind(), device = %event.device(), "DispatchSink::dispatch: called");
        match event {
            CaptureEvent::DeviceArrival { device, name } => {
                stats.arrivals += 1;
                self.spawn_handler(handle_arrival(
                    self.session.clone(),
                    self.notifier.clone(),
                    self.queries.clone(),
                    self.mode,
                    device,
                    name,
                ));
            }
            CaptureEvent::DeviceRemoval { device, name } => {
                stats.removals += 1;
                self.spawn_handler(handle_removal(self.notifier.clone(), device, name));
            }
            CaptureEvent::DataDecoded { device, payload } => {
                stats.decoded += 1;
                self.spawn_handler(handle_decoded(
                    self.session.clone(),
                    self.notifier.clone(),
                    self.validator.clone(),
                    device,
                    payload,
                ));
            }
        }
    }
}

impl DispatchSink {
    fn spawn_handler<F>(&self, handler: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.send_modify(|n| *n += 1);
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            handler.await;
            in_flight.send_modify(|n| *n -= 1);
        });
    }
}

/// Handle to a running sink; dropping it also stops the sink
pub struct DispatchHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    in_flight: watch::Receiver<usize>,
    task: JoinHandle<DispatchStats>,
}

impl DispatchHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Handlers spawned and not yet finished
    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Resolves once no handler is running
    ///
    /// Events still queued in the stream are not counted.
    pub fn idle(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut in_flight = self.in_flight.clone();
        async move {
            if in_flight.wait_for(|n| *n == 0).await.is_err() {
                debug!("DispatchHandle::idle: sink dropped");
            }
        }
    }

    /// Stop dispatching and return the sink's counters
    ///
    /// Waits for the sink loop only; handlers already spawned keep running.
    pub async fn stop(mut self) -> DispatchStats {
        debug!("DispatchHandle::stop: called");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Event dispatch task failed");
                DispatchStats::default()
            }
        }
    }
}
