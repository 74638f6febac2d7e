//! Interactive-context notifications
//!
//! Worker tasks never touch user-facing state directly. They send
//! [`Notification`] messages through a [`Notifier`]; a single notifier task
//! owns the output and renders each message as one short line.

mod messages;
mod render;

pub use messages::{FollowUp, Notification, NotificationEvent, Verdict};
pub use render::{describe, render};

use std::io::Write;

use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::OutputFormat;

/// Sending side of the notification channel
///
/// Cheap to clone; one clone per worker task.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Create a notifier and the receiver the interactive context drains
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        debug!(buffer, "Notifier::channel: called");
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Timestamp and send a notification
    ///
    /// Fire-and-forget: if the interactive side is gone the message is dropped.
    pub async fn notify(&self, event: NotificationEvent) {
        debug!(?event, "Notifier::notify: called");
        if self.tx.send(Notification::now(event)).await.is_err() {
            debug!("Notifier::notify: receiver closed, dropping notification");
        }
    }
}

/// Drain notifications until every `Notifier` is dropped
///
/// Returns how many notifications were written.
pub async fn run_notifier<W: Write>(mut rx: mpsc::Receiver<Notification>, format: OutputFormat, mut out: W) -> usize {
    debug!(?format, "run_notifier: called");
    let mut shown = 0;
    while let Some(notification) = rx.recv().await {
        let line = render(&notification, &format);
        if let Err(e) = writeln!(out, "{}", line) {
            debug!(error = %e, "run_notifier: write failed");
            continue;
        }
        let _ = out.flush();
        shown += 1;
    }
    debug!(shown, "run_notifier: channel closed");
    shown
}
