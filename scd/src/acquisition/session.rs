//! Open session guard

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::capture::{CaptureResult, CaptureService, ResultCode, SessionHandle};

/// An open Capture session
///
/// Owns the handle granted by the service. Once closed, the handle is no
/// longer handed out, and closing again does nothing.
pub struct Session {
    service: Arc<dyn CaptureService>,
    handle: SessionHandle,
    closed: AtomicBool,
}

impl Session {
    pub fn new(service: Arc<dyn CaptureService>, handle: SessionHandle) -> Self {
        debug!(session = %handle, "Session::new: called");
        Self {
            service,
            handle,
            closed: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &Arc<dyn CaptureService> {
        &self.service
    }

    /// The session handle, or `INVALID_HANDLE` after close
    pub fn handle(&self) -> CaptureResult<&SessionHandle> {
        if self.is_open() {
            Ok(&self.handle)
        } else {
            debug!(session = %self.handle, "Session::handle: used after close");
            Err(ResultCode::INVALID_HANDLE)
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Close the session with the service, at most once
    pub async fn close(&self) -> CaptureResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!(session = %self.handle, "Session::close: already closed");
            return Ok(());
        }
        let result = self.service.close(&self.handle).await;
        info!(session = %self.handle, ?result, "Session closed");
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("open", &self.is_open())
            .finish()
    }
}
