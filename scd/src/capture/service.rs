//! CaptureService trait definition

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{CaptureEvent, CaptureResult, Credentials, DataConfirmationMode, DeviceId, Feedback, SessionHandle};

/// Client surface of the out-of-process Capture service
///
/// Every method is a round trip to another process and may take a while.
/// Failures come back as result codes; none of them is fatal to the caller.
/// The device list behind `devices` is owned by the service and may change
/// (or become empty) between any two calls.
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Open a client session
    ///
    /// Answers `ResultCode::UNABLE_OPEN_DEVICE` while the service is still starting.
    async fn open(&self, credentials: &Credentials) -> CaptureResult<SessionHandle>;

    /// Close a client session; the handle is invalid afterwards
    async fn close(&self, session: &SessionHandle) -> CaptureResult<()>;

    /// Subscribe to device arrival, removal and decoded-data events for a session
    fn subscribe(&self, session: &SessionHandle) -> CaptureResult<broadcast::Receiver<CaptureEvent>>;

    /// Snapshot of the currently connected devices
    async fn devices(&self, session: &SessionHandle) -> CaptureResult<Vec<DeviceId>>;

    /// Friendly device name
    async fn device_name(&self, session: &SessionHandle, device: DeviceId) -> CaptureResult<String>;

    /// Battery charge in percent
    async fn battery_level(&self, session: &SessionHandle, device: DeviceId) -> CaptureResult<u8>;

    /// Firmware version string, e.g. "10.3.5 build 1423"
    async fn firmware_version(&self, session: &SessionHandle, device: DeviceId) -> CaptureResult<String>;

    /// Choose who confirms decoded data
    async fn set_data_confirmation_mode(&self, session: &SessionHandle, mode: DataConfirmationMode) -> CaptureResult<()>;

    /// Send a beep/LED/rumble feedback pattern to a device
    async fn set_data_confirmation(
        &self,
        session: &SessionHandle,
        device: DeviceId,
        feedback: Feedback,
    ) -> CaptureResult<()>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::capture::ResultCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Mock Capture service for unit tests
    ///
    /// `open` pops scripted results in order and succeeds once the script is
    /// exhausted. Queries answer fixed values unless a failure is configured.
    pub struct MockCapture {
        open_script: Mutex<VecDeque<ResultCode>>,
        open_calls: AtomicUsize,
        close_calls: AtomicUsize,
        query_calls: AtomicUsize,
        events: broadcast::Sender<CaptureEvent>,
        pub name_result: CaptureResult<String>,
        pub battery_result: CaptureResult<u8>,
        pub firmware_result: CaptureResult<String>,
        pub feedback_result: CaptureResult<()>,
        pub subscribe_result: CaptureResult<()>,
        confirmations: Mutex<Vec<(DeviceId, Feedback)>>,
        modes: Mutex<Vec<DataConfirmationMode>>,
    }

    impl MockCapture {
        pub fn new(open_script: Vec<ResultCode>) -> Self {
            debug!(script_len = %open_script.len(), "MockCapture::new: called");
            let (events, _) = broadcast::channel(64);
            Self {
                open_script: Mutex::new(open_script.into()),
                open_calls: AtomicUsize::new(0),
                close_calls: AtomicUsize::new(0),
                query_calls: AtomicUsize::new(0),
                events,
                name_result: Ok("Socket S700".to_string()),
                battery_result: Ok(87),
                firmware_result: Ok("10.3.5".to_string()),
                feedback_result: Ok(()),
                subscribe_result: Ok(()),
                confirmations: Mutex::new(Vec::new()),
                modes: Mutex::new(Vec::new()),
            }
        }

        /// Mock that is ready immediately
        pub fn ready() -> Self {
            Self::new(Vec::new())
        }

        pub fn open_calls(&self) -> usize {
            self.open_calls.load(Ordering::SeqCst)
        }

        pub fn close_calls(&self) -> usize {
            self.close_calls.load(Ordering::SeqCst)
        }

        /// Number of per-device calls (queries, configuration and feedback)
        pub fn query_calls(&self) -> usize {
            self.query_calls.load(Ordering::SeqCst)
        }

        pub fn confirmations(&self) -> Vec<(DeviceId, Feedback)> {
            self.confirmations.lock().unwrap().clone()
        }

        pub fn modes(&self) -> Vec<DataConfirmationMode> {
            self.modes.lock().unwrap().clone()
        }

        pub fn emit(&self, event: CaptureEvent) {
            let _ = self.events.send(event);
        }
    }

    #[async_trait]
    impl CaptureService for MockCapture {
        async fn open(&self, _credentials: &Credentials) -> CaptureResult<SessionHandle> {
            self.open_calls.fetch_add(1, Ordering::SeqCst);
            match self.open_script.lock().unwrap().pop_front() {
                Some(code) => Err(code),
                None => Ok(SessionHandle::generate()),
            }
        }

        async fn close(&self, _session: &SessionHandle) -> CaptureResult<()> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn subscribe(&self, _session: &SessionHandle) -> CaptureResult<broadcast::Receiver<CaptureEvent>> {
            self.subscribe_result.map(|()| self.events.subscribe())
        }

        async fn devices(&self, _session: &SessionHandle) -> CaptureResult<Vec<DeviceId>> {
            Ok(Vec::new())
        }

        async fn device_name(&self, _session: &SessionHandle, _device: DeviceId) -> CaptureResult<String> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.name_result.clone()
        }

        async fn battery_level(&self, _session: &SessionHandle, _device: DeviceId) -> CaptureResult<u8> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.battery_result
        }

        async fn firmware_version(&self, _session: &SessionHandle, _device: DeviceId) -> CaptureResult<String> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.firmware_result.clone()
        }

        async fn set_data_confirmation_mode(
            &self,
            _session: &SessionHandle,
            mode: DataConfirmationMode,
        ) -> CaptureResult<()> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.modes.lock().unwrap().push(mode);
            Ok(())
        }

        async fn set_data_confirmation(
            &self,
            _session: &SessionHandle,
            device: DeviceId,
            feedback: Feedback,
        ) -> CaptureResult<()> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.confirmations.lock().unwrap().push((device, feedback));
            self.feedback_result
        }
    }
}
