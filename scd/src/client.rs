//! CaptureClient - lifecycle of one Capture client
//!
//! `start` sends the start signal, acquires a session and hands the event
//! stream to a dispatch sink. `stop` tears the sink down and closes the
//! session once. Both take the same lock, so a close can never overlap an
//! open that is still retrying.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::acquisition::{Acquisition, RetryPolicy, Session, Sleeper, TokioSleeper, acquire_session};
use crate::bootstrap::{ServiceBootstrap, StartSignal, start_capture_service};
use crate::capture::{CaptureResult, CaptureService, Credentials, DeviceId, ResultCode};
use crate::config::Config;
use crate::dispatch::{DispatchHandle, DispatchSettings, DispatchSink, DispatchStats, PayloadValidator, SuffixRule};
use crate::notify::{NotificationEvent, Notifier};

/// Lifecycle misuse
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Capture client already has an open session")]
    AlreadyStarted,

    #[error("Capture client was stopped")]
    Stopped,
}

/// Outcome of `CaptureClient::start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AcquisitionReport {
    /// Final result code, `NO_ERROR` when the session is open
    pub code: ResultCode,
    pub retries: u32,
    pub attempts: u32,
    /// The service never became ready within the retry ceiling
    pub exhausted: bool,
}

impl AcquisitionReport {
    fn from_acquisition(acquisition: &Acquisition) -> Self {
        Self {
            code: acquisition.code(),
            retries: acquisition.retries,
            attempts: acquisition.attempts,
            exhausted: acquisition.is_exhausted(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::NO_ERROR
    }
}

#[derive(Default)]
struct ClientState {
    session: Option<Arc<Session>>,
    dispatch: Option<DispatchHandle>,
    stopped: bool,
}

/// A Capture client: bootstrap, session acquisition and event dispatch
pub struct CaptureClient {
    service: Arc<dyn CaptureService>,
    bootstrap: Arc<dyn ServiceBootstrap>,
    notifier: Notifier,
    signal: StartSignal,
    credentials: Credentials,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    settings: DispatchSettings,
    validator: Arc<dyn PayloadValidator>,
    state: Mutex<ClientState>,
}

impl CaptureClient {
    /// Create a client with the built-in defaults
    pub fn new(service: Arc<dyn CaptureService>, bootstrap: Arc<dyn ServiceBootstrap>, notifier: Notifier) -> Self {
        Self::from_config(&Config::default(), service, bootstrap, notifier)
    }

    /// Create a client from configuration
    pub fn from_config(
        config: &Config,
        service: Arc<dyn CaptureService>,
        bootstrap: Arc<dyn ServiceBootstrap>,
        notifier: Notifier,
    ) -> Self {
        debug!("CaptureClient::from_config: called");
        Self {
            service,
            bootstrap,
            notifier,
            signal: StartSignal::from_config(&config.service),
            credentials: config.credentials.resolve(),
            policy: RetryPolicy::from_config(&config.acquisition),
            sleeper: Arc::new(TokioSleeper),
            settings: DispatchSettings::from_config(&config.dispatch),
            validator: Arc::new(SuffixRule::new(config.dispatch.reject_suffix.clone())),
            state: Mutex::new(ClientState::default()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start the service, open a session and begin dispatching events
    ///
    /// A failed acquisition is not an error: it is reported in the returned
    /// `AcquisitionReport` and the client stays without a session.
    pub async fn start(&self) -> Result<AcquisitionReport, ClientError> {
        debug!("CaptureClient::start: called");
        let mut state = self.state.lock().await;
        if state.stopped {
            return Err(ClientError::Stopped);
        }
        if state.session.is_some() {
            return Err(ClientError::AlreadyStarted);
        }

        start_capture_service(self.bootstrap.as_ref(), &self.signal);
        self.notifier
            .notify(NotificationEvent::ServiceStartRequested {
                target: self.signal.to_string(),
            })
            .await;

        let acquisition = acquire_session(
            self.service.as_ref(),
            &self.credentials,
            &self.policy,
            self.sleeper.as_ref(),
        )
        .await;
        let mut report = AcquisitionReport::from_acquisition(&acquisition);

        let handle = match acquisition.outcome {
            Ok(handle) => handle,
            Err(code) => {
                self.notifier
                    .notify(NotificationEvent::SessionFailed {
                        code,
                        retries: report.retries,
                        exhausted: report.exhausted,
                    })
                    .await;
                return Ok(report);
            }
        };

        let session = Arc::new(Session::new(self.service.clone(), handle));
        let events = match session.handle().and_then(|h| self.service.subscribe(h)) {
            Ok(events) => events,
            Err(code) => {
                warn!(%code, "Event subscription failed, closing session");
                if let Err(close_code) = session.close().await {
                    debug!(%close_code, "CaptureClient::start: close after failed subscribe also failed");
                }
                report.code = code;
                self.notifier
                    .notify(NotificationEvent::SessionFailed {
                        code,
                        retries: report.retries,
                        exhausted: false,
                    })
                    .await;
                return Ok(report);
            }
        };

        self.notifier
            .notify(NotificationEvent::SessionOpened {
                retries: report.retries,
                attempts: report.attempts,
            })
            .await;

        let sink = DispatchSink::new(
            session.clone(),
            self.notifier.clone(),
            self.validator.clone(),
            &self.settings,
        );
        state.dispatch = Some(sink.spawn(events));
        state.session = Some(session);
        info!(retries = report.retries, "Capture client started");
        Ok(report)
    }

    /// Stop dispatching and close the session
    ///
    /// Safe to call when no session was ever opened, and more than once.
    /// Returns the dispatch counters when a sink was running.
    pub async fn stop(&self) -> Option<DispatchStats> {
        debug!("CaptureClient::stop: called");
        let mut state = self.state.lock().await;
        state.stopped = true;

        let stats = match state.dispatch.take() {
            Some(dispatch) => Some(dispatch.stop().await),
            None => None,
        };

        match state.session.take() {
            Some(session) => {
                let result = session.close().await;
                self.notifier
                    .notify(NotificationEvent::SessionClosed { code: result.err() })
                    .await;
            }
            None => debug!("CaptureClient::stop: no session to close"),
        }

        info!(?stats, "Capture client stopped");
        stats
    }

    /// Wait until every event handler spawned so far has finished
    ///
    /// Returns at once when no sink is running.
    pub async fn wait_idle(&self) {
        debug!("CaptureClient::wait_idle: called");
        let idle = {
            let state = self.state.lock().await;
            state.dispatch.as_ref().map(|dispatch| dispatch.idle())
        };
        if let Some(idle) = idle {
            idle.await;
        }
    }

    /// True while a session is open
    pub async fn is_open(&self) -> bool {
        let state = self.state.lock().await;
        state.session.as_ref().is_some_and(|s| s.is_open())
    }

    /// Devices currently connected to the service
    ///
    /// The list belongs to the service and may be empty at any time.
    pub async fn connected_devices(&self) -> CaptureResult<Vec<DeviceId>> {
        let session = {
            let state = self.state.lock().await;
            state.session.clone()
        };
        match session {
            Some(session) => session.service().devices(session.handle()?).await,
            None => Err(ResultCode::INVALID_HANDLE),
        }
    }

    /// First connected device, if any
    pub async fn primary_device(&self) -> Option<DeviceId> {
        match self.connected_devices().await {
            Ok(devices) => devices.first().copied(),
            Err(code) => {
                debug!(%code, "CaptureClient::primary_device: device list unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::sleeper::fake::RecordingSleeper;
    use crate::capture::SimulatedCapture;
    use crate::capture::service::mock::MockCapture;
    use std::time::Duration;

    fn client_for(mock: Arc<MockCapture>, sim: Arc<SimulatedCapture>) -> (CaptureClient, Arc<RecordingSleeper>) {
        let (notifier, _rx) = Notifier::channel(64);
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = CaptureClient::new(mock, sim, notifier).with_sleeper(sleeper.clone());
        (client, sleeper)
    }

    #[tokio::test]
    async fn test_stop_without_session_is_safe() {
        let mock = Arc::new(MockCapture::ready());
        let (client, _) = client_for(mock.clone(), Arc::new(SimulatedCapture::ready()));

        assert!(client.stop().await.is_none());
        assert!(client.stop().await.is_none());
        assert_eq!(mock.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_start_then_stop_closes_once() {
        let mock = Arc::new(MockCapture::new(vec![ResultCode::UNABLE_OPEN_DEVICE; 2]));
        let sim = Arc::new(SimulatedCapture::ready());
        let (client, sleeper) = client_for(mock.clone(), sim.clone());

        let report = client.start().await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.retries, 2);
        assert_eq!(sleeper.waits(), vec![Duration::from_millis(500); 2]);
        assert_eq!(sim.start_signals(), 1);
        assert!(client.is_open().await);

        assert!(client.stop().await.is_some());
        assert!(client.stop().await.is_none());
        assert_eq!(mock.close_calls(), 1);
        assert!(!client.is_open().await);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mock = Arc::new(MockCapture::ready());
        let (client, _) = client_for(mock, Arc::new(SimulatedCapture::ready()));

        client.start().await.unwrap();
        assert_eq!(client.start().await, Err(ClientError::AlreadyStarted));
        client.stop().await;
        assert_eq!(client.start().await, Err(ClientError::Stopped));
    }

    #[tokio::test]
    async fn test_failed_acquisition_leaves_no_session() {
        let mock = Arc::new(MockCapture::new(vec![ResultCode::NOT_SUPPORTED]));
        let (client, _) = client_for(mock.clone(), Arc::new(SimulatedCapture::ready()));

        let report = client.start().await.unwrap();
        assert_eq!(report.code, ResultCode::NOT_SUPPORTED);
        assert!(!report.exhausted);
        assert!(!client.is_open().await);
        assert_eq!(client.primary_device().await, None);

        client.stop().await;
        assert_eq!(mock.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_failure_closes_session_once() {
        let mut mock = MockCapture::ready();
        mock.subscribe_result = Err(ResultCode::NOT_SUPPORTED);
        let mock = Arc::new(mock);
        let (notifier, mut rx) = Notifier::channel(16);
        let client = CaptureClient::new(mock.clone(), Arc::new(SimulatedCapture::ready()), notifier);

        let report = client.start().await.unwrap();
        assert_eq!(report.code, ResultCode::NOT_SUPPORTED);
        assert!(!report.is_success());
        assert!(!client.is_open().await);
        assert_eq!(mock.close_calls(), 1);

        assert!(client.stop().await.is_none());
        assert_eq!(mock.close_calls(), 1);

        let mut last = None;
        while let Ok(note) = rx.try_recv() {
            last = Some(note.event);
        }
        assert_eq!(
            last,
            Some(NotificationEvent::SessionFailed {
                code: ResultCode::NOT_SUPPORTED,
                retries: 0,
                exhausted: false
            })
        );
    }

    #[tokio::test]
    async fn test_policy_override_lowers_ceiling() {
        let mock = Arc::new(MockCapture::new(vec![ResultCode::UNABLE_OPEN_DEVICE; 5]));
        let (client, sleeper) = client_for(mock.clone(), Arc::new(SimulatedCapture::ready()));
        let client = client.with_policy(RetryPolicy::new(2, Duration::from_millis(100)));

        let report = client.start().await.unwrap();
        assert!(report.exhausted);
        assert_eq!(report.retries, 2);
        assert_eq!(mock.open_calls(), 2);
        assert_eq!(sleeper.waits(), vec![Duration::from_millis(100)]);
    }

    #[tokio::test]
    async fn test_settings_override_changes_arrival_follow_ups() {
        use crate::capture::{CaptureEvent, DataConfirmationMode};
        use crate::dispatch::ArrivalQuery;

        let mock = Arc::new(MockCapture::ready());
        let (notifier, mut rx) = Notifier::channel(32);
        let client = CaptureClient::new(mock.clone(), Arc::new(SimulatedCapture::ready()), notifier)
            .with_settings(DispatchSettings::new(vec![ArrivalQuery::Name], DataConfirmationMode::Device));
        client.start().await.unwrap();

        let device = DeviceId::generate();
        mock.emit(CaptureEvent::DeviceArrival {
            device,
            name: "S700".to_string(),
        });

        let name = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await.map(|note| note.event) {
                    Some(NotificationEvent::DeviceName { name, .. }) => break name,
                    Some(NotificationEvent::BatteryLevel { .. }) => panic!("battery was not requested"),
                    Some(_) => continue,
                    None => panic!("notifier closed"),
                }
            }
        })
        .await
        .expect("device name never reported");
        assert_eq!(name, "Socket S700");

        client.wait_idle().await;
        assert_eq!(mock.modes(), vec![DataConfirmationMode::Device]);
        client.stop().await;
    }
}
