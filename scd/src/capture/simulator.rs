//! In-process simulated Capture service
//!
//! Stands in for the vendor service so the demo and the tests can run the
//! whole flow: it refuses sessions until its startup latency has elapsed,
//! owns a device list, publishes device events and records the feedback
//! commands it receives.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    CaptureEvent, CaptureResult, CaptureService, Credentials, DataConfirmationMode, DecodedData, DeviceId, Feedback,
    ResultCode, SessionHandle,
};
use crate::bootstrap::{ServiceBootstrap, StartSignal};
use crate::config::SimulatorConfig;

/// Service calls that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Open,
    DeviceName,
    Battery,
    Firmware,
    ConfirmationMode,
    Confirmation,
}

/// One step of a simulated device timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Delay before this step, relative to the previous one
    #[serde(rename = "after-ms", default)]
    pub after_ms: u64,

    #[serde(flatten)]
    pub action: ScriptAction,
}

/// What a script step does; devices are referenced by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ScriptAction {
    Attach { name: String, battery: u8, firmware: String },
    Decode { name: String, symbology: String, data: String },
    Detach { name: String },
}

/// Timeline played by `scd run` when the config has none of its own
pub fn default_script() -> Vec<ScriptStep> {
    let name = "Socket S700".to_string();
    vec![
        ScriptStep {
            after_ms: 500,
            action: ScriptAction::Attach {
                name: name.clone(),
                battery: 87,
                firmware: "10.3.5 build 1423".to_string(),
            },
        },
        ScriptStep {
            after_ms: 800,
            action: ScriptAction::Decode {
                name: name.clone(),
                symbology: "Code 128".to_string(),
                data: "A123".to_string(),
            },
        },
        ScriptStep {
            after_ms: 800,
            action: ScriptAction::Decode {
                name: name.clone(),
                symbology: "Code 128".to_string(),
                data: "A1236".to_string(),
            },
        },
        ScriptStep {
            after_ms: 800,
            action: ScriptAction::Detach { name },
        },
    ]
}

#[derive(Debug, Clone)]
struct SimDevice {
    name: String,
    battery: u8,
    firmware: String,
}

/// Simulated Capture service
pub struct SimulatedCapture {
    startup_latency: Duration,
    round_trip: Duration,
    ready_at: Mutex<Option<Instant>>,
    sessions: Mutex<HashSet<Uuid>>,
    devices: Mutex<BTreeMap<DeviceId, SimDevice>>,
    events: broadcast::Sender<CaptureEvent>,
    faults: Mutex<HashMap<Fault, ResultCode>>,
    confirmations: Mutex<Vec<(DeviceId, Feedback)>>,
    modes: Mutex<Vec<DataConfirmationMode>>,
    open_attempts: AtomicU32,
    close_calls: AtomicU32,
    start_signals: AtomicU32,
}

impl SimulatedCapture {
    pub fn new(config: &SimulatorConfig) -> Self {
        debug!(
            startup_latency_ms = config.startup_latency_ms,
            auto_start = config.auto_start,
            "SimulatedCapture::new: called"
        );
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let sim = Self {
            startup_latency: config.startup_latency(),
            round_trip: config.round_trip(),
            ready_at: Mutex::new(None),
            sessions: Mutex::new(HashSet::new()),
            devices: Mutex::new(BTreeMap::new()),
            events,
            faults: Mutex::new(HashMap::new()),
            confirmations: Mutex::new(Vec::new()),
            modes: Mutex::new(Vec::new()),
            open_attempts: AtomicU32::new(0),
            close_calls: AtomicU32::new(0),
            start_signals: AtomicU32::new(0),
        };
        if config.auto_start {
            sim.begin_startup();
        }
        sim
    }

    /// Service that accepts sessions immediately and answers without delay
    pub fn ready() -> Self {
        Self::new(&SimulatorConfig {
            startup_latency_ms: 0,
            auto_start: true,
            round_trip_ms: 0,
            script: Vec::new(),
            ..Default::default()
        })
    }

    fn begin_startup(&self) {
        let mut ready_at = self.ready_at.lock().expect("ready_at lock poisoned");
        if ready_at.is_none() {
            let at = Instant::now() + self.startup_latency;
            debug!(latency = ?self.startup_latency, "SimulatedCapture::begin_startup: service starting");
            *ready_at = Some(at);
        } else {
            debug!("SimulatedCapture::begin_startup: already started");
        }
    }

    /// True once the startup latency has elapsed after a start signal
    pub fn is_ready(&self) -> bool {
        match *self.ready_at.lock().expect("ready_at lock poisoned") {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Make a call fail with the given code until cleared
    pub fn inject_fault(&self, fault: Fault, code: ResultCode) {
        debug!(?fault, %code, "SimulatedCapture::inject_fault: called");
        self.faults.lock().expect("faults lock poisoned").insert(fault, code);
    }

    pub fn clear_fault(&self, fault: Fault) {
        self.faults.lock().expect("faults lock poisoned").remove(&fault);
    }

    pub fn open_attempts(&self) -> u32 {
        self.open_attempts.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn start_signals(&self) -> u32 {
        self.start_signals.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().expect("sessions lock poisoned").len()
    }

    /// Feedback commands received so far, oldest first
    pub fn confirmations(&self) -> Vec<(DeviceId, Feedback)> {
        self.confirmations.lock().expect("confirmations lock poisoned").clone()
    }

    /// Confirmation modes set so far, oldest first
    pub fn confirmation_modes(&self) -> Vec<DataConfirmationMode> {
        self.modes.lock().expect("modes lock poisoned").clone()
    }

    /// Connect a device and publish its arrival
    pub fn attach(&self, name: &str, battery: u8, firmware: &str) -> DeviceId {
        let device = DeviceId::generate();
        info!(%device, %name, "Simulated device attached");
        self.devices.lock().expect("devices lock poisoned").insert(
            device,
            SimDevice {
                name: name.to_string(),
                battery,
                firmware: firmware.to_string(),
            },
        );
        let _ = self.events.send(CaptureEvent::DeviceArrival {
            device,
            name: name.to_string(),
        });
        device
    }

    /// Disconnect a device and publish its removal
    pub fn detach(&self, device: DeviceId) -> bool {
        let removed = self.devices.lock().expect("devices lock poisoned").remove(&device);
        match removed {
            Some(dev) => {
                info!(%device, name = %dev.name, "Simulated device detached");
                let _ = self.events.send(CaptureEvent::DeviceRemoval { device, name: dev.name });
                true
            }
            None => {
                debug!(%device, "SimulatedCapture::detach: unknown device");
                false
            }
        }
    }

    /// Publish a decoded barcode from a connected device
    pub fn decode(&self, device: DeviceId, payload: DecodedData) -> CaptureResult<()> {
        if !self.devices.lock().expect("devices lock poisoned").contains_key(&device) {
            debug!(%device, "SimulatedCapture::decode: unknown device");
            return Err(ResultCode::DEVICE_NOT_FOUND);
        }
        debug!(%device, data = %payload.data, "SimulatedCapture::decode: publishing");
        let _ = self.events.send(CaptureEvent::DataDecoded { device, payload });
        Ok(())
    }

    /// Look up a connected device by name
    pub fn find_device(&self, name: &str) -> Option<DeviceId> {
        self.devices
            .lock()
            .expect("devices lock poisoned")
            .iter()
            .find(|(_, dev)| dev.name == name)
            .map(|(id, _)| *id)
    }

    /// Play a device timeline to completion
    pub async fn play(&self, script: &[ScriptStep]) {
        info!(steps = script.len(), "Playing simulated device script");
        for step in script {
            if step.after_ms > 0 {
                tokio::time::sleep(Duration::from_millis(step.after_ms)).await;
            }
            match &step.action {
                ScriptAction::Attach { name, battery, firmware } => {
                    self.attach(name, *battery, firmware);
                }
                ScriptAction::Decode { name, symbology, data } => match self.find_device(name) {
                    Some(device) => {
                        if let Err(code) = self.decode(device, DecodedData::new(symbology.clone(), data.clone())) {
                            warn!(%name, %code, "Script decode failed");
                        }
                    }
                    None => warn!(%name, "Script decode for a device that is not attached"),
                },
                ScriptAction::Detach { name } => match self.find_device(name) {
                    Some(device) => {
                        self.detach(device);
                    }
                    None => warn!(%name, "Script detach for a device that is not attached"),
                },
            }
        }
        debug!("SimulatedCapture::play: script finished");
    }

    async fn round_trip(&self) {
        if !self.round_trip.is_zero() {
            tokio::time::sleep(self.round_trip).await;
        }
    }

    fn fault(&self, fault: Fault) -> CaptureResult<()> {
        match self.faults.lock().expect("faults lock poisoned").get(&fault) {
            Some(code) => {
                debug!(?fault, %code, "SimulatedCapture::fault: injected failure");
                Err(*code)
            }
            None => Ok(()),
        }
    }

    fn check_session(&self, session: &SessionHandle) -> CaptureResult<()> {
        if self
            .sessions
            .lock()
            .expect("sessions lock poisoned")
            .contains(session.as_uuid())
        {
            Ok(())
        } else {
            debug!(session = %session, "SimulatedCapture::check_session: invalid handle");
            Err(ResultCode::INVALID_HANDLE)
        }
    }

    fn device(&self, device: DeviceId) -> CaptureResult<SimDevice> {
        self.devices
            .lock()
            .expect("devices lock poisoned")
            .get(&device)
            .cloned()
            .ok_or(ResultCode::DEVICE_NOT_FOUND)
    }
}

impl ServiceBootstrap for SimulatedCapture {
    fn start_service(&self, signal: &StartSignal) {
        debug!(signal = %signal, "SimulatedCapture::start_service: called");
        self.start_signals.fetch_add(1, Ordering::SeqCst);
        self.begin_startup();
    }
}

#[async_trait]
impl CaptureService for SimulatedCapture {
    async fn open(&self, credentials: &Credentials) -> CaptureResult<SessionHandle> {
        self.round_trip().await;
        let attempt = self.open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(attempt, app_id = %credentials.app_id, "SimulatedCapture::open: called");
        self.fault(Fault::Open)?;
        if !self.is_ready() {
            debug!(attempt, "SimulatedCapture::open: service not ready");
            return Err(ResultCode::UNABLE_OPEN_DEVICE);
        }
        let session = SessionHandle::generate();
        self.sessions
            .lock()
            .expect("sessions lock poisoned")
            .insert(*session.as_uuid());
        info!(session = %session, attempt, "Simulated session opened");
        Ok(session)
    }

    async fn close(&self, session: &SessionHandle) -> CaptureResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        if self
            .sessions
            .lock()
            .expect("sessions lock poisoned")
            .remove(session.as_uuid())
        {
            info!(session = %session, "Simulated session closed");
            Ok(())
        } else {
            Err(ResultCode::INVALID_HANDLE)
        }
    }

    fn subscribe(&self, session: &SessionHandle) -> CaptureResult<broadcast::Receiver<CaptureEvent>> {
        self.check_session(session)?;
        Ok(self.events.subscribe())
    }

    async fn devices(&self, session: &SessionHandle) -> CaptureResult<Vec<DeviceId>> {
        self.round_trip().await;
        self.check_session(session)?;
        Ok(self.devices.lock().expect("devices lock poisoned").keys().copied().collect())
    }

    async fn device_name(&self, session: &SessionHandle, device: DeviceId) -> CaptureResult<String> {
        self.round_trip().await;
        self.check_session(session)?;
        self.fault(Fault::DeviceName)?;
        Ok(self.device(device)?.name)
    }

    async fn battery_level(&self, session: &SessionHandle, device: DeviceId) -> CaptureResult<u8> {
        self.round_trip().await;
        self.check_session(session)?;
        self.fault(Fault::Battery)?;
        Ok(self.device(device)?.battery)
    }

    async fn firmware_version(&self, session: &SessionHandle, device: DeviceId) -> CaptureResult<String> {
        self.round_trip().await;
        self.check_session(session)?;
        self.fault(Fault::Firmware)?;
        Ok(self.device(device)?.firmware)
    }

    async fn set_data_confirmation_mode(&self, session: &SessionHandle, mode: DataConfirmationMode) -> CaptureResult<()> {
        self.round_trip().await;
        self.check_session(session)?;
        self.fault(Fault::ConfirmationMode)?;
        self.modes.lock().expect("modes lock poisoned").push(mode);
        Ok(())
    }

    async fn set_data_confirmation(
        &self,
        session: &SessionHandle,
        device: DeviceId,
        feedback: Feedback,
    ) -> CaptureResult<()> {
        self.round_trip().await;
        self.check_session(session)?;
        self.fault(Fault::Confirmation)?;
        self.device(device)?;
        self.confirmations
            .lock()
            .expect("confirmations lock poisoned")
            .push((device, feedback));
        Ok(())
    }
}
