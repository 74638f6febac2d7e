//! Capture domain types shared by the service seam, the simulator and the dispatch sink

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Opaque session handle granted by the service on a successful open
///
/// Not `Clone` on purpose: the caller that acquired it owns it until close.
#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(Uuid);

impl SessionHandle {
    pub(crate) fn generate() -> Self {
        let handle = Self(Uuid::now_v7());
        debug!(handle = %handle, "SessionHandle::generate: called");
        handle
    }

    /// Short form used in logs and notifications
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Reference into the device list owned by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Application credential triple presented on open
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Package identity, e.g. "android:com.socketmobile.simplecapturedemo"
    #[serde(rename = "app-id")]
    pub app_id: String,

    /// Developer ID issued by the vendor portal
    #[serde(rename = "developer-id")]
    pub developer_id: String,

    /// Application key bound to the app ID and developer ID
    #[serde(rename = "app-key")]
    pub app_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("developer_id", &self.developer_id)
            .field("app_key", &"<redacted>")
            .finish()
    }
}

/// Decoded payload delivered with a data-decoded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedData {
    /// Symbology name reported by the device, e.g. "Code 128"
    pub symbology: String,
    pub data: String,
}

impl DecodedData {
    pub fn new(symbology: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            symbology: symbology.into(),
            data: data.into(),
        }
    }
}

/// Events pushed by the service once a session is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A scanner connected to the service
    DeviceArrival { device: DeviceId, name: String },

    /// A scanner left the service
    DeviceRemoval { device: DeviceId, name: String },

    /// A scanner decoded a barcode
    DataDecoded { device: DeviceId, payload: DecodedData },
}

impl CaptureEvent {
    pub fn device(&self) -> DeviceId {
        match self {
            CaptureEvent::DeviceArrival { device, .. }
            | CaptureEvent::DeviceRemoval { device, .. }
            | CaptureEvent::DataDecoded { device, .. } => *device,
        }
    }

    /// Short event-kind name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureEvent::DeviceArrival { .. } => "device-arrival",
            CaptureEvent::DeviceRemoval { .. } => "device-removal",
            CaptureEvent::DataDecoded { .. } => "data-decoded",
        }
    }
}

/// Who confirms decoded data back to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataConfirmationMode {
    Off,
    /// The device confirms locally
    Device,
    /// The service confirms
    Capture,
    /// The application confirms with an explicit feedback command
    App,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Beep {
    None,
    Good,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Led {
    None,
    Green,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rumble {
    None,
    Good,
    Bad,
}

/// Data-confirmation feedback pattern sent to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub beep: Beep,
    pub led: Led,
    pub rumble: Rumble,
}

impl Feedback {
    /// Good beep, green LED, good rumble
    pub fn positive() -> Self {
        Self {
            beep: Beep::Good,
            led: Led::Green,
            rumble: Rumble::Good,
        }
    }

    /// Bad beep, red LED, bad rumble
    pub fn negative() -> Self {
        Self {
            beep: Beep::Bad,
            led: Led::Red,
            rumble: Rumble::Bad,
        }
    }

    pub fn is_positive(&self) -> bool {
        *self == Self::positive()
    }
}
