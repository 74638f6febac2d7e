//! Notification types sent to the interactive context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::{DeviceId, ResultCode};

/// Device call whose result is surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FollowUp {
    Name,
    Battery,
    Firmware,
    ConfirmationMode,
}

impl std::fmt::Display for FollowUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FollowUp::Name => "device name",
            FollowUp::Battery => "battery level",
            FollowUp::Firmware => "firmware version",
            FollowUp::ConfirmationMode => "data confirmation mode",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of validating a decoded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// Vocabulary of user-facing notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationEvent {
    /// Start signal sent to the service
    ServiceStartRequested { target: String },

    /// Acquisition ended with an open session
    SessionOpened { retries: u32, attempts: u32 },

    /// Acquisition ended without a session
    SessionFailed {
        code: ResultCode,
        retries: u32,
        exhausted: bool,
    },

    /// Session closed at teardown; `code` is set when the service refused the close
    SessionClosed { code: Option<ResultCode> },

    DeviceArrived { device: DeviceId, name: String },

    DeviceRemoved { device: DeviceId, name: String },

    DeviceName { device: DeviceId, name: String },

    BatteryLevel { device: DeviceId, percent: u8 },

    FirmwareVersion { device: DeviceId, version: String },

    /// A follow-up call failed; the others are unaffected
    FollowUpFailed {
        device: DeviceId,
        follow_up: FollowUp,
        code: ResultCode,
    },

    /// Decoded data and the feedback sent back for it
    Decoded {
        device: DeviceId,
        symbology: String,
        data: String,
        verdict: Verdict,
    },

    /// The feedback command for a decoded payload failed
    FeedbackFailed { device: DeviceId, code: ResultCode },
}

/// A timestamped notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub at: DateTime<Utc>,

    #[serde(flatten)]
    pub event: NotificationEvent,
}

impl Notification {
    pub fn now(event: NotificationEvent) -> Self {
        Self { at: Utc::now(), event }
    }
}
