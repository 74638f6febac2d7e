//! Capture result codes
//!
//! Every call into the Capture service answers with a signed result code.
//! Zero is success, negative values are failures. Only one failure is treated
//! specially by this crate: `UNABLE_OPEN_DEVICE`, which the service reports
//! while its process is still starting.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failing result code returned by the Capture service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(transparent)]
#[error("{} ({})", self.name(), self.0)]
pub struct ResultCode(pub i64);

impl ResultCode {
    /// Success
    pub const NO_ERROR: ResultCode = ResultCode(0);

    /// Not supported by the device or service
    pub const NOT_SUPPORTED: ResultCode = ResultCode(-15);

    /// Unknown or already closed handle
    pub const INVALID_HANDLE: ResultCode = ResultCode(-18);

    /// Device is not in the service's device list
    pub const DEVICE_NOT_FOUND: ResultCode = ResultCode(-19);

    /// Service process has not finished starting
    pub const UNABLE_OPEN_DEVICE: ResultCode = ResultCode(-27);

    /// Device did not answer in time
    pub const TIMEOUT: ResultCode = ResultCode(-32);

    /// Raw numeric value
    pub fn value(&self) -> i64 {
        self.0
    }

    /// True when the service is still starting and the call may be retried
    pub fn is_not_ready(&self) -> bool {
        *self == Self::UNABLE_OPEN_DEVICE
    }

    pub fn is_success(&self) -> bool {
        self.0 >= 0
    }

    /// Symbolic name of the code, or "ESKT_UNKNOWN" for codes this crate does not know
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "ESKT_NOERROR",
            -15 => "ESKT_NOTSUPPORTED",
            -18 => "ESKT_INVALIDHANDLE",
            -19 => "ESKT_DEVICENOTFOUND",
            -27 => "ESKT_UNABLEOPENDEVICE",
            -32 => "ESKT_TIMEOUT",
            _ => "ESKT_UNKNOWN",
        }
    }
}

/// Result of a Capture service call
pub type CaptureResult<T> = Result<T, ResultCode>;
