//! Capture service seam
//!
//! The vendor Capture service is closed source and runs out of process.
//! This module describes the part of its client surface the crate consumes
//! ([`CaptureService`]), the values crossing that surface, and an in-process
//! [`SimulatedCapture`] used by the demo binary and the tests.

mod result;
pub mod service;
mod simulator;
mod types;

pub use result::{CaptureResult, ResultCode};
pub use service::CaptureService;
pub use simulator::{Fault, ScriptAction, ScriptStep, SimulatedCapture, default_script};
pub use types::{
    Beep, CaptureEvent, Credentials, DataConfirmationMode, DecodedData, DeviceId, Feedback, Led, Rumble,
    SessionHandle,
};
