//! SimpleCapture - Capture service client
//!
//! A client for a barcode-scanner companion service that runs in its own
//! process and may take several seconds to come up. The crate starts the
//! service, opens a session with bounded retry-until-ready, and reacts to
//! scanner events once the session is open.
//!
//! # Core Concepts
//!
//! - **Bootstrap**: a fire-and-forget start signal; idempotent
//! - **Acquisition**: retry only on "not ready", fixed interval, hard ceiling
//! - **Dispatch**: one worker task per event, results marshalled as notifications
//! - **Close once**: teardown never overlaps an open and never repeats
//!
//! # Modules
//!
//! - [`capture`] - Capture service trait seam, result codes and the simulator
//! - [`bootstrap`] - Service start signal
//! - [`acquisition`] - Session acquisition loop
//! - [`dispatch`] - Device event dispatch sink
//! - [`notify`] - Notifications to the interactive context
//! - [`client`] - Client lifecycle
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod acquisition;
pub mod bootstrap;
pub mod capture;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod notify;

// Re-export commonly used types
pub use acquisition::{
    Acquisition, AcquisitionState, RetryPolicy, Session, Sleeper, TokioSleeper, acquire_session, should_retry,
};
pub use bootstrap::{ServiceBootstrap, StartSignal, start_capture_service};
pub use capture::{
    CaptureEvent, CaptureResult, CaptureService, Credentials, DataConfirmationMode, DecodedData, DeviceId, Fault,
    Feedback, ResultCode, SessionHandle, SimulatedCapture,
};
pub use client::{AcquisitionReport, CaptureClient, ClientError};
pub use config::{Config, ConfigError};
pub use dispatch::{ArrivalQuery, DispatchSettings, DispatchSink, DispatchStats, PayloadValidator, SuffixRule};
pub use notify::{Notification, NotificationEvent, Notifier, Verdict, run_notifier};
