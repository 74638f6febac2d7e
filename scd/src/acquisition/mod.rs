//! Session acquisition
//!
//! Opens a Capture session against a service whose process may still be
//! starting: bounded retry with a fixed interval, driven by a small state
//! machine and an injected sleeper.

mod engine;
mod policy;
mod session;
pub mod sleeper;

pub use engine::acquire_session;
pub use policy::{Acquisition, AcquisitionState, RetryPolicy, should_retry};
pub use session::Session;
pub use sleeper::{Sleeper, TokioSleeper};
