//! Retry policy and the acquisition state machine
//!
//! The decision of whether to try again is a pure function of the last result
//! code and the retry count, so it can be tested without any timer.

use std::time::Duration;

use tracing::{debug, warn};

use crate::capture::{CaptureResult, ResultCode, SessionHandle};
use crate::config::AcquisitionConfig;

/// Bounded retry with a fixed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// Create a policy; a zero ceiling is raised to one
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        debug!(max_retries, ?interval, "RetryPolicy::new: called");
        let max_retries = if max_retries == 0 {
            warn!("max-retries of 0 would never stop retrying, using 1");
            1
        } else {
            max_retries
        };
        Self { max_retries, interval }
    }

    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(config.max_retries, config.retry_interval())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AcquisitionConfig::default())
    }
}

/// Decide whether another open attempt should follow
///
/// `retries` counts the "not ready" answers seen so far, including the one
/// carried by `code`. Only "not ready" is retryable, and never past `max_retries`.
pub fn should_retry(code: ResultCode, retries: u32, max_retries: u32) -> bool {
    code.is_not_ready() && retries < max_retries
}

/// Final result of one acquisition sequence
#[derive(Debug)]
pub struct Acquisition {
    /// Session handle, or the last failing result code
    pub outcome: CaptureResult<SessionHandle>,

    /// "Not ready" answers consumed; never exceeds the policy ceiling
    pub retries: u32,

    /// Open calls issued
    pub attempts: u32,
}

impl Acquisition {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Ended because the service never became ready within the ceiling
    pub fn is_exhausted(&self) -> bool {
        matches!(&self.outcome, Err(code) if code.is_not_ready())
    }

    /// Result code as the service reported it, `NO_ERROR` on success
    pub fn code(&self) -> ResultCode {
        match &self.outcome {
            Ok(_) => ResultCode::NO_ERROR,
            Err(code) => *code,
        }
    }
}

/// Acquisition state machine
#[derive(Debug)]
pub enum AcquisitionState {
    /// Another open attempt is due
    Retrying { attempts: u32, retries: u32 },

    /// Done, successfully or not
    Resolved(Acquisition),
}

impl AcquisitionState {
    pub fn start() -> Self {
        AcquisitionState::Retrying { attempts: 0, retries: 0 }
    }

    /// Feed the outcome of one open attempt
    pub fn step(self, outcome: CaptureResult<SessionHandle>, policy: &RetryPolicy) -> Self {
        let (attempts, retries) = match self {
            AcquisitionState::Retrying { attempts, retries } => (attempts + 1, retries),
            resolved @ AcquisitionState::Resolved(_) => {
                debug!("AcquisitionState::step: already resolved, ignoring outcome");
                return resolved;
            }
        };

        match outcome {
            Ok(session) => {
                debug!(attempts, retries, "AcquisitionState::step: open succeeded");
                AcquisitionState::Resolved(Acquisition {
                    outcome: Ok(session),
                    retries,
                    attempts,
                })
            }
            Err(code) => {
                let retries = if code.is_not_ready() { retries + 1 } else { retries };
                if should_retry(code, retries, policy.max_retries()) {
                    debug!(attempts, retries, %code, "AcquisitionState::step: retrying");
                    AcquisitionState::Retrying { attempts, retries }
                } else {
                    debug!(attempts, retries, %code, "AcquisitionState::step: giving up");
                    AcquisitionState::Resolved(Acquisition {
                        outcome: Err(code),
                        retries,
                        attempts,
                    })
                }
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AcquisitionState::Resolved(_))
    }
}
