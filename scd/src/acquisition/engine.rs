//! Session acquisition loop
//!
//! The Capture service may still be starting when the client comes up, and
//! its startup time is unknown (ten seconds or more right after a device
//! reset). The loop keeps opening until the service answers with anything
//! other than "not ready", or until the retry ceiling is reached.

use tracing::{debug, info, warn};

use super::policy::{Acquisition, AcquisitionState, RetryPolicy};
use super::sleeper::Sleeper;
use crate::capture::{CaptureService, Credentials};

/// Open a session, waiting out the service's startup
///
/// Issues no I/O besides the open calls. Exhausting the ceiling is reported
/// through the returned `Acquisition`, never as a panic or error.
pub async fn acquire_session(
    service: &dyn CaptureService,
    credentials: &Credentials,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Acquisition {
    debug!(
        app_id = %credentials.app_id,
        max_retries = policy.max_retries(),
        interval = ?policy.interval(),
        "acquire_session: called"
    );
    let mut state = AcquisitionState::start();

    loop {
        match state {
            AcquisitionState::Resolved(acquisition) => {
                match &acquisition.outcome {
                    Ok(session) => info!(
                        session = %session,
                        retries = acquisition.retries,
                        attempts = acquisition.attempts,
                        "Capture session opened"
                    ),
                    Err(code) if acquisition.is_exhausted() => warn!(
                        %code,
                        retries = acquisition.retries,
                        "Capture service not ready after retry ceiling"
                    ),
                    Err(code) => warn!(
                        %code,
                        retries = acquisition.retries,
                        attempts = acquisition.attempts,
                        "Capture open failed"
                    ),
                }
                return acquisition;
            }
            AcquisitionState::Retrying { attempts, retries } => {
                if attempts > 0 {
                    sleeper.sleep(policy.interval()).await;
                }
                debug!(attempt = attempts + 1, retries, "acquire_session: opening");
                let outcome = service.open(credentials).await;
                state = AcquisitionState::Retrying { attempts, retries }.step(outcome, policy);
            }
        }
    }
}
