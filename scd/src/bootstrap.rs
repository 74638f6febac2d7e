//! Service bootstrap
//!
//! The Capture service runs in its own process and is started by a one-shot
//! broadcast addressed to its well-known component. Nothing acknowledges the
//! signal; the session acquisition loop absorbs the startup latency.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ServiceConfig;

/// Start broadcast addressed to the Capture service component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartSignal {
    pub action: String,
    pub package: String,
    pub component: String,
    /// Deliver to the receiver with foreground priority
    #[serde(rename = "receiver-foreground")]
    pub receiver_foreground: bool,
}

impl StartSignal {
    pub fn from_config(config: &ServiceConfig) -> Self {
        debug!(action = %config.action, package = %config.package, "StartSignal::from_config: called");
        Self {
            action: config.action.clone(),
            package: config.package.clone(),
            component: config.component.clone(),
            receiver_foreground: config.receiver_foreground,
        }
    }
}

impl fmt::Display for StartSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}/{}", self.action, self.package, self.component)?;
        if self.receiver_foreground {
            write!(f, " [receiver-foreground]")?;
        }
        Ok(())
    }
}

/// Something that can deliver a start signal to the service
///
/// Fire-and-forget and idempotent: delivering the signal to a service that
/// is already running has no effect.
pub trait ServiceBootstrap: Send + Sync {
    fn start_service(&self, signal: &StartSignal);
}

/// Send the start signal through a bootstrap
pub fn start_capture_service(bootstrap: &dyn ServiceBootstrap, signal: &StartSignal) {
    info!(signal = %signal, "Sending Capture service start signal");
    bootstrap.start_service(signal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingBootstrap {
        sent: Mutex<Vec<StartSignal>>,
    }

    impl ServiceBootstrap for RecordingBootstrap {
        fn start_service(&self, signal: &StartSignal) {
            self.sent.lock().unwrap().push(signal.clone());
        }
    }

    #[test]
    fn test_signal_from_default_config() {
        let signal = StartSignal::from_config(&ServiceConfig::default());
        assert_eq!(signal.action, "com.socketmobile.capture.START_SERVICE");
        assert_eq!(signal.package, "com.socketmobile.companion");
        assert_eq!(signal.component, "com.socketmobile.capture.StartService");
        assert!(signal.receiver_foreground);
    }

    #[test]
    fn test_display() {
        let signal = StartSignal::from_config(&ServiceConfig::default());
        assert_eq!(
            signal.to_string(),
            "com.socketmobile.capture.START_SERVICE -> com.socketmobile.companion/com.socketmobile.capture.StartService [receiver-foreground]"
        );
    }

    #[test]
    fn test_start_is_repeatable() {
        let bootstrap = RecordingBootstrap {
            sent: Mutex::new(Vec::new()),
        };
        let signal = StartSignal::from_config(&ServiceConfig::default());
        start_capture_service(&bootstrap, &signal);
        start_capture_service(&bootstrap, &signal);
        assert_eq!(bootstrap.sent.lock().unwrap().len(), 2);
    }
}
