//! Rendering notifications as short transient lines

use colored::Colorize;
use tracing::debug;

use super::messages::{Notification, NotificationEvent, Verdict};
use crate::cli::OutputFormat;

/// Render one notification as a single line
pub fn render(notification: &Notification, format: &OutputFormat) -> String {
    debug!(?format, "render: called");
    match format {
        OutputFormat::Json => match serde_json::to_string(notification) {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "render: JSON serialization failed");
                json_error(&e)
            }
        },
        OutputFormat::Text => {
            let time = notification.at.with_timezone(&chrono::Local).format("%H:%M:%S");
            format!("[{}] {}", time, describe(&notification.event))
        }
    }
}

fn json_error(error: &serde_json::Error) -> String {
    serde_json::json!({ "error": error.to_string() }).to_string()
}

/// Human-readable text of a notification, colored by outcome
pub fn describe(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::ServiceStartRequested { target } => format!("Start signal sent: {}", target),
        NotificationEvent::SessionOpened { retries, .. } => {
            format!("StartCaptureClient result is: 0 Retries: {}", retries)
                .green()
                .to_string()
        }
        NotificationEvent::SessionFailed {
            code,
            retries,
            exhausted,
        } => {
            let mut line = format!("StartCaptureClient result is: {} Retries: {}", code.value(), retries);
            if *exhausted {
                line.push_str(" (service never became ready)");
            } else {
                line.push_str(&format!(" ({})", code.name()));
            }
            line.red().to_string()
        }
        NotificationEvent::SessionClosed { code: None } => "Capture session closed".to_string(),
        NotificationEvent::SessionClosed { code: Some(code) } => {
            format!("Capture session close failed: {}", code).yellow().to_string()
        }
        NotificationEvent::DeviceArrived { name, .. } => format!("Device arrival: {}", name).bold().to_string(),
        NotificationEvent::DeviceRemoved { name, .. } => format!("Device removal: {}", name).bold().to_string(),
        NotificationEvent::DeviceName { device, name } => format!("Device {} name: {}", device, name),
        NotificationEvent::BatteryLevel { device, percent } => {
            format!("Device {} battery level: {}%", device, percent)
        }
        NotificationEvent::FirmwareVersion { device, version } => {
            format!("Device {} firmware version: {}", device, version)
        }
        NotificationEvent::FollowUpFailed {
            device,
            follow_up,
            code,
        } => format!("Device {} {} failed: {}", device, follow_up, code)
            .yellow()
            .to_string(),
        NotificationEvent::Decoded {
            symbology,
            data,
            verdict,
            ..
        } => {
            let line = format!("Decoded {} [{}]", data, symbology);
            match verdict {
                Verdict::Accepted => format!("{} good", line).green().to_string(),
                Verdict::Rejected => format!("{} bad", line).red().to_string(),
            }
        }
        NotificationEvent::FeedbackFailed { device, code } => {
            format!("Device {} feedback failed: {}", device, code).yellow().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceId, ResultCode};

    fn plain(event: NotificationEvent) -> String {
        colored::control::set_override(false);
        describe(&event)
    }

    #[test]
    fn test_acquisition_lines_match_demo_wording() {
        assert_eq!(
            plain(NotificationEvent::SessionOpened { retries: 3, attempts: 4 }),
            "StartCaptureClient result is: 0 Retries: 3"
        );
        assert_eq!(
            plain(NotificationEvent::SessionFailed {
                code: ResultCode::UNABLE_OPEN_DEVICE,
                retries: 60,
                exhausted: true
            }),
            "StartCaptureClient result is: -27 Retries: 60 (service never became ready)"
        );
    }

    #[test]
    fn test_decoded_line_carries_verdict() {
        let line = plain(NotificationEvent::Decoded {
            device: DeviceId::generate(),
            symbology: "Code 128".to_string(),
            data: "A1236".to_string(),
            verdict: Verdict::Rejected,
        });
        assert_eq!(line, "Decoded A1236 [Code 128] bad");
    }

    #[test]
    fn test_json_render_is_one_line() {
        let note = Notification::now(NotificationEvent::SessionClosed { code: None });
        let line = render(&note, &OutputFormat::Json);
        assert!(!line.contains('\n'));
        assert!(line.contains("\"type\":\"session-closed\""));
    }

    #[test]
    fn test_text_render_has_timestamp() {
        colored::control::set_override(false);
        let note = Notification::now(NotificationEvent::ServiceStartRequested {
            target: "svc".to_string(),
        });
        let line = render(&note, &OutputFormat::Text);
        assert!(line.starts_with('['));
        assert!(line.ends_with("Start signal sent: svc"));
    }

    #[test]
    fn test_json_error_line_escapes_message() {
        let error = serde_json::from_str::<u8>("\"x\"").unwrap_err();
        assert!(error.to_string().contains('"'));

        let line = json_error(&error);
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["error"], error.to_string());
    }
}
