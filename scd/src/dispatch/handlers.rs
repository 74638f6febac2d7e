//! Per-event handlers
//!
//! Each handler runs on its own worker task and reports to the interactive
//! context only through the notifier.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::debug;

use super::ArrivalQuery;
use super::validator::PayloadValidator;
use crate::acquisition::Session;
use crate::capture::{CaptureResult, DataConfirmationMode, DecodedData, DeviceId, Feedback};
use crate::notify::{FollowUp, NotificationEvent, Notifier, Verdict};

/// Announce the device, then run its follow-up queries and configuration concurrently
///
/// A failing call produces a `FollowUpFailed` notification and leaves the
/// other calls alone.
pub async fn handle_arrival(
    session: Arc<Session>,
    notifier: Notifier,
    queries: Arc<[ArrivalQuery]>,
    mode: DataConfirmationMode,
    device: DeviceId,
    name: String,
) {
    debug!(%device, %name, ?queries, "handle_arrival: called");
    notifier
        .notify(NotificationEvent::DeviceArrived {
            device,
            name: name.clone(),
        })
        .await;

    let mut calls: Vec<BoxFuture<'_, ()>> = queries
        .iter()
        .map(|query| run_query(&session, &notifier, *query, device).boxed())
        .collect();
    calls.push(configure_confirmation(&session, &notifier, mode, device).boxed());

    join_all(calls).await;
    debug!(%device, "handle_arrival: follow-ups finished");
}

async fn run_query(session: &Session, notifier: &Notifier, query: ArrivalQuery, device: DeviceId) {
    let event = match query {
        ArrivalQuery::Name => answer(name(session, device).await, device, FollowUp::Name, |name| {
            NotificationEvent::DeviceName { device, name }
        }),
        ArrivalQuery::Battery => answer(battery(session, device).await, device, FollowUp::Battery, |percent| {
            NotificationEvent::BatteryLevel { device, percent }
        }),
        ArrivalQuery::Firmware => answer(firmware(session, device).await, device, FollowUp::Firmware, |version| {
            NotificationEvent::FirmwareVersion { device, version }
        }),
    };
    notifier.notify(event).await;
}

fn answer<T>(
    result: CaptureResult<T>,
    device: DeviceId,
    follow_up: FollowUp,
    ok: impl FnOnce(T) -> NotificationEvent,
) -> NotificationEvent {
    match result {
        Ok(value) => ok(value),
        Err(code) => {
            debug!(%device, %follow_up, %code, "answer: follow-up failed");
            NotificationEvent::FollowUpFailed {
                device,
                follow_up,
                code,
            }
        }
    }
}

async fn name(session: &Session, device: DeviceId) -> CaptureResult<String> {
    session.service().device_name(session.handle()?, device).await
}

async fn battery(session: &Session, device: DeviceId) -> CaptureResult<u8> {
    session.service().battery_level(session.handle()?, device).await
}

async fn firmware(session: &Session, device: DeviceId) -> CaptureResult<String> {
    session.service().firmware_version(session.handle()?, device).await
}

async fn configure_confirmation(session: &Session, notifier: &Notifier, mode: DataConfirmationMode, device: DeviceId) {
    let result = match session.handle() {
        Ok(handle) => session.service().set_data_confirmation_mode(handle, mode).await,
        Err(code) => Err(code),
    };
    match result {
        Ok(()) => debug!(%device, ?mode, "configure_confirmation: mode set"),
        Err(code) => {
            notifier
                .notify(NotificationEvent::FollowUpFailed {
                    device,
                    follow_up: FollowUp::ConfirmationMode,
                    code,
                })
                .await
        }
    }
}

/// Announce the removal; the device is gone, so nothing is queried
pub async fn handle_removal(notifier: Notifier, device: DeviceId, name: String) {
    debug!(%device, %name, "handle_removal: called");
    notifier.notify(NotificationEvent::DeviceRemoved { device, name }).await;
}

/// Validate the payload and send exactly one feedback command to its device
pub async fn handle_decoded(
    session: Arc<Session>,
    notifier: Notifier,
    validator: Arc<dyn PayloadValidator>,
    device: DeviceId,
    payload: DecodedData,
) {
    let verdict = if validator.is_rejected(&payload) {
        Verdict::Rejected
    } else {
        Verdict::Accepted
    };
    let feedback = match verdict {
        Verdict::Accepted => Feedback::positive(),
        Verdict::Rejected => Feedback::negative(),
    };
    debug!(%device, data = %payload.data, ?verdict, "handle_decoded: called");

    let result = match session.handle() {
        Ok(handle) => session.service().set_data_confirmation(handle, device, feedback).await,
        Err(code) => Err(code),
    };

    notifier
        .notify(NotificationEvent::Decoded {
            device,
            symbology: payload.symbology,
            data: payload.data,
            verdict,
        })
        .await;
    if let Err(code) = result {
        notifier.notify(NotificationEvent::FeedbackFailed { device, code }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::service::mock::MockCapture;
    use crate::capture::{ResultCode, SessionHandle};
    use crate::dispatch::SuffixRule;
    use crate::notify::Notification;
    use tokio::sync::mpsc;

    fn session(mock: Arc<MockCapture>) -> Arc<Session> {
        Arc::new(Session::new(mock, SessionHandle::generate()))
    }

    fn drain(rx: &mut mpsc::Receiver<Notification>) -> Vec<NotificationEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).map(|n| n.event).collect()
    }

    fn default_queries() -> Arc<[ArrivalQuery]> {
        Arc::from(vec![ArrivalQuery::Battery, ArrivalQuery::Firmware])
    }

    #[tokio::test]
    async fn test_arrival_reports_queries_and_sets_mode() {
        let mock = Arc::new(MockCapture::ready());
        let (notifier, mut rx) = Notifier::channel(16);
        let device = DeviceId::generate();

        handle_arrival(
            session(mock.clone()),
            notifier,
            default_queries(),
            DataConfirmationMode::App,
            device,
            "S700".to_string(),
        )
        .await;

        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            NotificationEvent::DeviceArrived {
                device,
                name: "S700".to_string()
            }
        );
        assert!(events.contains(&NotificationEvent::BatteryLevel { device, percent: 87 }));
        assert!(events.contains(&NotificationEvent::FirmwareVersion {
            device,
            version: "10.3.5".to_string()
        }));
        assert_eq!(mock.modes(), vec![DataConfirmationMode::App]);
        assert_eq!(mock.query_calls(), 3);
    }

    #[tokio::test]
    async fn test_arrival_survives_failed_battery_query() {
        let mut mock = MockCapture::ready();
        mock.battery_result = Err(ResultCode::TIMEOUT);
        let mock = Arc::new(mock);
        let (notifier, mut rx) = Notifier::channel(16);
        let device = DeviceId::generate();

        handle_arrival(
            session(mock.clone()),
            notifier,
            default_queries(),
            DataConfirmationMode::App,
            device,
            "S700".to_string(),
        )
        .await;

        let events = drain(&mut rx);
        assert!(events.contains(&NotificationEvent::FollowUpFailed {
            device,
            follow_up: FollowUp::Battery,
            code: ResultCode::TIMEOUT
        }));
        assert!(events.contains(&NotificationEvent::FirmwareVersion {
            device,
            version: "10.3.5".to_string()
        }));
        assert_eq!(mock.modes(), vec![DataConfirmationMode::App]);
    }

    #[tokio::test]
    async fn test_arrival_with_name_query() {
        let mock = Arc::new(MockCapture::ready());
        let (notifier, mut rx) = Notifier::channel(16);
        let device = DeviceId::generate();

        handle_arrival(
            session(mock),
            notifier,
            Arc::from(vec![ArrivalQuery::Name]),
            DataConfirmationMode::App,
            device,
            "S700".to_string(),
        )
        .await;

        assert!(drain(&mut rx).contains(&NotificationEvent::DeviceName {
            device,
            name: "Socket S700".to_string()
        }));
    }

    #[tokio::test]
    async fn test_removal_never_queries() {
        let mock = Arc::new(MockCapture::ready());
        let (notifier, mut rx) = Notifier::channel(4);
        let device = DeviceId::generate();

        handle_removal(notifier, device, "S700".to_string()).await;

        assert_eq!(
            drain(&mut rx),
            vec![NotificationEvent::DeviceRemoved {
                device,
                name: "S700".to_string()
            }]
        );
        assert_eq!(mock.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_decoded_rejected_payload_gets_negative_feedback() {
        let mock = Arc::new(MockCapture::ready());
        let (notifier, _rx) = Notifier::channel(4);
        let device = DeviceId::generate();

        handle_decoded(
            session(mock.clone()),
            notifier,
            Arc::new(SuffixRule::new("6")),
            device,
            DecodedData::new("Code 128", "A1236"),
        )
        .await;

        assert_eq!(mock.confirmations(), vec![(device, Feedback::negative())]);
    }

    #[tokio::test]
    async fn test_decoded_accepted_payload_gets_positive_feedback() {
        let mock = Arc::new(MockCapture::ready());
        let (notifier, mut rx) = Notifier::channel(4);
        let device = DeviceId::generate();

        handle_decoded(
            session(mock.clone()),
            notifier,
            Arc::new(SuffixRule::new("6")),
            device,
            DecodedData::new("Code 128", "A123"),
        )
        .await;

        assert_eq!(mock.confirmations(), vec![(device, Feedback::positive())]);
        assert!(matches!(
            drain(&mut rx)[0],
            NotificationEvent::Decoded {
                verdict: Verdict::Accepted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_feedback_failure_is_reported() {
        let mut mock = MockCapture::ready();
        mock.feedback_result = Err(ResultCode::DEVICE_NOT_FOUND);
        let mock = Arc::new(mock);
        let (notifier, mut rx) = Notifier::channel(4);
        let device = DeviceId::generate();

        handle_decoded(
            session(mock),
            notifier,
            Arc::new(SuffixRule::new("6")),
            device,
            DecodedData::new("Code 128", "A123"),
        )
        .await;

        assert!(drain(&mut rx).contains(&NotificationEvent::FeedbackFailed {
            device,
            code: ResultCode::DEVICE_NOT_FOUND
        }));
    }

    #[tokio::test]
    async fn test_closed_session_skips_service_calls() {
        let mock = Arc::new(MockCapture::ready());
        let session = session(mock.clone());
        session.close().await.unwrap();
        let (notifier, mut rx) = Notifier::channel(4);
        let device = DeviceId::generate();

        handle_decoded(
            session,
            notifier,
            Arc::new(SuffixRule::new("6")),
            device,
            DecodedData::new("Code 128", "A123"),
        )
        .await;

        assert_eq!(mock.query_calls(), 0);
        assert!(drain(&mut rx).contains(&NotificationEvent::FeedbackFailed {
            device,
            code: ResultCode::INVALID_HANDLE
        }));
    }
}
