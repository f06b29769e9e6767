use crate::api::{ApiError, CaptureResponse, DoorbellClient};
use crate::notify::{Notifications, Severity};
use crate::pending::take_finished;
use crate::view::CaptureTriggers;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Gives the user time to read the result before the dashboard reloads.
pub const RELOAD_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    Idle,
    Capturing,
}

/// Single-flight manual capture.
#[derive(Debug, Default)]
pub struct CaptureController {
    pending: Option<JoinHandle<Result<CaptureResponse, ApiError>>>,
    reload_at: Option<Instant>,
}

impl CaptureController {
    #[must_use]
    pub fn state(&self) -> CaptureState {
        if self.pending.is_some() {
            CaptureState::Capturing
        } else {
            CaptureState::Idle
        }
    }

    /// Starts a capture. A trigger while one is already running is ignored.
    pub fn trigger(&mut self, client: &DoorbellClient, triggers: &mut CaptureTriggers) -> bool {
        if self.pending.is_some() {
            tracing::debug!("capture already in flight; ignoring trigger");
            return false;
        }

        tracing::info!("manual frame capture requested");
        triggers.set_busy();
        let client = client.clone();
        self.pending = Some(tokio::spawn(async move { client.capture().await }));
        true
    }

    /// Finishes a completed capture. Returns `true` when one completed.
    pub async fn poll(
        &mut self,
        notifications: &mut Notifications,
        triggers: &mut CaptureTriggers,
        now: Instant,
    ) -> bool {
        let Some(joined) = take_finished(&mut self.pending).await else {
            return false;
        };
        let result = joined.unwrap_or_else(|err| Err(err.into()));
        self.finish(result, notifications, triggers, now);
        true
    }

    fn finish(
        &mut self,
        result: Result<CaptureResponse, ApiError>,
        notifications: &mut Notifications,
        triggers: &mut CaptureTriggers,
        now: Instant,
    ) {
        match result {
            Ok(response) => {
                let faces = response.faces_detected();
                tracing::info!(faces, image = ?response.image_path, "frame captured");
                notifications.notify("Frame captured successfully!", Severity::Success);
                if faces > 0 {
                    notifications.notify(format!("Detected {faces} face(s)"), Severity::Info);
                }
                self.reload_at = Some(now + RELOAD_DELAY);
            }
            Err(err) => {
                tracing::warn!(error = %err, "capture failed");
                notifications.notify(
                    err.user_message("Error capturing frame: ", "Network error during capture"),
                    Severity::Error,
                );
            }
        }
        triggers.restore();
    }

    /// `true` once the post-capture reload delay has elapsed. Fires once.
    pub fn reload_due(&mut self, now: Instant) -> bool {
        match self.reload_at {
            Some(deadline) if now >= deadline => {
                self.reload_at = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn reload_pending(&self) -> bool {
        self.reload_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: String) -> DoorbellClient {
        DoorbellClient::new(&ClientConfig {
            base_url,
            timeout: Duration::from_secs(2),
            token: None,
        })
        .unwrap_or_else(|err| panic!("client should build: {err:#}"))
    }

    async fn run_to_completion(
        controller: &mut CaptureController,
        notifications: &mut Notifications,
        triggers: &mut CaptureTriggers,
    ) {
        for _ in 0..300 {
            if controller
                .poll(notifications, triggers, Instant::now())
                .await
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("capture did not complete");
    }

    #[tokio::test]
    async fn repeated_triggers_issue_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/camera/capture"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "results": { "faces_detected": 0 } }))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let mut controller = CaptureController::default();
        let mut notifications = Notifications::default();
        let mut triggers = CaptureTriggers::new(2);

        assert!(controller.trigger(&client, &mut triggers));
        assert_eq!(controller.state(), CaptureState::Capturing);
        assert!(!triggers.all_enabled());
        assert!(!controller.trigger(&client, &mut triggers));
        assert!(!controller.trigger(&client, &mut triggers));

        run_to_completion(&mut controller, &mut notifications, &mut triggers).await;
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(triggers.all_enabled());
        assert_eq!(notifications.active().len(), 1);
        assert_eq!(
            notifications.active()[0].message,
            "Frame captured successfully!"
        );
    }

    #[tokio::test]
    async fn detected_faces_add_info_notification_and_schedule_reload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/camera/capture"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "results": { "faces_detected": 3 } })),
            )
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let mut controller = CaptureController::default();
        let mut notifications = Notifications::default();
        let mut triggers = CaptureTriggers::new(1);

        controller.trigger(&client, &mut triggers);
        run_to_completion(&mut controller, &mut notifications, &mut triggers).await;

        let messages: Vec<_> = notifications
            .active()
            .iter()
            .map(|notification| (notification.message.as_str(), notification.severity))
            .collect();
        assert_eq!(
            messages,
            vec![
                ("Frame captured successfully!", Severity::Success),
                ("Detected 3 face(s)", Severity::Info),
            ]
        );
        assert!(controller.reload_pending());
        assert!(!controller.reload_due(Instant::now()));
        assert!(controller.reload_due(Instant::now() + RELOAD_DELAY));
        assert!(!controller.reload_due(Instant::now() + RELOAD_DELAY));
    }

    #[tokio::test]
    async fn backend_failure_reports_detail_and_restores_triggers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/camera/capture"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({ "detail": "Camera manager not available" })),
            )
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        let mut controller = CaptureController::default();
        let mut notifications = Notifications::default();
        let mut triggers = CaptureTriggers::new(2);

        controller.trigger(&client, &mut triggers);
        run_to_completion(&mut controller, &mut notifications, &mut triggers).await;

        assert!(triggers.all_enabled());
        assert!(!controller.reload_pending());
        assert_eq!(
            notifications.active()[0].message,
            "Error capturing frame: Camera manager not available"
        );
        assert_eq!(notifications.active()[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn network_failure_reports_generic_message_and_restores_triggers() {
        let client = client_for("http://127.0.0.1:9".to_owned());
        let mut controller = CaptureController::default();
        let mut notifications = Notifications::default();
        let mut triggers = CaptureTriggers::new(2);

        controller.trigger(&client, &mut triggers);
        run_to_completion(&mut controller, &mut notifications, &mut triggers).await;

        assert!(triggers.all_enabled());
        assert_eq!(controller.state(), CaptureState::Idle);
        assert_eq!(
            notifications.active()[0].message,
            "Network error during capture"
        );
    }

    #[test]
    fn undecodable_success_body_is_treated_like_a_network_failure() {
        let mut controller = CaptureController::default();
        let mut notifications = Notifications::default();
        let mut triggers = CaptureTriggers::new(1);
        triggers.set_busy();

        controller.finish(
            Err(ApiError::Decode("expected value".to_owned())),
            &mut notifications,
            &mut triggers,
            Instant::now(),
        );
        assert!(triggers.all_enabled());
        assert_eq!(
            notifications.active()[0].message,
            "Network error during capture"
        );
    }
}
