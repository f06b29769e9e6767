use crate::api::{ApiError, DoorbellClient, EventSummary, Stats};
use crate::pending::take_finished;
use crate::view::DashboardView;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const RECENT_EVENTS_LIMIT: u32 = 10;

#[derive(Debug)]
pub struct DashboardSnapshot {
    pub stats: Result<Stats, ApiError>,
    pub events: Result<Vec<EventSummary>, ApiError>,
}

/// Fetches both halves of the dashboard. Either half may fail on its own.
pub async fn fetch_dashboard(client: &DoorbellClient) -> DashboardSnapshot {
    let (stats, events) = tokio::join!(
        client.stats(),
        client.recent_events(RECENT_EVENTS_LIMIT)
    );
    DashboardSnapshot { stats, events }
}

/// Updates the counters that loaded; failures are logged and left for the next tick.
pub fn apply_snapshot(view: &mut DashboardView, snapshot: DashboardSnapshot) {
    match snapshot.stats {
        Ok(stats) => view.update_stats(&stats),
        Err(err) => tracing::warn!(error = %err, "dashboard stats refresh failed"),
    }
    match snapshot.events {
        Ok(events) => view.update_event_counts(events),
        Err(err) => tracing::warn!(error = %err, "dashboard events refresh failed"),
    }
}

/// Fixed-period dashboard poller.
///
/// The schedule always advances; a tick only does work when the caller says the
/// dashboard is visible and no earlier refresh is still running.
#[derive(Debug)]
pub struct AutoRefresh {
    interval: Duration,
    next_tick: Instant,
    pending: Option<JoinHandle<DashboardSnapshot>>,
    queued: bool,
}

impl AutoRefresh {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self::with_interval(REFRESH_INTERVAL, now)
    }

    #[must_use]
    pub fn with_interval(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_tick: now + interval,
            pending: None,
            queued: false,
        }
    }

    /// Consumes the tick if one is due and reports whether a refresh should run.
    pub fn tick_due(&mut self, now: Instant, visible: bool) -> bool {
        if now < self.next_tick {
            return false;
        }
        self.next_tick = now + self.interval;
        if !visible {
            tracing::trace!("dashboard not visible; skipping refresh tick");
            return false;
        }
        self.pending.is_none()
    }

    /// Starts a refresh right away unless one is already running.
    pub fn start(&mut self, client: &DoorbellClient) -> bool {
        if self.pending.is_some() {
            return false;
        }
        let client = client.clone();
        self.pending = Some(tokio::spawn(async move { fetch_dashboard(&client).await }));
        true
    }

    /// Like `start`, but a refresh already in flight gets a follow-up instead of
    /// being treated as enough. The running one may predate the change.
    pub fn request(&mut self, client: &DoorbellClient) -> bool {
        if self.start(client) {
            return true;
        }
        self.queued = true;
        false
    }

    /// Starts the follow-up queued by `request` once the previous refresh is done.
    pub fn start_queued(&mut self, client: &DoorbellClient) -> bool {
        if !self.queued || self.pending.is_some() {
            return false;
        }
        self.queued = false;
        self.start(client)
    }

    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub async fn poll(&mut self, view: &mut DashboardView) -> bool {
        match take_finished(&mut self.pending).await {
            Some(Ok(snapshot)) => {
                apply_snapshot(view, snapshot);
                true
            }
            Some(Err(err)) => {
                tracing::error!(error = %err, "dashboard refresh task failed");
                false
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> DoorbellClient {
        DoorbellClient::new(&ClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(2),
            token: None,
        })
        .unwrap_or_else(|err| panic!("client should build: {err:#}"))
    }

    #[test]
    fn ticks_follow_the_interval() {
        let start = Instant::now();
        let mut refresh = AutoRefresh::new(start);
        assert!(!refresh.tick_due(start + Duration::from_secs(29), true));
        assert!(refresh.tick_due(start + Duration::from_secs(30), true));
        assert!(!refresh.tick_due(start + Duration::from_secs(31), true));
        assert!(refresh.tick_due(start + Duration::from_secs(60), true));
    }

    #[test]
    fn hidden_ticks_are_consumed_without_work() {
        let start = Instant::now();
        let mut refresh = AutoRefresh::new(start);
        assert!(!refresh.tick_due(start + REFRESH_INTERVAL, false));
        // The hidden tick still moved the schedule forward.
        assert!(!refresh.tick_due(start + REFRESH_INTERVAL + Duration::from_secs(1), true));
        assert!(refresh.tick_due(start + REFRESH_INTERVAL * 2, true));
    }

    #[tokio::test]
    async fn snapshot_updates_counters_in_place() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_events": 42,
                "known_events": 30,
                "unknown_events": 12,
                "total_persons": 4,
                "storage_usage": { "total_mb": 12.5 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [
                    { "is_known": true },
                    { "is_known": true },
                    { "is_known": false }
                ]
            })))
            .mount(&server)
            .await;

        let mut view = DashboardView::default();
        apply_snapshot(&mut view, fetch_dashboard(&client_for(&server)).await);
        assert_eq!(view.total_events, Some(42));
        assert_eq!(view.known_faces, Some(30));
        assert_eq!(view.unknown_faces, Some(12));
        assert_eq!(view.total_persons, Some(4));
        assert_eq!(view.recent_known, 2);
        assert_eq!(view.recent_unknown, 1);
    }

    #[tokio::test]
    async fn failed_stats_leave_counters_untouched_but_events_still_apply() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "detail": "database locked"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "events": [{ "is_known": false }]
            })))
            .mount(&server)
            .await;

        let mut view = DashboardView {
            total_events: Some(7),
            ..DashboardView::default()
        };
        apply_snapshot(&mut view, fetch_dashboard(&client_for(&server)).await);
        assert_eq!(view.total_events, Some(7));
        assert_eq!(view.recent_unknown, 1);
    }

    #[tokio::test]
    async fn background_refresh_is_polled_into_view() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_events": 1, "known_events": 1, "unknown_events": 0, "total_persons": 1
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "events": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut refresh = AutoRefresh::new(Instant::now());
        let mut view = DashboardView::default();
        assert!(refresh.start(&client));
        assert!(!refresh.start(&client));

        let mut applied = false;
        for _ in 0..200 {
            if refresh.poll(&mut view).await {
                applied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(applied);
        assert!(!refresh.is_running());
        assert_eq!(view.total_persons, Some(1));
    }

    #[tokio::test]
    async fn request_during_refresh_queues_a_follow_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "total_events": 5 }))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "events": [] })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut refresh = AutoRefresh::new(Instant::now());
        let mut view = DashboardView::default();
        assert!(refresh.start(&client));
        assert!(!refresh.request(&client));
        assert!(refresh.is_queued());
        assert!(!refresh.start_queued(&client));

        let mut polled = false;
        for _ in 0..300 {
            if refresh.poll(&mut view).await {
                polled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(polled);
        assert!(refresh.start_queued(&client));
        assert!(!refresh.is_queued());
        assert!(!refresh.start_queued(&client));

        for _ in 0..300 {
            if refresh.poll(&mut view).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!refresh.is_running());
    }
}
