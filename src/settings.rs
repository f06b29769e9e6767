use crate::api::{ApiError, CameraDescriptor, CameraTestOutcome, DoorbellClient};
use crate::notify::{Notifications, Severity};
use crate::pending::take_finished;
use crate::validation::validate_required;
use crate::view::{CameraSelect, SettingsView, TextField};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub const DEFAULT_CONFIDENCE: f64 = 0.6;
pub const PANEL_NOTIFICATION_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceMode {
    #[default]
    Url,
    Entity,
}

impl SourceMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Entity => "entity",
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Url => Self::Entity,
            Self::Entity => Self::Url,
        }
    }
}

/// Where the doorbell camera is read from. Exactly one source is ever active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    Url(String),
    Entity(String),
}

impl CameraSource {
    #[must_use]
    pub fn new(mode: SourceMode, value: impl Into<String>) -> Self {
        match mode {
            SourceMode::Url => Self::Url(value.into()),
            SourceMode::Entity => Self::Entity(value.into()),
        }
    }

    #[must_use]
    pub fn mode(&self) -> SourceMode {
        match self {
            Self::Url(_) => SourceMode::Url,
            Self::Entity(_) => SourceMode::Entity,
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Url(value) | Self::Entity(value) => value,
        }
    }

    #[must_use]
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::Entity(value) => Some(value),
            Self::Url(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SettingsRecord", into = "SettingsRecord")]
pub struct Settings {
    pub confidence_threshold: f64,
    pub ha_access_token: Option<String>,
    pub camera: CameraSource,
}

/// Wire shape of the settings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsRecord {
    #[serde(alias = "face_confidence_threshold", default = "default_confidence")]
    confidence_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ha_access_token: Option<String>,
    #[serde(default)]
    camera_url: Option<String>,
    #[serde(default)]
    camera_entity: Option<String>,
}

const fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

impl From<SettingsRecord> for Settings {
    fn from(record: SettingsRecord) -> Self {
        let entity = record
            .camera_entity
            .filter(|entity| !entity.trim().is_empty());
        let camera = match (entity, record.camera_url) {
            (Some(entity), _) => CameraSource::Entity(entity),
            (None, url) => CameraSource::Url(url.unwrap_or_default()),
        };
        Self {
            confidence_threshold: record.confidence_threshold.clamp(0.0, 1.0),
            ha_access_token: record
                .ha_access_token
                .filter(|token| !token.is_empty()),
            camera,
        }
    }
}

impl From<Settings> for SettingsRecord {
    fn from(settings: Settings) -> Self {
        let (camera_url, camera_entity) = match settings.camera {
            CameraSource::Url(url) => (Some(url), None),
            CameraSource::Entity(entity) => (None, Some(entity)),
        };
        Self {
            confidence_threshold: settings.confidence_threshold,
            ha_access_token: settings.ha_access_token,
            camera_url,
            camera_entity,
        }
    }
}

#[must_use]
pub fn percent_to_fraction(percent: u8) -> f64 {
    f64::from(percent.min(100)) / 100.0
}

#[must_use]
pub fn fraction_to_percent(fraction: f64) -> u8 {
    let percent = (fraction.clamp(0.0, 1.0) * 100.0).round();
    // Clamped to [0, 100] above.
    percent as u8
}

/// Builds the record to persist from what the form currently shows.
#[must_use]
pub fn assemble_settings(view: &SettingsView) -> Settings {
    let token = view.access_token.value.trim();
    Settings {
        confidence_threshold: percent_to_fraction(view.confidence_percent()),
        ha_access_token: (!token.is_empty()).then(|| token.to_owned()),
        camera: CameraSource::new(view.source(), view.active_camera_value()),
    }
}

/// Token given on the command line. Unlike the form, an empty value is kept and
/// posted as `""`, which is how the backend is told to forget its stored token.
pub fn override_access_token(settings: &mut Settings, token: &str) {
    settings.ha_access_token = Some(token.trim().to_owned());
}

/// Copies loaded settings into the form. Camera options are populated separately.
pub fn apply_settings(view: &mut SettingsView, settings: &Settings) {
    view.set_source(settings.camera.mode());
    if let CameraSource::Url(url) = &settings.camera {
        view.camera_url = TextField::with_value(url.clone());
    }
    view.access_token = TextField::with_value(settings.ha_access_token.clone().unwrap_or_default());
    view.set_confidence_percent(fraction_to_percent(settings.confidence_threshold));
}

/// Step 2 of the panel load: fetch cameras and mark `current_entity` selected.
pub async fn load_camera_select(
    client: &DoorbellClient,
    current_entity: Option<&str>,
) -> (CameraSelect, Option<ApiError>) {
    match client.cameras().await {
        Ok(cameras) => (
            CameraSelect::from_listing(Some(cameras.as_slice()), current_entity),
            None,
        ),
        Err(err) => {
            tracing::warn!(error = %err, "failed loading camera entities");
            (CameraSelect::from_listing(None, current_entity), Some(err))
        }
    }
}

#[derive(Debug)]
pub struct PanelLoad {
    pub settings: Result<Settings, ApiError>,
    pub cameras: CameraSelect,
}

/// Settings first, then cameras with the loaded settings as input.
pub async fn load_panel(client: &DoorbellClient) -> PanelLoad {
    let settings = client.settings().await;
    let current_entity = settings
        .as_ref()
        .ok()
        .and_then(|settings| settings.camera.entity());
    // A failed listing is already logged and shown as the select placeholder.
    let (cameras, _) = load_camera_select(client, current_entity).await;
    PanelLoad { settings, cameras }
}

pub const TEST_EMPTY_VALUE: &str = "Please enter a camera URL or select an entity";

/// Inline message for a finished connectivity test.
#[must_use]
pub fn test_outcome_message(result: &Result<CameraTestOutcome, ApiError>) -> (String, bool) {
    match result {
        Ok(outcome) if outcome.success => ("Camera connection successful!".to_owned(), true),
        Ok(outcome) => (
            format!(
                "Camera connection failed: {}",
                outcome.error.as_deref().unwrap_or("Unknown error")
            ),
            false,
        ),
        Err(ApiError::Backend { detail, .. }) => {
            (format!("Camera connection failed: {detail}"), false)
        }
        Err(_) => ("Network error during test".to_owned(), false),
    }
}

/// The settings screen: form state plus the requests it has in flight.
#[derive(Debug, Default)]
pub struct SettingsPanel {
    pub view: SettingsView,
    loaded: Option<Settings>,
    pending_load: Option<JoinHandle<PanelLoad>>,
    pending_cameras: Option<JoinHandle<(CameraSelect, Option<ApiError>)>>,
    pending_test: Option<JoinHandle<Result<CameraTestOutcome, ApiError>>>,
    pending_save: Option<JoinHandle<Result<(), ApiError>>>,
}

impl SettingsPanel {
    #[must_use]
    pub fn loaded(&self) -> Option<&Settings> {
        self.loaded.as_ref()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.pending_load.is_some()
            || self.pending_cameras.is_some()
            || self.pending_test.is_some()
            || self.pending_save.is_some()
    }

    pub fn begin_load(&mut self, client: &DoorbellClient) {
        if self.pending_load.is_some() {
            return;
        }
        let client = client.clone();
        self.pending_load = Some(tokio::spawn(async move { load_panel(&client).await }));
    }

    pub fn begin_refresh_cameras(&mut self, client: &DoorbellClient) -> bool {
        if self.pending_cameras.is_some() {
            return false;
        }
        self.view.refresh_button.set_busy("Refreshing...");
        let client = client.clone();
        let current = self.current_entity();
        self.pending_cameras = Some(tokio::spawn(async move {
            load_camera_select(&client, current.as_deref()).await
        }));
        true
    }

    pub fn begin_test(&mut self, client: &DoorbellClient, now: Instant) -> bool {
        if self.pending_test.is_some() {
            return false;
        }
        let source = self.view.source();
        let value = self.view.active_camera_value().to_owned();
        if value.is_empty() {
            self.view.camera_status.show(TEST_EMPTY_VALUE, false, now);
            return false;
        }

        self.view.test_button.set_busy("Testing...");
        let client = client.clone();
        self.pending_test = Some(tokio::spawn(async move {
            client.test_camera(source, &value).await
        }));
        true
    }

    /// Validates the active camera input, then persists the assembled record.
    pub fn begin_save(&mut self, client: &DoorbellClient, notifications: &mut Notifications) -> bool {
        if self.pending_save.is_some() {
            return false;
        }
        if !self.validate_active_source() {
            notifications.notify_for(
                match self.view.source() {
                    SourceMode::Url => "Camera URL is required",
                    SourceMode::Entity => "Select a camera entity first",
                },
                Severity::Warning,
                PANEL_NOTIFICATION_TTL,
            );
            return false;
        }

        let settings = assemble_settings(&self.view);
        self.view.save_button.set_busy("Saving...");
        let client = client.clone();
        self.pending_save = Some(tokio::spawn(async move {
            client.save_settings(&settings).await
        }));
        true
    }

    /// Applies every finished request. Returns `true` when anything changed.
    pub async fn poll(&mut self, notifications: &mut Notifications, now: Instant) -> bool {
        let mut changed = self.view.camera_status.clear_if_due(now);

        if let Some(joined) = take_finished(&mut self.pending_load).await {
            changed = true;
            match joined {
                Ok(load) => self.apply_load(load, notifications),
                Err(err) => {
                    tracing::error!(error = %err, "settings load task failed");
                    notifications.notify_for(
                        "Error loading settings",
                        Severity::Error,
                        PANEL_NOTIFICATION_TTL,
                    );
                }
            }
        }

        if let Some(joined) = take_finished(&mut self.pending_cameras).await {
            changed = true;
            self.view.refresh_button.restore();
            match joined {
                Ok((select, None)) => {
                    self.view.camera_select = select;
                    notifications.notify_for(
                        "Camera entities refreshed successfully!",
                        Severity::Success,
                        PANEL_NOTIFICATION_TTL,
                    );
                }
                Ok((select, Some(_))) => {
                    self.view.camera_select = select;
                    notifications.notify_for(
                        "Error refreshing camera entities",
                        Severity::Error,
                        PANEL_NOTIFICATION_TTL,
                    );
                }
                Err(err) => {
                    tracing::error!(error = %err, "camera refresh task failed");
                    notifications.notify_for(
                        "Error refreshing camera entities",
                        Severity::Error,
                        PANEL_NOTIFICATION_TTL,
                    );
                }
            }
        }

        if let Some(joined) = take_finished(&mut self.pending_test).await {
            changed = true;
            self.view.test_button.restore();
            let result = joined.unwrap_or_else(|err| Err(err.into()));
            if let Err(err) = &result {
                tracing::warn!(error = %err, "camera test failed");
            }
            let (message, success) = test_outcome_message(&result);
            self.view.camera_status.show(message, success, now);
        }

        if let Some(joined) = take_finished(&mut self.pending_save).await {
            changed = true;
            self.view.save_button.restore();
            match joined.unwrap_or_else(|err| Err(err.into())) {
                Ok(()) => {
                    self.loaded = Some(assemble_settings(&self.view));
                    notifications.notify_for(
                        "Settings saved successfully!",
                        Severity::Success,
                        PANEL_NOTIFICATION_TTL,
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "saving settings failed");
                    notifications.notify_for(
                        err.user_message("Error saving settings: ", "Network error while saving"),
                        Severity::Error,
                        PANEL_NOTIFICATION_TTL,
                    );
                }
            }
        }

        changed
    }

    fn apply_load(&mut self, load: PanelLoad, notifications: &mut Notifications) {
        match load.settings {
            Ok(settings) => {
                apply_settings(&mut self.view, &settings);
                self.loaded = Some(settings);
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed loading settings");
                notifications.notify_for(
                    err.user_message("Error loading settings: ", "Network error while loading settings"),
                    Severity::Error,
                    PANEL_NOTIFICATION_TTL,
                );
            }
        }
        self.view.camera_select = load.cameras;
    }

    fn current_entity(&self) -> Option<String> {
        let selected = self.view.camera_select.value();
        if !selected.is_empty() {
            return Some(selected.to_owned());
        }
        self.loaded
            .as_ref()
            .and_then(|settings| settings.camera.entity())
            .map(str::to_owned)
    }

    fn validate_active_source(&mut self) -> bool {
        match self.view.source() {
            SourceMode::Url => {
                self.view.camera_url.required = true;
                validate_required(&mut [&mut self.view.camera_url])
            }
            SourceMode::Entity => self.view.camera_select.validate_required(),
        }
    }
}
