//! View bindings.
//!
//! Controllers never touch the terminal. They mutate these structs and the
//! renderer in `tui.rs` draws whatever they hold on the next frame.

use crate::api::{CameraDescriptor, EventSummary, Stats};
use crate::notify::Severity;
use crate::settings::SourceMode;
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

pub const CAPTURE_LABEL: &str = "Capture";
pub const CAPTURE_BUSY_LABEL: &str = "Capturing...";
pub const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonView {
    pub label: String,
    pub enabled: bool,
    idle_label: &'static str,
}

impl ButtonView {
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label: label.to_owned(),
            enabled: true,
            idle_label: label,
        }
    }

    pub fn set_busy(&mut self, busy_label: &str) {
        self.enabled = false;
        self.label = busy_label.to_owned();
    }

    pub fn restore(&mut self) {
        self.enabled = true;
        self.label = self.idle_label.to_owned();
    }
}

/// Every control that can start a capture.
#[derive(Debug, Clone)]
pub struct CaptureTriggers {
    pub buttons: Vec<ButtonView>,
}

impl CaptureTriggers {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            buttons: (0..count).map(|_| ButtonView::new(CAPTURE_LABEL)).collect(),
        }
    }

    pub fn set_busy(&mut self) {
        for button in &mut self.buttons {
            button.set_busy(CAPTURE_BUSY_LABEL);
        }
    }

    pub fn restore(&mut self) {
        for button in &mut self.buttons {
            button.restore();
        }
    }

    #[cfg(test)]
    pub fn all_enabled(&self) -> bool {
        self.buttons.iter().all(|button| button.enabled)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        self.buttons
            .first()
            .map_or(CAPTURE_LABEL, |button| button.label.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    pub value: String,
    pub invalid: bool,
    pub required: bool,
}

impl TextField {
    #[must_use]
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.value.trim()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub total_events: Option<u64>,
    pub known_faces: Option<u64>,
    pub unknown_faces: Option<u64>,
    pub total_persons: Option<u64>,
    pub recent_events: Vec<EventSummary>,
    pub recent_known: usize,
    pub recent_unknown: usize,
    pub last_refreshed: Option<DateTime<Local>>,
}

impl DashboardView {
    pub fn update_stats(&mut self, stats: &Stats) {
        self.total_events = Some(stats.total_events);
        self.known_faces = Some(stats.known_events);
        self.unknown_faces = Some(stats.unknown_events);
        self.total_persons = Some(stats.total_persons);
        self.last_refreshed = Some(Local::now());
    }

    pub fn update_event_counts(&mut self, events: Vec<EventSummary>) {
        self.recent_known = events.iter().filter(|event| event.is_known).count();
        self.recent_unknown = events.len() - self.recent_known;
        self.recent_events = events;
        self.last_refreshed = Some(Local::now());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    fn placeholder(label: &str) -> Self {
        Self {
            value: String::new(),
            label: label.to_owned(),
        }
    }
}

pub const CAMERAS_PLACEHOLDER: &str = "Select a camera...";
pub const CAMERAS_EMPTY: &str = "No cameras found";
pub const CAMERAS_FAILED: &str = "Error loading cameras";

/// The camera entity select list. Index 0 is always a placeholder with an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSelect {
    pub options: Vec<SelectOption>,
    pub selected: usize,
    pub invalid: bool,
}

impl Default for CameraSelect {
    fn default() -> Self {
        Self {
            options: vec![SelectOption::placeholder("Loading cameras...")],
            selected: 0,
            invalid: false,
        }
    }
}

impl CameraSelect {
    #[must_use]
    pub fn from_listing(cameras: Option<&[CameraDescriptor]>, current: Option<&str>) -> Self {
        let Some(cameras) = cameras else {
            return Self {
                options: vec![SelectOption::placeholder(CAMERAS_FAILED)],
                selected: 0,
                invalid: false,
            };
        };
        if cameras.is_empty() {
            return Self {
                options: vec![SelectOption::placeholder(CAMERAS_EMPTY)],
                selected: 0,
                invalid: false,
            };
        }

        let mut options = Vec::with_capacity(cameras.len() + 1);
        options.push(SelectOption::placeholder(CAMERAS_PLACEHOLDER));
        options.extend(cameras.iter().map(|camera| SelectOption {
            value: camera.entity_id.clone(),
            label: camera.friendly_name.clone(),
        }));
        let selected = current
            .filter(|value| !value.is_empty())
            .and_then(|value| options.iter().position(|option| option.value == value))
            .unwrap_or(0);
        Self {
            options,
            selected,
            invalid: false,
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        self.options
            .get(self.selected)
            .map_or("", |option| option.value.as_str())
    }

    /// Same rule as a required text field: the placeholder counts as empty.
    pub fn validate_required(&mut self) -> bool {
        self.invalid = self.value().is_empty();
        !self.invalid
    }

    pub fn select_next(&mut self) {
        if !self.options.is_empty() {
            self.selected = (self.selected + 1).min(self.options.len() - 1);
        }
        self.invalid = false;
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.invalid = false;
    }
}

/// Inline result line next to "Test Camera". Lower prominence than a toast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStatus {
    pub message: String,
    pub success: bool,
    clear_at: Option<Instant>,
}

impl InlineStatus {
    pub fn show(&mut self, message: impl Into<String>, success: bool, now: Instant) {
        self.message = message.into();
        self.success = success;
        self.clear_at = Some(now + STATUS_CLEAR_AFTER);
    }

    /// Returns `true` when the message was cleared.
    pub fn clear_if_due(&mut self, now: Instant) -> bool {
        match self.clear_at {
            Some(deadline) if now >= deadline => {
                self.message.clear();
                self.success = false;
                self.clear_at = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        if self.success {
            Severity::Success
        } else {
            Severity::Error
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsView {
    source: SourceMode,
    url_section_visible: bool,
    entity_section_visible: bool,
    pub camera_url: TextField,
    pub camera_select: CameraSelect,
    pub access_token: TextField,
    confidence_percent: u8,
    pub camera_status: InlineStatus,
    pub test_button: ButtonView,
    pub save_button: ButtonView,
    pub refresh_button: ButtonView,
}

impl Default for SettingsView {
    fn default() -> Self {
        let mut view = Self {
            source: SourceMode::Url,
            url_section_visible: false,
            entity_section_visible: false,
            camera_url: TextField::default(),
            camera_select: CameraSelect::default(),
            access_token: TextField::default(),
            confidence_percent: 60,
            camera_status: InlineStatus::default(),
            test_button: ButtonView::new("Test Camera Connection"),
            save_button: ButtonView::new("Save Settings"),
            refresh_button: ButtonView::new("Refresh Camera Entities"),
        };
        view.set_source(SourceMode::Url);
        view
    }
}

impl SettingsView {
    /// Shows exactly the section that belongs to `mode`.
    pub fn set_source(&mut self, mode: SourceMode) {
        self.source = mode;
        self.url_section_visible = mode == SourceMode::Url;
        self.entity_section_visible = mode == SourceMode::Entity;
    }

    pub fn toggle_source(&mut self) {
        self.set_source(self.source.toggled());
    }

    #[must_use]
    pub fn source(&self) -> SourceMode {
        self.source
    }

    #[must_use]
    pub fn url_section_visible(&self) -> bool {
        self.url_section_visible
    }

    #[must_use]
    pub fn entity_section_visible(&self) -> bool {
        self.entity_section_visible
    }

    /// Value of whichever camera input is active.
    #[must_use]
    pub fn active_camera_value(&self) -> &str {
        match self.source {
            SourceMode::Url => self.camera_url.trimmed(),
            SourceMode::Entity => self.camera_select.value(),
        }
    }

    pub fn set_confidence_percent(&mut self, percent: u8) {
        self.confidence_percent = percent.min(100);
    }

    pub fn adjust_confidence(&mut self, delta: i16) {
        let next = (i16::from(self.confidence_percent) + delta).clamp(0, 100);
        self.confidence_percent = u8::try_from(next).unwrap_or(100);
    }

    #[must_use]
    pub fn confidence_percent(&self) -> u8 {
        self.confidence_percent
    }

    #[must_use]
    pub fn confidence_label(&self) -> String {
        format!("{}%", self.confidence_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cameras() -> Vec<CameraDescriptor> {
        vec![
            CameraDescriptor {
                entity_id: "camera.front_door".to_owned(),
                friendly_name: "Front Door".to_owned(),
            },
            CameraDescriptor {
                entity_id: "camera.garage".to_owned(),
                friendly_name: "Garage".to_owned(),
            },
        ]
    }

    #[test]
    fn source_toggle_always_shows_exactly_one_section() {
        let mut view = SettingsView::default();
        assert!(view.url_section_visible());
        assert!(!view.entity_section_visible());

        let sequence = [
            SourceMode::Entity,
            SourceMode::Entity,
            SourceMode::Url,
            SourceMode::Entity,
            SourceMode::Url,
            SourceMode::Url,
        ];
        for mode in sequence {
            view.set_source(mode);
            assert_eq!(view.url_section_visible(), mode == SourceMode::Url);
            assert_eq!(view.entity_section_visible(), mode == SourceMode::Entity);
        }

        for _ in 0..5 {
            view.toggle_source();
            assert_ne!(view.url_section_visible(), view.entity_section_visible());
        }
    }

    #[test]
    fn camera_select_preselects_current_entity() {
        let listing = cameras();
        let select = CameraSelect::from_listing(Some(listing.as_slice()), Some("camera.garage"));
        assert_eq!(select.options[0].label, CAMERAS_PLACEHOLDER);
        assert_eq!(select.value(), "camera.garage");
        assert_eq!(select.options[select.selected].label, "Garage");
    }

    #[test]
    fn camera_select_falls_back_to_placeholder() {
        let listing = cameras();
        let unknown = CameraSelect::from_listing(Some(listing.as_slice()), Some("camera.gone"));
        assert_eq!(unknown.selected, 0);
        assert_eq!(unknown.value(), "");

        let empty = CameraSelect::from_listing(Some(&[][..]), None);
        assert_eq!(empty.options.len(), 1);
        assert_eq!(empty.options[0].label, CAMERAS_EMPTY);

        let failed = CameraSelect::from_listing(None, Some("camera.garage"));
        assert_eq!(failed.options[0].label, CAMERAS_FAILED);
        assert_eq!(failed.value(), "");
    }

    #[test]
    fn camera_select_navigation_is_bounded() {
        let listing = cameras();
        let mut select = CameraSelect::from_listing(Some(listing.as_slice()), None);
        select.select_previous();
        assert_eq!(select.selected, 0);
        for _ in 0..10 {
            select.select_next();
        }
        assert_eq!(select.selected, 2);
    }

    #[test]
    fn capture_triggers_busy_and_restore() {
        let mut triggers = CaptureTriggers::new(2);
        triggers.set_busy();
        assert!(triggers.buttons.iter().all(|button| !button.enabled));
        assert_eq!(triggers.label(), CAPTURE_BUSY_LABEL);
        triggers.restore();
        assert!(triggers.all_enabled());
        assert_eq!(triggers.label(), CAPTURE_LABEL);
    }

    #[test]
    fn inline_status_clears_after_five_seconds() {
        let start = Instant::now();
        let mut status = InlineStatus::default();
        status.show("Camera connection successful!", true, start);
        assert!(!status.clear_if_due(start + Duration::from_secs(4)));
        assert_eq!(status.severity(), Severity::Success);
        assert!(status.clear_if_due(start + STATUS_CLEAR_AFTER));
        assert!(status.message.is_empty());
        assert!(!status.clear_if_due(start + Duration::from_secs(60)));
    }

    #[test]
    fn confidence_is_clamped_to_percent_range() {
        let mut view = SettingsView::default();
        view.set_confidence_percent(250);
        assert_eq!(view.confidence_percent(), 100);
        view.adjust_confidence(-130);
        assert_eq!(view.confidence_percent(), 0);
        view.adjust_confidence(45);
        assert_eq!(view.confidence_label(), "45%");
    }

    #[test]
    fn event_counts_split_known_and_unknown() {
        let mut view = DashboardView::default();
        view.update_event_counts(vec![
            EventSummary {
                is_known: true,
                ..EventSummary::default()
            },
            EventSummary::default(),
            EventSummary::default(),
        ]);
        assert_eq!(view.recent_known, 1);
        assert_eq!(view.recent_unknown, 2);
        assert_eq!(view.recent_events.len(), 3);
    }
}
