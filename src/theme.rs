use crate::store::LocalStore;
use parking_lot::RwLock;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

pub const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    #[must_use]
    pub fn palette(self) -> ThemePalette {
        match self {
            Self::Dark => ThemePalette::DARK,
            Self::Light => ThemePalette::LIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemePalette {
    pub background: Color,
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub border_active: Color,
    pub accent: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
}

impl ThemePalette {
    pub const DARK: Self = Self {
        background: Color::Rgb(22, 25, 34),
        text: Color::Rgb(231, 235, 243),
        muted: Color::Rgb(145, 152, 170),
        border: Color::Rgb(88, 98, 120),
        border_active: Color::Rgb(114, 140, 255),
        accent: Color::Rgb(102, 216, 255),
        success: Color::Rgb(103, 212, 142),
        warning: Color::Rgb(255, 198, 109),
        error: Color::Rgb(255, 121, 134),
        info: Color::Rgb(120, 190, 255),
    };

    pub const LIGHT: Self = Self {
        background: Color::Rgb(248, 249, 250),
        text: Color::Rgb(33, 37, 41),
        muted: Color::Rgb(108, 117, 125),
        border: Color::Rgb(173, 181, 189),
        border_active: Color::Rgb(13, 110, 253),
        accent: Color::Rgb(10, 88, 202),
        success: Color::Rgb(25, 135, 84),
        warning: Color::Rgb(176, 112, 0),
        error: Color::Rgb(220, 53, 69),
        info: Color::Rgb(13, 130, 160),
    };
}

impl Default for ThemePalette {
    fn default() -> Self {
        Self::DARK
    }
}

static ACTIVE: RwLock<(ThemeMode, ThemePalette)> =
    parking_lot::const_rwlock((ThemeMode::Dark, ThemePalette::DARK));

#[must_use]
pub fn active_palette() -> ThemePalette {
    ACTIVE.read().1
}

#[must_use]
pub fn active_mode() -> ThemeMode {
    ACTIVE.read().0
}

pub fn apply(mode: ThemeMode) {
    *ACTIVE.write() = (mode, mode.palette());
}

/// Stored preference, dark when absent or unreadable.
#[must_use]
pub fn load_theme(store: &LocalStore) -> ThemeMode {
    store.load(THEME_KEY, ThemeMode::Dark)
}

pub fn save_theme(store: &LocalStore, mode: ThemeMode) {
    if let Err(err) = store.save(THEME_KEY, &mode) {
        tracing::warn!(error = %format!("{err:#}"), "failed saving theme preference");
    }
}

/// Flips the active theme and persists the new choice.
pub fn toggle(store: Option<&LocalStore>) -> ThemeMode {
    let next = active_mode().toggled();
    apply(next);
    if let Some(store) = store {
        save_theme(store, next);
    }
    tracing::debug!(theme = next.as_str(), "theme toggled");
    next
}
