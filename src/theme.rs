//! Theme system

use crate::store::{LocalStore, THEME_KEY};
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// Complete color palette for TUI rendering
#[derive(Debug, Clone, Copy)]
pub struct ThemeColors {
    // Backgrounds
    pub bg_primary: Color,
    pub bg_panel: Color,
    pub bg_highlight: Color,

    // Borders
    pub border_default: Color,
    pub border_focus: Color,
    pub border_muted: Color,

    // Text
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_muted: Color,

    // Status
    pub success: Color,
    pub error: Color,
    pub info: Color,

    // Accents
    pub accent_blue: Color,
    pub accent_cyan: Color,
    pub accent_magenta: Color,
    pub accent_orange: Color,
    pub accent_yellow: Color,
}

impl ThemeColors {
    pub const DARK: Self = Self {
        bg_primary: Color::Rgb(47, 48, 49),
        bg_panel: Color::Rgb(60, 60, 60),
        bg_highlight: Color::Rgb(78, 82, 96),

        border_default: Color::Rgb(130, 135, 160),
        border_focus: Color::Rgb(120, 220, 170),
        border_muted: Color::Rgb(90, 95, 115),

        text_primary: Color::Rgb(235, 236, 240),
        text_secondary: Color::Rgb(190, 193, 205),
        text_muted: Color::Rgb(140, 145, 160),

        success: Color::Rgb(110, 220, 120),
        error: Color::Rgb(250, 120, 130),
        info: Color::Rgb(110, 200, 245),

        accent_blue: Color::Rgb(120, 170, 250),
        accent_cyan: Color::Rgb(100, 215, 235),
        accent_magenta: Color::Rgb(210, 150, 235),
        accent_orange: Color::Rgb(245, 175, 100),
        accent_yellow: Color::Rgb(235, 195, 100),
    };

    pub const LIGHT: Self = Self {
        bg_primary: Color::Rgb(248, 249, 250),
        bg_panel: Color::Rgb(255, 255, 255),
        bg_highlight: Color::Rgb(219, 230, 250),

        border_default: Color::Rgb(170, 175, 190),
        border_focus: Color::Rgb(40, 140, 100),
        border_muted: Color::Rgb(210, 212, 220),

        text_primary: Color::Rgb(17, 24, 39),
        text_secondary: Color::Rgb(55, 65, 81),
        text_muted: Color::Rgb(107, 114, 128),

        success: Color::Rgb(22, 140, 60),
        error: Color::Rgb(197, 48, 48),
        info: Color::Rgb(30, 120, 200),

        accent_blue: Color::Rgb(37, 99, 235),
        accent_cyan: Color::Rgb(8, 145, 178),
        accent_magenta: Color::Rgb(147, 51, 234),
        accent_orange: Color::Rgb(217, 119, 6),
        accent_yellow: Color::Rgb(161, 98, 7),
    };

    /// Screenshot reference chip color
    #[inline]
    pub const fn screenshot_ref(&self) -> Color {
        self.accent_cyan
    }

    /// Thinking indicator color
    #[inline]
    pub const fn thinking(&self) -> Color {
        self.accent_magenta
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    #[inline]
    pub const fn colors(&self) -> ThemeColors {
        match self {
            Theme::Dark => ThemeColors::DARK,
            Theme::Light => ThemeColors::LIGHT,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn load(store: &LocalStore) -> Self {
        store.load_or_default(THEME_KEY)
    }

    pub fn save(self, store: &LocalStore) {
        store.save_logged(THEME_KEY, &self);
    }
}
