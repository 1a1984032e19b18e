//! Overlay window configuration
//!
//! Holds the full description of the overlay the control surface asked for:
//! geometry, interaction flags, placement, drag/snap behavior and the
//! notification text shown while the overlay is active. Keywords arriving
//! over the control socket are parsed once at the boundary; unknown keywords
//! fall back to documented defaults instead of failing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::BitOr;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::constants::config as cfg;
use crate::types::{Dimensions, Position};

/// Interaction flag bitset for the overlay window
///
/// Mirrors the window-manager level flags: whether the overlay absorbs
/// pointer input, whether it may take keyboard focus, and whether its layout
/// is allowed to span the whole screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouchFlags(u32);

impl TouchFlags {
    pub const NOT_TOUCHABLE: TouchFlags = TouchFlags(1 << 0);
    pub const NOT_FOCUSABLE: TouchFlags = TouchFlags(1 << 1);
    pub const LAYOUT_NO_LIMITS: TouchFlags = TouchFlags(1 << 2);
    pub const LAYOUT_IN_SCREEN: TouchFlags = TouchFlags(1 << 3);
    pub const FOCUSABLE: TouchFlags = TouchFlags(1 << 4);

    /// Default set: receives pointer input but never steals focus
    pub const DEFAULT: TouchFlags = TouchFlags(
        Self::NOT_FOCUSABLE.0 | Self::LAYOUT_NO_LIMITS.0 | Self::LAYOUT_IN_SCREEN.0,
    );

    /// Fully non-interactive set: every pointer event falls through to
    /// whatever is underneath
    pub const CLICK_THROUGH: TouchFlags = TouchFlags(
        Self::NOT_TOUCHABLE.0
            | Self::NOT_FOCUSABLE.0
            | Self::LAYOUT_NO_LIMITS.0
            | Self::LAYOUT_IN_SCREEN.0,
    );

    /// Focus-grabbing set for overlays that take text input
    pub const FOCUS_POINTER: TouchFlags = TouchFlags(
        Self::FOCUSABLE.0 | Self::LAYOUT_NO_LIMITS.0 | Self::LAYOUT_IN_SCREEN.0,
    );

    pub fn contains(self, other: TouchFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parse a flag keyword; unknown keywords map to [`TouchFlags::DEFAULT`]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "clickThrough" | "flagNotTouchable" => Self::CLICK_THROUGH,
            "focusPointer" | "flagNotTouchModal" => Self::FOCUS_POINTER,
            "defaultFlag" | "flagNotFocusable" => Self::DEFAULT,
            other => {
                warn!(flag = %other, "Unknown flag keyword, using default");
                Self::DEFAULT
            }
        }
    }
}

impl Default for TouchFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for TouchFlags {
    type Output = TouchFlags;

    fn bitor(self, rhs: TouchFlags) -> TouchFlags {
        TouchFlags(self.0 | rhs.0)
    }
}

/// Screen anchor used to place the overlay at creation time
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    #[default]
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Alignment {
    /// Parse an alignment keyword; unknown keywords map to [`Alignment::Center`]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "topLeft" => Self::TopLeft,
            "topCenter" => Self::TopCenter,
            "topRight" => Self::TopRight,
            "centerLeft" => Self::CenterLeft,
            "center" => Self::Center,
            "centerRight" => Self::CenterRight,
            "bottomLeft" => Self::BottomLeft,
            "bottomCenter" => Self::BottomCenter,
            "bottomRight" => Self::BottomRight,
            other => {
                warn!(alignment = %other, "Unknown alignment keyword, using center");
                Self::Center
            }
        }
    }

    /// Window origin for this anchor given screen and window extents
    pub fn anchor(self, screen: Dimensions, window: Dimensions) -> Position {
        let right = screen.width as i32 - window.width as i32;
        let bottom = screen.height as i32 - window.height as i32;
        let (x, y) = match self {
            Self::TopLeft => (0, 0),
            Self::TopCenter => (right / 2, 0),
            Self::TopRight => (right, 0),
            Self::CenterLeft => (0, bottom / 2),
            Self::Center => (right / 2, bottom / 2),
            Self::CenterRight => (right, bottom / 2),
            Self::BottomLeft => (0, bottom),
            Self::BottomCenter => (right / 2, bottom),
            Self::BottomRight => (right, bottom),
        };
        Position::new(x, y)
    }
}

/// Where the overlay settles after a drag is released
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeSnap {
    #[default]
    None,
    Auto,
    Left,
    Right,
}

impl EdgeSnap {
    /// Parse a snap keyword; unknown keywords map to [`EdgeSnap::None`]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "auto" => Self::Auto,
            "left" => Self::Left,
            "right" => Self::Right,
            "none" => Self::None,
            other => {
                warn!(position_gravity = %other, "Unknown snap keyword, disabling snap");
                Self::None
            }
        }
    }
}

/// Lock-screen visibility of the resident notification
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationVisibility {
    Public,
    Private,
    #[default]
    Secret,
}

impl NotificationVisibility {
    /// Parse a visibility keyword; unknown keywords map to
    /// [`NotificationVisibility::Secret`]
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "visibilityPublic" | "public" => Self::Public,
            "visibilityPrivate" | "private" => Self::Private,
            "visibilitySecret" | "secret" => Self::Secret,
            other => {
                warn!(visibility = %other, "Unknown visibility keyword, using secret");
                Self::Secret
            }
        }
    }
}

/// Full overlay description, read in one piece at window-creation time
///
/// Mutating this after a window exists has no effect on that window except
/// through the explicit flag-update and resize operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Window width; `-1` fills the screen horizontally
    #[serde(default = "default_span")]
    pub width: i32,

    /// Window height; `-1` fills the screen vertically
    #[serde(default = "default_span")]
    pub height: i32,

    #[serde(default)]
    pub flag: TouchFlags,

    #[serde(default)]
    pub alignment: Alignment,

    #[serde(default)]
    pub position_gravity: EdgeSnap,

    #[serde(default)]
    pub enable_drag: bool,

    #[serde(default = "default_title")]
    pub overlay_title: String,

    #[serde(default)]
    pub overlay_content: String,

    #[serde(default)]
    pub notification_visibility: NotificationVisibility,
}

fn default_span() -> i32 {
    cfg::MATCH_SCREEN
}

fn default_title() -> String {
    "Overlay is activated".to_string()
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            width: default_span(),
            height: default_span(),
            flag: TouchFlags::default(),
            alignment: Alignment::default(),
            position_gravity: EdgeSnap::default(),
            enable_drag: false,
            overlay_title: default_title(),
            overlay_content: String::new(),
            notification_visibility: NotificationVisibility::default(),
        }
    }
}

impl OverlayConfig {
    fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(cfg::APP_DIR);
        path.push(cfg::FILENAME);
        path
    }

    /// Load the last-shown configuration, falling back to defaults on a
    /// missing or unparsable file
    pub fn load() -> Self {
        let path = Self::config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<OverlayConfig>(&contents) {
                Ok(mut config) => {
                    config.validate_and_clamp();
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config to TOML")?;
        fs::write(&path, contents)
            .context(format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    /// Clamp geometry to sane values; non-positive spans other than the
    /// match-screen sentinel degrade to match-screen
    pub fn validate_and_clamp(&mut self) {
        for (name, span) in [("width", &mut self.width), ("height", &mut self.height)] {
            if *span != cfg::MATCH_SCREEN && *span <= 0 {
                warn!(dimension = name, value = *span, "Non-positive dimension, treating as match-screen");
                *span = cfg::MATCH_SCREEN;
            } else if *span > cfg::MAX_DIMENSION {
                warn!(dimension = name, value = *span, max = cfg::MAX_DIMENSION, "Dimension exceeds maximum, clamping");
                *span = cfg::MAX_DIMENSION;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_keywords_resolve_to_sets() {
        assert_eq!(TouchFlags::from_keyword("clickThrough"), TouchFlags::CLICK_THROUGH);
        assert_eq!(TouchFlags::from_keyword("flagNotTouchable"), TouchFlags::CLICK_THROUGH);
        assert_eq!(TouchFlags::from_keyword("focusPointer"), TouchFlags::FOCUS_POINTER);
        assert_eq!(TouchFlags::from_keyword("defaultFlag"), TouchFlags::DEFAULT);
    }

    #[test]
    fn unknown_flag_keyword_falls_back_to_default() {
        assert_eq!(TouchFlags::from_keyword("noSuchFlag"), TouchFlags::DEFAULT);
        assert_eq!(TouchFlags::from_keyword(""), TouchFlags::DEFAULT);
    }

    #[test]
    fn click_through_contains_every_non_interactive_flag() {
        let flags = TouchFlags::CLICK_THROUGH;
        assert!(flags.contains(TouchFlags::NOT_TOUCHABLE));
        assert!(flags.contains(TouchFlags::NOT_FOCUSABLE));
        assert!(flags.contains(TouchFlags::LAYOUT_NO_LIMITS));
        assert!(flags.contains(TouchFlags::LAYOUT_IN_SCREEN));
        assert!(!flags.contains(TouchFlags::FOCUSABLE));
    }

    #[test]
    fn alignment_keywords_resolve() {
        assert_eq!(Alignment::from_keyword("topLeft"), Alignment::TopLeft);
        assert_eq!(Alignment::from_keyword("bottomRight"), Alignment::BottomRight);
        assert_eq!(Alignment::from_keyword("center"), Alignment::Center);
    }

    #[test]
    fn unknown_alignment_keyword_falls_back_to_center() {
        assert_eq!(Alignment::from_keyword("middle"), Alignment::Center);
    }

    #[test]
    fn anchor_positions_cover_the_screen() {
        let screen = Dimensions::new(1000, 800);
        let window = Dimensions::new(200, 100);

        assert_eq!(Alignment::TopLeft.anchor(screen, window), Position::new(0, 0));
        assert_eq!(Alignment::TopCenter.anchor(screen, window), Position::new(400, 0));
        assert_eq!(Alignment::Center.anchor(screen, window), Position::new(400, 350));
        assert_eq!(Alignment::CenterRight.anchor(screen, window), Position::new(800, 350));
        assert_eq!(Alignment::BottomRight.anchor(screen, window), Position::new(800, 700));
        assert_eq!(Alignment::BottomCenter.anchor(screen, window), Position::new(400, 700));
    }

    #[test]
    fn snap_keywords_resolve_with_none_fallback() {
        assert_eq!(EdgeSnap::from_keyword("auto"), EdgeSnap::Auto);
        assert_eq!(EdgeSnap::from_keyword("left"), EdgeSnap::Left);
        assert_eq!(EdgeSnap::from_keyword("right"), EdgeSnap::Right);
        assert_eq!(EdgeSnap::from_keyword("none"), EdgeSnap::None);
        assert_eq!(EdgeSnap::from_keyword("diagonal"), EdgeSnap::None);
    }

    #[test]
    fn visibility_keywords_resolve_with_secret_fallback() {
        assert_eq!(NotificationVisibility::from_keyword("visibilityPublic"), NotificationVisibility::Public);
        assert_eq!(NotificationVisibility::from_keyword("private"), NotificationVisibility::Private);
        assert_eq!(NotificationVisibility::from_keyword("??"), NotificationVisibility::Secret);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: OverlayConfig = toml::from_str("").unwrap();
        assert_eq!(config.width, -1);
        assert_eq!(config.height, -1);
        assert_eq!(config.flag, TouchFlags::DEFAULT);
        assert_eq!(config.alignment, Alignment::Center);
        assert_eq!(config.position_gravity, EdgeSnap::None);
        assert!(!config.enable_drag);
        assert_eq!(config.overlay_title, "Overlay is activated");
        assert_eq!(config.notification_visibility, NotificationVisibility::Secret);
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let config = OverlayConfig {
            width: 320,
            height: 240,
            flag: TouchFlags::CLICK_THROUGH,
            alignment: Alignment::BottomLeft,
            position_gravity: EdgeSnap::Auto,
            enable_drag: true,
            ..OverlayConfig::default()
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let back: OverlayConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.width, 320);
        assert_eq!(back.height, 240);
        assert_eq!(back.flag, TouchFlags::CLICK_THROUGH);
        assert_eq!(back.alignment, Alignment::BottomLeft);
        assert_eq!(back.position_gravity, EdgeSnap::Auto);
        assert!(back.enable_drag);
    }

    #[test]
    fn clamp_degrades_bad_spans_to_match_screen() {
        let mut config = OverlayConfig {
            width: 0,
            height: -7,
            ..OverlayConfig::default()
        };
        config.validate_and_clamp();
        assert_eq!(config.width, -1);
        assert_eq!(config.height, -1);

        config.width = 1_000_000;
        config.validate_and_clamp();
        assert_eq!(config.width, cfg::MAX_DIMENSION);
    }
}
