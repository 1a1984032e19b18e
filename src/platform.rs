//! Platform API level detection and version-gated window behavior
//!
//! The window type and the click-through opacity cap are pure functions of
//! the API level, so both can change per host without touching the window
//! code. The level is taken from `OVERLAYD_API_LEVEL` when set, otherwise
//! derived from the X server release.

use tracing::{info, warn};
use x11rb::protocol::xproto::Screen;
use x11rb::rust_connection::RustConnection;
use x11rb::connection::Connection;

use crate::config::TouchFlags;
use crate::constants::platform as level;
use crate::types::Dimensions;

/// Window type requested from the window manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// Dedicated overlay type on newer platforms
    ApplicationOverlay,
    /// Legacy type used before the dedicated one existed
    Phone,
}

/// Immutable facts about the host captured once at startup
#[derive(Debug, Clone, Copy)]
pub struct Platform {
    pub api_level: u32,
    pub screen: Dimensions,
}

impl Platform {
    pub fn new(api_level: u32, screen: Dimensions) -> Self {
        Self { api_level, screen }
    }

    /// Detect the API level and screen extents for this connection
    pub fn detect(conn: &RustConnection, screen: &Screen, override_level: Option<u32>) -> Self {
        let api_level = override_level
            .or_else(Self::level_from_env)
            .unwrap_or_else(|| Self::level_from_release(conn.setup().release_number));
        let screen = Dimensions::new(screen.width_in_pixels, screen.height_in_pixels);
        info!(api_level, width = screen.width, height = screen.height, "Detected platform");
        Self { api_level, screen }
    }

    fn level_from_env() -> Option<u32> {
        let raw = std::env::var(level::API_LEVEL_ENV).ok()?;
        match raw.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(value = %raw, env = level::API_LEVEL_ENV, "Ignoring non-numeric API level override");
                None
            }
        }
    }

    /// Server releases encode major * 10^7; the major release doubles as the
    /// API level when no override is given
    fn level_from_release(release_number: u32) -> u32 {
        release_number / 10_000_000
    }

    /// Window type appropriate for this level
    pub fn window_type(&self) -> WindowType {
        if self.api_level >= level::DEDICATED_OVERLAY_TYPE_LEVEL {
            WindowType::ApplicationOverlay
        } else {
            WindowType::Phone
        }
    }

    /// Opacity cap for the given flag set, when one applies
    ///
    /// Only the exact fully-non-interactive combination is capped, and only
    /// at levels that reject opaque click-through windows. Every other
    /// combination leaves opacity unset (fully opaque).
    pub fn alpha_for(&self, flags: TouchFlags) -> Option<f32> {
        if self.api_level >= level::ALPHA_CLAMP_LEVEL && flags == TouchFlags::CLICK_THROUGH {
            Some(level::CLICK_THROUGH_MAX_ALPHA)
        } else {
            None
        }
    }

    /// Whether overlay permission exists as a grantable concept here
    pub fn requires_permission(&self) -> bool {
        self.api_level >= level::RUNTIME_CHECK_LEVEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(api_level: u32) -> Platform {
        Platform::new(api_level, Dimensions::new(1920, 1080))
    }

    #[test]
    fn window_type_follows_api_level() {
        assert_eq!(platform(25).window_type(), WindowType::Phone);
        assert_eq!(platform(26).window_type(), WindowType::ApplicationOverlay);
        assert_eq!(platform(34).window_type(), WindowType::ApplicationOverlay);
    }

    #[test]
    fn alpha_cap_applies_only_to_click_through_on_new_levels() {
        assert_eq!(platform(31).alpha_for(TouchFlags::CLICK_THROUGH), Some(0.8));
        assert_eq!(platform(34).alpha_for(TouchFlags::CLICK_THROUGH), Some(0.8));
    }

    #[test]
    fn alpha_cap_skips_old_levels() {
        assert_eq!(platform(30).alpha_for(TouchFlags::CLICK_THROUGH), None);
    }

    #[test]
    fn alpha_cap_skips_other_flag_sets() {
        assert_eq!(platform(31).alpha_for(TouchFlags::DEFAULT), None);
        assert_eq!(platform(31).alpha_for(TouchFlags::FOCUS_POINTER), None);
        // A superset of click-through is not the exact combination
        let superset = TouchFlags::CLICK_THROUGH | TouchFlags::FOCUSABLE;
        assert_eq!(platform(31).alpha_for(superset), None);
    }

    #[test]
    fn release_number_maps_to_major() {
        assert_eq!(Platform::level_from_release(12_101_004), 1);
        assert_eq!(Platform::level_from_release(21_001_008 * 10), 21);
        assert_eq!(Platform::level_from_release(0), 0);
    }

    #[test]
    fn permission_concept_is_level_gated() {
        assert!(!platform(22).requires_permission());
        assert!(platform(23).requires_permission());
    }
}
