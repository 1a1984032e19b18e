//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the daemon, providing a single source of truth for constant values.

/// X11 protocol constants
pub mod x11 {
    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// WM_CLASS instance and class name for the overlay window
    pub const WM_CLASS: &[u8] = b"overlayd\0overlayd\0";
}

/// Pointer gesture constants
pub mod gesture {
    /// Squared drag slop in pixels; motion below this never starts a drag
    /// (cumulative jitter under ~5px stays a tap)
    pub const DRAG_SLOP_SQ: i32 = 25;
}

/// Settle (edge snap) animation constants
pub mod animation {
    /// Interval between settle animation ticks
    pub const TICK_INTERVAL_MS: u64 = 25;

    /// Both axes must be within this distance of the target to stop
    pub const SETTLE_TOLERANCE: i32 = 2;
}

/// Platform API level gates
pub mod platform {
    /// First level with a dedicated application-overlay window type;
    /// older levels fall back to the legacy phone type
    pub const DEDICATED_OVERLAY_TYPE_LEVEL: u32 = 26;

    /// First level that rejects a fully opaque click-through window
    pub const ALPHA_CLAMP_LEVEL: u32 = 31;

    /// Maximum alpha allowed for click-through windows at or above
    /// [`ALPHA_CLAMP_LEVEL`]
    pub const CLICK_THROUGH_MAX_ALPHA: f32 = 0.8;

    /// Levels below this never require an overlay permission grant
    pub const RUNTIME_CHECK_LEVEL: u32 = 23;

    /// Env var overriding the detected API level
    pub const API_LEVEL_ENV: &str = "OVERLAYD_API_LEVEL";
}

/// Overlay permission flow constants
pub mod permission {
    /// Request code echoed back with every asynchronous permission result
    pub const REQUEST_CODE: u32 = 1248;

    /// Grace period before re-probing after a permission request
    pub const GRANT_FLOW_DELAY_MS: u64 = 500;
}

/// Control socket constants
pub mod ipc {
    /// Maximum message size (10 MB) to prevent DoS via memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

    /// Directory under the runtime dir holding the control socket
    pub const APP_DIR: &str = "overlayd";

    /// Control socket file name
    pub const SOCKET_FILE: &str = "control.sock";

    /// Env var overriding the control socket path
    pub const SOCKET_ENV: &str = "OVERLAYD_SOCKET";
}

/// Configuration file constants
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "overlayd";

    /// Config file name
    pub const FILENAME: &str = "config.toml";

    /// Width/height value meaning "fill the whole screen axis"
    pub const MATCH_SCREEN: i32 = -1;

    /// Upper bound for explicit overlay dimensions
    pub const MAX_DIMENSION: i32 = 16384;
}
