//! X11 plumbing shared by the window controller and the daemon

use anyhow::{Context, Result};
use std::sync::Arc;
use x11rb::protocol::xproto::{Atom, ConnectionExt, Screen};
use x11rb::rust_connection::RustConnection;

use crate::platform::Platform;

/// Shared context for everything that talks to the display
///
/// One instance per daemon; handed to the window controller and the
/// permission gate instead of process-wide globals.
#[derive(Clone)]
pub struct AppContext {
    pub conn: Arc<RustConnection>,
    pub screen: Screen,
    pub atoms: Arc<CachedAtoms>,
    pub platform: Platform,
}

/// Pre-cached X11 atoms to avoid repeated roundtrips
pub struct CachedAtoms {
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_notification: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_opacity: Atom,
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            net_wm_state: intern(conn, b"_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, b"_NET_WM_STATE_ABOVE")?,
            net_wm_window_type: intern(conn, b"_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_notification: intern(conn, b"_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
            net_wm_window_type_dock: intern(conn, b"_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_opacity: intern(conn, b"_NET_WM_WINDOW_OPACITY")?,
        })
    }
}

fn intern(conn: &RustConnection, name: &[u8]) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name)
        .context(format!("Failed to intern {} atom", String::from_utf8_lossy(name)))?
        .reply()
        .context(format!("Failed to get reply for {} atom", String::from_utf8_lossy(name)))?
        .atom)
}

/// Convert an alpha fraction to the cardinal value `_NET_WM_WINDOW_OPACITY`
/// expects (0 = transparent, `u32::MAX` = opaque)
pub fn opacity_cardinal(alpha: f32) -> u32 {
    (alpha.clamp(0.0, 1.0) as f64 * u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_cardinal_spans_the_range() {
        assert_eq!(opacity_cardinal(0.0), 0);
        assert_eq!(opacity_cardinal(1.0), u32::MAX);
        assert_eq!(opacity_cardinal(2.0), u32::MAX);

        let capped = opacity_cardinal(0.8);
        assert!(capped > (u32::MAX / 10) * 7 && capped < (u32::MAX / 10) * 9);
    }
}
