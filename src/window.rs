//! The single system overlay window
//!
//! Owns the one X11 window handle this process may have on screen at a time.
//! The window is created from a full configuration snapshot, kept
//! always-on-top and unmanaged, and mutated only through the explicit
//! flag-update, resize and reposition operations.

use anyhow::{Context, Result};
use tracing::{error, info};
use x11rb::connection::Connection;
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::config::{OverlayConfig, TouchFlags};
use crate::constants::x11 as x11c;
use crate::platform::WindowType;
use crate::types::{Dimensions, Position, Rect};
use crate::x11::{opacity_cardinal, AppContext};

/// Resolve a configured span against the screen axis; the `-1` sentinel
/// fills the whole axis
fn resolve_span(span: i32, screen_axis: u16) -> u16 {
    if span == crate::constants::config::MATCH_SCREEN {
        screen_axis
    } else {
        span.clamp(1, u16::MAX as i32) as u16
    }
}

pub struct OverlayWindow {
    ctx: AppContext,
    window: Window,
    origin: Position,
    size: Dimensions,
    flags: TouchFlags,
}

impl OverlayWindow {
    /// Create, configure and map the overlay window from `config`
    ///
    /// The configuration is read in full here; later mutation of the caller's
    /// config does not affect this window.
    pub fn create(ctx: &AppContext, config: &OverlayConfig) -> Result<Self> {
        let size = Dimensions::new(
            resolve_span(config.width, ctx.platform.screen.width),
            resolve_span(config.height, ctx.platform.screen.height),
        );
        let origin = config.alignment.anchor(ctx.platform.screen, size);

        let window = ctx
            .conn
            .generate_id()
            .context("Failed to generate X11 window ID")?;
        ctx.conn
            .create_window(
                ctx.screen.root_depth,
                window,
                ctx.screen.root,
                origin.x as i16,
                origin.y as i16,
                size.width,
                size.height,
                0,
                WindowClass::INPUT_OUTPUT,
                ctx.screen.root_visual,
                &CreateWindowAux::new()
                    .override_redirect(x11c::OVERRIDE_REDIRECT)
                    .background_pixel(ctx.screen.black_pixel)
                    .event_mask(
                        EventMask::BUTTON_PRESS
                            | EventMask::BUTTON_RELEASE
                            | EventMask::POINTER_MOTION
                            | EventMask::STRUCTURE_NOTIFY,
                    ),
            )
            .context("Failed to create overlay window")?;

        // Destroy the half-built window if any later setup step fails
        struct WindowGuard<'a> {
            conn: &'a RustConnection,
            window: Window,
            armed: bool,
        }

        impl Drop for WindowGuard<'_> {
            fn drop(&mut self) {
                if self.armed {
                    if let Err(e) = self.conn.destroy_window(self.window) {
                        error!(window = self.window, error = ?e, "Failed to clean up window after initialization failure");
                    }
                    let _ = self.conn.flush();
                }
            }
        }

        let mut guard = WindowGuard {
            conn: ctx.conn.as_ref(),
            window,
            armed: true,
        };

        Self::setup_properties(ctx, window)?;
        Self::apply_flags(ctx, window, config.flag)?;

        ctx.conn
            .map_window(window)
            .context("Failed to map overlay window")?;
        if config.flag.contains(TouchFlags::FOCUSABLE) {
            ctx.conn
                .set_input_focus(InputFocus::POINTER_ROOT, window, x11rb::CURRENT_TIME)
                .context("Failed to focus overlay window")?;
        }
        ctx.conn
            .flush()
            .context("Failed to flush X11 connection after window creation")?;
        info!(window, x = origin.x, y = origin.y, width = size.width, height = size.height, "Created overlay window");

        guard.armed = false;
        Ok(Self {
            ctx: ctx.clone(),
            window,
            origin,
            size,
            flags: config.flag,
        })
    }

    /// Window type, always-on-top state and WM_CLASS
    fn setup_properties(ctx: &AppContext, window: Window) -> Result<()> {
        let window_type = match ctx.platform.window_type() {
            WindowType::ApplicationOverlay => ctx.atoms.net_wm_window_type_notification,
            WindowType::Phone => ctx.atoms.net_wm_window_type_dock,
        };
        ctx.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                ctx.atoms.net_wm_window_type,
                AtomEnum::ATOM,
                &[window_type],
            )
            .context("Failed to set overlay window type")?;

        ctx.conn
            .change_property32(
                PropMode::REPLACE,
                window,
                ctx.atoms.net_wm_state,
                AtomEnum::ATOM,
                &[ctx.atoms.net_wm_state_above],
            )
            .context("Failed to set overlay always-on-top")?;

        ctx.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                x11c::WM_CLASS,
            )
            .context("Failed to set WM_CLASS")?;

        Ok(())
    }

    /// Input region and opacity for the given flag set
    fn apply_flags(ctx: &AppContext, window: Window, flags: TouchFlags) -> Result<()> {
        if flags.contains(TouchFlags::NOT_TOUCHABLE) {
            // Empty input region: every pointer event falls through
            ctx.conn
                .shape_rectangles(SO::SET, SK::INPUT, ClipOrdering::UNSORTED, window, 0, 0, &[])
                .context("Failed to clear overlay input region")?;
        } else {
            ctx.conn
                .shape_mask(SO::SET, SK::INPUT, window, 0, 0, x11rb::NONE)
                .context("Failed to restore overlay input region")?;
        }

        match ctx.platform.alpha_for(flags) {
            Some(alpha) => {
                ctx.conn
                    .change_property32(
                        PropMode::REPLACE,
                        window,
                        ctx.atoms.net_wm_window_opacity,
                        AtomEnum::CARDINAL,
                        &[opacity_cardinal(alpha)],
                    )
                    .context("Failed to cap overlay opacity")?;
            }
            None => {
                ctx.conn
                    .delete_property(window, ctx.atoms.net_wm_window_opacity)
                    .context("Failed to reset overlay opacity")?;
            }
        }
        Ok(())
    }

    /// Live-update interaction flags on the existing window
    pub fn update_flags(&mut self, flags: TouchFlags) -> Result<()> {
        Self::apply_flags(&self.ctx, self.window, flags)?;
        if flags.contains(TouchFlags::FOCUSABLE) && !self.flags.contains(TouchFlags::FOCUSABLE) {
            self.ctx
                .conn
                .set_input_focus(InputFocus::POINTER_ROOT, self.window, x11rb::CURRENT_TIME)
                .context("Failed to focus overlay window")?;
        }
        self.flags = flags;
        self.ctx
            .conn
            .flush()
            .context("Failed to flush X11 connection after flag update")?;
        info!(window = self.window, ?flags, "Updated overlay flags");
        Ok(())
    }

    /// Live-update window extents; `-1` spans fill the screen axis
    pub fn resize(&mut self, width: i32, height: i32) -> Result<()> {
        let size = Dimensions::new(
            resolve_span(width, self.ctx.platform.screen.width),
            resolve_span(height, self.ctx.platform.screen.height),
        );
        self.ctx
            .conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new()
                    .width(size.width as u32)
                    .height(size.height as u32),
            )
            .context(format!("Failed to resize overlay window to {}x{}", size.width, size.height))?;
        self.ctx
            .conn
            .flush()
            .context("Failed to flush X11 connection after resize")?;
        self.size = size;
        Ok(())
    }

    /// Move the window, flushing so the change is visually synchronous with
    /// the gesture driving it
    pub fn reposition(&mut self, origin: Position) -> Result<()> {
        self.ctx
            .conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new().x(origin.x).y(origin.y),
            )
            .context(format!("Failed to reposition overlay window to ({}, {})", origin.x, origin.y))?;
        self.ctx
            .conn
            .flush()
            .context("Failed to flush X11 connection after reposition")?;
        self.origin = origin;
        Ok(())
    }

    pub fn id(&self) -> Window {
        self.window
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.origin, self.size)
    }
}

impl Drop for OverlayWindow {
    fn drop(&mut self) {
        if let Err(e) = self.ctx.conn.destroy_window(self.window) {
            error!(window = self.window, error = ?e, "Failed to destroy overlay window");
        }
        if let Err(e) = self.ctx.conn.flush() {
            error!(error = ?e, "Failed to flush X11 connection during window teardown");
        }
        info!(window = self.window, "Destroyed overlay window");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_screen_span_fills_the_axis() {
        assert_eq!(resolve_span(-1, 1920), 1920);
        assert_eq!(resolve_span(-1, 1080), 1080);
    }

    #[test]
    fn explicit_spans_pass_through_clamped() {
        assert_eq!(resolve_span(300, 1920), 300);
        assert_eq!(resolve_span(0, 1920), 1);
        assert_eq!(resolve_span(100_000, 1920), u16::MAX);
    }
}
