//! Overlay permission gate
//!
//! Thin wrapper over the platform question "may this process put an
//! unmanaged always-on-top window on the display". The check is a probe:
//! create and destroy a throwaway override-redirect window and see whether
//! the server accepts it.

use anyhow::{Context, Result};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt, CreateWindowAux, WindowClass};

use crate::constants::permission::{GRANT_FLOW_DELAY_MS, REQUEST_CODE};
use crate::constants::x11 as x11c;
use crate::daemon::Command;
use crate::x11::AppContext;

/// Whether this process may draw overlay windows right now
pub fn check(ctx: &AppContext) -> bool {
    if !ctx.platform.requires_permission() {
        return true;
    }
    match probe(ctx) {
        Ok(granted) => granted,
        Err(e) => {
            warn!(error = %e, "Overlay permission probe failed");
            false
        }
    }
}

fn probe(ctx: &AppContext) -> Result<bool> {
    let window = ctx
        .conn
        .generate_id()
        .context("Failed to generate probe window ID")?;
    let created = ctx
        .conn
        .create_window(
            0,
            window,
            ctx.screen.root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            0,
            &CreateWindowAux::new().override_redirect(x11c::OVERRIDE_REDIRECT),
        )
        .context("Failed to issue probe window request")?
        .check();

    match created {
        Ok(()) => {
            let _ = ctx.conn.destroy_window(window);
            let _ = ctx.conn.flush();
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

/// Run the asynchronous permission grant flow
///
/// Returns `Some` when the answer is immediate (no grantable permission at
/// this level). Otherwise a worker re-probes the display after giving the
/// grant dialog time to land and delivers a
/// [`Command::PermissionResult`] keyed by [`REQUEST_CODE`].
pub fn request(ctx: &AppContext, commands: Sender<Command>) -> Option<bool> {
    if !ctx.platform.requires_permission() {
        return Some(true);
    }

    let ctx = ctx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(GRANT_FLOW_DELAY_MS));
        let granted = check(&ctx);
        info!(granted, request_code = REQUEST_CODE, "Permission flow finished");
        if commands
            .send(Command::PermissionResult {
                request_code: REQUEST_CODE,
                granted,
            })
            .is_err()
        {
            warn!("Daemon loop gone before permission result could be delivered");
        }
    });
    None
}
