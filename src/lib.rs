#![forbid(unsafe_code)]

//! Floating always-on-top overlay window daemon
//!
//! Owns at most one unmanaged, always-on-top X11 window per process, exposes
//! a control surface over a Unix socket (show/close/resize/flag-update,
//! permission check and request), relays opaque JSON payloads between host
//! and overlay peers, and implements the drag / edge-settle interaction on
//! the window.

pub mod config;
pub mod constants;
pub mod daemon;
pub mod drag;
pub mod ipc;
pub mod notification;
pub mod permission;
pub mod platform;
pub mod types;
pub mod window;
pub mod x11;
