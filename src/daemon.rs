//! Daemon state and control dispatch
//!
//! One `OverlayDaemon` instance owns every shared resource: the single
//! window handle, the drag session, the settle timer and the resident
//! notification. All window mutation and pointer handling happens on the
//! loop that owns this struct; worker threads (control connections, the
//! settle ticker, the permission flow) only enqueue [`Command`]s.

use tracing::{debug, error, info, warn};
use x11rb::protocol::xproto::{ButtonPressEvent, ButtonReleaseEvent, MotionNotifyEvent};
use x11rb::protocol::Event;

use crate::config::{Alignment, EdgeSnap, NotificationVisibility, OverlayConfig, TouchFlags};
use crate::constants::config as cfg;
use crate::drag::{DragState, SettleAnimation, SettleTimer};
use crate::ipc::{
    self, ControlRequest, ControlResponse, Endpoint, PeerId, PeerRegistry, PeerWriter, ShowRequest,
};
use crate::notification::OverlayNotification;
use crate::permission;
use crate::types::Position;
use crate::window::OverlayWindow;
use crate::x11::AppContext;

/// Work item for the daemon loop
#[derive(Clone)]
pub enum Command {
    /// A request read off a control connection
    Control {
        peer: PeerId,
        request: ControlRequest,
        writer: PeerWriter,
    },
    /// Settle animation tick
    SettleTick,
    /// Result of an asynchronous permission flow
    PermissionResult { request_code: u32, granted: bool },
    /// An event read off the X connection
    X11(Event),
}

struct Settle {
    animation: SettleAnimation,
    timer: SettleTimer,
}

pub struct OverlayDaemon {
    ctx: AppContext,
    config: OverlayConfig,
    window: Option<OverlayWindow>,
    drag: DragState,
    settle: Option<Settle>,
    notification: Option<OverlayNotification>,
    registry: PeerRegistry,
    commands: std::sync::mpsc::Sender<Command>,
    shutdown: bool,
}

impl OverlayDaemon {
    pub fn new(
        ctx: AppContext,
        config: OverlayConfig,
        registry: PeerRegistry,
        commands: std::sync::mpsc::Sender<Command>,
    ) -> Self {
        Self {
            ctx,
            config,
            window: None,
            drag: DragState::default(),
            settle: None,
            notification: None,
            registry,
            commands,
            shutdown: false,
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
    }

    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::Control { peer, request, writer } => {
                let response = self.dispatch(peer, request);
                if let Err(e) = ipc::write_response(&writer, &response) {
                    warn!(peer, error = %e, "Failed to reply, dropping connection");
                    self.registry.remove(peer);
                }
            }
            Command::SettleTick => self.handle_settle_tick(),
            Command::PermissionResult { request_code, granted } => {
                info!(request_code, granted, "Delivering permission result");
                self.registry.push_to(
                    Endpoint::Host,
                    &ControlResponse::PermissionResult { request_code, granted },
                );
            }
            Command::X11(event) => self.handle_x_event(event),
        }
    }

    fn dispatch(&mut self, peer: PeerId, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::Hello { endpoint } => {
                self.registry.set_endpoint(peer, endpoint);
                debug!(peer, ?endpoint, "Peer declared its side of the duct");
                ControlResponse::Ready
            }
            ControlRequest::CheckPermission => {
                ControlResponse::Permission(permission::check(&self.ctx))
            }
            ControlRequest::RequestPermission => {
                match permission::request(&self.ctx, self.commands.clone()) {
                    Some(granted) => ControlResponse::Permission(granted),
                    None => ControlResponse::Ready,
                }
            }
            ControlRequest::ShowOverlay(show) => self.show(show),
            ControlRequest::IsOverlayActive => ControlResponse::Active(self.window.is_some()),
            ControlRequest::CloseOverlay => ControlResponse::Done(self.close()),
            ControlRequest::UpdateFlag { flag } => ControlResponse::Done(self.update_flag(&flag)),
            ControlRequest::ResizeOverlay { width, height } => {
                ControlResponse::Done(self.resize(width, height))
            }
            ControlRequest::Message { payload } => {
                self.registry.relay_from(peer, payload);
                ControlResponse::Ready
            }
            ControlRequest::Ping => ControlResponse::Pong,
            ControlRequest::Shutdown => {
                info!("Shutdown requested over control socket");
                self.shutdown = true;
                ControlResponse::Ready
            }
        }
    }

    /// Create the overlay window from the requested configuration, tearing
    /// down any existing one first (idempotent re-show)
    fn show(&mut self, show: ShowRequest) -> ControlResponse {
        if !permission::check(&self.ctx) {
            return ControlResponse::Error("overlay permission is not enabled".to_string());
        }

        self.cancel_settle();
        self.drag = DragState::default();
        if self.window.take().is_some() {
            info!("Replacing existing overlay window");
        }
        if let Some(notification) = self.notification.take() {
            notification.close();
        }

        self.config.width = show.width.unwrap_or(cfg::MATCH_SCREEN);
        self.config.height = show.height.unwrap_or(cfg::MATCH_SCREEN);
        self.config.enable_drag = show.enable_drag;
        self.config.alignment =
            Alignment::from_keyword(show.alignment.as_deref().unwrap_or("center"));
        self.config.flag =
            TouchFlags::from_keyword(show.flag.as_deref().unwrap_or("flagNotFocusable"));
        if let Some(title) = show.overlay_title {
            self.config.overlay_title = title;
        }
        self.config.overlay_content = show.overlay_content.unwrap_or_default();
        if let Some(gravity) = show.position_gravity {
            self.config.position_gravity = EdgeSnap::from_keyword(&gravity);
        }
        if let Some(visibility) = show.notification_visibility {
            self.config.notification_visibility =
                NotificationVisibility::from_keyword(&visibility);
        }
        self.config.validate_and_clamp();
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to persist overlay config");
        }

        match OverlayWindow::create(&self.ctx, &self.config) {
            Ok(window) => {
                self.window = Some(window);
                match OverlayNotification::show(&self.config) {
                    Ok(notification) => self.notification = Some(notification),
                    Err(e) => warn!(error = %e, "Overlay active without its notification"),
                }
                ControlResponse::Ready
            }
            Err(e) => {
                error!(error = ?e, "Failed to create overlay window");
                ControlResponse::Error(format!("failed to create overlay window: {e:#}"))
            }
        }
    }

    /// Tear down the overlay; returns whether a window existed
    pub fn close(&mut self) -> bool {
        self.cancel_settle();
        self.drag = DragState::default();
        let had_window = self.window.take().is_some();
        if let Some(notification) = self.notification.take() {
            notification.close();
        }
        if had_window {
            info!("Closed overlay window");
        } else {
            debug!("Close requested with no active overlay");
        }
        had_window
    }

    fn update_flag(&mut self, keyword: &str) -> bool {
        let flags = TouchFlags::from_keyword(keyword);
        match self.window.as_mut() {
            Some(window) => match window.update_flags(flags) {
                Ok(()) => {
                    self.config.flag = flags;
                    true
                }
                Err(e) => {
                    error!(error = ?e, "Failed to update overlay flags");
                    false
                }
            },
            None => {
                debug!("Flag update requested with no active overlay");
                false
            }
        }
    }

    fn resize(&mut self, width: i32, height: i32) -> bool {
        match self.window.as_mut() {
            Some(window) => match window.resize(width, height) {
                Ok(()) => {
                    self.config.width = width;
                    self.config.height = height;
                    true
                }
                Err(e) => {
                    error!(error = ?e, "Failed to resize overlay window");
                    false
                }
            },
            None => {
                debug!("Resize requested with no active overlay");
                false
            }
        }
    }

    fn handle_x_event(&mut self, event: Event) {
        match event {
            Event::ButtonPress(ev) => self.on_press(ev),
            Event::MotionNotify(ev) => self.on_motion(ev),
            Event::ButtonRelease(ev) => {
                self.on_release(ev);
            }
            Event::DestroyNotify(ev) => {
                if self.window.as_ref().is_some_and(|w| w.id() == ev.window) {
                    warn!(window = ev.window, "Overlay window destroyed externally");
                    // Drop issues one redundant destroy; the server ignores it
                    self.window = None;
                    self.reset_interaction();
                }
            }
            _ => {}
        }
    }

    fn on_press(&mut self, ev: ButtonPressEvent) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if ev.event != window.id() || !self.config.enable_drag {
            return;
        }
        // A live settle animation must not fight the new drag
        self.cancel_settle();
        self.drag.on_press(Position::new(ev.root_x as i32, ev.root_y as i32));
    }

    fn on_motion(&mut self, ev: MotionNotifyEvent) {
        let Some(window) = self.window.as_mut() else {
            return;
        };
        if ev.event != window.id() || !self.config.enable_drag {
            return;
        }
        let pointer = Position::new(ev.root_x as i32, ev.root_y as i32);
        if let Some(origin) = self.drag.on_move(pointer, window.origin())
            && let Err(e) = window.reposition(origin)
        {
            warn!(error = ?e, "Lost overlay window mid-drag");
            self.reset_interaction();
        }
    }

    /// Returns whether the gesture was consumed as a drag
    fn on_release(&mut self, ev: ButtonReleaseEvent) -> bool {
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        if ev.event != window.id() || !self.config.enable_drag {
            return false;
        }

        let consumed = self.drag.on_release(window.origin().y);
        if self.config.position_gravity != EdgeSnap::None {
            // Push the final drag position once more before animating
            let origin = window.origin();
            if let Err(e) = window.reposition(origin) {
                warn!(error = ?e, "Lost overlay window on release");
                self.reset_interaction();
                return consumed;
            }
            let animation = SettleAnimation::resolve(
                self.config.position_gravity,
                window.rect(),
                self.ctx.platform.screen,
                self.drag.rest_y(),
            );
            let timer = SettleTimer::spawn(self.commands.clone(), Command::SettleTick);
            self.settle = Some(Settle { animation, timer });
        }
        debug!(consumed, "Pointer released");
        consumed
    }

    fn handle_settle_tick(&mut self) {
        let Some(settle) = self.settle.as_ref() else {
            return;
        };
        let animation = settle.animation;

        let Some(window) = self.window.as_mut() else {
            // Window vanished mid-animation
            self.cancel_settle();
            return;
        };

        let next = animation.step(window.origin());
        if let Err(e) = window.reposition(next) {
            warn!(error = ?e, "Lost overlay window mid-settle");
            self.reset_interaction();
            return;
        }
        if animation.settled(next) {
            debug!(x = next.x, y = next.y, "Settle animation finished");
            self.cancel_settle();
        }
    }

    fn cancel_settle(&mut self) {
        if let Some(mut settle) = self.settle.take() {
            settle.timer.cancel();
        }
    }

    fn reset_interaction(&mut self) {
        self.cancel_settle();
        self.drag = DragState::default();
    }
}
