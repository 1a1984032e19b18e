//! Pointer-drag tracking and the edge-settle animation
//!
//! The state machine is pure position math: it consumes raw pointer
//! coordinates plus the window's current origin and yields new origins. The
//! caller applies those to the actual window, so everything here is testable
//! without a display.
//!
//! Gesture flow: Idle -> (press) Tracking -> (motion past the slop)
//! Dragging -> (release) optional settle animation -> Idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::EdgeSnap;
use crate::constants::{animation, gesture};
use crate::types::{Dimensions, Position, Rect};

/// Ephemeral drag session state
///
/// `dragging` flips only after cumulative motion exceeds the slop, so taps
/// never move the window and never count as consumed gestures.
#[derive(Debug, Default)]
pub struct DragState {
    tracking: bool,
    dragging: bool,
    last: Position,
    rest_y: i32,
}

impl DragState {
    /// Pointer went down over the window
    pub fn on_press(&mut self, pointer: Position) {
        self.tracking = true;
        self.dragging = false;
        self.last = pointer;
    }

    /// Pointer moved; returns the new window origin when this motion is an
    /// actual drag step
    ///
    /// Deltas are applied additively to the window's current origin rather
    /// than mapping absolute pointer coordinates, so a mismatch between
    /// pointer and window coordinate spaces cannot make the window drift.
    pub fn on_move(&mut self, pointer: Position, origin: Position) -> Option<Position> {
        if !self.tracking {
            return None;
        }
        let dx = pointer.x - self.last.x;
        let dy = pointer.y - self.last.y;
        if !self.dragging && dx * dx + dy * dy < gesture::DRAG_SLOP_SQ {
            return None;
        }
        self.dragging = true;
        self.last = pointer;
        Some(Position::new(origin.x + dx, origin.y + dy))
    }

    /// Pointer released (or the gesture was cancelled); records the window's
    /// y as the settle reference and reports whether a drag was consumed
    pub fn on_release(&mut self, window_y: i32) -> bool {
        self.tracking = false;
        self.rest_y = window_y;
        self.dragging
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Window y recorded at the last release
    pub fn rest_y(&self) -> i32 {
        self.rest_y
    }
}

/// Settle animation converging the window onto its resting position
///
/// The target is resolved once at entry. Each tick keeps two thirds of the
/// remaining distance, in integer pixels; truncation is what makes the
/// sequence reach the target exactly instead of approaching it forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleAnimation {
    target: Position,
}

impl SettleAnimation {
    /// Resolve the resting target for the released window
    pub fn resolve(mode: EdgeSnap, window: Rect, screen: Dimensions, rest_y: i32) -> Self {
        let right_edge = screen.width as i32 - window.width as i32;
        let target = match mode {
            EdgeSnap::Auto => {
                if window.center_x() < screen.width as i32 / 2 {
                    Position::new(0, rest_y)
                } else {
                    Position::new(right_edge, rest_y)
                }
            }
            EdgeSnap::Left => Position::new(0, rest_y),
            EdgeSnap::Right => Position::new(right_edge, rest_y),
            EdgeSnap::None => window.origin(),
        };
        debug!(?mode, x = target.x, y = target.y, "Resolved settle target");
        Self { target }
    }

    pub fn target(&self) -> Position {
        self.target
    }

    /// One animation step from `current` toward the target
    pub fn step(&self, current: Position) -> Position {
        Position::new(
            self.target.x + 2 * (current.x - self.target.x) / 3,
            self.target.y + 2 * (current.y - self.target.y) / 3,
        )
    }

    /// Whether `current` is close enough to stop
    pub fn settled(&self, current: Position) -> bool {
        (current.x - self.target.x).abs() < animation::SETTLE_TOLERANCE
            && (current.y - self.target.y).abs() < animation::SETTLE_TOLERANCE
    }
}

/// Periodic ticker driving a settle animation
///
/// The timer thread owns nothing but a channel sender: each tick enqueues a
/// message for the loop that owns the window, which applies the actual
/// position update. Dropping the timer stops the thread.
pub struct SettleTimer {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SettleTimer {
    pub fn spawn<T: Clone + Send + 'static>(tx: Sender<T>, tick: T) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !thread_stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(animation::TICK_INTERVAL_MS));
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }
                if tx.send(tick.clone()).is_err() {
                    // Receiver is gone; nothing left to animate
                    break;
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the ticker and wait for the thread to exit
    pub fn cancel(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Settle timer thread panicked");
        }
    }
}

impl Drop for SettleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn rect(x: i32, y: i32, width: u16, height: u16) -> Rect {
        Rect::new(Position::new(x, y), Dimensions::new(width, height))
    }

    #[test]
    fn sub_slop_motion_never_starts_a_drag() {
        let mut drag = DragState::default();
        drag.on_press(Position::new(100, 100));

        // 4^2 + 2^2 = 20 < 25
        assert_eq!(drag.on_move(Position::new(104, 102), Position::new(50, 50)), None);
        assert!(!drag.is_dragging());
        // Still measured against the press point, not the last motion
        assert_eq!(drag.on_move(Position::new(102, 101), Position::new(50, 50)), None);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn slop_crossed_moves_window_by_the_pointer_delta() {
        let mut drag = DragState::default();
        drag.on_press(Position::new(100, 100));

        // 4^2 + 3^2 = 25, no longer below the slop
        let moved = drag.on_move(Position::new(104, 103), Position::new(50, 50));
        assert_eq!(moved, Some(Position::new(54, 53)));
        assert!(drag.is_dragging());
    }

    #[test]
    fn dragging_accumulates_exact_deltas() {
        let mut drag = DragState::default();
        drag.on_press(Position::new(0, 0));

        let mut origin = Position::new(300, 200);
        origin = drag.on_move(Position::new(10, 0), origin).unwrap();
        assert_eq!(origin, Position::new(310, 200));

        // Once dragging, even one-pixel motions are applied
        origin = drag.on_move(Position::new(11, -1), origin).unwrap();
        assert_eq!(origin, Position::new(311, 199));

        origin = drag.on_move(Position::new(5, 5), origin).unwrap();
        assert_eq!(origin, Position::new(305, 205));
    }

    #[test]
    fn motion_without_a_press_is_ignored() {
        let mut drag = DragState::default();
        assert_eq!(drag.on_move(Position::new(500, 500), Position::new(0, 0)), None);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn release_reports_consumed_only_after_a_real_drag() {
        let mut drag = DragState::default();

        drag.on_press(Position::new(100, 100));
        drag.on_move(Position::new(101, 101), Position::new(0, 0));
        assert!(!drag.on_release(40), "sub-slop gesture is a tap, not a drag");

        drag.on_press(Position::new(100, 100));
        drag.on_move(Position::new(110, 110), Position::new(0, 0));
        assert!(drag.on_release(55));
        assert_eq!(drag.rest_y(), 55);
    }

    #[test]
    fn press_resets_the_previous_session() {
        let mut drag = DragState::default();
        drag.on_press(Position::new(0, 0));
        drag.on_move(Position::new(20, 20), Position::new(0, 0));
        assert!(drag.is_dragging());

        drag.on_press(Position::new(5, 5));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn auto_snap_picks_the_near_edge() {
        let screen = Dimensions::new(1000, 800);

        // Center 400 < 500: left edge
        let left = SettleAnimation::resolve(EdgeSnap::Auto, rect(300, 120, 200, 100), screen, 120);
        assert_eq!(left.target(), Position::new(0, 120));

        // Center 700 > 500: right edge
        let right = SettleAnimation::resolve(EdgeSnap::Auto, rect(600, 40, 200, 100), screen, 40);
        assert_eq!(right.target(), Position::new(800, 40));
    }

    #[test]
    fn auto_snap_at_exact_center_goes_right() {
        let screen = Dimensions::new(1000, 800);
        let anim = SettleAnimation::resolve(EdgeSnap::Auto, rect(400, 0, 200, 100), screen, 0);
        assert_eq!(anim.target(), Position::new(800, 0));
    }

    #[test]
    fn forced_edges_ignore_the_window_position() {
        let screen = Dimensions::new(1000, 800);
        let window = rect(900, 300, 200, 100);

        let left = SettleAnimation::resolve(EdgeSnap::Left, window, screen, 300);
        assert_eq!(left.target(), Position::new(0, 300));

        let right = SettleAnimation::resolve(EdgeSnap::Right, rect(10, 300, 200, 100), screen, 300);
        assert_eq!(right.target(), Position::new(800, 300));
    }

    #[test]
    fn snap_none_targets_the_current_origin() {
        let screen = Dimensions::new(1000, 800);
        let anim = SettleAnimation::resolve(EdgeSnap::None, rect(321, 77, 200, 100), screen, 77);
        assert_eq!(anim.target(), Position::new(321, 77));
        assert!(anim.settled(Position::new(321, 77)));
    }

    #[test]
    fn settle_sequence_decays_toward_the_left_edge() {
        // Window at x=300 on a 1000px screen, 200px wide: center 400 < 500
        let screen = Dimensions::new(1000, 800);
        let anim = SettleAnimation::resolve(EdgeSnap::Auto, rect(300, 64, 200, 100), screen, 64);
        assert_eq!(anim.target(), Position::new(0, 64));

        let mut pos = Position::new(300, 64);
        pos = anim.step(pos);
        assert_eq!(pos.x, 200);
        pos = anim.step(pos);
        assert_eq!(pos.x, 133);
        pos = anim.step(pos);
        assert_eq!(pos.x, 88);

        let mut ticks = 3;
        while !anim.settled(pos) {
            pos = anim.step(pos);
            ticks += 1;
            assert!(ticks < 32, "settle must terminate in finite ticks");
        }
        assert!((pos.x - 0).abs() < 2);
        assert_eq!(pos.y, 64);
    }

    #[test]
    fn settle_y_always_converges_to_the_release_y() {
        let screen = Dimensions::new(1000, 800);
        let anim = SettleAnimation::resolve(EdgeSnap::Right, rect(500, 700, 100, 100), screen, 240);

        // The window was still moving vertically when released
        let mut pos = Position::new(500, 700);
        while !anim.settled(pos) {
            pos = anim.step(pos);
        }
        assert!((pos.x - 900).abs() < 2);
        assert!((pos.y - 240).abs() < 2);
    }

    #[test]
    fn settle_converges_from_negative_coordinates() {
        let screen = Dimensions::new(1000, 800);
        let anim = SettleAnimation::resolve(EdgeSnap::Left, rect(-250, 10, 200, 100), screen, 10);

        let mut pos = Position::new(-250, 10);
        let mut ticks = 0;
        while !anim.settled(pos) {
            pos = anim.step(pos);
            ticks += 1;
            assert!(ticks < 32);
        }
        assert!(pos.x.abs() < 2);
    }

    #[test]
    fn settle_timer_ticks_until_cancelled() {
        let (tx, rx) = mpsc::channel();
        let mut timer = SettleTimer::spawn(tx, ());

        assert!(rx.recv_timeout(Duration::from_millis(500)).is_ok());
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_ok());

        timer.cancel();
        // Drain anything sent before the stop flag landed
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
