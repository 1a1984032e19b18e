//! Resident desktop notification shown while the overlay is active
//!
//! Background-surfaced windows must stay announced to the user for as long
//! as they are up, so the notification is posted on show, replaced on
//! re-show and closed on teardown.

use anyhow::{Context, Result};
use notify_rust::{Hint, Notification, NotificationHandle, Timeout, Urgency};
use tracing::info;

use crate::config::{NotificationVisibility, OverlayConfig};

pub struct OverlayNotification {
    handle: NotificationHandle,
}

impl OverlayNotification {
    /// Post the notification; it stays up until [`OverlayNotification::close`]
    pub fn show(config: &OverlayConfig) -> Result<Self> {
        let mut notification = Notification::new();
        notification
            .appname("overlayd")
            .summary(&config.overlay_title)
            .body(&config.overlay_content)
            .timeout(Timeout::Never)
            .hint(Hint::Resident(true));

        match config.notification_visibility {
            NotificationVisibility::Public => {
                notification.hint(Hint::Urgency(Urgency::Normal));
            }
            NotificationVisibility::Private => {
                notification.hint(Hint::Urgency(Urgency::Low));
            }
            NotificationVisibility::Secret => {
                // Keep it out of notification history and quiet surfaces
                notification.hint(Hint::Urgency(Urgency::Low));
                notification.hint(Hint::Transient(true));
            }
        }

        let handle = notification
            .show()
            .context("Failed to post overlay notification")?;
        info!(title = %config.overlay_title, "Posted overlay notification");
        Ok(Self { handle })
    }

    /// Take the notification down again
    pub fn close(self) {
        self.handle.close();
    }
}
