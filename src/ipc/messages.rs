//! Control messages for host / overlay <-> daemon communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which side of the message duct a connection speaks for
///
/// Connections that never declare themselves are treated as hosts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Endpoint {
    Host,
    Overlay,
}

impl Endpoint {
    pub fn other(self) -> Endpoint {
        match self {
            Endpoint::Host => Endpoint::Overlay,
            Endpoint::Overlay => Endpoint::Host,
        }
    }
}

/// Requests sent to the daemon
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ControlRequest {
    /// Declare which side of the message duct this connection is
    Hello { endpoint: Endpoint },

    /// Can this process draw overlay windows?
    CheckPermission,

    /// Run the permission grant flow; the result arrives later as a
    /// [`ControlResponse::PermissionResult`] push unless it is immediate
    RequestPermission,

    /// Create the overlay window, replacing any existing one
    ShowOverlay(ShowRequest),

    IsOverlayActive,

    CloseOverlay,

    /// Live-update interaction flags on the active window
    UpdateFlag { flag: String },

    /// Live-update extents of the active window
    ResizeOverlay { width: i32, height: i32 },

    /// Opaque payload relayed verbatim to the other side of the duct
    Message { payload: Value },

    /// Health check
    Ping,

    /// Request graceful daemon shutdown
    Shutdown,
}

/// Arguments of [`ControlRequest::ShowOverlay`]
///
/// Absent fields fall back to their documented defaults; `enable_drag` is
/// the one argument callers must always supply.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ShowRequest {
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub alignment: Option<String>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub overlay_title: Option<String>,
    #[serde(default)]
    pub overlay_content: Option<String>,
    #[serde(default)]
    pub notification_visibility: Option<String>,
    pub enable_drag: bool,
    #[serde(default)]
    pub position_gravity: Option<String>,
}

/// Responses and unsolicited pushes sent by the daemon
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ControlResponse {
    /// Request accepted
    Ready,

    /// Result of close / flag-update / resize
    Done(bool),

    /// Whether an overlay window is currently active
    Active(bool),

    /// Immediate permission answer
    Permission(bool),

    /// Unsolicited: result of an earlier RequestPermission
    PermissionResult { request_code: u32, granted: bool },

    /// Unsolicited: payload relayed from the other side of the duct
    Message { payload: Value },

    Pong,

    /// Operation aborted; the message names the reason
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn show_overlay_request_roundtrips() {
        let request = ControlRequest::ShowOverlay(ShowRequest {
            width: Some(300),
            alignment: Some("bottomCenter".to_string()),
            flag: Some("clickThrough".to_string()),
            overlay_content: Some("running".to_string()),
            enable_drag: true,
            position_gravity: Some("auto".to_string()),
            ..ShowRequest::default()
        });

        let bytes = serde_json::to_vec(&request).unwrap();
        let back: ControlRequest = serde_json::from_slice(&bytes).unwrap();
        match back {
            ControlRequest::ShowOverlay(show) => {
                assert_eq!(show.width, Some(300));
                assert_eq!(show.height, None);
                assert!(show.enable_drag);
                assert_eq!(show.position_gravity.as_deref(), Some("auto"));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn absent_show_fields_default() {
        let raw = r#"{"ShowOverlay": {"enable_drag": false}}"#;
        let parsed: ControlRequest = serde_json::from_str(raw).unwrap();
        match parsed {
            ControlRequest::ShowOverlay(show) => {
                assert_eq!(show.width, None);
                assert_eq!(show.flag, None);
                assert!(!show.enable_drag);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn relayed_payloads_stay_opaque() {
        let payload = json!({"kind": "counter", "value": 7, "nested": [1, 2, {"deep": true}]});
        let push = ControlResponse::Message { payload: payload.clone() };

        let bytes = serde_json::to_vec(&push).unwrap();
        let back: ControlResponse = serde_json::from_slice(&bytes).unwrap();
        match back {
            ControlResponse::Message { payload: relayed } => assert_eq!(relayed, payload),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn endpoint_other_side() {
        assert_eq!(Endpoint::Host.other(), Endpoint::Overlay);
        assert_eq!(Endpoint::Overlay.other(), Endpoint::Host);
    }
}
