//! Wire protocol between client and server.
//!
//! All frames are JSON text, tagged by `"type"`:
//!
//! | Direction      | `type`              | Payload |
//! |----------------|---------------------|---------|
//! | client→server  | `send-location`     | `latitude`, `longitude`, optional `userId` |
//! | server→others  | `receive-location`  | `id`, `latitude`, `longitude`, optional `userId` |
//! | server→others  | `user-disconnected` | `id` |
//!
//! A client leaves by closing its WebSocket; there is no application-level
//! disconnect message. The browser client relies on these exact type
//! strings and field names.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::SessionId;

/// Errors raised while decoding or validating a client frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame was not valid JSON for any known message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Coordinates were non-finite or out of range.
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates {
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
}

/// A validated latitude/longitude pair.
///
/// Construction via [`Position::new`] is the only way to obtain one, so a
/// `Position` held anywhere downstream is known finite and in range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Degrees north, in `[-90, 90]`.
    pub latitude: f64,
    /// Degrees east, in `[-180, 180]`.
    pub longitude: f64,
}

impl Position {
    /// Validate and build a position.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ProtocolError> {
        let lat_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        let lon_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        if lat_ok && lon_ok {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(ProtocolError::InvalidCoordinates {
                latitude,
                longitude,
            })
        }
    }
}

/// Messages a client may send over its channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// A geolocation fix from the client.
    #[serde(rename = "send-location")]
    SendLocation {
        /// Degrees north.
        latitude: f64,
        /// Degrees east.
        longitude: f64,
        /// Client-chosen display label, echoed to peers verbatim.
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

impl ClientMessage {
    /// Decode one inbound text frame.
    ///
    /// Unknown `type` tags and missing fields surface as
    /// [`ProtocolError::Malformed`]; coordinate range checking is a
    /// separate step (see [`Position::new`]) so the caller can count the
    /// two failure classes apart.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Events the server fans out to peer sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Another session reported a position.
    #[serde(rename = "receive-location")]
    ReceiveLocation {
        /// Session that sent the fix.
        id: SessionId,
        /// Degrees north.
        latitude: f64,
        /// Degrees east.
        longitude: f64,
        /// The sender's display label, if it supplied one.
        #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },

    /// Another session's channel closed.
    #[serde(rename = "user-disconnected")]
    UserDisconnected {
        /// Session that ended.
        id: SessionId,
    },
}

impl ServerEvent {
    /// The wire `type` string (for type discrimination in logs/metrics).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReceiveLocation { .. } => "receive-location",
            Self::UserDisconnected { .. } => "user-disconnected",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- Position --

    #[test]
    fn position_accepts_ordinary_coordinates() {
        let p = Position::new(48.8584, 2.2945).unwrap();
        assert!((p.latitude - 48.8584).abs() < f64::EPSILON);
        assert!((p.longitude - 2.2945).abs() < f64::EPSILON);
    }

    #[test]
    fn position_accepts_boundary_values() {
        assert!(Position::new(90.0, 180.0).is_ok());
        assert!(Position::new(-90.0, -180.0).is_ok());
        assert!(Position::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn position_rejects_out_of_range_latitude() {
        assert!(Position::new(90.1, 0.0).is_err());
        assert!(Position::new(-91.0, 0.0).is_err());
    }

    #[test]
    fn position_rejects_out_of_range_longitude() {
        assert!(Position::new(0.0, 180.5).is_err());
        assert!(Position::new(0.0, -200.0).is_err());
    }

    #[test]
    fn position_rejects_non_finite() {
        assert!(Position::new(f64::NAN, 0.0).is_err());
        assert!(Position::new(0.0, f64::INFINITY).is_err());
        assert!(Position::new(f64::NEG_INFINITY, f64::NAN).is_err());
    }

    #[test]
    fn invalid_coordinates_error_reports_values() {
        let err = Position::new(200.0, 10.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("200"));
        assert!(msg.contains("10"));
    }

    // -- ClientMessage --

    #[test]
    fn parse_send_location() {
        let msg = ClientMessage::parse(
            r#"{"type":"send-location","latitude":10.0,"longitude":20.0,"userId":"u1"}"#,
        )
        .unwrap();
        let ClientMessage::SendLocation {
            latitude,
            longitude,
            user_id,
        } = msg;
        assert!((latitude - 10.0).abs() < f64::EPSILON);
        assert!((longitude - 20.0).abs() < f64::EPSILON);
        assert_eq!(user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn parse_send_location_without_user_id() {
        let msg =
            ClientMessage::parse(r#"{"type":"send-location","latitude":1.5,"longitude":-2.5}"#)
                .unwrap();
        let ClientMessage::SendLocation { user_id, .. } = msg;
        assert!(user_id.is_none());
    }

    #[test]
    fn parse_rejects_unknown_type() {
        let err = ClientMessage::parse(r#"{"type":"disconnect"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn parse_rejects_missing_coordinates() {
        assert!(ClientMessage::parse(r#"{"type":"send-location","latitude":1.0}"#).is_err());
        assert!(ClientMessage::parse(r#"{"type":"send-location"}"#).is_err());
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(ClientMessage::parse("not json").is_err());
    }

    #[test]
    fn send_location_wire_field_names() {
        let msg = ClientMessage::SendLocation {
            latitude: 1.0,
            longitude: 2.0,
            user_id: Some("muskan".into()),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "send-location");
        assert_eq!(json["userId"], "muskan");
        assert!(json.get("user_id").is_none());
    }

    // -- ServerEvent --

    #[test]
    fn receive_location_serde() {
        let event = ServerEvent::ReceiveLocation {
            id: SessionId::from("s1"),
            latitude: 10.0,
            longitude: 20.0,
            user_id: Some("u1".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "receive-location");
        assert_eq!(json["id"], "s1");
        assert_eq!(json["latitude"], 10.0);
        assert_eq!(json["longitude"], 20.0);
        assert_eq!(json["userId"], "u1");

        let back: ServerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn receive_location_omits_missing_user_id() {
        let event = ServerEvent::ReceiveLocation {
            id: SessionId::from("s1"),
            latitude: 0.0,
            longitude: 0.0,
            user_id: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn user_disconnected_serde() {
        let event = ServerEvent::UserDisconnected {
            id: SessionId::from("s2"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({"type": "user-disconnected", "id": "s2"}));
    }

    #[test]
    fn event_type_strings() {
        let location = ServerEvent::ReceiveLocation {
            id: SessionId::from("a"),
            latitude: 0.0,
            longitude: 0.0,
            user_id: None,
        };
        let gone = ServerEvent::UserDisconnected {
            id: SessionId::from("a"),
        };
        assert_eq!(location.event_type(), "receive-location");
        assert_eq!(gone.event_type(), "user-disconnected");
    }
}
