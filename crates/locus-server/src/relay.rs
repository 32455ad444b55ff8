//! Broadcast relay and lifecycle notifier.
//!
//! The relay owns the [`SessionRegistry`] and implements the two fan-out
//! paths: location updates (`receive-location`) and disconnect notices
//! (`user-disconnected`). Every open session implicitly subscribes to every
//! other session's events — there is no interest or subscription state,
//! which is adequate only for a handful of concurrent users and makes no
//! attempt to scale beyond that.

use std::sync::Arc;

use locus_core::{Position, ServerEvent, SessionId};
use metrics::counter;
use tracing::{debug, warn};

use crate::metrics::{INVALID_PAYLOADS_TOTAL, LOCATION_UPDATES_TOTAL, WS_BROADCAST_DROPS_TOTAL};
use crate::registry::{Frame, SessionRegistry};

/// Fan-out relay over the session registry.
pub struct Relay {
    registry: SessionRegistry,
}

impl Relay {
    /// Create a relay with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: SessionRegistry::new(),
        }
    }

    /// The registry backing this relay.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Record a location fix and fan it out to every other open session.
    ///
    /// Out-of-range or non-finite coordinates are dropped here so they
    /// never reach a peer. An update for an unknown session (one that
    /// already disconnected) is ignored entirely.
    pub async fn on_location_update(
        &self,
        id: &SessionId,
        latitude: f64,
        longitude: f64,
        user_id: Option<String>,
    ) {
        let position = match Position::new(latitude, longitude) {
            Ok(position) => position,
            Err(error) => {
                counter!(INVALID_PAYLOADS_TOTAL).increment(1);
                warn!(session_id = %id, %error, "dropping location update");
                return;
            }
        };

        if !self.registry.update(id, position, user_id.clone()).await {
            debug!(session_id = %id, "update for unknown session ignored");
            return;
        }

        counter!(LOCATION_UPDATES_TOTAL).increment(1);
        let event = ServerEvent::ReceiveLocation {
            id: id.clone(),
            latitude: position.latitude,
            longitude: position.longitude,
            user_id,
        };
        self.broadcast_from(id, &event).await;
    }

    /// Drop the session and tell every remaining session it ended.
    ///
    /// Idempotent: a second call for the same id sends nothing.
    pub async fn on_disconnect(&self, id: &SessionId) {
        if !self.registry.remove(id).await {
            return;
        }
        let event = ServerEvent::UserDisconnected { id: id.clone() };
        self.broadcast_from(id, &event).await;
    }

    /// Serialize once, deliver to every open session except `exclude`.
    ///
    /// Delivery is best-effort: a full or closed peer channel drops the
    /// frame for that peer only and fan-out continues. No retry, no
    /// ordering guarantee across sessions.
    async fn broadcast_from(&self, exclude: &SessionId, event: &ServerEvent) {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(error) => {
                warn!(event_type = event.event_type(), %error, "failed to serialize event");
                return;
            }
        };

        let mut recipients = 0u32;
        let mut dropped = 0u32;
        for (peer_id, outbound) in self.registry.peer_senders(exclude).await {
            recipients += 1;
            if outbound.try_send(Arc::clone(&frame)).is_err() {
                dropped += 1;
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(
                    peer = %peer_id,
                    event_type = event.event_type(),
                    "peer channel unavailable, dropping frame"
                );
            }
        }
        debug!(
            event_type = event.event_type(),
            recipients, dropped, "broadcast event"
        );
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn join(relay: &Relay) -> (SessionId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(32);
        let id = relay.registry().register(tx).await;
        (id, rx)
    }

    fn parse(frame: &Frame) -> serde_json::Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn update_reaches_all_other_sessions() {
        let relay = Relay::new();
        let (a, mut rx_a) = join(&relay).await;
        let (_b, mut rx_b) = join(&relay).await;
        let (_c, mut rx_c) = join(&relay).await;

        relay
            .on_location_update(&a, 10.0, 20.0, Some("u1".into()))
            .await;

        for rx in [&mut rx_b, &mut rx_c] {
            let event = parse(&rx.try_recv().unwrap());
            assert_eq!(event["type"], "receive-location");
            assert_eq!(event["id"], a.as_str());
            assert_eq!(event["latitude"], 10.0);
            assert_eq!(event["longitude"], 20.0);
            assert_eq!(event["userId"], "u1");
        }

        // The sender never hears its own update.
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn update_records_position_in_registry() {
        let relay = Relay::new();
        let (a, _rx_a) = join(&relay).await;
        let (b, _rx_b) = join(&relay).await;

        relay.on_location_update(&a, 1.5, -2.5, None).await;

        let others = relay.registry().list_others(&b).await;
        let peer = others.iter().find(|peer| peer.id == a).unwrap();
        let position = peer.last_position.unwrap();
        assert!((position.latitude - 1.5).abs() < f64::EPSILON);
        assert!((position.longitude + 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn invalid_coordinates_are_not_broadcast() {
        let relay = Relay::new();
        let (a, _rx_a) = join(&relay).await;
        let (b, mut rx_b) = join(&relay).await;

        relay.on_location_update(&a, f64::NAN, 20.0, None).await;
        relay.on_location_update(&a, 91.0, 0.0, None).await;

        assert!(rx_b.try_recv().is_err());
        // Nothing was recorded either.
        let others = relay.registry().list_others(&b).await;
        let peer = others.iter().find(|peer| peer.id == a).unwrap();
        assert!(peer.last_position.is_none());
    }

    #[tokio::test]
    async fn update_for_unknown_session_is_ignored() {
        let relay = Relay::new();
        let (_a, mut rx_a) = join(&relay).await;
        let ghost = SessionId::generate();

        relay.on_location_update(&ghost, 10.0, 10.0, None).await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(relay.registry().count(), 1);
    }

    #[tokio::test]
    async fn disconnect_notifies_each_remaining_session_once() {
        let relay = Relay::new();
        let (a, mut rx_a) = join(&relay).await;
        let (b, rx_b) = join(&relay).await;
        let (_c, mut rx_c) = join(&relay).await;
        drop(rx_b);

        relay.on_disconnect(&b).await;

        for rx in [&mut rx_a, &mut rx_c] {
            let event = parse(&rx.try_recv().unwrap());
            assert_eq!(event["type"], "user-disconnected");
            assert_eq!(event["id"], b.as_str());
            // Exactly one notice.
            assert!(rx.try_recv().is_err());
        }
        assert_eq!(relay.registry().count(), 2);
        assert!(
            relay
                .registry()
                .list_others(&a)
                .await
                .iter()
                .all(|peer| peer.id != b)
        );
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let relay = Relay::new();
        let (a, _rx_a) = join(&relay).await;
        let (b, mut rx_b) = join(&relay).await;

        relay.on_disconnect(&a).await;
        relay.on_disconnect(&a).await;

        let event = parse(&rx_b.try_recv().unwrap());
        assert_eq!(event["type"], "user-disconnected");
        // The second call produced no extra notice.
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn broken_peer_does_not_abort_fan_out() {
        let relay = Relay::new();
        let (a, _rx_a) = join(&relay).await;
        let (_b, rx_b) = join(&relay).await;
        let (_c, mut rx_c) = join(&relay).await;

        // b's receive half is gone; delivery to it fails.
        drop(rx_b);

        relay.on_location_update(&a, 5.0, 6.0, None).await;

        // c still got the update.
        let event = parse(&rx_c.try_recv().unwrap());
        assert_eq!(event["type"], "receive-location");
    }

    #[tokio::test]
    async fn full_peer_channel_drops_frame_for_that_peer_only() {
        let relay = Relay::new();
        let (a, _rx_a) = join(&relay).await;

        // Session with a single-slot channel that is already full.
        let (tx_full, mut rx_full) = mpsc::channel(1);
        let _full_id = relay.registry().register(tx_full).await;
        let (_c, mut rx_c) = join(&relay).await;

        relay.on_location_update(&a, 1.0, 1.0, None).await;
        relay.on_location_update(&a, 2.0, 2.0, None).await;

        // The slow peer only got the first frame; the healthy one got both.
        let first = parse(&rx_full.try_recv().unwrap());
        assert_eq!(first["latitude"], 1.0);
        assert!(rx_full.try_recv().is_err());

        let event = parse(&rx_c.try_recv().unwrap());
        assert_eq!(event["latitude"], 1.0);
        let event = parse(&rx_c.try_recv().unwrap());
        assert_eq!(event["latitude"], 2.0);
    }

    #[tokio::test]
    async fn frames_are_shared_not_cloned() {
        let relay = Relay::new();
        let (a, _rx_a) = join(&relay).await;
        let (_b, mut rx_b) = join(&relay).await;
        let (_c, mut rx_c) = join(&relay).await;

        relay.on_location_update(&a, 3.0, 4.0, None).await;

        let frame_b = rx_b.try_recv().unwrap();
        let frame_c = rx_c.try_recv().unwrap();
        assert!(Arc::ptr_eq(&frame_b, &frame_c));
    }

    #[tokio::test]
    async fn single_session_broadcast_is_a_noop() {
        let relay = Relay::new();
        let (a, mut rx_a) = join(&relay).await;

        relay.on_location_update(&a, 1.0, 1.0, None).await;
        relay.on_disconnect(&a).await;

        assert!(rx_a.try_recv().is_err());
        assert_eq!(relay.registry().count(), 0);
    }
}
