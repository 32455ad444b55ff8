//! WebSocket upgrade and per-connection message pumping.
//!
//! `connection` owns the whole lifecycle of one client: upgrade, the
//! outbound write task draining the session's frame queue, the inbound
//! read loop dispatching `send-location` frames into the relay, and the
//! disconnect notification when the channel closes.

pub mod connection;

pub use connection::ws_handler;
