//! # locus-core
//!
//! Foundation types for the Locus location relay.
//!
//! This crate provides the shared vocabulary the server crate builds on:
//!
//! - **Branded IDs**: [`ids::SessionId`] as a newtype over a UUIDv7 string
//! - **Wire protocol**: [`protocol::ClientMessage`] and
//!   [`protocol::ServerEvent`] JSON frames, tagged by `"type"`
//! - **Coordinates**: [`protocol::Position`] with range/finiteness validation
//! - **Errors**: [`protocol::ProtocolError`] via `thiserror`
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `locus-server` and the `locus` binary.

#![deny(unsafe_code)]

pub mod ids;
pub mod protocol;

pub use ids::SessionId;
pub use protocol::{ClientMessage, Position, ProtocolError, ServerEvent};
