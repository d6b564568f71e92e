//! # Bingo Server Library
//!
//! This library provides the authoritative server for the stream bingo game.
//! It assigns every connecting client a personal shuffled 24-cell board,
//! tracks which theme items an admin has marked as occurred, and broadcasts
//! state snapshots to all connected clients over persistent WebSocket
//! connections.
//!
//! ## Core Responsibilities
//!
//! ### Session Continuity
//! A client's identity and board survive disconnects: on close, the identity
//! moves into a pending map with a grace deadline, and a reconnect claim
//! bearing the matching token restores the exact same board on the new
//! connection. Once the grace window elapses the identity is permanently
//! forgotten.
//!
//! ### Admin State Propagation
//! Toggle commands carrying the shared secret flip membership of a theme
//! item in the global happened set; every announced connection then receives
//! an updated snapshot. Unauthorized or malformed messages are answered with
//! the sender's current state and never mutate anything.
//!
//! ### Connection Liveness
//! A periodic ping sweep terminates connections that stopped answering
//! probes, routing them through the same disconnect path as an explicit
//! close. This guards against half-open connections that never emit a close
//! event.
//!
//! ## Architecture
//!
//! The server is event-driven around a single `select!` loop that owns the
//! [`registry::Registry`]. Connection tasks never touch state directly:
//! readers forward inbound frames as events over a channel, writers drain
//! per-connection outbound queues. The event loop processes one event at a
//! time, so no locking is needed and delivery order per connection is
//! preserved.
//!
//! ## Module Organization
//!
//! - [`board`] generates randomized boards by sampling the theme vocabulary
//!   without replacement.
//! - [`registry`] owns all session, reconnect, and happened-set state and
//!   implements the message dispatch rules.
//! - [`network`] accepts WebSocket connections and runs the event loop and
//!   the periodic sweeps.
//!
//! All state is held in process memory for the server's lifetime; a restart
//! loses every session and the happened set.

pub mod board;
pub mod network;
pub mod registry;
