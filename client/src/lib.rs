//! # Bingo Client Library
//!
//! This library provides a terminal client for the stream bingo server,
//! used for play-testing boards and driving admin toggles without a
//! browser.
//!
//! ## Module Organization
//!
//! - [`network`] owns the WebSocket connection and the message loop: it
//!   performs the handshake, replays a saved identity as a reconnect claim,
//!   answers liveness probes, and dispatches snapshots and vocabulary
//!   frames.
//! - [`identity`] persists the server-assigned identity token to a file so
//!   a later run can reclaim its board, the same role a cookie plays for
//!   the browser client.
//! - [`board_view`] renders a board and the happened set as a 5x5 text
//!   grid with the traditional free center cell.
//!
//! ## Modes
//!
//! In play mode the client stays connected and reprints its board whenever
//! a snapshot arrives. With `--auth` it acts as the admin instead: given
//! `--toggle` it flips one theme item and exits once the change is
//! reflected; without one it fetches and prints the valid toggle list.

pub mod board_view;
pub mod identity;
pub mod network;
