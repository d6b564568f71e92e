//! Session registry and reconnection resolution for the bingo server
//!
//! This module is the single source of truth for server state, including:
//! - Live connections and their assigned identities and boards
//! - The shared happened set mutated by validated admin toggles
//! - Recently disconnected identities eligible for reconnection
//! - Liveness bookkeeping for the periodic ping sweep
//!
//! The registry is owned exclusively by the server's event loop, so every
//! mutation happens inside a single synchronous turn and no locking is
//! needed anywhere in here.

use crate::board::generate_board;
use log::{debug, error, info, warn};
use serde::Serialize;
use shared::{ClientMessage, Command, Snapshot};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Connection identifier assigned by the accept loop. Distinct from the
/// client-facing identity token: a reconnecting client gets a new `ConnId`
/// but keeps its uuid.
pub type ConnId = u64;

/// Per-connection state for a currently open connection
///
/// The admin privilege is deliberately absent here: it is evaluated per
/// message against the shared secret and never sticks to the session.
#[derive(Debug)]
pub struct Session {
    /// Opaque identity token assigned by the server, never client-chosen
    pub uuid: String,
    /// This identity's personal 24-cell board
    pub board: Vec<String>,
    /// Whether the connection answered the previous liveness probe
    pub alive: bool,
    /// Whether the handshake snapshot has been sent; only announced
    /// sessions receive broadcasts
    pub announced: bool,
    /// Outbound frame queue drained by this connection's writer task
    pub sender: mpsc::UnboundedSender<Message>,
}

/// A disconnected identity still inside its grace window
#[derive(Debug)]
struct PendingReconnect {
    board: Vec<String>,
    expires_at: Instant,
}

/// Owns all live and recently disconnected session state
///
/// Per identity, the lifecycle is LIVE (in `sessions`), then on disconnect
/// PENDING_RECONNECT (in `pending` with a grace deadline), then either back
/// to LIVE via a matching reconnect claim or FORGOTTEN once the deadline
/// passes and the sweep drops the entry.
pub struct Registry {
    /// Live sessions indexed by connection id
    sessions: HashMap<ConnId, Session>,
    /// Disconnected identities waiting out their grace window
    pending: HashMap<String, PendingReconnect>,
    /// Theme items the admin has marked as occurred, in toggle order
    happened: Vec<String>,
    /// The fixed theme list; also the set of valid toggle values
    vocabulary: Vec<String>,
    /// Shared admin secret; `None` disables admin commands entirely
    secret: Option<String>,
    /// How long a disconnected identity stays reclaimable
    grace_window: Duration,
    /// Countdown epoch in ms, echoed in every snapshot
    start_time: u64,
}

impl Registry {
    pub fn new(
        vocabulary: Vec<String>,
        secret: Option<String>,
        grace_window: Duration,
        start_time: u64,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            pending: HashMap::new(),
            happened: Vec::new(),
            vocabulary,
            secret,
            grace_window,
            start_time,
        }
    }

    /// Registers a freshly opened connection
    ///
    /// Assigns a brand-new identity and board and sends the handshake
    /// snapshot. Runs exactly once per connection, before any of its
    /// messages are processed. A reconnect claim arriving later swaps the
    /// identity in place; it never goes through here again.
    pub fn register(&mut self, conn_id: ConnId, sender: mpsc::UnboundedSender<Message>) {
        let board = match generate_board(&self.vocabulary) {
            Ok(board) => board,
            Err(e) => {
                error!("Cannot assign a board: {}", e);
                let _ = sender.send(Message::Close(None));
                return;
            }
        };

        let session = Session {
            uuid: uuid::Uuid::new_v4().to_string(),
            board,
            alive: true,
            announced: false,
            sender,
        };

        info!("Client connected: {}", session.uuid);
        self.sessions.insert(conn_id, session);
        self.send_snapshot(conn_id, false);

        if let Some(session) = self.sessions.get_mut(&conn_id) {
            session.announced = true;
        }
    }

    /// Dispatches one inbound text frame from a connection
    ///
    /// Anything that fails to parse, and any message that earns no special
    /// treatment, is answered with the sender's current snapshot. Nothing
    /// in here can take the connection down.
    pub fn handle_message(&mut self, conn_id: ConnId, raw: &str) {
        if !self.sessions.contains_key(&conn_id) {
            debug!("Message from untracked connection {}", conn_id);
            return;
        }

        let command = match serde_json::from_str::<ClientMessage>(raw) {
            Ok(message) => message.classify(self.secret.as_deref()),
            Err(e) => {
                debug!("Unparseable message on connection {}: {}", conn_id, e);
                self.send_snapshot(conn_id, false);
                return;
            }
        };

        match command {
            Command::Reconnect { uuid } => self.resolve_reconnect(conn_id, &uuid),
            Command::Admin { toggle } => self.handle_admin(conn_id, toggle),
            Command::Probe => self.send_snapshot(conn_id, false),
        }
    }

    /// Resolves a reconnect claim against the pending map
    ///
    /// A matching entry moves back to live: the connection adopts the
    /// stored identity and board, and removing the entry also cancels its
    /// grace deadline. An unknown identity is humored with the connection's
    /// current snapshot and the `recon` flag set, with no board continuity
    /// (never seen, or already forgotten; the two are indistinguishable).
    fn resolve_reconnect(&mut self, conn_id: ConnId, claimed: &str) {
        if let Some(entry) = self.pending.remove(claimed) {
            if let Some(session) = self.sessions.get_mut(&conn_id) {
                info!("{} -> {}", session.uuid, claimed);
                session.uuid = claimed.to_string();
                session.board = entry.board;
            }
        } else {
            debug!("Reconnect claim for unknown identity {}", claimed);
        }

        self.send_snapshot(conn_id, true);
    }

    /// Applies a validated admin command
    ///
    /// A toggle naming a vocabulary item flips its membership in the
    /// happened set and rebroadcasts to everyone. A missing or unknown
    /// toggle gets the vocabulary list back instead, which the admin UI
    /// uses to populate its controls.
    fn handle_admin(&mut self, conn_id: ConnId, toggle: Option<String>) {
        let item = match toggle {
            Some(item) if self.vocabulary.contains(&item) => item,
            _ => {
                self.send_json(conn_id, &self.vocabulary);
                return;
            }
        };

        debug!("Toggling {}", item);
        if let Some(position) = self.happened.iter().position(|x| *x == item) {
            self.happened.remove(position);
        } else {
            self.happened.push(item);
        }

        self.broadcast();
    }

    /// Moves a closed connection's identity into the pending map
    ///
    /// The identity stays reclaimable until `now + grace_window`; the board
    /// travels with it. Unknown connection ids are ignored, which covers a
    /// reader task reporting a close after the ping sweep already removed
    /// the session.
    pub fn disconnect(&mut self, conn_id: ConnId, now: Instant) {
        let Some(session) = self.sessions.remove(&conn_id) else {
            return;
        };

        info!("Client disconnected: {}", session.uuid);
        self.pending.insert(
            session.uuid,
            PendingReconnect {
                board: session.board,
                expires_at: now + self.grace_window,
            },
        );
    }

    /// Marks a connection as having answered the liveness probe
    pub fn confirm(&mut self, conn_id: ConnId) {
        if let Some(session) = self.sessions.get_mut(&conn_id) {
            session.alive = true;
            debug!("Client ponged: {}", session.uuid);
        }
    }

    /// Runs one liveness probe round
    ///
    /// Connections that never answered the previous probe are told to close
    /// and returned to the caller for ordinary disconnect handling; the
    /// rest are marked unconfirmed and sent a new probe. This catches
    /// half-open connections that will never emit a close event.
    pub fn sweep_unconfirmed(&mut self) -> Vec<ConnId> {
        let mut dead = Vec::new();

        for (conn_id, session) in &mut self.sessions {
            if session.alive {
                session.alive = false;
                let _ = session.sender.send(Message::Ping(Vec::new()));
            } else {
                debug!("Client timed out: {}", session.uuid);
                let _ = session.sender.send(Message::Close(None));
                dead.push(*conn_id);
            }
        }

        dead
    }

    /// Forgets pending identities whose grace window has elapsed
    ///
    /// Removal is permanent: a claim arriving afterwards is treated exactly
    /// like one for an identity that never existed.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(uuid, _)| uuid.clone())
            .collect();

        for uuid in &expired {
            debug!("Removing {} from disconnected clients", uuid);
            self.pending.remove(uuid);
        }

        expired
    }

    /// Sends every announced session its own current snapshot
    ///
    /// Plain fan-out: a failed send just means the connection is on its way
    /// out, and its reader task will report the close through the normal
    /// path.
    pub fn broadcast(&self) {
        for session in self.sessions.values() {
            if !session.announced {
                continue;
            }

            let snapshot = self.snapshot_for(session, false);
            Self::send_to(session, &snapshot);
        }
    }

    fn snapshot_for(&self, session: &Session, recon: bool) -> Snapshot {
        Snapshot {
            uuid: session.uuid.clone(),
            start_time: self.start_time,
            bingo_board: session.board.clone(),
            has_happened: self.happened.clone(),
            recon: recon.then_some(true),
        }
    }

    fn send_snapshot(&self, conn_id: ConnId, recon: bool) {
        if let Some(session) = self.sessions.get(&conn_id) {
            let snapshot = self.snapshot_for(session, recon);
            Self::send_to(session, &snapshot);
        }
    }

    fn send_json<T: Serialize>(&self, conn_id: ConnId, value: &T) {
        if let Some(session) = self.sessions.get(&conn_id) {
            Self::send_to(session, value);
        }
    }

    fn send_to<T: Serialize>(session: &Session, value: &T) {
        match serde_json::to_string(value) {
            Ok(text) => {
                let _ = session.sender.send(Message::Text(text));
            }
            Err(e) => warn!("Failed to serialize outbound frame: {}", e),
        }
    }

    /// Looks up a live session by connection id
    pub fn session(&self, conn_id: ConnId) -> Option<&Session> {
        self.sessions.get(&conn_id)
    }

    /// Theme items currently marked as occurred, in toggle order
    pub fn happened(&self) -> &[String] {
        &self.happened
    }

    /// Number of currently live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of identities waiting out their grace window
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{theme_vocabulary, ServerPayload, BOARD_SIZE};
    use tokio::sync::mpsc::UnboundedReceiver;

    const GRACE: Duration = Duration::from_secs(3600);

    fn test_registry(secret: Option<&str>) -> Registry {
        Registry::new(
            theme_vocabulary(),
            secret.map(|s| s.to_string()),
            GRACE,
            shared::DEFAULT_START_TIME,
        )
    }

    fn connect(registry: &mut Registry, conn_id: ConnId) -> UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(conn_id, tx);
        rx
    }

    fn recv_payload(rx: &mut UnboundedReceiver<Message>) -> ServerPayload {
        match rx.try_recv().expect("expected a queued frame") {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    fn recv_snapshot(rx: &mut UnboundedReceiver<Message>) -> Snapshot {
        match recv_payload(rx) {
            ServerPayload::Snapshot(snapshot) => snapshot,
            ServerPayload::Vocabulary(_) => panic!("expected snapshot, got vocabulary"),
        }
    }

    #[test]
    fn test_register_sends_handshake_snapshot() {
        let mut registry = test_registry(None);
        let mut rx = connect(&mut registry, 1);

        let snapshot = recv_snapshot(&mut rx);
        assert_eq!(snapshot.bingo_board.len(), BOARD_SIZE);
        assert!(snapshot.has_happened.is_empty());
        assert!(!snapshot.uuid.is_empty());
        assert_eq!(snapshot.recon, None);
        assert!(registry.session(1).unwrap().announced);
    }

    #[test]
    fn test_register_with_undersized_vocabulary_closes_connection() {
        let mut registry = Registry::new(
            vec!["only".to_string()],
            None,
            GRACE,
            shared::DEFAULT_START_TIME,
        );
        let mut rx = connect(&mut registry, 1);

        assert!(matches!(rx.try_recv().unwrap(), Message::Close(_)));
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_each_connection_gets_its_own_identity() {
        let mut registry = test_registry(None);
        let mut rx1 = connect(&mut registry, 1);
        let mut rx2 = connect(&mut registry, 2);

        let first = recv_snapshot(&mut rx1);
        let second = recv_snapshot(&mut rx2);
        assert_ne!(first.uuid, second.uuid);
    }

    #[test]
    fn test_disconnect_moves_identity_to_pending() {
        let mut registry = test_registry(None);
        let _rx = connect(&mut registry, 1);

        registry.disconnect(1, Instant::now());

        assert_eq!(registry.session_count(), 0);
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_reconnect_restores_identity_and_board() {
        let mut registry = test_registry(None);
        let mut rx = connect(&mut registry, 1);
        let original = recv_snapshot(&mut rx);

        registry.disconnect(1, Instant::now());

        let mut rx2 = connect(&mut registry, 2);
        let fresh = recv_snapshot(&mut rx2);
        assert_ne!(fresh.uuid, original.uuid);

        registry.handle_message(
            2,
            &format!(r#"{{"uuid":"{}","recon":true}}"#, original.uuid),
        );

        let restored = recv_snapshot(&mut rx2);
        assert_eq!(restored.uuid, original.uuid);
        assert_eq!(restored.bingo_board, original.bingo_board);
        assert_eq!(restored.recon, Some(true));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_unknown_reconnect_claim_is_humored_without_board() {
        let mut registry = test_registry(None);
        let mut rx = connect(&mut registry, 1);
        let handshake = recv_snapshot(&mut rx);

        registry.handle_message(1, r#"{"uuid":"not-a-real-id","recon":true}"#);

        let reply = recv_snapshot(&mut rx);
        assert_eq!(reply.recon, Some(true));
        assert_eq!(reply.uuid, handshake.uuid);
        assert_eq!(reply.bingo_board, handshake.bingo_board);
    }

    #[test]
    fn test_reconnect_after_grace_window_is_unrecognized() {
        let mut registry = test_registry(None);
        let mut rx = connect(&mut registry, 1);
        let original = recv_snapshot(&mut rx);

        let disconnected_at = Instant::now();
        registry.disconnect(1, disconnected_at);

        let expired = registry.sweep_expired(disconnected_at + GRACE + Duration::from_secs(1));
        assert_eq!(expired, vec![original.uuid.clone()]);

        let mut rx2 = connect(&mut registry, 2);
        let fresh = recv_snapshot(&mut rx2);

        registry.handle_message(
            2,
            &format!(r#"{{"uuid":"{}","recon":true}}"#, original.uuid),
        );

        let reply = recv_snapshot(&mut rx2);
        assert_eq!(reply.recon, Some(true));
        assert_eq!(reply.uuid, fresh.uuid);
        assert_ne!(reply.uuid, original.uuid);
    }

    #[test]
    fn test_sweep_before_deadline_keeps_pending_entry() {
        let mut registry = test_registry(None);
        let _rx = connect(&mut registry, 1);

        let disconnected_at = Instant::now();
        registry.disconnect(1, disconnected_at);

        let expired = registry.sweep_expired(disconnected_at + GRACE - Duration::from_secs(1));
        assert!(expired.is_empty());
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_admin_toggle_updates_happened_and_broadcasts() {
        let mut registry = test_registry(Some("secret"));
        let mut rx1 = connect(&mut registry, 1);
        let mut rx2 = connect(&mut registry, 2);
        recv_snapshot(&mut rx1);
        recv_snapshot(&mut rx2);

        registry.handle_message(1, r#"{"auth":"secret","toggle":"Wukong"}"#);

        assert_eq!(registry.happened(), ["Wukong".to_string()]);
        let update1 = recv_snapshot(&mut rx1);
        let update2 = recv_snapshot(&mut rx2);
        assert_eq!(update1.has_happened, vec!["Wukong".to_string()]);
        assert_eq!(update2.has_happened, vec!["Wukong".to_string()]);
    }

    #[test]
    fn test_double_toggle_restores_original_membership() {
        let mut registry = test_registry(Some("secret"));
        let mut rx = connect(&mut registry, 1);
        recv_snapshot(&mut rx);

        registry.handle_message(1, r#"{"auth":"secret","toggle":"Wukong"}"#);
        registry.handle_message(1, r#"{"auth":"secret","toggle":"Wukong"}"#);

        assert!(registry.happened().is_empty());
        recv_snapshot(&mut rx);
        let last = recv_snapshot(&mut rx);
        assert!(last.has_happened.is_empty());
    }

    #[test]
    fn test_non_admin_toggle_never_mutates() {
        let mut registry = test_registry(Some("secret"));
        let mut rx = connect(&mut registry, 1);
        recv_snapshot(&mut rx);

        registry.handle_message(1, r#"{"auth":"wrong","toggle":"Wukong"}"#);
        registry.handle_message(1, r#"{"toggle":"Wukong"}"#);

        assert!(registry.happened().is_empty());

        // Both replies are plain snapshots, never the vocabulary.
        for _ in 0..2 {
            let reply = recv_snapshot(&mut rx);
            assert!(reply.has_happened.is_empty());
        }
    }

    #[test]
    fn test_toggle_without_configured_secret_is_ignored() {
        let mut registry = test_registry(None);
        let mut rx = connect(&mut registry, 1);
        recv_snapshot(&mut rx);

        registry.handle_message(1, r#"{"auth":"secret","toggle":"Wukong"}"#);

        assert!(registry.happened().is_empty());
        recv_snapshot(&mut rx);
    }

    #[test]
    fn test_admin_without_toggle_receives_vocabulary() {
        let mut registry = test_registry(Some("secret"));
        let mut rx = connect(&mut registry, 1);
        recv_snapshot(&mut rx);

        registry.handle_message(1, r#"{"auth":"secret"}"#);

        match recv_payload(&mut rx) {
            ServerPayload::Vocabulary(items) => assert_eq!(items, theme_vocabulary()),
            ServerPayload::Snapshot(_) => panic!("expected vocabulary list"),
        }
    }

    #[test]
    fn test_admin_with_unknown_toggle_receives_vocabulary() {
        let mut registry = test_registry(Some("secret"));
        let mut rx = connect(&mut registry, 1);
        recv_snapshot(&mut rx);

        registry.handle_message(1, r#"{"auth":"secret","toggle":"Not A Cell"}"#);

        assert!(registry.happened().is_empty());
        assert!(matches!(
            recv_payload(&mut rx),
            ServerPayload::Vocabulary(_)
        ));
    }

    #[test]
    fn test_malformed_message_returns_current_state() {
        let mut registry = test_registry(Some("secret"));
        let mut rx = connect(&mut registry, 1);
        let handshake = recv_snapshot(&mut rx);

        registry.handle_message(1, "this is not json");

        let reply = recv_snapshot(&mut rx);
        assert_eq!(reply.uuid, handshake.uuid);
        assert_eq!(reply.bingo_board, handshake.bingo_board);
    }

    #[test]
    fn test_liveness_sweep_marks_then_removes() {
        let mut registry = test_registry(None);
        let mut rx1 = connect(&mut registry, 1);
        let mut rx2 = connect(&mut registry, 2);
        recv_snapshot(&mut rx1);
        recv_snapshot(&mut rx2);

        // First round: everyone confirmed, so nobody is dropped.
        let dead = registry.sweep_unconfirmed();
        assert!(dead.is_empty());
        assert!(matches!(rx1.try_recv().unwrap(), Message::Ping(_)));
        assert!(matches!(rx2.try_recv().unwrap(), Message::Ping(_)));

        // Only connection 1 answers the probe.
        registry.confirm(1);

        let dead = registry.sweep_unconfirmed();
        assert_eq!(dead, vec![2]);
        assert!(matches!(rx2.try_recv().unwrap(), Message::Close(_)));

        // The caller routes the dead connection through normal disconnect
        // handling, so its identity stays reclaimable.
        registry.disconnect(2, Instant::now());
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_broadcast_skips_closed_receivers() {
        let mut registry = test_registry(Some("secret"));
        let mut rx1 = connect(&mut registry, 1);
        let rx2 = connect(&mut registry, 2);
        recv_snapshot(&mut rx1);
        drop(rx2);

        // Send failure on connection 2 must not disturb the fan-out.
        registry.handle_message(1, r#"{"auth":"secret","toggle":"Wukong"}"#);

        let update = recv_snapshot(&mut rx1);
        assert_eq!(update.has_happened, vec!["Wukong".to_string()]);
    }
}
