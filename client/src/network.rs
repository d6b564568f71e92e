use crate::board_view;
use crate::identity;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{ClientMessage, ServerPayload, Snapshot};
use std::path::PathBuf;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

pub struct Client {
    url: String,
    identity_file: Option<PathBuf>,
    auth: Option<String>,
    toggle: Option<String>,

    uuid: Option<String>,
}

impl Client {
    pub fn new(
        url: &str,
        identity_file: Option<PathBuf>,
        auth: Option<String>,
        toggle: Option<String>,
    ) -> Self {
        Client {
            url: url.to_string(),
            identity_file,
            auth,
            toggle,
            uuid: None,
        }
    }

    /// Connects and runs the message loop until the server closes the
    /// connection or, in admin mode, until the reply to the admin request
    /// has been printed.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        info!("Connected to {}", self.url);

        let (mut sink, mut source) = ws_stream.split();

        let admin_mode = self.auth.is_some();

        // A saved identity from a previous run becomes a reconnect claim.
        // The server answers the claim after the handshake snapshot. Admin
        // runs skip the claim so the reply to the admin request is the only
        // frame after the handshake.
        let saved = if admin_mode {
            None
        } else {
            self.identity_file.as_deref().and_then(identity::load)
        };
        if let Some(uuid) = &saved {
            info!("Reclaiming identity {}", uuid);
            let claim = ClientMessage {
                uuid: Some(uuid.clone()),
                recon: Some(true),
                ..Default::default()
            };
            sink.send(Message::Text(serde_json::to_string(&claim)?))
                .await?;
        }

        if let Some(auth) = &self.auth {
            let request = ClientMessage {
                auth: Some(auth.clone()),
                toggle: self.toggle.clone(),
                ..Default::default()
            };
            sink.send(Message::Text(serde_json::to_string(&request)?))
                .await?;
        }

        let mut handshake_seen = false;

        while let Some(frame) = source.next().await {
            match frame? {
                Message::Text(text) => {
                    let payload = match serde_json::from_str::<ServerPayload>(&text) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Unrecognized frame from server: {}", e);
                            continue;
                        }
                    };

                    match payload {
                        ServerPayload::Snapshot(snapshot) => {
                            let first = !handshake_seen;
                            handshake_seen = true;
                            self.handle_snapshot(snapshot);

                            // In admin mode the frame after the handshake is
                            // the reply to our request; print it and leave.
                            if admin_mode && !first {
                                break;
                            }
                        }
                        ServerPayload::Vocabulary(items) => {
                            println!("Valid toggles:");
                            for item in items {
                                println!("  {}", item.replace('\n', " "));
                            }
                            if admin_mode {
                                break;
                            }
                        }
                    }
                }
                Message::Ping(data) => {
                    // Liveness probe; an unanswered one gets us terminated.
                    sink.send(Message::Pong(data)).await?;
                }
                Message::Close(_) => {
                    info!("Server closed the connection");
                    break;
                }
                other => {
                    debug!("Ignoring frame: {:?}", other);
                }
            }
        }

        Ok(())
    }

    fn handle_snapshot(&mut self, snapshot: Snapshot) {
        if snapshot.recon == Some(true) {
            info!("Reconnect acknowledged as {}", snapshot.uuid);
        }

        if self.uuid.as_deref() != Some(snapshot.uuid.as_str()) {
            self.uuid = Some(snapshot.uuid.clone());
            if let Some(path) = &self.identity_file {
                if let Err(e) = identity::save(path, &snapshot.uuid) {
                    warn!("Could not save identity to {}: {}", path.display(), e);
                }
            }
        }

        println!(
            "\nBoard for {} ({} happened):",
            snapshot.uuid,
            snapshot.has_happened.len()
        );
        print!(
            "{}",
            board_view::render(&snapshot.bingo_board, &snapshot.has_happened)
        );
    }
}
