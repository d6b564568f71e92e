//! Server network layer handling WebSocket connections and the event loop

use crate::registry::{ConnId, Registry};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// How often expired pending-reconnect entries are swept
const GRACE_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Events sent from connection tasks to the main event loop
///
/// Per connection, its reader task always sends `Connected` before any
/// other event and `Disconnected` last, so registration happens before the
/// first message is processed and cleanup after the last.
#[derive(Debug)]
pub enum ServerEvent {
    Connected {
        conn_id: ConnId,
        sender: mpsc::UnboundedSender<Message>,
    },
    MessageReceived {
        conn_id: ConnId,
        text: String,
    },
    PongReceived {
        conn_id: ConnId,
    },
    Disconnected {
        conn_id: ConnId,
    },
}

/// Main server coordinating connection I/O and registry state
///
/// All registry mutation happens inside [`Server::run`]'s select loop, one
/// event at a time. Connection tasks only shuttle frames: readers forward
/// inbound events over a channel, writers drain per-connection queues.
pub struct Server {
    listener: Option<TcpListener>,
    registry: Registry,
    ping_interval: Duration,

    event_tx: mpsc::UnboundedSender<ServerEvent>,
    event_rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Server {
    pub async fn new(
        addr: &str,
        registry: Registry,
        ping_interval: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            registry,
            ping_interval,
            event_tx,
            event_rx,
        })
    }

    /// The address the server actually bound to (useful with port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref()?.local_addr().ok()
    }

    /// Spawns the task that accepts connections and hands each one off to
    /// its own reader/writer pair
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut next_conn_id: ConnId = 1;

            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let conn_id = next_conn_id;
                        next_conn_id += 1;

                        let event_tx = event_tx.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, peer, conn_id, event_tx).await;
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main event loop coordinating all state changes
    ///
    /// Three event sources: connection events, the liveness probe interval,
    /// and the grace-window sweep. Each arm runs to completion before the
    /// next event is taken, which is the only mutual exclusion the registry
    /// needs.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();

        let mut ping_timer = interval(self.ping_interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so fresh connections
        // are not probed before they exist.
        ping_timer.tick().await;

        let mut sweep_timer = interval(GRACE_SWEEP_INTERVAL);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(ServerEvent::Connected { conn_id, sender }) => {
                            self.registry.register(conn_id, sender);
                        }
                        Some(ServerEvent::MessageReceived { conn_id, text }) => {
                            self.registry.handle_message(conn_id, &text);
                        }
                        Some(ServerEvent::PongReceived { conn_id }) => {
                            self.registry.confirm(conn_id);
                        }
                        Some(ServerEvent::Disconnected { conn_id }) => {
                            self.registry.disconnect(conn_id, Instant::now());
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = ping_timer.tick() => {
                    let now = Instant::now();
                    for conn_id in self.registry.sweep_unconfirmed() {
                        self.registry.disconnect(conn_id, now);
                    }
                },

                _ = sweep_timer.tick() => {
                    self.registry.sweep_expired(Instant::now());
                },
            }
        }

        Ok(())
    }
}

/// Runs one connection: WebSocket upgrade, then a writer task draining the
/// outbound queue while this task reads inbound frames into events.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn_id: ConnId,
    event_tx: mpsc::UnboundedSender<ServerEvent>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("WebSocket handshake failed for {}: {}", peer, e);
            return;
        }
    };

    let (mut sink, mut source) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    if event_tx
        .send(ServerEvent::Connected {
            conn_id,
            sender: out_tx,
        })
        .is_err()
    {
        return;
    }

    // Writer: drains the queue the registry sends into. Ends when the
    // registry drops the sender or after forwarding a close frame.
    tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader: this task. A transport error is logged and treated as an
    // ordinary close.
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if event_tx
                    .send(ServerEvent::MessageReceived { conn_id, text })
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Pong(_)) => {
                if event_tx.send(ServerEvent::PongReceived { conn_id }).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                debug!("Ignoring non-text frame from {}", peer);
            }
            Err(e) => {
                warn!("Socket error from {}: {}", peer, e);
                break;
            }
        }
    }

    let _ = event_tx.send(ServerEvent::Disconnected { conn_id });
}
