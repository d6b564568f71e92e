use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: usize = 24;
pub const DEFAULT_GRACE_SECS: u64 = 3600;
pub const DEFAULT_PING_SECS: u64 = 30;
pub const DEFAULT_START_TIME: u64 = 1_751_092_200_000;

/// The fixed theme list boards are drawn from. Every toggle the admin sends
/// must name one of these cells verbatim.
pub const THEME_VOCABULARY: [&str; 41] = [
    "Wukong",
    "New Class\n(Not Wukong)",
    "New Outfit(s)",
    "J Hammer(s)",
    "PvE Balance Changes",
    "Demon Realm Teaser",
    "Mountain of Dawnbreak Teaser",
    "Free PEN Debo",
    "Elviah Mediah",
    "PA Apology",
    "Sovereign Offhand",
    "'Sovereign' Armor",
    "Console Mentioned",
    "Players 'Enjoy' Fishing",
    "C8-10 Shrine Boss",
    "New Party Shrine Boss",
    "New Mount/ Dragon",
    "Lifeskill Changes",
    "Alchemy Stone Rework",
    "Who Asked For This?",
    "Nodewar Rework",
    "Quality-of-Life Changes",
    "Altar Of Blood Returns",
    "New Dehkia Spot",
    "New World Boss",
    "Mainhand 'Heart' Item",
    "Trade Reimplimented As Land Bartering",
    "New Hardcore Season",
    "Open-World PvP Changes",
    "New Treasure Item",
    "PvE Servers",
    "KR Gets Something First",
    "China Number One",
    "'Listening To Your Feedback'",
    "Guild/ Alliance Changes",
    "'Time Travel' Map",
    "Crimson Desert Mentioned",
    "More Party Grind Spots",
    "Auto-Grinding Added",
    "Crossplay with Console",
    "Shai Rework",
];

pub fn theme_vocabulary() -> Vec<String> {
    THEME_VOCABULARY.iter().map(|s| s.to_string()).collect()
}

/// Per-connection state snapshot sent by the server: at handshake, on every
/// broadcast, and as the fallback reply to anything unrecognized.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub uuid: String,
    pub start_time: u64,
    pub bingo_board: Vec<String>,
    pub has_happened: Vec<String>,
    /// Only present on reconnect acknowledgments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recon: Option<bool>,
}

/// Anything a client may send. All fields optional; classification decides
/// what the message actually is.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ClientMessage {
    pub uuid: Option<String>,
    pub recon: Option<bool>,
    pub auth: Option<String>,
    pub toggle: Option<String>,
}

/// A validated command derived from a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Claim to an identity from a previous connection.
    Reconnect { uuid: String },
    /// Authenticated admin action; no toggle means a vocabulary request.
    Admin { toggle: Option<String> },
    /// Everything else: answered with the sender's current snapshot.
    Probe,
}

impl ClientMessage {
    /// Classifies the message against the server's shared secret.
    ///
    /// A reconnect claim wins over admin fields. Admin requires an exact
    /// secret match; a server with no secret configured never grants it.
    pub fn classify(&self, secret: Option<&str>) -> Command {
        if self.recon == Some(true) {
            if let Some(uuid) = &self.uuid {
                return Command::Reconnect { uuid: uuid.clone() };
            }
        }

        match (secret, self.auth.as_deref()) {
            (Some(expected), Some(presented)) if expected == presented => Command::Admin {
                toggle: self.toggle.clone(),
            },
            _ => Command::Probe,
        }
    }
}

/// The two frame shapes the server emits: a snapshot object or, for admins
/// asking for valid toggles, the bare vocabulary array.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ServerPayload {
    Snapshot(Snapshot),
    Vocabulary(Vec<String>),
}
