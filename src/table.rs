//! Lobby-side table records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a table is waiting for players or mid-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableStatus {
    /// The table is open and waiting for enough players.
    Waiting,
    /// A round is in progress.
    InGame,
}

/// One seat at a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePlayer {
    /// The seated user.
    pub user_id: String,
    /// Whether the seat is played by the house bot.
    pub is_ai: bool,
}

/// A table as the lobby sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Table id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Per-round stake.
    pub stake: u64,
    /// Seats required before a round starts.
    pub min_players: usize,
    /// Maximum seats.
    pub max_players: usize,
    /// Seated players in seat order.
    pub players: Vec<TablePlayer>,
    /// Waiting or in-game.
    pub status: TableStatus,
    /// The match currently being played, when any.
    pub current_match_id: Option<Uuid>,
}

impl Table {
    /// Creates an empty waiting table.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, stake: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stake,
            min_players: 2,
            max_players: 4,
            players: Vec::new(),
            status: TableStatus::Waiting,
            current_match_id: None,
        }
    }

    /// Number of seated players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether every seat is taken.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Whether the user is seated.
    #[must_use]
    pub fn is_seated(&self, user_id: &str) -> bool {
        self.players.iter().any(|p| p.user_id == user_id)
    }

    /// Number of human seats.
    #[must_use]
    pub fn human_count(&self) -> usize {
        self.players.iter().filter(|p| !p.is_ai).count()
    }

    /// Appends a seat.
    pub fn seat(&mut self, user_id: impl Into<String>, is_ai: bool) {
        self.players.push(TablePlayer {
            user_id: user_id.into(),
            is_ai,
        });
    }

    /// Removes a seat.
    pub fn unseat(&mut self, user_id: &str) {
        self.players.retain(|p| p.user_id != user_id);
    }

    /// Removes every bot seat.
    pub fn evict_bots(&mut self) {
        self.players.retain(|p| !p.is_ai);
    }
}
