//! Wire events exchanged with clients.
//!
//! Events are JSON objects tagged by an `event` field. Inbound events carry
//! the acting user's claimed id; the transport layer has already bound the
//! connection to a verified identity before any event reaches a session.

use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::game::{DrawSource, GameState};
use crate::table::Table;

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Take a seat at a table.
    #[serde(rename_all = "camelCase")]
    JoinTable {
        /// Target table.
        table_id: String,
        /// Joining user.
        user_id: String,
        /// Display name.
        username: String,
        /// Optional avatar URL.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar_url: Option<String>,
    },
    /// Leave a table immediately.
    #[serde(rename_all = "camelCase")]
    LeaveTable {
        /// Target table.
        table_id: String,
        /// Leaving user.
        user_id: String,
        /// Display name.
        username: String,
    },
    /// Queue a leave for when the current round ends.
    #[serde(rename_all = "camelCase")]
    RequestLeaveTable {
        /// Target table.
        table_id: String,
        /// Leaving user.
        user_id: String,
    },
    /// Draw a card.
    #[serde(rename_all = "camelCase")]
    DrawCard {
        /// Target table.
        table_id: String,
        /// Acting user.
        user_id: String,
        /// Deck or discard pile.
        source: DrawSource,
    },
    /// Discard a card, ending the turn.
    #[serde(rename_all = "camelCase")]
    DiscardCard {
        /// Target table.
        table_id: String,
        /// Acting user.
        user_id: String,
        /// The card to discard.
        card: Card,
    },
    /// Lay down a meld.
    #[serde(rename_all = "camelCase")]
    Spread {
        /// Target table.
        table_id: String,
        /// Acting user.
        user_id: String,
        /// The meld to lay down.
        cards: Vec<Card>,
    },
    /// Play a card onto an existing spread.
    #[serde(rename_all = "camelCase")]
    Hit {
        /// Target table.
        table_id: String,
        /// Acting user.
        user_id: String,
        /// The card to play.
        card: Card,
        /// Owner of the target spread.
        target_player_id: String,
        /// Index into the target's spreads.
        target_spread_index: usize,
    },
    /// Concede before acting.
    #[serde(rename_all = "camelCase")]
    Drop {
        /// Target table.
        table_id: String,
        /// Acting user.
        user_id: String,
    },
    /// Ask for the current game state.
    #[serde(rename_all = "camelCase")]
    RequestInitialGameState {
        /// Target table.
        table_id: String,
    },
}

impl ClientEvent {
    /// The table the event addresses.
    #[must_use]
    pub fn table_id(&self) -> &str {
        match self {
            Self::JoinTable { table_id, .. }
            | Self::LeaveTable { table_id, .. }
            | Self::RequestLeaveTable { table_id, .. }
            | Self::DrawCard { table_id, .. }
            | Self::DiscardCard { table_id, .. }
            | Self::Spread { table_id, .. }
            | Self::Hit { table_id, .. }
            | Self::Drop { table_id, .. }
            | Self::RequestInitialGameState { table_id } => table_id,
        }
    }
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    /// The current state, sent to a single requesting client.
    #[serde(rename_all = "camelCase")]
    InitialGameState {
        /// The table's current round.
        game_state: GameState,
    },
    /// A state delta broadcast to the table's room.
    #[serde(rename_all = "camelCase")]
    GameStateUpdate {
        /// The table's current round.
        game_state: GameState,
    },
    /// A lobby-level change broadcast to the table's room.
    #[serde(rename_all = "camelCase")]
    TableUpdate {
        /// Human-readable description of the change.
        message: String,
        /// The table after the change.
        table: Table,
        /// The round state when one is live.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_state: Option<GameState>,
    },
    /// A balance change, targeted at one human player.
    #[serde(rename_all = "camelCase")]
    WalletBalanceUpdate {
        /// Wallet owner.
        user_id: String,
        /// New available balance.
        balance: u64,
    },
    /// A player left the table.
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        /// The departed user.
        user_id: String,
    },
    /// An action was rejected; only the offender sees this.
    #[serde(rename_all = "camelCase")]
    GameError {
        /// Why the action was rejected.
        message: String,
    },
    /// A queued leave request was accepted.
    #[serde(rename_all = "camelCase")]
    AckLeaveRequest {},
}
