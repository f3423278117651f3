//! Round status and action record types.

use serde::{Deserialize, Serialize};

use crate::card::Card;

/// Lifecycle of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundStatus {
    /// The round is being set up.
    Starting,
    /// Players are taking turns.
    InProgress,
    /// The round has ended and awaits settlement or transition.
    RoundEnd,
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundEndReason {
    /// A plain win: an uncaught drop or an auto-win at 50/47.
    Regular,
    /// Two spreads laid down with an emptied hand.
    Reem,
    /// A dealt hand of 41 or eleven-and-under; pays triple.
    AutoTriple,
    /// A drop beaten by another hand; the dropper pays double.
    CaughtDrop,
    /// The deck ran out; lowest hand wins the pot.
    DeckEmpty,
}

/// Where a drawn card comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawSource {
    /// The face-down deck.
    Deck,
    /// The face-up discard pile.
    Discard,
}

/// The most recent action applied to the state, tagged for UI diffing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LastAction {
    /// A card was drawn.
    #[serde(rename_all = "camelCase")]
    Draw {
        /// Acting player.
        user_id: String,
        /// Deck or discard pile.
        source: DrawSource,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
    /// A card was discarded, ending the turn.
    #[serde(rename_all = "camelCase")]
    Discard {
        /// Acting player.
        user_id: String,
        /// The discarded card.
        card: Card,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
    /// A meld was laid down.
    #[serde(rename_all = "camelCase")]
    Spread {
        /// Acting player.
        user_id: String,
        /// The meld, in the order it was laid down.
        cards: Vec<Card>,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
    /// A card was added to an existing spread.
    #[serde(rename_all = "camelCase")]
    Hit {
        /// Acting player.
        user_id: String,
        /// The card played onto the spread.
        card: Card,
        /// Owner of the spread that was hit.
        target_user_id: String,
        /// Index into the target's spreads.
        target_spread_index: usize,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
    /// A player dropped before acting.
    #[serde(rename_all = "camelCase")]
    Drop {
        /// Acting player.
        user_id: String,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
    /// The round ended.
    #[serde(rename_all = "camelCase")]
    RoundEnd {
        /// Why the round ended.
        reason: RoundEndReason,
        /// The winning player.
        winner_id: String,
        /// Milliseconds since the Unix epoch.
        timestamp: u64,
    },
}
