//! Game state and the rules engine.
//!
//! [`GameState`] is a plain value: every transition is a method that checks
//! its guards, mutates the state, and reports a typed error when a guard
//! fails, leaving the state untouched. The engine performs no I/O; the
//! session layer owns persistence and timing and passes wall-clock
//! timestamps in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::card::{Card, hand_value};
use crate::deck::{Deck, DiscardPile};

mod actions;
pub mod dealing;
pub mod payout;
pub mod spread;
pub mod state;

pub use dealing::Seat;
pub use state::{DrawSource, LastAction, RoundEndReason, RoundStatus};

/// A participant in the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Stable opaque identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Whether this seat is played by the house bot.
    pub is_ai: bool,
    /// Cards held privately.
    pub hand: Vec<Card>,
    /// Melds already laid down, in the order they were laid.
    pub spreads: Vec<Vec<Card>>,
    /// True once the player has drawn this turn.
    pub has_taken_action_this_turn: bool,
    /// Whether the player is in the hit-lock penalty box.
    pub is_hit_locked: bool,
    /// Turn rotations left before the hit-lock clears.
    pub hit_lock_counter: u8,
    /// Card taken from the discard pile this turn; it may not be discarded
    /// again until the turn ends.
    pub restricted_discard: Option<Card>,
    /// Stake locked for this round.
    pub current_buy_in: u64,
}

impl PlayerState {
    /// Creates a seat record for a new round.
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, is_ai: bool) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_ai,
            hand: Vec::new(),
            spreads: Vec::new(),
            has_taken_action_this_turn: false,
            is_hit_locked: false,
            hit_lock_counter: 0,
            restricted_discard: None,
            current_buy_in: 0,
        }
    }

    /// Point value of the cards still in hand.
    #[must_use]
    pub fn hand_value(&self) -> u32 {
        hand_value(&self.hand)
    }

    /// Removes one card from the hand, failing when it is absent.
    pub(crate) fn take_from_hand(&mut self, card: Card) -> Option<Card> {
        let at = self.hand.iter().position(|c| *c == card)?;
        Some(self.hand.remove(at))
    }
}

/// Authoritative state of one table's current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Owning table.
    pub table_id: String,
    /// Per-seat ante for this round.
    pub base_stake: u64,
    /// Total antes locked into the round.
    pub pot: u64,
    /// Ante locked per user id; the pot always equals their sum.
    pub locked_antes: HashMap<String, u64>,
    /// Seat-ordered participants; seat order defines turn order.
    pub players: Vec<PlayerState>,
    /// Seat of the dealer for this round.
    pub current_dealer_index: usize,
    /// Seat whose turn it is.
    pub current_player_index: usize,
    /// Monotonic turn counter.
    pub turn: u64,
    /// The face-down deck.
    pub deck: Deck,
    /// The face-up discard pile.
    pub discard_pile: DiscardPile,
    /// Round lifecycle.
    pub status: RoundStatus,
    /// The most recent applied action.
    pub last_action: Option<LastAction>,
    /// Why the round ended, once it has.
    pub round_ended_by: Option<RoundEndReason>,
    /// The winner, once the round has ended.
    pub round_winner_id: Option<String>,
    /// The dropper, when the round ended by a caught drop.
    pub caught_dropping_player_id: Option<String>,
    /// Final hand values, populated at round end.
    pub hand_scores: HashMap<String, u32>,
    /// Amounts moved at settlement, populated at round end.
    pub payouts: HashMap<String, u64>,
}

impl GameState {
    /// The player whose turn it is.
    #[must_use]
    pub fn current_player(&self) -> Option<&PlayerState> {
        self.players.get(self.current_player_index)
    }

    /// Looks up a seat by user id.
    #[must_use]
    pub fn player(&self, user_id: &str) -> Option<&PlayerState> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    /// Seat index of a user id.
    #[must_use]
    pub fn player_index(&self, user_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    /// Whether it is currently this user's turn.
    #[must_use]
    pub fn is_players_turn(&self, user_id: &str) -> bool {
        self.current_player()
            .is_some_and(|p| p.user_id == user_id)
    }

    /// Total cards across deck, discard pile, hands and spreads.
    ///
    /// Always forty for a live round; tests assert this after every
    /// transition.
    #[must_use]
    pub fn card_count(&self) -> usize {
        let in_hands: usize = self.players.iter().map(|p| p.hand.len()).sum();
        let in_spreads: usize = self
            .players
            .iter()
            .flat_map(|p| p.spreads.iter())
            .map(Vec::len)
            .sum();
        self.deck.len() + self.discard_pile.len() + in_hands + in_spreads
    }

    /// Seat index holding the lowest hand value; earliest seat wins ties.
    #[must_use]
    pub(crate) fn lowest_hand_index(&self) -> Option<usize> {
        self.players
            .iter()
            .enumerate()
            .min_by_key(|(i, p)| (p.hand_value(), *i))
            .map(|(i, _)| i)
    }

    /// Removes a seat from the live round.
    ///
    /// The leaver's hand and spread cards are buried under the discard pile
    /// so card conservation holds, their ante stays in the pot, and the
    /// turn index is clamped modulo the shrunk seat list. When the dealer's
    /// own seat is the one removed, the dealer index falls back to the
    /// previous seat so the next rotation hands the deal to the player who
    /// inherited the vacated slot.
    pub fn remove_player(&mut self, user_id: &str) -> Option<PlayerState> {
        let at = self.player_index(user_id)?;
        let leaver = self.players.remove(at);

        self.discard_pile.bury(&leaver.hand);
        for meld in &leaver.spreads {
            self.discard_pile.bury(meld);
        }

        if self.players.is_empty() {
            self.current_player_index = 0;
            return Some(leaver);
        }
        if at < self.current_player_index {
            self.current_player_index -= 1;
        }
        self.current_player_index %= self.players.len();
        if at < self.current_dealer_index {
            self.current_dealer_index -= 1;
        } else if at == self.current_dealer_index {
            // Anchor the rotation on the departed dealer's predecessor;
            // rotating one seat from there reaches the slot's inheritor.
            self.current_dealer_index = (at + self.players.len() - 1) % self.players.len();
        }
        self.current_dealer_index %= self.players.len();

        Some(leaver)
    }

    /// Marks the round as ended and records final hand scores.
    pub(crate) fn end_round(
        &mut self,
        reason: RoundEndReason,
        winner_index: usize,
        now_ms: u64,
    ) {
        self.status = RoundStatus::RoundEnd;
        self.round_ended_by = Some(reason);
        let winner_id = self.players[winner_index].user_id.clone();
        self.round_winner_id = Some(winner_id.clone());
        self.hand_scores = self
            .players
            .iter()
            .map(|p| (p.user_id.clone(), p.hand_value()))
            .collect();
        self.last_action = Some(LastAction::RoundEnd {
            reason,
            winner_id,
            timestamp: now_ms,
        });
    }
}
