//! Round initialization: shuffle, deal, ante bookkeeping, auto-win checks.

use std::collections::HashMap;

use rand_chacha::ChaCha20Rng;

use crate::deck::{Deck, DiscardPile, HAND_SIZE};
use crate::error::DealError;

use super::{GameState, PlayerState, RoundEndReason, RoundStatus};

/// Dealt hand value that wins triple immediately.
const AUTO_TRIPLE_EXACT: u32 = 41;
/// Dealt hand value at or under which the hand wins triple immediately.
const AUTO_TRIPLE_UNDER: u32 = 11;
/// Dealt hand values that win the pot immediately.
const AUTO_WIN_VALUES: [u32; 2] = [50, 47];

/// A seat to deal into a new round.
#[derive(Debug, Clone)]
pub struct Seat {
    /// Stable opaque identifier.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Whether the seat is played by the house bot.
    pub is_ai: bool,
}

impl GameState {
    /// Deals a fresh round: shuffles the deck, deals five cards per seat
    /// round-robin, locks one ante per seat into the pot, and runs the
    /// auto-win check. Play starts with the seat after the dealer unless an
    /// auto-win already ended the round.
    ///
    /// Ante amounts recorded here are pot bookkeeping; the wallet settler
    /// decides which of them debit a real balance.
    ///
    /// # Errors
    ///
    /// Returns a [`DealError`] when the seat count is outside 2–4.
    pub fn new_round(
        table_id: impl Into<String>,
        base_stake: u64,
        seats: &[Seat],
        dealer_index: usize,
        rng: &mut ChaCha20Rng,
        now_ms: u64,
    ) -> Result<Self, DealError> {
        let mut deck = Deck::new();
        deck.shuffle(rng);
        Self::with_deck(table_id, base_stake, seats, dealer_index, deck, now_ms)
    }

    /// Deals a round from an already-shuffled deck.
    ///
    /// Exists so the deal is reproducible: callers control the deck order,
    /// and [`GameState::new_round`] is a shuffle followed by this.
    ///
    /// # Errors
    ///
    /// Returns a [`DealError`] when the seat count is outside 2–4.
    pub fn with_deck(
        table_id: impl Into<String>,
        base_stake: u64,
        seats: &[Seat],
        dealer_index: usize,
        mut deck: Deck,
        now_ms: u64,
    ) -> Result<Self, DealError> {
        let hands = deck.deal(seats.len(), HAND_SIZE)?;

        let mut players = Vec::with_capacity(seats.len());
        let mut locked_antes = HashMap::new();
        for (seat, hand) in seats.iter().zip(hands) {
            let mut player = PlayerState::new(&seat.user_id, &seat.username, seat.is_ai);
            player.hand = hand;
            player.current_buy_in = base_stake;
            locked_antes.insert(seat.user_id.clone(), base_stake);
            players.push(player);
        }

        let dealer = dealer_index % players.len();
        let mut state = Self {
            table_id: table_id.into(),
            base_stake,
            pot: base_stake * players.len() as u64,
            locked_antes,
            players,
            current_dealer_index: dealer,
            current_player_index: (dealer + 1) % seats.len(),
            turn: 0,
            deck,
            discard_pile: DiscardPile::new(),
            status: RoundStatus::InProgress,
            last_action: None,
            round_ended_by: None,
            round_winner_id: None,
            caught_dropping_player_id: None,
            hand_scores: HashMap::new(),
            payouts: HashMap::new(),
        };

        state.check_auto_win(now_ms);
        Ok(state)
    }

    /// Resolves the round immediately when a dealt hand qualifies.
    ///
    /// A hand of exactly 41 or of eleven-and-under wins triple stakes and
    /// takes precedence; otherwise 50 or 47 wins the pot. The earliest
    /// qualifying seat wins when several qualify.
    fn check_auto_win(&mut self, now_ms: u64) {
        let values: Vec<u32> = self.players.iter().map(PlayerState::hand_value).collect();

        let triple = values
            .iter()
            .position(|&v| v == AUTO_TRIPLE_EXACT || v <= AUTO_TRIPLE_UNDER);
        if let Some(winner) = triple {
            self.end_round(RoundEndReason::AutoTriple, winner, now_ms);
            return;
        }

        let regular = values.iter().position(|v| AUTO_WIN_VALUES.contains(v));
        if let Some(winner) = regular {
            self.end_round(RoundEndReason::Regular, winner, now_ms);
        }
    }
}
