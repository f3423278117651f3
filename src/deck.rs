//! Deck construction, shuffling and dealing.

use rand::RngCore;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::card::{Card, DECK_SIZE, Rank, Suit};
use crate::error::DealError;

/// Fewest seats a round can deal to.
pub const MIN_PLAYERS: usize = 2;
/// Most seats a round can deal to.
pub const MAX_PLAYERS: usize = 4;
/// Cards dealt to each seat at the start of a round.
pub const HAND_SIZE: usize = 5;

/// An ordered deck of cards with the top at the end of the storage.
///
/// Cards removed from the deck are never reinserted within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Builds the canonical 40-card sequence.
    #[must_use]
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity(DECK_SIZE);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                cards.push(Card::new(suit, rank));
            }
        }
        Self { cards }
    }

    /// How many cards are left in the deck?
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Have all cards been drawn?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// A slice of all cards still in the deck.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Generates an unbiased index in `[0, upper)` using rejection sampling.
    ///
    /// A plain modulo over a random byte favours low indices whenever 256 is
    /// not divisible by `upper`; bytes past the last full multiple are
    /// rejected and redrawn instead.
    fn unbiased_index(rng: &mut ChaCha20Rng, upper: usize) -> usize {
        debug_assert!(upper > 0);

        let limit = 256 - (256 % upper);
        loop {
            let byte = (rng.next_u32() & 0xFF) as usize;
            if byte < limit {
                return byte % upper;
            }
        }
    }

    /// Fisher–Yates shuffle with unbiased index selection.
    ///
    /// The caller supplies the ChaCha20 generator so that sessions can seed
    /// it from OS entropy while tests seed it deterministically.
    pub fn shuffle(&mut self, rng: &mut ChaCha20Rng) {
        let n = self.cards.len();
        if n <= 1 {
            return;
        }

        for i in 0..(n - 1) {
            let offset = Self::unbiased_index(rng, n - i);
            self.cards.swap(i, i + offset);
        }
    }

    /// Draws the top card, or `None` when the deck is exhausted.
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Deals `per_player` cards to each of `n_players` seats, one card per
    /// seat per pass (round-robin), and returns the hands in seat order.
    ///
    /// # Errors
    ///
    /// Returns [`DealError::InvalidPlayerCount`] outside 2–4 seats and
    /// [`DealError::NotEnoughCards`] when the deck cannot cover the deal.
    pub fn deal(
        &mut self,
        n_players: usize,
        per_player: usize,
    ) -> Result<Vec<Vec<Card>>, DealError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&n_players) {
            return Err(DealError::InvalidPlayerCount);
        }
        if self.len() < n_players * per_player {
            return Err(DealError::NotEnoughCards);
        }

        let mut hands = vec![Vec::with_capacity(per_player); n_players];
        for _ in 0..per_player {
            for hand in &mut hands {
                // Checked above; the deck cannot run out mid-deal.
                if let Some(card) = self.draw() {
                    hand.push(card);
                }
            }
        }
        Ok(hands)
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Card>> for Deck {
    fn from(cards: Vec<Card>) -> Self {
        Self { cards }
    }
}

/// The face-up discard pile with the newest card on top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardPile {
    cards: Vec<Card>,
}

impl DiscardPile {
    /// Creates an empty pile.
    #[must_use]
    pub const fn new() -> Self {
        Self { cards: Vec::new() }
    }

    /// Places a card on top of the pile.
    pub fn push(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// The visible top card, if any.
    #[must_use]
    pub fn top(&self) -> Option<Card> {
        self.cards.last().copied()
    }

    /// Removes and returns the top card.
    pub fn take_top(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Slides cards under the pile without disturbing the top.
    pub(crate) fn bury(&mut self, cards: &[Card]) {
        self.cards.splice(0..0, cards.iter().copied());
    }

    /// Number of cards in the pile.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the pile is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// A slice of all cards in the pile, oldest first.
    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}
