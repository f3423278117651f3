//! Card types for the 40-card Tonk deck.

use serde::{Deserialize, Serialize};

/// Card suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    /// Hearts.
    Hearts,
    /// Diamonds.
    Diamonds,
    /// Clubs.
    Clubs,
    /// Spades.
    Spades,
}

impl Suit {
    /// All four suits in canonical order.
    pub const ALL: [Self; 4] = [Self::Hearts, Self::Diamonds, Self::Clubs, Self::Spades];
}

/// Card rank.
///
/// The Tonk deck drops eights, nines and tens, so `Jack` is the rank that
/// immediately follows `Seven` when building runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    /// Ace (counts one).
    Ace,
    /// Two.
    Two,
    /// Three.
    Three,
    /// Four.
    Four,
    /// Five.
    Five,
    /// Six.
    Six,
    /// Seven.
    Seven,
    /// Jack (counts ten).
    Jack,
    /// Queen (counts ten).
    Queen,
    /// King (counts ten).
    King,
}

impl Rank {
    /// All ten ranks in run order.
    pub const ALL: [Self; 10] = [
        Self::Ace,
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Jack,
        Self::Queen,
        Self::King,
    ];

    /// Point value of the rank: Ace counts one, pip cards count face value,
    /// court cards count ten.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Ace => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Jack | Self::Queen | Self::King => 10,
        }
    }

    /// Position of the rank in the run order `A-2-3-4-5-6-7-J-Q-K`.
    #[must_use]
    pub const fn run_index(self) -> u8 {
        match self {
            Self::Ace => 0,
            Self::Two => 1,
            Self::Three => 2,
            Self::Four => 3,
            Self::Five => 4,
            Self::Six => 5,
            Self::Seven => 6,
            Self::Jack => 7,
            Self::Queen => 8,
            Self::King => 9,
        }
    }
}

/// A playing card.
///
/// Cards are value objects; two cards are equal when their suit and rank
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// The suit of the card.
    pub suit: Suit,
    /// The rank of the card.
    pub rank: Rank,
}

impl Card {
    /// Creates a new card.
    #[must_use]
    pub const fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    /// Point value of the card.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.rank.value()
    }
}

/// Number of cards in a Tonk deck.
pub const DECK_SIZE: usize = 40;

/// Sum of the point values of a set of cards.
#[must_use]
pub fn hand_value(cards: &[Card]) -> u32 {
    cards.iter().map(|c| u32::from(c.value())).sum()
}
