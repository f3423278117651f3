//! Spread and hit validity predicates.

use crate::card::Card;

/// Minimum cards in a spread.
pub const MIN_SPREAD_SIZE: usize = 3;

/// Whether the cards all share one rank.
fn is_rank_meld(cards: &[Card]) -> bool {
    cards
        .split_first()
        .is_some_and(|(first, rest)| rest.iter().all(|c| c.rank == first.rank))
}

/// Whether the cards all share one suit and their ranks form a consecutive
/// run in the order `A-2-3-4-5-6-7-J-Q-K`.
fn is_run(cards: &[Card]) -> bool {
    let Some((first, rest)) = cards.split_first() else {
        return false;
    };
    if !rest.iter().all(|c| c.suit == first.suit) {
        return false;
    }

    let mut indices: Vec<u8> = cards.iter().map(|c| c.rank.run_index()).collect();
    indices.sort_unstable();
    indices.windows(2).all(|w| w[1] == w[0] + 1)
}

/// Whether the cards form a valid spread: at least three cards that are
/// either all one rank or a consecutive same-suit run.
#[must_use]
pub fn is_valid_spread(cards: &[Card]) -> bool {
    cards.len() >= MIN_SPREAD_SIZE && (is_rank_meld(cards) || is_run(cards))
}

/// Whether `card` can be played onto an existing spread.
///
/// Rank melds accept the shared rank in a suit not already present; runs
/// accept the shared suit at a rank exactly one step below the run's
/// minimum or above its maximum.
#[must_use]
pub fn can_hit(spread: &[Card], card: Card) -> bool {
    if is_rank_meld(spread) {
        return spread[0].rank == card.rank && !spread.iter().any(|c| c.suit == card.suit);
    }
    if is_run(spread) {
        if spread[0].suit != card.suit {
            return false;
        }
        let min = spread.iter().map(|c| c.rank.run_index()).min();
        let max = spread.iter().map(|c| c.rank.run_index()).max();
        let idx = card.rank.run_index();
        return min.is_some_and(|m| idx + 1 == m) || max.is_some_and(|m| idx == m + 1);
    }
    false
}

/// Inserts a hit card into a spread, keeping same-suit runs sorted by rank.
pub(crate) fn insert_into_spread(spread: &mut Vec<Card>, card: Card) {
    if is_run(spread) {
        let at = spread
            .iter()
            .position(|c| c.rank.run_index() > card.rank.run_index())
            .unwrap_or(spread.len());
        spread.insert(at, card);
    } else {
        spread.push(card);
    }
}
