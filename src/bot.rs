//! Bot strategist.
//!
//! Given a game state and a bot's seat, picks exactly one action. The
//! priority order favours finishing the round: a spread that sets up a
//! second spread (a potential Reem) beats any spread, which beats hitting,
//! which beats dropping a cheap hand, which beats drawing; discarding is
//! the fallback once the bot has drawn.

use rand::Rng;

use crate::card::Card;
use crate::game::spread::{can_hit, is_valid_spread};
use crate::game::GameState;

/// Hand value at or under which an unlocked bot drops instead of drawing.
const DROP_THRESHOLD: u32 = 5;

/// One action chosen by the strategist.
#[derive(Debug, Clone, PartialEq)]
pub enum BotAction {
    /// Draw from the deck.
    Draw,
    /// Lay down a meld.
    Spread(Vec<Card>),
    /// Play a card onto an existing spread.
    Hit {
        /// The card to play.
        card: Card,
        /// Owner of the target spread.
        target_user_id: String,
        /// Index into the target's spreads.
        target_spread_index: usize,
    },
    /// Concede before acting.
    Drop,
    /// Discard a card, ending the turn.
    Discard(Card),
}

/// All spreads that can be laid from a hand, each grown greedily from a
/// three-card base so four- and five-card melds are found too.
fn enumerate_spreads(hand: &[Card]) -> Vec<Vec<Card>> {
    let n = hand.len();
    let mut found = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let mut meld = vec![hand[i], hand[j], hand[k]];
                if !is_valid_spread(&meld) {
                    continue;
                }
                // Grow the base with any remaining card that fits.
                loop {
                    let extension = hand
                        .iter()
                        .find(|c| !meld.contains(*c) && can_hit(&meld, **c))
                        .copied();
                    match extension {
                        Some(card) => meld.push(card),
                        None => break,
                    }
                }
                meld.sort_by_key(|c| c.rank.run_index());
                if !found.contains(&meld) {
                    found.push(meld);
                }
            }
        }
    }
    found
}

/// The hand left over after removing a meld.
fn remaining_after(hand: &[Card], meld: &[Card]) -> Vec<Card> {
    hand.iter()
        .filter(|c| !meld.contains(*c))
        .copied()
        .collect()
}

/// Chooses one action for the bot seated as `bot_id`.
///
/// Returns `None` when the bot is not seated in the round.
#[must_use]
pub fn choose_action(state: &GameState, bot_id: &str, rng: &mut impl Rng) -> Option<BotAction> {
    let player = state.player(bot_id)?;

    if player.has_taken_action_this_turn {
        let candidates = enumerate_spreads(&player.hand);

        // Emptying the hand onto a second spread wins outright.
        if player.spreads.len() == 1 {
            if let Some(meld) = candidates.iter().find(|m| m.len() == player.hand.len()) {
                return Some(BotAction::Spread(meld.clone()));
            }
        }

        // A spread whose leftovers still hold a spread sets up a Reem.
        if player.spreads.is_empty() {
            let reem_setup = candidates
                .iter()
                .find(|meld| !enumerate_spreads(&remaining_after(&player.hand, meld)).is_empty());
            if let Some(meld) = reem_setup {
                return Some(BotAction::Spread(meld.clone()));
            }
        }

        // Never lay a meld that strands the turn with nothing to discard.
        let keeps_a_discard = |meld: &&Vec<Card>| meld.len() < player.hand.len();
        if let Some(meld) = candidates.iter().find(keeps_a_discard) {
            return Some(BotAction::Spread(meld.clone()));
        }

        // Hitting with the last card would strand the turn the same way.
        if player.hand.len() > 1 {
            for card in &player.hand {
                for target in &state.players {
                    for (idx, meld) in target.spreads.iter().enumerate() {
                        if can_hit(meld, *card) {
                            return Some(BotAction::Hit {
                                card: *card,
                                target_user_id: target.user_id.clone(),
                                target_spread_index: idx,
                            });
                        }
                    }
                }
            }
        }

        // Nothing to lay down; throw away a random card we are allowed to
        // discard.
        let discardable: Vec<Card> = player
            .hand
            .iter()
            .filter(|c| player.restricted_discard != Some(**c))
            .copied()
            .collect();
        if discardable.is_empty() {
            return player.hand.first().copied().map(BotAction::Discard);
        }
        let pick = discardable[rng.random_range(0..discardable.len())];
        return Some(BotAction::Discard(pick));
    }

    if !player.is_hit_locked && player.hand_value() <= DROP_THRESHOLD {
        return Some(BotAction::Drop);
    }
    Some(BotAction::Draw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};
    use crate::game::dealing::Seat;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn card(suit: Suit, rank: Rank) -> Card {
        Card::new(suit, rank)
    }

    fn two_seat_state(bot_hand: Vec<Card>) -> GameState {
        let seats = vec![
            Seat {
                user_id: "human".into(),
                username: "human".into(),
                is_ai: false,
            },
            Seat {
                user_id: "bot".into(),
                username: "Bot 1".into(),
                is_ai: true,
            },
        ];
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut state = GameState::new_round("t", 10, &seats, 0, &mut rng, 0).unwrap();
        state.status = crate::game::RoundStatus::InProgress;
        state.round_ended_by = None;
        state.round_winner_id = None;
        if let Some(at) = state.player_index("bot") {
            state.players[at].hand = bot_hand;
        }
        state
    }

    #[test]
    fn finds_four_card_melds() {
        let hand = vec![
            card(Suit::Hearts, Rank::Five),
            card(Suit::Clubs, Rank::Five),
            card(Suit::Spades, Rank::Five),
            card(Suit::Diamonds, Rank::Five),
            card(Suit::Hearts, Rank::King),
        ];
        let spreads = enumerate_spreads(&hand);
        assert!(spreads.iter().any(|m| m.len() == 4));
    }

    #[test]
    fn prefers_reem_setup_spread() {
        // Two disjoint melds in hand: laying either leaves the other.
        let hand = vec![
            card(Suit::Hearts, Rank::Two),
            card(Suit::Clubs, Rank::Two),
            card(Suit::Spades, Rank::Two),
            card(Suit::Diamonds, Rank::Ace),
            card(Suit::Diamonds, Rank::Two),
            card(Suit::Diamonds, Rank::Three),
        ];
        let mut state = two_seat_state(hand);
        let at = state.player_index("bot").unwrap();
        state.players[at].has_taken_action_this_turn = true;

        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let action = choose_action(&state, "bot", &mut rng).unwrap();
        assert!(matches!(action, BotAction::Spread(_)));
    }

    #[test]
    fn drops_cheap_unlocked_hand() {
        let hand = vec![
            card(Suit::Hearts, Rank::Ace),
            card(Suit::Clubs, Rank::Ace),
            card(Suit::Spades, Rank::Three),
        ];
        let state = two_seat_state(hand);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        assert_eq!(
            choose_action(&state, "bot", &mut rng),
            Some(BotAction::Drop)
        );
    }

    #[test]
    fn draws_when_nothing_better() {
        let hand = vec![
            card(Suit::Hearts, Rank::King),
            card(Suit::Clubs, Rank::Seven),
            card(Suit::Spades, Rank::Three),
        ];
        let state = two_seat_state(hand);
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        assert_eq!(
            choose_action(&state, "bot", &mut rng),
            Some(BotAction::Draw)
        );
    }

    #[test]
    fn hits_a_table_spread_after_drawing() {
        let hand = vec![
            card(Suit::Hearts, Rank::King),
            card(Suit::Clubs, Rank::Seven),
        ];
        let mut state = two_seat_state(hand);
        let human = state.player_index("human").unwrap();
        state.players[human].spreads.push(vec![
            card(Suit::Spades, Rank::King),
            card(Suit::Clubs, Rank::King),
            card(Suit::Diamonds, Rank::King),
        ]);
        let at = state.player_index("bot").unwrap();
        state.players[at].has_taken_action_this_turn = true;

        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let action = choose_action(&state, "bot", &mut rng).unwrap();
        assert_eq!(
            action,
            BotAction::Hit {
                card: card(Suit::Hearts, Rank::King),
                target_user_id: "human".into(),
                target_spread_index: 0,
            }
        );
    }
}
