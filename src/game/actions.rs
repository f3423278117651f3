//! Player action transitions: draw, spread, hit, discard, drop.

use crate::card::Card;
use crate::error::ActionError;

use super::spread::{can_hit, insert_into_spread, is_valid_spread};
use super::{DrawSource, GameState, LastAction, RoundEndReason, RoundStatus};

/// Fresh hit-lock value; the victim sits out roughly two rotations.
const HIT_LOCK_TURNS: u8 = 2;

impl GameState {
    /// Checks the round is live and it is this user's turn; returns the
    /// seat index.
    fn ensure_turn(&self, user_id: &str) -> Result<usize, ActionError> {
        if self.status != RoundStatus::InProgress {
            return Err(ActionError::RoundNotInProgress);
        }
        let at = self
            .player_index(user_id)
            .ok_or(ActionError::PlayerNotFound)?;
        if at != self.current_player_index {
            return Err(ActionError::NotYourTurn);
        }
        Ok(at)
    }

    /// Draws a card from the deck or the discard pile.
    ///
    /// Drawing from the deck when it is empty does not fail: the round ends
    /// with [`RoundEndReason::DeckEmpty`] and the lowest hand wins, so the
    /// returned card is `None`. A card taken from the discard pile is
    /// remembered and may not be discarded again this turn.
    ///
    /// # Errors
    ///
    /// Returns an error when it is not the player's turn, they have already
    /// drawn, or the discard pile is empty.
    pub fn draw_card(
        &mut self,
        user_id: &str,
        source: DrawSource,
        now_ms: u64,
    ) -> Result<Option<Card>, ActionError> {
        let at = self.ensure_turn(user_id)?;
        if self.players[at].has_taken_action_this_turn {
            return Err(ActionError::AlreadyDrawn);
        }

        let card = match source {
            DrawSource::Deck => {
                let Some(card) = self.deck.draw() else {
                    let winner = self.lowest_hand_index().unwrap_or(at);
                    self.end_round(RoundEndReason::DeckEmpty, winner, now_ms);
                    return Ok(None);
                };
                card
            }
            DrawSource::Discard => {
                let card = self
                    .discard_pile
                    .take_top()
                    .ok_or(ActionError::DiscardPileEmpty)?;
                self.players[at].restricted_discard = Some(card);
                card
            }
        };

        self.players[at].hand.push(card);
        self.players[at].has_taken_action_this_turn = true;
        self.last_action = Some(LastAction::Draw {
            user_id: user_id.to_string(),
            source,
            timestamp: now_ms,
        });
        Ok(Some(card))
    }

    /// Lays down a meld from the player's hand.
    ///
    /// Spreading does not end the turn, unless it produces a Reem — exactly
    /// two spreads with an emptied hand — which ends the round.
    ///
    /// # Errors
    ///
    /// Returns an error when it is not the player's turn, they have not
    /// drawn yet, the cards do not form a valid spread, or any card is not
    /// in their hand.
    pub fn spread_cards(
        &mut self,
        user_id: &str,
        cards: &[Card],
        now_ms: u64,
    ) -> Result<(), ActionError> {
        let at = self.ensure_turn(user_id)?;
        if !self.players[at].has_taken_action_this_turn {
            return Err(ActionError::MustDrawFirst);
        }
        if !is_valid_spread(cards) {
            return Err(ActionError::InvalidSpread);
        }
        // Hands never hold duplicates, so a repeated card cannot be covered.
        let repeated = cards
            .iter()
            .enumerate()
            .any(|(i, c)| cards[..i].contains(c));
        if repeated || !cards.iter().all(|c| self.players[at].hand.contains(c)) {
            return Err(ActionError::CardNotInHand);
        }

        let player = &mut self.players[at];
        for card in cards {
            player.take_from_hand(*card);
        }
        let mut meld = cards.to_vec();
        meld.sort_by_key(|c| c.rank.run_index());
        player.spreads.push(meld);
        self.last_action = Some(LastAction::Spread {
            user_id: user_id.to_string(),
            cards: cards.to_vec(),
            timestamp: now_ms,
        });

        let reem = self.players[at].spreads.len() == 2 && self.players[at].hand.is_empty();
        if reem {
            self.end_round(RoundEndReason::Reem, at, now_ms);
        }
        Ok(())
    }

    /// Plays one card from the hand onto any existing spread on the table.
    ///
    /// Hitting does not end the turn. The owner of the hit spread is put in
    /// the hit-lock penalty box and cannot drop until the lock decays.
    ///
    /// # Errors
    ///
    /// Returns an error when it is not the player's turn, they have not
    /// drawn yet, the card is not in their hand, the target does not exist,
    /// or the card does not fit the target spread.
    pub fn hit_spread(
        &mut self,
        user_id: &str,
        card: Card,
        target_user_id: &str,
        target_spread_index: usize,
        now_ms: u64,
    ) -> Result<(), ActionError> {
        let at = self.ensure_turn(user_id)?;
        if !self.players[at].has_taken_action_this_turn {
            return Err(ActionError::MustDrawFirst);
        }
        if !self.players[at].hand.contains(&card) {
            return Err(ActionError::CardNotInHand);
        }
        let target = self
            .player_index(target_user_id)
            .ok_or(ActionError::PlayerNotFound)?;
        let meld = self.players[target]
            .spreads
            .get(target_spread_index)
            .ok_or(ActionError::SpreadNotFound)?;
        if !can_hit(meld, card) {
            return Err(ActionError::CannotHit);
        }

        self.players[at].take_from_hand(card);
        insert_into_spread(&mut self.players[target].spreads[target_spread_index], card);

        let victim = &mut self.players[target];
        if victim.is_hit_locked {
            victim.hit_lock_counter += 1;
        } else {
            victim.is_hit_locked = true;
            victim.hit_lock_counter = HIT_LOCK_TURNS;
        }

        self.last_action = Some(LastAction::Hit {
            user_id: user_id.to_string(),
            card,
            target_user_id: target_user_id.to_string(),
            target_spread_index,
            timestamp: now_ms,
        });
        Ok(())
    }

    /// Discards a card, ending the turn.
    ///
    /// # Errors
    ///
    /// Returns an error when it is not the player's turn, they have not
    /// drawn yet, the card is not in their hand, or the card is the one
    /// taken from the discard pile this turn.
    pub fn discard_card(
        &mut self,
        user_id: &str,
        card: Card,
        now_ms: u64,
    ) -> Result<(), ActionError> {
        let at = self.ensure_turn(user_id)?;
        if !self.players[at].has_taken_action_this_turn {
            return Err(ActionError::MustDrawFirst);
        }
        if !self.players[at].hand.contains(&card) {
            return Err(ActionError::CardNotInHand);
        }
        if self.players[at].restricted_discard == Some(card) {
            return Err(ActionError::RestrictedDiscard);
        }

        self.players[at].take_from_hand(card);
        self.discard_pile.push(card);
        self.last_action = Some(LastAction::Discard {
            user_id: user_id.to_string(),
            card,
            timestamp: now_ms,
        });
        self.next_turn();
        Ok(())
    }

    /// Concedes the round before acting.
    ///
    /// The drop is *caught* when any other hand is worth the dropper's value
    /// or less; the lowest such hand wins and the dropper pays the
    /// caught-drop penalty at settlement. An uncaught drop wins the pot.
    ///
    /// # Errors
    ///
    /// Returns an error when it is not the player's turn, they already
    /// acted this turn, or they are hit-locked.
    pub fn drop_hand(&mut self, user_id: &str, now_ms: u64) -> Result<(), ActionError> {
        let at = self.ensure_turn(user_id)?;
        if self.players[at].has_taken_action_this_turn {
            return Err(ActionError::DropAfterAction);
        }
        if self.players[at].is_hit_locked {
            return Err(ActionError::DropWhileLocked);
        }

        self.last_action = Some(LastAction::Drop {
            user_id: user_id.to_string(),
            timestamp: now_ms,
        });

        let dropper_value = self.players[at].hand_value();
        let catcher = self
            .players
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != at)
            .filter(|(_, p)| p.hand_value() <= dropper_value)
            .min_by_key(|(i, p)| (p.hand_value(), *i))
            .map(|(i, _)| i);

        if let Some(catcher) = catcher {
            self.caught_dropping_player_id = Some(user_id.to_string());
            self.end_round(RoundEndReason::CaughtDrop, catcher, now_ms);
        } else {
            self.end_round(RoundEndReason::Regular, at, now_ms);
        }
        Ok(())
    }

    /// Rotates the turn to the next seat.
    ///
    /// Resets the per-turn flags for every seat and decays hit-locks by one
    /// rotation; a lock clears when its counter reaches zero.
    pub(crate) fn next_turn(&mut self) {
        self.current_player_index = (self.current_player_index + 1) % self.players.len();
        self.turn += 1;
        for player in &mut self.players {
            player.has_taken_action_this_turn = false;
            player.restricted_discard = None;
            if player.hit_lock_counter > 0 {
                player.hit_lock_counter -= 1;
                if player.hit_lock_counter == 0 {
                    player.is_hit_locked = false;
                }
            }
        }
    }
}
