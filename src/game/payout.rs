//! Payout computation at round end.

use serde::{Deserialize, Serialize};

use crate::error::SettleError;

use super::{GameState, RoundEndReason, RoundStatus};

/// Stake multiple paid by each loser of an auto-triple round.
const TRIPLE_MULTIPLIER: u64 = 3;

/// A penalty owed by one losing player.
///
/// Bot penalties are listed too — the winner is paid for them — but the
/// settler funds them from the house instead of debiting a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    /// The penalized player.
    pub user_id: String,
    /// Amount owed on top of the forfeited ante.
    pub amount: u64,
}

/// The money moved when a round settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payouts {
    /// The winning player.
    pub winner_id: String,
    /// Total credited to the winner.
    pub winner_payout: u64,
    /// Per-loser penalties, empty for plain wins.
    pub penalties: Vec<Penalty>,
}

/// Computes the winner payout and loser penalties for an ended round.
///
/// Dispatch on the end reason:
///
/// | Reason               | Winner receives              | Loser penalties |
/// |----------------------|------------------------------|-----------------|
/// | regular / deck empty | pot                          | none            |
/// | reem                 | pot + stake per loser        | stake each      |
/// | auto-triple          | pot + triple stake per loser | triple each     |
/// | caught drop          | pot + stake                  | dropper, stake  |
///
/// # Errors
///
/// Returns an error when the round has not ended or has no winner.
pub fn compute_payouts(state: &GameState) -> Result<Payouts, SettleError> {
    if state.status != RoundStatus::RoundEnd {
        return Err(SettleError::RoundNotOver);
    }
    let reason = state.round_ended_by.ok_or(SettleError::RoundNotOver)?;
    let winner_id = state
        .round_winner_id
        .clone()
        .ok_or(SettleError::NoWinner)?;

    let losers = || {
        state
            .players
            .iter()
            .filter(|p| p.user_id != winner_id)
            .map(|p| p.user_id.clone())
    };

    let payouts = match reason {
        RoundEndReason::Regular | RoundEndReason::DeckEmpty => Payouts {
            winner_id,
            winner_payout: state.pot,
            penalties: Vec::new(),
        },
        RoundEndReason::Reem => {
            let penalties: Vec<Penalty> = losers()
                .map(|user_id| Penalty {
                    user_id,
                    amount: state.base_stake,
                })
                .collect();
            Payouts {
                winner_id,
                winner_payout: state.pot + state.base_stake * penalties.len() as u64,
                penalties,
            }
        }
        RoundEndReason::AutoTriple => {
            let amount = TRIPLE_MULTIPLIER * state.base_stake;
            let penalties: Vec<Penalty> = losers()
                .map(|user_id| Penalty { user_id, amount })
                .collect();
            Payouts {
                winner_id,
                winner_payout: state.pot + amount * penalties.len() as u64,
                penalties,
            }
        }
        RoundEndReason::CaughtDrop => {
            let dropper = state
                .caught_dropping_player_id
                .clone()
                .ok_or(SettleError::NoWinner)?;
            Payouts {
                winner_id,
                winner_payout: state.pot + state.base_stake,
                penalties: vec![Penalty {
                    user_id: dropper,
                    amount: state.base_stake,
                }],
            }
        }
    };
    Ok(payouts)
}
