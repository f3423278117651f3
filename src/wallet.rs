//! Wallets and round settlement.
//!
//! Settlement is one atomic unit: the winner credit, the loser debits, the
//! earnings-history entries, the match record and the per-wallet
//! transaction records all commit together or not at all. Every debit is
//! validated before the first write; a shortfall aborts the whole
//! settlement, since antes were checked when the round started, a shortfall
//! here is a pre-validation bug and must not partially commit.

use std::collections::HashMap;

use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SettleError;
use crate::game::payout::Payouts;
use crate::game::{GameState, RoundEndReason};

/// One entry in a wallet's match earnings history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsEntry {
    /// The match that moved the money.
    pub match_id: Uuid,
    /// Signed amount: positive for wins, negative for losses.
    pub amount: i64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// A player's balance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Owning user.
    pub user_id: String,
    /// Funds available for antes and withdrawals.
    pub available_balance: u64,
    /// Funds moved into withdrawal requests awaiting approval.
    pub pending_withdrawals: u64,
    /// Lifetime deposited amount.
    pub lifetime_deposits: u64,
    /// Lifetime withdrawn amount.
    pub lifetime_withdrawals: u64,
    /// Per-match earnings, newest last.
    pub match_earnings_history: Vec<EarningsEntry>,
}

impl Wallet {
    /// Creates a wallet holding `balance`.
    #[must_use]
    pub fn new(user_id: impl Into<String>, balance: u64) -> Self {
        Self {
            user_id: user_id.into(),
            available_balance: balance,
            pending_withdrawals: 0,
            lifetime_deposits: balance,
            lifetime_withdrawals: 0,
            match_earnings_history: Vec::new(),
        }
    }
}

/// Kind of a wallet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionKind {
    /// Funds deposited from outside.
    Deposit,
    /// Funds withdrawn to outside.
    Withdrawal,
    /// A round win credit.
    Win,
    /// A round loss debit.
    Loss,
}

/// One credit or debit applied to a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    /// Transaction id.
    pub id: Uuid,
    /// Wallet owner.
    pub user_id: String,
    /// Credit or debit kind.
    pub kind: TransactionKind,
    /// Unsigned amount moved.
    pub amount: u64,
    /// The match that caused the movement, when any.
    pub match_id: Option<Uuid>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Per-player line of a match record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPlayerStats {
    /// The player.
    pub user_id: String,
    /// The table stake for the round.
    pub stake: u64,
    /// The ante the player locked in.
    pub buy_in: u64,
    /// Amount credited at settlement; zero for losers.
    pub payout: u64,
    /// The player's hand value when the round ended.
    pub final_hand_value: u32,
    /// Whether the seat was played by the house bot.
    pub is_ai: bool,
}

/// Immutable record of a settled round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Match id; created first and threaded into every transaction.
    pub id: Uuid,
    /// The table the round was played at.
    pub table_id: String,
    /// The pot at settlement.
    pub pot: u64,
    /// How the round was won.
    pub win_type: RoundEndReason,
    /// The winner.
    pub winner_id: String,
    /// Per-player stats in seat order.
    pub players: Vec<MatchPlayerStats>,
    /// Penalty amounts debited per user.
    pub penalties: HashMap<String, u64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Balance storage plus the transactional settlement operations.
pub trait WalletStore: Send + Sync {
    /// Available balance for a user, or `None` without a wallet.
    fn balance(&self, user_id: &str) -> Option<u64>;

    /// Creates a wallet holding `balance` unless one already exists.
    fn create_wallet(&self, user_id: &str, balance: u64);

    /// Reserves one ante per human seat from available balances.
    ///
    /// Validates every human seat before debiting any wallet; bots inflate
    /// the pot without a debit. A shortfall fails the whole round setup.
    fn collect_antes(&self, state: &GameState) -> Result<(), SettleError>;

    /// Commits a round settlement atomically and returns the match record.
    fn settle(
        &self,
        state: &GameState,
        payouts: &Payouts,
        now_ms: u64,
    ) -> Result<MatchRecord, SettleError>;

    /// Moves available funds into a pending withdrawal request.
    fn request_withdrawal(&self, user_id: &str, amount: u64) -> Result<(), SettleError>;
}

#[derive(Default)]
struct BankInner {
    wallets: HashMap<String, Wallet>,
    matches: Vec<MatchRecord>,
    transactions: Vec<WalletTransaction>,
}

/// In-memory [`WalletStore`]; a document store replaces it in production.
pub struct MemoryBank {
    inner: Mutex<BankInner>,
    min_withdrawal: u64,
}

impl MemoryBank {
    /// Creates an empty bank.
    #[must_use]
    pub fn new(min_withdrawal: u64) -> Self {
        Self {
            inner: Mutex::new(BankInner::default()),
            min_withdrawal,
        }
    }

    /// All settled match records, oldest first.
    #[must_use]
    pub fn matches(&self) -> Vec<MatchRecord> {
        self.inner.lock().matches.clone()
    }

    /// All wallet transactions, oldest first.
    #[must_use]
    pub fn transactions(&self) -> Vec<WalletTransaction> {
        self.inner.lock().transactions.clone()
    }

    /// A snapshot of a wallet.
    #[must_use]
    pub fn wallet(&self, user_id: &str) -> Option<Wallet> {
        self.inner.lock().wallets.get(user_id).cloned()
    }
}

impl WalletStore for MemoryBank {
    fn balance(&self, user_id: &str) -> Option<u64> {
        self.inner
            .lock()
            .wallets
            .get(user_id)
            .map(|w| w.available_balance)
    }

    fn create_wallet(&self, user_id: &str, balance: u64) {
        self.inner
            .lock()
            .wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet::new(user_id, balance));
    }

    fn collect_antes(&self, state: &GameState) -> Result<(), SettleError> {
        let mut inner = self.inner.lock();

        // Validate every human seat before touching any balance.
        for player in state.players.iter().filter(|p| !p.is_ai) {
            let wallet = inner
                .wallets
                .get(&player.user_id)
                .ok_or_else(|| SettleError::WalletNotFound(player.user_id.clone()))?;
            if wallet.available_balance < state.base_stake {
                return Err(SettleError::InsufficientFunds(player.user_id.clone()));
            }
        }

        for player in state.players.iter().filter(|p| !p.is_ai) {
            if let Some(wallet) = inner.wallets.get_mut(&player.user_id) {
                wallet.available_balance -= state.base_stake;
            }
        }
        info!(
            "collected antes for table {}: {} per seat, pot {}",
            state.table_id, state.base_stake, state.pot
        );
        Ok(())
    }

    fn settle(
        &self,
        state: &GameState,
        payouts: &Payouts,
        now_ms: u64,
    ) -> Result<MatchRecord, SettleError> {
        let mut inner = self.inner.lock();

        let is_bot = |user_id: &str| state.player(user_id).is_some_and(|p| p.is_ai);
        let winner_is_human = !is_bot(&payouts.winner_id);

        // Validate every leg before the first write.
        if winner_is_human && !inner.wallets.contains_key(&payouts.winner_id) {
            return Err(SettleError::WalletNotFound(payouts.winner_id.clone()));
        }
        for penalty in &payouts.penalties {
            if is_bot(&penalty.user_id) {
                continue;
            }
            let wallet = inner
                .wallets
                .get(&penalty.user_id)
                .ok_or_else(|| SettleError::WalletNotFound(penalty.user_id.clone()))?;
            if wallet.available_balance < penalty.amount {
                warn!(
                    "settlement aborted for table {}: wallet {} cannot cover {}",
                    state.table_id, penalty.user_id, penalty.amount
                );
                return Err(SettleError::InsufficientFunds(penalty.user_id.clone()));
            }
        }

        let win_type = state.round_ended_by.ok_or(SettleError::RoundNotOver)?;
        let record = MatchRecord {
            id: Uuid::new_v4(),
            table_id: state.table_id.clone(),
            pot: state.pot,
            win_type,
            winner_id: payouts.winner_id.clone(),
            players: state
                .players
                .iter()
                .map(|p| MatchPlayerStats {
                    user_id: p.user_id.clone(),
                    stake: state.base_stake,
                    buy_in: p.current_buy_in,
                    payout: if p.user_id == payouts.winner_id {
                        payouts.winner_payout
                    } else {
                        0
                    },
                    final_hand_value: state
                        .hand_scores
                        .get(&p.user_id)
                        .copied()
                        .unwrap_or_else(|| p.hand_value()),
                    is_ai: p.is_ai,
                })
                .collect(),
            penalties: payouts
                .penalties
                .iter()
                .map(|p| (p.user_id.clone(), p.amount))
                .collect(),
            timestamp: now_ms,
        };

        if winner_is_human {
            if let Some(wallet) = inner.wallets.get_mut(&payouts.winner_id) {
                wallet.available_balance += payouts.winner_payout;
                wallet.match_earnings_history.push(EarningsEntry {
                    match_id: record.id,
                    amount: payouts.winner_payout as i64,
                    timestamp: now_ms,
                });
            }
            inner.transactions.push(WalletTransaction {
                id: Uuid::new_v4(),
                user_id: payouts.winner_id.clone(),
                kind: TransactionKind::Win,
                amount: payouts.winner_payout,
                match_id: Some(record.id),
                timestamp: now_ms,
            });
        }

        // Bot penalty legs are house-funded: the winner was paid for them
        // above, but no wallet is debited.
        for penalty in payouts.penalties.iter().filter(|p| !is_bot(&p.user_id)) {
            if let Some(wallet) = inner.wallets.get_mut(&penalty.user_id) {
                wallet.available_balance -= penalty.amount;
                wallet.match_earnings_history.push(EarningsEntry {
                    match_id: record.id,
                    amount: -(penalty.amount as i64),
                    timestamp: now_ms,
                });
            }
            inner.transactions.push(WalletTransaction {
                id: Uuid::new_v4(),
                user_id: penalty.user_id.clone(),
                kind: TransactionKind::Loss,
                amount: penalty.amount,
                match_id: Some(record.id),
                timestamp: now_ms,
            });
        }

        inner.matches.push(record.clone());
        info!(
            "settled table {} match {}: {:?} win for {}, payout {}",
            state.table_id, record.id, win_type, payouts.winner_id, payouts.winner_payout
        );
        Ok(record)
    }

    fn request_withdrawal(&self, user_id: &str, amount: u64) -> Result<(), SettleError> {
        if amount < self.min_withdrawal {
            return Err(SettleError::BelowMinimumWithdrawal);
        }
        let mut inner = self.inner.lock();
        let wallet = inner
            .wallets
            .get_mut(user_id)
            .ok_or_else(|| SettleError::WalletNotFound(user_id.to_string()))?;
        if wallet.available_balance < amount {
            return Err(SettleError::InsufficientFunds(user_id.to_string()));
        }
        wallet.available_balance -= amount;
        wallet.pending_withdrawals += amount;
        Ok(())
    }
}
