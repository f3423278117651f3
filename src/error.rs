//! Error types for game, store and settlement operations.

use thiserror::Error;

/// Errors that can occur while dealing a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DealError {
    /// Tables seat two to four players.
    #[error("tables seat two to four players")]
    InvalidPlayerCount,
    /// Not enough cards in the deck.
    #[error("not enough cards in the deck")]
    NotEnoughCards,
}

/// Errors that can occur during player actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The round is not in progress.
    #[error("the round is not in progress")]
    RoundNotInProgress,
    /// Not this player's turn.
    #[error("not your turn")]
    NotYourTurn,
    /// Player not seated in this round.
    #[error("player not found")]
    PlayerNotFound,
    /// The player already drew this turn.
    #[error("you have already drawn this turn")]
    AlreadyDrawn,
    /// The player must draw before spreading, hitting or discarding.
    #[error("you must draw before taking that action")]
    MustDrawFirst,
    /// The discard pile is empty.
    #[error("the discard pile is empty")]
    DiscardPileEmpty,
    /// One of the named cards is not in the player's hand.
    #[error("card is not in your hand")]
    CardNotInHand,
    /// The cards do not form a valid spread.
    #[error("cards do not form a valid spread")]
    InvalidSpread,
    /// The target spread does not exist.
    #[error("target spread not found")]
    SpreadNotFound,
    /// The card cannot be added to the target spread.
    #[error("card cannot hit that spread")]
    CannotHit,
    /// The card drawn from the discard pile cannot be discarded this turn.
    #[error("cannot discard the card just taken from the discard pile")]
    RestrictedDiscard,
    /// A player whose spread was hit cannot drop while locked.
    #[error("cannot drop while hit-locked")]
    DropWhileLocked,
    /// Dropping is only allowed before taking any action this turn.
    #[error("cannot drop after acting this turn")]
    DropAfterAction,
}

/// Errors that can occur when a player joins a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinError {
    /// The table is full.
    #[error("table is full")]
    TableFull,
    /// The player has no wallet.
    #[error("wallet not found")]
    WalletNotFound,
    /// The player's balance does not cover the buy-in headroom.
    #[error("insufficient funds to join this table")]
    InsufficientFunds,
}

/// Errors that can occur while collecting antes or settling a round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    /// The round has not ended.
    #[error("round has not ended")]
    RoundNotOver,
    /// The round has no recorded winner.
    #[error("round has no winner")]
    NoWinner,
    /// A wallet involved in the settlement is missing.
    #[error("wallet not found for {0}")]
    WalletNotFound(String),
    /// A debit would push a wallet negative; the settlement is aborted.
    #[error("insufficient funds in wallet {0}")]
    InsufficientFunds(String),
    /// A withdrawal request below the configured minimum.
    #[error("withdrawal below the minimum amount")]
    BelowMinimumWithdrawal,
}

/// Errors raised by the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another actor holds the per-table lock.
    #[error("table is locked by another actor")]
    Conflict,
    /// The stored state could not be serialized or deserialized.
    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Unified error surfaced by the table session to a single client.
///
/// Rules, join and settlement failures only ever reach the offending
/// client; other subscribers observe no state change.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The named table does not exist.
    #[error("table not found")]
    TableNotFound,
    /// The acting user is not seated at the table.
    #[error("you are not seated at this table")]
    NotSeated,
    /// No round is currently tracked for the table.
    #[error("no active game for this table")]
    NoActiveGame,
    /// A rules-engine guard rejected the action.
    #[error(transparent)]
    Action(#[from] ActionError),
    /// Joining the table failed.
    #[error(transparent)]
    Join(#[from] JoinError),
    /// Dealing failed.
    #[error(transparent)]
    Deal(#[from] DealError),
    /// Settlement failed.
    #[error(transparent)]
    Settle(#[from] SettleError),
    /// The state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
