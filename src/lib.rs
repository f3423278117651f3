//! An authoritative multiplayer engine for real-money Tonk tables.
//!
//! The crate keeps a consistent, tamper-proof game state across concurrent
//! tables: a pure rules engine for the 40-card Tonk variant, a per-table
//! [`session::TableSession`] that shepherds rounds and schedules bot turns,
//! and an atomic wallet settlement step at every round boundary, fronted by
//! a WebSocket transport.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tonkrs::{GameServer, MemoryBank, MemoryStore, Table, TableOptions};
//!
//! let options = TableOptions::default();
//! let bank = Arc::new(MemoryBank::new(options.min_withdrawal));
//! let server = GameServer::new(
//!     options,
//!     Arc::new(MemoryStore::new()),
//!     bank,
//!     vec![Table::new("low-1", "Low Stakes", 10)],
//! );
//! let _ = server;
//! ```

pub mod bot;
pub mod card;
pub mod deck;
pub mod error;
pub mod events;
pub mod game;
pub mod options;
pub mod session;
pub mod store;
pub mod table;
pub mod transport;
pub mod wallet;

// Re-export main types
pub use bot::{BotAction, choose_action};
pub use card::{Card, DECK_SIZE, Rank, Suit};
pub use deck::{Deck, DiscardPile, HAND_SIZE, MAX_PLAYERS, MIN_PLAYERS};
pub use error::{ActionError, DealError, JoinError, SessionError, SettleError, StoreError};
pub use events::{ClientEvent, ServerEvent};
pub use game::payout::{Payouts, Penalty, compute_payouts};
pub use game::{
    DrawSource, GameState, LastAction, PlayerState, RoundEndReason, RoundStatus, Seat,
};
pub use options::TableOptions;
pub use session::{GameServer, Outbound, TableSession};
pub use store::{MemoryStore, PlayerProfile, StateStore};
pub use table::{Table, TablePlayer, TableStatus};
pub use wallet::{
    MatchRecord, MemoryBank, TransactionKind, Wallet, WalletStore, WalletTransaction,
};
