//! Table sessions.
//!
//! One [`TableSession`] owns one table: it consumes client events, drives
//! the rules engine, persists state through the store, settles wallets at
//! round boundaries, and fans state updates out to the table's room.
//!
//! Routine actions are serialised by the session's own gate (one session
//! owns one table's events); leave handling and round transitions
//! additionally take the store's per-table TTL lock so they stay exclusive
//! across processes. Deferred work — the bot tick and the round-transition
//! timer — re-validates state when it fires and no-ops when superseded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio::sync::broadcast;

use crate::bot::{self, BotAction};
use crate::error::{JoinError, SessionError, StoreError};
use crate::events::{ClientEvent, ServerEvent};
use crate::game::payout::compute_payouts;
use crate::game::{GameState, RoundStatus, Seat};
use crate::options::TableOptions;
use crate::store::{PlayerProfile, StateStore};
use crate::table::{Table, TableStatus};
use crate::wallet::WalletStore;

/// Capacity of a table's broadcast room.
const ROOM_CAPACITY: usize = 64;

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A room message, optionally targeted at a single user.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Deliver only to this user when set.
    pub target: Option<String>,
    /// The event to deliver.
    pub event: ServerEvent,
}

/// Per-table session singleton.
pub struct TableSession {
    me: Weak<Self>,
    options: TableOptions,
    table: Mutex<Table>,
    store: Arc<dyn StateStore>,
    bank: Arc<dyn WalletStore>,
    room: broadcast::Sender<Outbound>,
    /// Serialises all event handling for this table.
    gate: tokio::sync::Mutex<()>,
    rng: Mutex<ChaCha20Rng>,
    bot_seq: AtomicUsize,
    /// True while a bot loop task is alive; prevents duplicate loops.
    bot_loop_active: AtomicBool,
}

impl TableSession {
    /// Creates a session for a table.
    #[must_use]
    pub fn new(
        table: Table,
        options: TableOptions,
        store: Arc<dyn StateStore>,
        bank: Arc<dyn WalletStore>,
    ) -> Arc<Self> {
        let (room, _) = broadcast::channel(ROOM_CAPACITY);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            options,
            table: Mutex::new(table),
            store,
            bank,
            room,
            gate: tokio::sync::Mutex::new(()),
            rng: Mutex::new(ChaCha20Rng::from_os_rng()),
            bot_seq: AtomicUsize::new(0),
            bot_loop_active: AtomicBool::new(false),
        })
    }

    /// Subscribes to the table's room.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.room.subscribe()
    }

    /// A snapshot of the lobby-side table record.
    #[must_use]
    pub fn table(&self) -> Table {
        self.table.lock().clone()
    }

    fn table_id(&self) -> String {
        self.table.lock().id.clone()
    }

    fn broadcast(&self, event: ServerEvent) {
        let _ = self.room.send(Outbound {
            target: None,
            event,
        });
    }

    fn send_to(&self, user_id: &str, event: ServerEvent) {
        let _ = self.room.send(Outbound {
            target: Some(user_id.to_string()),
            event,
        });
    }

    /// Handles one client event, returning replies for the sending client.
    ///
    /// Room-wide effects are broadcast internally; only the targeted
    /// replies come back. Errors concern only the sending client.
    pub async fn handle_event(
        &self,
        event: ClientEvent,
    ) -> Result<Vec<ServerEvent>, SessionError> {
        match event {
            ClientEvent::JoinTable {
                user_id,
                username,
                avatar_url,
                ..
            } => self.join(&user_id, &username, avatar_url).await,
            ClientEvent::LeaveTable { user_id, .. } => {
                self.leave(&user_id).await?;
                Ok(Vec::new())
            }
            ClientEvent::RequestLeaveTable { user_id, .. } => {
                let table_id = self.table_id();
                self.store.mark_leaving(&table_id, &user_id);
                Ok(vec![ServerEvent::AckLeaveRequest {}])
            }
            ClientEvent::DrawCard {
                user_id, source, ..
            } => {
                self.apply_action(&user_id, |state, now| {
                    state.draw_card(&user_id, source, now).map(|_| ())
                })
                .await
            }
            ClientEvent::DiscardCard { user_id, card, .. } => {
                self.apply_action(&user_id, |state, now| {
                    state.discard_card(&user_id, card, now)
                })
                .await
            }
            ClientEvent::Spread { user_id, cards, .. } => {
                self.apply_action(&user_id, |state, now| {
                    state.spread_cards(&user_id, &cards, now)
                })
                .await
            }
            ClientEvent::Hit {
                user_id,
                card,
                target_player_id,
                target_spread_index,
                ..
            } => {
                self.apply_action(&user_id, |state, now| {
                    state.hit_spread(&user_id, card, &target_player_id, target_spread_index, now)
                })
                .await
            }
            ClientEvent::Drop { user_id, .. } => {
                self.apply_action(&user_id, |state, now| state.drop_hand(&user_id, now))
                    .await
            }
            ClientEvent::RequestInitialGameState { .. } => {
                let table_id = self.table_id();
                let state = self
                    .store
                    .load(&table_id)?
                    .ok_or(SessionError::NoActiveGame)?;
                Ok(vec![ServerEvent::InitialGameState { game_state: state }])
            }
        }
    }

    /// Seats a player, starting a round once enough seats fill.
    async fn join(
        &self,
        user_id: &str,
        username: &str,
        avatar_url: Option<String>,
    ) -> Result<Vec<ServerEvent>, SessionError> {
        let _g = self.gate.lock().await;
        let table_id = self.table_id();

        let rejoin = {
            let table = self.table.lock();
            table.is_seated(user_id)
        };
        if rejoin {
            debug!("{user_id} rejoined table {table_id}");
            let mut replies = Vec::new();
            if let Some(state) = self.store.load(&table_id)? {
                replies.push(ServerEvent::InitialGameState { game_state: state });
            }
            return Ok(replies);
        }

        let stake = {
            let mut table = self.table.lock();
            if table.is_full() {
                return Err(JoinError::TableFull.into());
            }
            let balance = self
                .bank
                .balance(user_id)
                .ok_or(JoinError::WalletNotFound)?;
            if balance < self.options.join_headroom * table.stake {
                return Err(JoinError::InsufficientFunds.into());
            }
            table.seat(user_id, false);
            table.stake
        };
        self.store.set_profile(
            &table_id,
            user_id,
            PlayerProfile {
                username: username.to_string(),
                is_ai: false,
                avatar_url,
            },
        );
        info!("{user_id} joined table {table_id} (stake {stake})");
        self.broadcast(ServerEvent::TableUpdate {
            message: format!("{username} joined the table"),
            table: self.table(),
            game_state: None,
        });

        // A lone human gets a bot opponent so a 1v1 can start right away.
        let (waiting, seats) = {
            let table = self.table.lock();
            (table.status == TableStatus::Waiting, table.player_count())
        };
        if waiting && seats == 1 {
            self.inject_bot(&table_id);
        }

        let ready = {
            let table = self.table.lock();
            table.status == TableStatus::Waiting && table.player_count() >= table.min_players
        };
        if ready {
            self.start_round(0)?;
        }

        let mut replies = Vec::new();
        if let Some(state) = self.store.load(&table_id)? {
            replies.push(ServerEvent::InitialGameState { game_state: state });
        }
        Ok(replies)
    }

    /// Seats a house bot.
    fn inject_bot(&self, table_id: &str) {
        let n = self.bot_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let bot_id = format!("bot-{}", uuid::Uuid::new_v4());
        let bot_name = format!("Bot {n}");
        self.table.lock().seat(&bot_id, true);
        self.store.set_profile(
            table_id,
            &bot_id,
            PlayerProfile {
                username: bot_name.clone(),
                is_ai: true,
                avatar_url: None,
            },
        );
        info!("seated {bot_name} at table {table_id}");
        self.broadcast(ServerEvent::TableUpdate {
            message: format!("{bot_name} joined the table"),
            table: self.table(),
            game_state: None,
        });
    }

    /// Shuffles, deals, locks antes, checks auto-wins, and broadcasts the
    /// opening state. Called with the gate held.
    fn start_round(&self, dealer_index: usize) -> Result<(), SessionError> {
        let table_id = self.table_id();
        let profiles = self.store.profiles(&table_id);
        let (stake, seats) = {
            let table = self.table.lock();
            let seats: Vec<Seat> = table
                .players
                .iter()
                .map(|p| Seat {
                    user_id: p.user_id.clone(),
                    username: profiles
                        .get(&p.user_id)
                        .map_or_else(|| p.user_id.clone(), |prof| prof.username.clone()),
                    is_ai: p.is_ai,
                })
                .collect();
            (table.stake, seats)
        };

        let mut state = {
            let mut rng = self.rng.lock();
            GameState::new_round(&table_id, stake, &seats, dealer_index, &mut rng, now_ms())?
        };

        if let Err(err) = self.bank.collect_antes(&state) {
            warn!("round setup failed at table {table_id}: {err}");
            self.table.lock().status = TableStatus::Waiting;
            self.store.delete(&table_id);
            return Err(err.into());
        }
        for player in state.players.iter().filter(|p| !p.is_ai) {
            if let Some(balance) = self.bank.balance(&player.user_id) {
                self.send_to(
                    &player.user_id,
                    ServerEvent::WalletBalanceUpdate {
                        user_id: player.user_id.clone(),
                        balance,
                    },
                );
            }
        }

        self.table.lock().status = TableStatus::InGame;
        self.store.save(&table_id, &state)?;
        info!(
            "round started at table {table_id}: {} seats, dealer {}",
            state.players.len(),
            state.current_dealer_index
        );
        self.broadcast(ServerEvent::GameStateUpdate {
            game_state: state.clone(),
        });

        if state.status == RoundStatus::RoundEnd {
            // An auto-win resolved the round on the deal.
            self.settle_round(&mut state);
        } else if state.current_player().is_some_and(|p| p.is_ai) {
            self.spawn_bot_loop();
        }
        Ok(())
    }

    /// Applies one rules-engine action for a human player.
    async fn apply_action<F>(
        &self,
        user_id: &str,
        apply: F,
    ) -> Result<Vec<ServerEvent>, SessionError>
    where
        F: FnOnce(&mut GameState, u64) -> Result<(), crate::error::ActionError>,
    {
        let _g = self.gate.lock().await;
        let table_id = self.table_id();
        if !self.table.lock().is_seated(user_id) {
            return Err(SessionError::NotSeated);
        }
        let mut state = self
            .store
            .load(&table_id)?
            .ok_or(SessionError::NoActiveGame)?;

        apply(&mut state, now_ms())?;

        self.store.save(&table_id, &state)?;
        self.broadcast(ServerEvent::GameStateUpdate {
            game_state: state.clone(),
        });

        if state.status == RoundStatus::RoundEnd {
            self.settle_round(&mut state);
        } else if state.current_player().is_some_and(|p| p.is_ai) {
            self.spawn_bot_loop();
        }
        Ok(Vec::new())
    }

    /// Settles an ended round and schedules the next-round transition.
    ///
    /// A settlement failure is logged and left for the transition timer to
    /// retry; an empty `payouts` map marks the round as unsettled.
    fn settle_round(&self, state: &mut GameState) {
        let table_id = self.table_id();
        match compute_payouts(state) {
            Ok(payouts) => match self.bank.settle(state, &payouts, now_ms()) {
                Ok(record) => {
                    state
                        .payouts
                        .insert(payouts.winner_id.clone(), payouts.winner_payout);
                    for penalty in &payouts.penalties {
                        state.payouts.insert(penalty.user_id.clone(), penalty.amount);
                    }
                    self.table.lock().current_match_id = Some(record.id);
                    if let Err(err) = self.store.save(&table_id, state) {
                        error!("failed to save settled state for {table_id}: {err}");
                    }
                    self.broadcast(ServerEvent::GameStateUpdate {
                        game_state: state.clone(),
                    });
                    for player in state.players.iter().filter(|p| !p.is_ai) {
                        if let Some(balance) = self.bank.balance(&player.user_id) {
                            self.send_to(
                                &player.user_id,
                                ServerEvent::WalletBalanceUpdate {
                                    user_id: player.user_id.clone(),
                                    balance,
                                },
                            );
                        }
                    }
                }
                Err(err) => error!("settlement failed at table {table_id}: {err}"),
            },
            Err(err) => error!("payout computation failed at table {table_id}: {err}"),
        }
        self.spawn_round_transition();
    }

    /// Spawns the deferred bot loop; each tick re-validates that it is
    /// still a bot's turn before acting.
    fn spawn_bot_loop(&self) {
        if self
            .bot_loop_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let Some(session) = self.me.upgrade() else {
            self.bot_loop_active.store(false, Ordering::SeqCst);
            return;
        };
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(session.options.bot_think_time).await;
                if !session.bot_turn_once().await {
                    break;
                }
            }
        });
    }

    /// Runs one bot action; returns whether the loop should keep going.
    ///
    /// The loop-active flag is cleared here, under the gate, so a human
    /// action arriving right after the loop winds down can respawn it
    /// without racing the old task.
    async fn bot_turn_once(&self) -> bool {
        let _g = self.gate.lock().await;
        let keep_going = self.bot_step();
        if !keep_going {
            self.bot_loop_active.store(false, Ordering::SeqCst);
        }
        keep_going
    }

    /// One bot action with the gate held.
    fn bot_step(&self) -> bool {
        let table_id = self.table_id();
        let Ok(Some(mut state)) = self.store.load(&table_id) else {
            return false;
        };
        if state.status != RoundStatus::InProgress {
            return false;
        }
        let Some(current) = state.current_player().cloned() else {
            return false;
        };
        if !current.is_ai {
            return false;
        }

        let action = {
            let mut rng = self.rng.lock();
            bot::choose_action(&state, &current.user_id, &mut *rng)
        };
        let Some(action) = action else {
            return false;
        };

        let now = now_ms();
        let bot_id = current.user_id.as_str();
        let applied = match action {
            BotAction::Draw => state
                .draw_card(bot_id, crate::game::DrawSource::Deck, now)
                .map(|_| ()),
            BotAction::Spread(cards) => state.spread_cards(bot_id, &cards, now),
            BotAction::Hit {
                card,
                target_user_id,
                target_spread_index,
            } => state.hit_spread(bot_id, card, &target_user_id, target_spread_index, now),
            BotAction::Drop => state.drop_hand(bot_id, now),
            BotAction::Discard(card) => state.discard_card(bot_id, card, now),
        };
        if let Err(err) = applied {
            warn!("bot action rejected at table {table_id}: {err}");
            return false;
        }

        if let Err(err) = self.store.save(&table_id, &state) {
            error!("failed to save bot action for {table_id}: {err}");
            return false;
        }
        self.broadcast(ServerEvent::GameStateUpdate {
            game_state: state.clone(),
        });

        if state.status == RoundStatus::RoundEnd {
            self.settle_round(&mut state);
            return false;
        }
        state.current_player().is_some_and(|p| p.is_ai)
    }

    /// Spawns the delayed round-transition handler.
    fn spawn_round_transition(&self) {
        let Some(session) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(session.options.round_transition_delay).await;
            session.transition_round().await;
        });
    }

    /// Moves the table from round-end into the next round: queued leavers
    /// are processed, bots are evicted once enough humans are seated, the
    /// dealer rotates, and the next round deals.
    ///
    /// Normally fired by the session's own delayed timer; public so an
    /// operator or test can crank it immediately. Runs under the store's
    /// per-table lock; a contended lock means another actor owns the
    /// transition and this fire simply skips.
    pub async fn transition_round(&self) {
        let _g = self.gate.lock().await;
        let table_id = self.table_id();
        if !self.store.try_lock(&table_id, self.options.lock_ttl) {
            debug!("transition skipped for {table_id}: lock contended");
            return;
        }
        self.transition_locked(&table_id);
        self.store.unlock(&table_id);
    }

    fn transition_locked(&self, table_id: &str) {
        let prev = match self.store.load(table_id) {
            Ok(Some(state)) => state,
            Ok(None) => return,
            Err(err) => {
                error!("transition load failed for {table_id}: {err}");
                return;
            }
        };
        // A stale fire: the round moved on without us.
        if prev.status != RoundStatus::RoundEnd {
            return;
        }

        // Retry a settlement the round-end handler could not commit.
        if prev.payouts.is_empty() && prev.round_ended_by.is_some() {
            let mut state = prev.clone();
            self.settle_retry(&mut state);
            if state.payouts.is_empty() {
                warn!("settlement still failing for {table_id}; transition deferred");
                self.spawn_round_transition();
                return;
            }
        }

        // Queued leave-after-round requests run first.
        for user_id in self.store.take_leaving(table_id) {
            self.leave_locked(table_id, &user_id);
        }

        let (seats, min_players, humans, has_bots) = {
            let table = self.table.lock();
            (
                table.player_count(),
                table.min_players,
                table.human_count(),
                table.players.iter().any(|p| p.is_ai),
            )
        };

        if seats < min_players {
            self.table.lock().status = TableStatus::Waiting;
            self.store.delete(table_id);
            self.broadcast(ServerEvent::TableUpdate {
                message: "waiting for players".to_string(),
                table: self.table(),
                game_state: None,
            });
            return;
        }

        // Humans-only rounds take precedence once enough humans are seated.
        if humans >= min_players && has_bots {
            let bots: Vec<String> = {
                let table = self.table.lock();
                table
                    .players
                    .iter()
                    .filter(|p| p.is_ai)
                    .map(|p| p.user_id.clone())
                    .collect()
            };
            for bot_id in bots {
                self.table.lock().unseat(&bot_id);
                self.store.remove_profile(table_id, &bot_id);
                self.broadcast(ServerEvent::PlayerLeft { user_id: bot_id });
            }
        }

        let seats = self.table.lock().player_count();
        let next_dealer = (prev.current_dealer_index + 1) % seats;
        if let Err(err) = self.start_round(next_dealer) {
            warn!("next round failed to start at {table_id}: {err}");
        }
    }

    /// One settlement retry from the transition timer.
    fn settle_retry(&self, state: &mut GameState) {
        let table_id = self.table_id();
        if let Ok(payouts) = compute_payouts(state) {
            if let Ok(record) = self.bank.settle(state, &payouts, now_ms()) {
                state
                    .payouts
                    .insert(payouts.winner_id.clone(), payouts.winner_payout);
                for penalty in &payouts.penalties {
                    state.payouts.insert(penalty.user_id.clone(), penalty.amount);
                }
                self.table.lock().current_match_id = Some(record.id);
                if let Err(err) = self.store.save(&table_id, state) {
                    error!("failed to save settled state for {table_id}: {err}");
                }
            }
        }
    }

    /// Removes a player immediately, under the store's per-table lock.
    pub async fn leave(&self, user_id: &str) -> Result<(), SessionError> {
        let _g = self.gate.lock().await;
        let table_id = self.table_id();
        if !self.store.try_lock(&table_id, self.options.lock_ttl) {
            return Err(StoreError::Conflict.into());
        }
        if !self.table.lock().is_seated(user_id) {
            self.store.unlock(&table_id);
            return Err(SessionError::NotSeated);
        }
        self.leave_locked(&table_id, user_id);
        self.store.unlock(&table_id);
        Ok(())
    }

    /// Leave handling with the table lock already held.
    fn leave_locked(&self, table_id: &str, user_id: &str) {
        {
            let mut table = self.table.lock();
            if !table.is_seated(user_id) {
                return;
            }
            table.unseat(user_id);
        }
        self.store.remove_profile(table_id, user_id);
        self.broadcast(ServerEvent::PlayerLeft {
            user_id: user_id.to_string(),
        });
        info!("{user_id} left table {table_id}");

        let (humans, seats, min_players, in_game) = {
            let table = self.table.lock();
            (
                table.human_count(),
                table.player_count(),
                table.min_players,
                table.status == TableStatus::InGame,
            )
        };

        if humans == 0 {
            // No humans left: reset the table entirely.
            {
                let mut table = self.table.lock();
                table.evict_bots();
                table.status = TableStatus::Waiting;
                table.current_match_id = None;
            }
            self.store.clear_table(table_id);
            self.broadcast(ServerEvent::TableUpdate {
                message: "table reset".to_string(),
                table: self.table(),
                game_state: None,
            });
            return;
        }

        if in_game && seats < min_players {
            // Not enough seats to continue: park the humans and wait.
            let bots: Vec<String> = {
                let table = self.table.lock();
                table
                    .players
                    .iter()
                    .filter(|p| p.is_ai)
                    .map(|p| p.user_id.clone())
                    .collect()
            };
            {
                let mut table = self.table.lock();
                table.evict_bots();
                table.status = TableStatus::Waiting;
                table.current_match_id = None;
            }
            for bot_id in &bots {
                self.store.remove_profile(table_id, bot_id);
            }
            self.store.delete(table_id);
            self.broadcast(ServerEvent::TableUpdate {
                message: "waiting for players".to_string(),
                table: self.table(),
                game_state: None,
            });
            return;
        }

        // The round continues with the seat list shrunk.
        if let Ok(Some(mut state)) = self.store.load(table_id) {
            if state.player_index(user_id).is_some() {
                state.remove_player(user_id);
                if self.store.save(table_id, &state).is_ok() {
                    self.broadcast(ServerEvent::GameStateUpdate {
                        game_state: state.clone(),
                    });
                    if state.status == RoundStatus::InProgress
                        && state.current_player().is_some_and(|p| p.is_ai)
                    {
                        self.spawn_bot_loop();
                    }
                }
            }
        }
    }

    /// Treats a dropped connection as an immediate leave.
    pub async fn disconnect(&self, user_id: &str) {
        match self.leave(user_id).await {
            Ok(()) | Err(SessionError::NotSeated) => {}
            Err(err) => warn!("disconnect cleanup failed for {user_id}: {err}"),
        }
    }
}

/// The set of live tables and their sessions.
pub struct GameServer {
    options: TableOptions,
    store: Arc<dyn StateStore>,
    bank: Arc<dyn WalletStore>,
    sessions: Mutex<HashMap<String, Arc<TableSession>>>,
}

impl GameServer {
    /// Creates a server over the given stores and seeds its tables.
    #[must_use]
    pub fn new(
        options: TableOptions,
        store: Arc<dyn StateStore>,
        bank: Arc<dyn WalletStore>,
        tables: Vec<Table>,
    ) -> Arc<Self> {
        let server = Arc::new(Self {
            options,
            store,
            bank,
            sessions: Mutex::new(HashMap::new()),
        });
        for table in tables {
            server.add_table(table);
        }
        server
    }

    /// Registers a table and its session.
    pub fn add_table(&self, table: Table) {
        let session = TableSession::new(
            table.clone(),
            self.options.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.bank),
        );
        self.sessions.lock().insert(table.id, session);
    }

    /// The session for a table.
    #[must_use]
    pub fn session(&self, table_id: &str) -> Option<Arc<TableSession>> {
        self.sessions.lock().get(table_id).cloned()
    }

    /// Lobby snapshots of every table.
    #[must_use]
    pub fn tables(&self) -> Vec<Table> {
        self.sessions
            .lock()
            .values()
            .map(|s| s.table())
            .collect()
    }
}
