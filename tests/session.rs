//! Session, store and settlement integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tonkrs::{
    ClientEvent, Deck, DiscardPile, GameServer, GameState, MemoryBank, MemoryStore,
    PlayerProfile, PlayerState, RoundEndReason, RoundStatus, ServerEvent, SessionError,
    StateStore, Table, TableOptions, TableStatus, WalletStore,
};

const STAKE: u64 = 10;

fn join_event(table_id: &str, user_id: &str) -> ClientEvent {
    ClientEvent::JoinTable {
        table_id: table_id.to_string(),
        user_id: user_id.to_string(),
        username: user_id.to_string(),
        avatar_url: None,
    }
}

/// Options that keep background timers out of the way; tests crank the
/// transition by hand.
fn quiet_options() -> TableOptions {
    TableOptions::default()
        .with_round_transition_delay(Duration::from_secs(600))
        .with_bot_think_time(Duration::from_secs(600))
}

fn server_with(
    options: TableOptions,
    balances: &[(&str, u64)],
) -> (Arc<GameServer>, Arc<MemoryStore>, Arc<MemoryBank>) {
    let store = Arc::new(MemoryStore::new());
    let bank = Arc::new(MemoryBank::new(options.min_withdrawal));
    for (user, balance) in balances {
        bank.create_wallet(user, *balance);
    }
    let server = GameServer::new(
        options,
        Arc::clone(&store) as Arc<dyn StateStore>,
        Arc::clone(&bank) as Arc<dyn WalletStore>,
        vec![Table::new("t1", "Test Table", STAKE)],
    );
    (server, store, bank)
}

/// A hand-built ended round for settlement and transition tests.
fn ended_round(players: &[(&str, bool)], reason: RoundEndReason, winner: &str) -> GameState {
    let seats: Vec<PlayerState> = players
        .iter()
        .map(|(id, is_ai)| {
            let mut p = PlayerState::new(*id, *id, *is_ai);
            p.current_buy_in = STAKE;
            p
        })
        .collect();
    let locked_antes: HashMap<String, u64> = seats
        .iter()
        .map(|p| (p.user_id.clone(), STAKE))
        .collect();
    let hand_scores = seats.iter().map(|p| (p.user_id.clone(), 0)).collect();

    GameState {
        table_id: "t1".to_string(),
        base_stake: STAKE,
        pot: STAKE * seats.len() as u64,
        locked_antes,
        players: seats,
        current_dealer_index: 0,
        current_player_index: 0,
        turn: 4,
        deck: Deck::new(),
        discard_pile: DiscardPile::new(),
        status: RoundStatus::RoundEnd,
        last_action: None,
        round_ended_by: Some(reason),
        round_winner_id: Some(winner.to_string()),
        caught_dropping_player_id: None,
        hand_scores,
        payouts: HashMap::new(),
    }
}

// ---------------------------------------------------------------------------
// State store
// ---------------------------------------------------------------------------

#[test]
fn store_round_trips_game_state() {
    let store = MemoryStore::new();
    let state = ended_round(&[("a", false), ("b", false)], RoundEndReason::Regular, "a");

    store.save("t1", &state).unwrap();
    let loaded = store.load("t1").unwrap().expect("state");
    assert_eq!(loaded, state);

    store.delete("t1");
    assert!(store.load("t1").unwrap().is_none());
}

#[test]
fn store_lock_expires_after_ttl() {
    let store = MemoryStore::new();
    let ttl = Duration::from_millis(50);

    assert!(store.try_lock("t1", ttl));
    assert!(!store.try_lock("t1", ttl));

    std::thread::sleep(Duration::from_millis(80));
    // The previous holder is assumed dead once the TTL lapses.
    assert!(store.try_lock("t1", ttl));

    store.unlock("t1");
    assert!(store.try_lock("t1", ttl));
}

#[test]
fn store_drains_the_leaving_set() {
    let store = MemoryStore::new();
    store.mark_leaving("t1", "a");
    store.mark_leaving("t1", "b");
    store.mark_leaving("t1", "a");

    assert_eq!(store.take_leaving("t1"), vec!["a".to_string(), "b".to_string()]);
    assert!(store.take_leaving("t1").is_empty());
}

#[test]
fn clear_table_wipes_everything_but_the_lock() {
    let store = MemoryStore::new();
    let state = ended_round(&[("a", false), ("b", false)], RoundEndReason::Regular, "a");
    store.save("t1", &state).unwrap();
    store.set_profile(
        "t1",
        "a",
        PlayerProfile {
            username: "a".to_string(),
            is_ai: false,
            avatar_url: None,
        },
    );
    store.mark_leaving("t1", "a");
    assert!(store.try_lock("t1", Duration::from_secs(10)));

    store.clear_table("t1");

    assert!(store.load("t1").unwrap().is_none());
    assert!(store.profiles("t1").is_empty());
    assert!(store.take_leaving("t1").is_empty());
    // The lock stays with its holder.
    assert!(!store.try_lock("t1", Duration::from_secs(10)));
    store.unlock("t1");
}

// ---------------------------------------------------------------------------
// Wallet settlement
// ---------------------------------------------------------------------------

#[test]
fn antes_debit_humans_only() {
    let bank = MemoryBank::new(5);
    bank.create_wallet("a", 100);
    bank.create_wallet("b", 100);
    let state = ended_round(
        &[("a", false), ("b", false), ("bot-1", true)],
        RoundEndReason::Regular,
        "a",
    );

    bank.collect_antes(&state).unwrap();
    assert_eq!(bank.balance("a"), Some(90));
    assert_eq!(bank.balance("b"), Some(90));
    // The bot inflated the pot without owning a wallet.
    assert_eq!(state.pot, STAKE * 3);
}

#[test]
fn ante_shortfall_fails_the_whole_round_setup() {
    let bank = MemoryBank::new(5);
    bank.create_wallet("a", 100);
    bank.create_wallet("b", 3);
    let state = ended_round(&[("a", false), ("b", false)], RoundEndReason::Regular, "a");

    assert!(bank.collect_antes(&state).is_err());
    // Nothing was debited.
    assert_eq!(bank.balance("a"), Some(100));
    assert_eq!(bank.balance("b"), Some(3));
}

#[test]
fn auto_triple_settlement_moves_triple_stakes() {
    let bank = MemoryBank::new(5);
    bank.create_wallet("a", 100);
    bank.create_wallet("b", 100);
    let state = ended_round(
        &[("a", false), ("b", false), ("bot-1", true)],
        RoundEndReason::AutoTriple,
        "a",
    );
    bank.collect_antes(&state).unwrap();

    let payouts = tonkrs::compute_payouts(&state).unwrap();
    // Pot of three antes plus triple stake from both losers.
    assert_eq!(payouts.winner_payout, 30 + 60);
    let record = bank.settle(&state, &payouts, 7).unwrap();

    assert_eq!(bank.balance("a"), Some(90 + 90));
    assert_eq!(bank.balance("b"), Some(90 - 30));

    // One match record, with the bot's penalty house-funded: only the two
    // human wallets got transactions, both threaded to the match id.
    assert_eq!(record.players.len(), 3);
    assert_eq!(record.penalties.len(), 2);
    let transactions = bank.transactions();
    assert_eq!(transactions.len(), 2);
    assert!(transactions.iter().all(|t| t.match_id == Some(record.id)));

    let wallet = bank.wallet("a").unwrap();
    assert_eq!(wallet.match_earnings_history.len(), 1);
    assert_eq!(wallet.match_earnings_history[0].amount, 90);
}

#[test]
fn settlement_aborts_atomically_on_shortfall() {
    let bank = MemoryBank::new(5);
    bank.create_wallet("a", 100);
    bank.create_wallet("b", 20);
    let state = ended_round(
        &[("a", false), ("b", false)],
        RoundEndReason::AutoTriple,
        "a",
    );
    bank.collect_antes(&state).unwrap();
    assert_eq!(bank.balance("b"), Some(10));

    // B cannot cover the triple-stake penalty; nothing may move.
    let payouts = tonkrs::compute_payouts(&state).unwrap();
    assert!(bank.settle(&state, &payouts, 7).is_err());

    assert_eq!(bank.balance("a"), Some(90));
    assert_eq!(bank.balance("b"), Some(10));
    assert!(bank.matches().is_empty());
    assert!(bank.transactions().is_empty());
}

#[test]
fn withdrawal_requests_respect_the_minimum() {
    let bank = MemoryBank::new(5);
    bank.create_wallet("a", 100);

    assert!(bank.request_withdrawal("a", 3).is_err());
    bank.request_withdrawal("a", 40).unwrap();

    let wallet = bank.wallet("a").unwrap();
    assert_eq!(wallet.available_balance, 60);
    assert_eq!(wallet.pending_withdrawals, 40);
}

// ---------------------------------------------------------------------------
// Table session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lone_human_gets_a_bot_and_a_round_starts() {
    let (server, store, _bank) = server_with(quiet_options(), &[("h1", 100)]);
    let session = server.session("t1").expect("session");

    let replies = session.handle_event(join_event("t1", "h1")).await.unwrap();
    assert!(
        replies
            .iter()
            .any(|r| matches!(r, ServerEvent::InitialGameState { .. }))
    );

    let table = session.table();
    assert_eq!(table.status, TableStatus::InGame);
    assert_eq!(table.player_count(), 2);
    assert_eq!(table.human_count(), 1);

    let state = store.load("t1").unwrap().expect("round state");
    assert_eq!(state.players.len(), 2);
    assert!(state.players.iter().any(|p| p.is_ai));
    assert_eq!(state.pot, STAKE * 2);
    // The human is the dealer, so the bot acts first.
    assert_eq!(state.current_dealer_index, 0);
}

#[tokio::test]
async fn join_requires_headroom() {
    let (server, _store, _bank) = server_with(quiet_options(), &[("poor", 30)]);
    let session = server.session("t1").expect("session");

    let err = session
        .handle_event(join_event("t1", "poor"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Join(_)));
    assert_eq!(session.table().player_count(), 0);
}

#[tokio::test]
async fn rejoin_resends_state_without_reseating() {
    let (server, _store, _bank) = server_with(quiet_options(), &[("h1", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    let seats = session.table().player_count();

    let replies = session.handle_event(join_event("t1", "h1")).await.unwrap();
    assert!(
        replies
            .iter()
            .any(|r| matches!(r, ServerEvent::InitialGameState { .. }))
    );
    assert_eq!(session.table().player_count(), seats);
}

#[tokio::test]
async fn last_human_leaving_resets_the_table() {
    let (server, store, _bank) = server_with(quiet_options(), &[("h1", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    session.leave("h1").await.unwrap();

    let table = session.table();
    assert_eq!(table.status, TableStatus::Waiting);
    assert_eq!(table.player_count(), 0);
    assert!(store.load("t1").unwrap().is_none());
    assert!(store.profiles("t1").is_empty());
}

#[tokio::test]
async fn ante_collection_failure_keeps_the_table_waiting() {
    let (server, store, bank) = server_with(quiet_options(), &[("h1", 100), ("h2", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    session.handle_event(join_event("t1", "h2")).await.unwrap();

    // Drain h1 below the stake, then force a redeal: the ante fails and
    // the whole round setup is abandoned.
    let drainable = bank.balance("h1").unwrap() - 5;
    bank.request_withdrawal("h1", drainable).unwrap();
    let mut prev = ended_round(&[("h1", false), ("h2", false)], RoundEndReason::Regular, "h1");
    prev.payouts.insert("h1".to_string(), STAKE * 2);
    store.save("t1", &prev).unwrap();

    session.transition_round().await;

    assert_eq!(session.table().status, TableStatus::Waiting);
    assert!(store.load("t1").unwrap().is_none());
    // Both humans stay seated for when the table refills.
    assert_eq!(session.table().human_count(), 2);
}

#[tokio::test]
async fn queued_leave_runs_at_transition_and_dealer_rotates() {
    let (server, store, _bank) =
        server_with(quiet_options(), &[("h1", 100), ("h2", 100), ("h3", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    session.handle_event(join_event("t1", "h2")).await.unwrap();
    // h3 is seated mid-round and will play from the next round.
    session.handle_event(join_event("t1", "h3")).await.unwrap();

    let replies = session
        .handle_event(ClientEvent::RequestLeaveTable {
            table_id: "t1".to_string(),
            user_id: "h3".to_string(),
        })
        .await
        .unwrap();
    assert!(
        replies
            .iter()
            .any(|r| matches!(r, ServerEvent::AckLeaveRequest {}))
    );
    // Nothing changed yet: three humans plus the injected bot stay seated
    // until the round ends.
    assert_eq!(session.table().player_count(), 4);

    // Force a settled round-end so the transition has nothing left to do
    // but process leavers and redeal.
    let mut prev = ended_round(&[("h1", false), ("h2", false)], RoundEndReason::Regular, "h1");
    prev.payouts.insert("h1".to_string(), STAKE * 2);
    store.save("t1", &prev).unwrap();

    session.transition_round().await;

    let table = session.table();
    assert_eq!(table.player_count(), 2);
    assert!(!table.is_seated("h3"));

    let state = store.load("t1").unwrap().expect("next round");
    assert_eq!(state.players.len(), 2);
    assert!(state.player("h3").is_none());
    // Dealer rotated one seat past the previous round's dealer.
    assert_eq!(state.current_dealer_index, 1);
}

#[tokio::test]
async fn transition_parks_a_short_table() {
    let (server, store, _bank) = server_with(quiet_options(), &[("h1", 100), ("h2", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    session.handle_event(join_event("t1", "h2")).await.unwrap();

    // First transition: two humans are enough, so the bot is evicted and a
    // humans-only round deals.
    let mut prev = ended_round(&[("h1", false), ("h2", false)], RoundEndReason::Regular, "h1");
    prev.payouts.insert("h1".to_string(), STAKE * 2);
    store.save("t1", &prev).unwrap();
    session.transition_round().await;
    assert_eq!(session.table().player_count(), 2);

    // Second transition: h2 is queued to leave, and one seat is not enough
    // to redeal. The table parks and waits.
    let mut prev = ended_round(&[("h1", false), ("h2", false)], RoundEndReason::Regular, "h1");
    prev.payouts.insert("h1".to_string(), STAKE * 2);
    store.save("t1", &prev).unwrap();
    store.mark_leaving("t1", "h2");
    session.transition_round().await;

    let table = session.table();
    assert_eq!(table.status, TableStatus::Waiting);
    assert_eq!(table.player_count(), 1);
    assert!(store.load("t1").unwrap().is_none());
}

#[tokio::test]
async fn leave_mid_round_shrinks_the_live_seat_list() {
    let (server, store, _bank) =
        server_with(quiet_options(), &[("h1", 100), ("h2", 100), ("h3", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    session.handle_event(join_event("t1", "h2")).await.unwrap();
    session.handle_event(join_event("t1", "h3")).await.unwrap();

    // Put a three-player round in play via a settled transition.
    let mut prev = ended_round(&[("h1", false), ("h2", false)], RoundEndReason::Regular, "h1");
    prev.payouts.insert("h1".to_string(), STAKE * 2);
    store.save("t1", &prev).unwrap();
    session.transition_round().await;
    let state = store.load("t1").unwrap().expect("three-player round");
    assert_eq!(state.players.len(), 3);

    session.leave("h1").await.unwrap();

    let table = session.table();
    assert_eq!(table.player_count(), 2);
    let state = store.load("t1").unwrap().expect("round continues");
    assert_eq!(state.players.len(), 2);
    assert!(state.player("h1").is_none());
    assert!(state.current_player_index < state.players.len());
}

#[tokio::test]
async fn dealer_leaving_mid_round_hands_the_deal_to_the_next_seat() {
    let (server, store, _bank) =
        server_with(quiet_options(), &[("h1", 100), ("h2", 100), ("h3", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    session.handle_event(join_event("t1", "h2")).await.unwrap();
    session.handle_event(join_event("t1", "h3")).await.unwrap();

    // A settled transition deals a three-player round with h2 as dealer.
    let mut prev = ended_round(&[("h1", false), ("h2", false)], RoundEndReason::Regular, "h1");
    prev.payouts.insert("h1".to_string(), STAKE * 2);
    store.save("t1", &prev).unwrap();
    session.transition_round().await;
    let state = store.load("t1").unwrap().expect("three-player round");
    assert_eq!(state.players[state.current_dealer_index].user_id, "h2");

    // The dealer disconnects mid-round.
    session.leave("h2").await.unwrap();

    let state = store.load("t1").unwrap().expect("round continues");
    assert_eq!(state.players.len(), 2);
    // Rotating one seat from the stored dealer index reaches h3, the seat
    // that inherited the vacated dealer slot.
    assert_eq!(state.current_dealer_index, 0);
    let next = (state.current_dealer_index + 1) % state.players.len();
    assert_eq!(state.players[next].user_id, "h3");
}

#[tokio::test]
async fn bot_eventually_acts_on_its_turn() {
    let options = quiet_options().with_bot_think_time(Duration::from_millis(10));
    let (server, store, _bank) = server_with(options, &[("h1", 100)]);
    let session = server.session("t1").expect("session");
    let mut room = session.subscribe();

    session.handle_event(join_event("t1", "h1")).await.unwrap();

    // The bot sits left of the dealer, so unless the deal auto-won the
    // round outright, the bot must act shortly.
    let mut acted = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let state = store.load("t1").unwrap().expect("state");
        if state.round_ended_by.is_some() || state.last_action.is_some() {
            acted = true;
            break;
        }
    }
    assert!(acted, "bot never acted and the round never ended");

    // The room observed at least one broadcast along the way.
    let mut saw_update = false;
    while let Ok(out) = room.try_recv() {
        if matches!(
            out.event,
            ServerEvent::GameStateUpdate { .. } | ServerEvent::TableUpdate { .. }
        ) {
            saw_update = true;
        }
    }
    assert!(saw_update);
}

#[tokio::test]
async fn unknown_leaver_is_rejected() {
    let (server, _store, _bank) = server_with(quiet_options(), &[("h1", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    assert!(matches!(
        session.leave("ghost").await,
        Err(SessionError::NotSeated)
    ));
}

#[tokio::test]
async fn settlement_retry_runs_from_the_transition() {
    let (server, store, bank) = server_with(quiet_options(), &[("h1", 100), ("h2", 100)]);
    let session = server.session("t1").expect("session");

    session.handle_event(join_event("t1", "h1")).await.unwrap();
    session.handle_event(join_event("t1", "h2")).await.unwrap();

    // An ended round that was never settled: empty payouts.
    let prev = ended_round(&[("h1", false), ("h2", false)], RoundEndReason::Regular, "h1");
    store.save("t1", &prev).unwrap();
    let before = bank.matches().len();

    session.transition_round().await;

    // The transition settled the stale round before redealing; the retried
    // settlement lands first in the ledger.
    let matches = bank.matches();
    assert!(matches.len() > before);
    let retried = &matches[before];
    assert_eq!(retried.win_type, RoundEndReason::Regular);
    assert_eq!(retried.winner_id, "h1");
    assert_eq!(retried.pot, STAKE * 2);
    let state = store.load("t1").unwrap().expect("next round");
    assert_eq!(state.turn, 0);
}
