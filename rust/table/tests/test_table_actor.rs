use std::sync::{Arc, Mutex};
use std::time::Duration;

use holdem_engine::engine::HandStatus;
use holdem_engine::errors::{ActionError, EngineError};
use holdem_engine::events::HandEvent;
use holdem_engine::ledger::InMemoryLedger;
use holdem_engine::logger::{ActionKind, Street};
use holdem_engine::player::{PlayerAction, TableSeat};
use holdem_table::{
    init_test_logging, spawn_table, EventBus, EventSubscription, TableError, TableSettings, Viewer,
};
use tracing::Level;

fn settings() -> TableSettings {
    let mut settings = TableSettings::default();
    settings.table.seed = Some(11);
    settings
}

fn shared_ledger() -> Arc<Mutex<InMemoryLedger>> {
    Arc::new(Mutex::new(InMemoryLedger::with_balances([(0, 1000), (1, 1000)])))
}

fn drain(sub: &mut EventSubscription) -> Vec<HandEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = sub.receiver().try_recv() {
        out.push(ev.event);
    }
    out
}

#[tokio::test]
async fn start_hand_broadcasts_and_keeps_hole_cards_private() {
    let bus = EventBus::new();
    let (table, task) = spawn_table(&settings(), &bus, Box::new(shared_ledger())).unwrap();
    let mut seat0 = bus.subscribe(table.table_id(), Viewer::Seat(0));
    let mut seat1 = bus.subscribe(table.table_id(), Viewer::Seat(1));
    let mut observer = bus.subscribe(table.table_id(), Viewer::Observer);

    table.seat_player(TableSeat::new(0, 1000)).await.unwrap();
    table.seat_player(TableSeat::new(1, 1000)).await.unwrap();
    let hand_id = table.start_hand().await.unwrap();

    let seen = drain(&mut observer);
    assert!(matches!(seen.first(), Some(HandEvent::HandStarted { .. })));
    assert!(seen
        .iter()
        .all(|ev| !matches!(ev, HandEvent::HoleCardsDealt { .. })));
    assert!(seen.iter().all(|ev| ev.hand_id() == hand_id));

    for (seat_id, sub) in [(0u8, &mut seat0), (1u8, &mut seat1)] {
        let holes: Vec<_> = drain(sub)
            .into_iter()
            .filter_map(|ev| match ev {
                HandEvent::HoleCardsDealt { seat_id, .. } => Some(seat_id),
                _ => None,
            })
            .collect();
        assert_eq!(holes, vec![seat_id]);
    }

    table.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn fold_through_handle_settles_ledger() {
    let bus = EventBus::new();
    let ledger = shared_ledger();
    let (table, task) = spawn_table(&settings(), &bus, Box::new(ledger.clone())).unwrap();
    let mut observer = bus.subscribe(table.table_id(), Viewer::Observer);
    table.seat_player(TableSeat::new(0, 1000)).await.unwrap();
    table.seat_player(TableSeat::new(1, 1000)).await.unwrap();

    let hand_id = table.start_hand().await.unwrap();
    let state = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    let first = state.to_act.unwrap();
    table.act(&hand_id, first, PlayerAction::Fold).await.unwrap();

    let state = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    assert_eq!(state.status, HandStatus::Finished);
    let winner = 1 - first;
    assert_eq!(state.result.as_ref().unwrap().payout(winner), 30);

    let stacks: u64 = table
        .seats()
        .await
        .unwrap()
        .iter()
        .map(|s| u64::from(s.stack))
        .sum();
    assert_eq!(stacks, 2000);
    {
        let ledger = ledger.lock().unwrap();
        assert_eq!(ledger.total(), 2000);
        assert_eq!(ledger.balance(winner), Some(1010));
    }
    assert!(drain(&mut observer)
        .iter()
        .any(|ev| matches!(ev, HandEvent::HandFinished { .. })));

    table.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn rejected_action_is_reported_to_the_caller() {
    let bus = EventBus::new();
    let (table, task) = spawn_table(&settings(), &bus, Box::new(shared_ledger())).unwrap();
    table.seat_player(TableSeat::new(0, 1000)).await.unwrap();
    table.seat_player(TableSeat::new(1, 1000)).await.unwrap();
    let hand_id = table.start_hand().await.unwrap();
    let before = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    let waiting = 1 - before.to_act.unwrap();

    let err = table
        .act(&hand_id, waiting, PlayerAction::Check)
        .await
        .unwrap_err();
    assert!(err.is_rejected_action());
    let after = table.hand_state(&hand_id, Viewer::Observer).await.unwrap();
    assert_eq!(after, Some(before));

    let err = table
        .act("19700101-000001", 0, PlayerAction::Fold)
        .await
        .unwrap_err();
    assert!(matches!(
        err.engine(),
        Some(EngineError::Action(ActionError::HandNotInProgress))
    ));

    let err = table.start_hand().await.unwrap_err();
    assert!(matches!(
        err,
        TableError::Engine(EngineError::HandAlreadyInProgress { .. })
    ));

    table.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn expired_clock_folds_the_seat_to_act() {
    let bus = EventBus::new();
    let mut settings = settings();
    settings.action_timeout_ms = Some(50);
    let (table, task) = spawn_table(&settings, &bus, Box::new(shared_ledger())).unwrap();
    table.seat_player(TableSeat::new(0, 1000)).await.unwrap();
    table.seat_player(TableSeat::new(1, 1000)).await.unwrap();

    let hand_id = table.start_hand().await.unwrap();
    let first = table
        .hand_state(&hand_id, Viewer::Observer)
        .await
        .unwrap()
        .unwrap()
        .to_act
        .unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;

    let state = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    assert_eq!(state.status, HandStatus::Finished);
    let timed_out = state
        .actions
        .iter()
        .find(|a| a.forced && a.kind == ActionKind::Fold)
        .expect("forced fold recorded");
    assert_eq!(timed_out.seat_id, first);

    table.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn closed_table_reports_closed() {
    let bus = EventBus::new();
    let (table, task) = spawn_table(&settings(), &bus, Box::new(shared_ledger())).unwrap();
    let other = table.clone();
    table.shutdown().await.unwrap();
    task.await.unwrap();

    let err = other.start_hand().await.unwrap_err();
    assert!(matches!(err, TableError::Closed(ref id) if id == table.table_id()));
}

#[tokio::test]
async fn checkpoint_file_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings();
    settings.checkpoint_path = Some(dir.path().join("hands.jsonl"));
    let bus = EventBus::new();

    let (table, task) = spawn_table(&settings, &bus, Box::new(shared_ledger())).unwrap();
    table.seat_player(TableSeat::new(0, 1000)).await.unwrap();
    table.seat_player(TableSeat::new(1, 1000)).await.unwrap();
    let hand_id = table.start_hand().await.unwrap();
    let before = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    table.shutdown().await.unwrap();
    task.await.unwrap();

    let ledger = shared_ledger();
    let (restarted, task) = spawn_table(&settings, &bus, Box::new(ledger.clone())).unwrap();
    let recovered = restarted.recover_from_checkpoint(&hand_id).await.unwrap();
    assert_eq!(recovered, before);

    let first = recovered.to_act.unwrap();
    restarted
        .act(&hand_id, first, PlayerAction::Fold)
        .await
        .unwrap();
    let state = restarted.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    assert_eq!(state.status, HandStatus::Finished);
    assert_eq!(ledger.lock().unwrap().balance(1 - first), Some(1010));

    let missing = restarted
        .recover_from_checkpoint("19700101-000001")
        .await
        .unwrap_err();
    assert!(matches!(
        missing.engine(),
        Some(EngineError::Persistence(_))
    ));

    restarted.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn state_shows_only_the_viewers_own_hole_cards() {
    let bus = EventBus::new();
    let (table, task) = spawn_table(&settings(), &bus, Box::new(shared_ledger())).unwrap();
    table.seat_player(TableSeat::new(0, 1000)).await.unwrap();
    table.seat_player(TableSeat::new(1, 1000)).await.unwrap();
    let hand_id = table.start_hand().await.unwrap();

    let observer = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    assert!(observer.seats.iter().all(|s| s.hole_cards.is_none()));

    let seat0 = table.hand_state(&hand_id, Viewer::Seat(0)).await.unwrap().unwrap();
    assert!(seat0.seat(0).unwrap().hole_cards.is_some());
    assert!(seat0.seat(1).unwrap().hole_cards.is_none());

    table.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn new_street_restarts_the_clock() {
    let logs = init_test_logging();
    let bus = EventBus::new();
    let mut settings = settings();
    settings.action_timeout_ms = Some(1000);
    let (table, task) = spawn_table(&settings, &bus, Box::new(shared_ledger())).unwrap();
    table.seat_player(TableSeat::new(0, 1000)).await.unwrap();
    table.seat_player(TableSeat::new(1, 1000)).await.unwrap();
    let hand_id = table.start_hand().await.unwrap();

    // Seeded heads-up: seat 0 has the button and acts first preflop, seat 1
    // acts first on the flop.
    tokio::time::sleep(Duration::from_millis(100)).await;
    table.act(&hand_id, 0, PlayerAction::Call).await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;
    table.act(&hand_id, 1, PlayerAction::Check).await.unwrap();

    // Past the preflop deadline, within a fresh one.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let state = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    assert_eq!(state.current_round, Street::Flop);
    assert_eq!(state.to_act, Some(1));
    assert_eq!(state.actions.iter().filter(|a| a.forced).count(), 2);

    tokio::time::sleep(Duration::from_millis(700)).await;
    let state = table.hand_state(&hand_id, Viewer::Observer).await.unwrap().unwrap();
    let forced: Vec<_> = state.actions.iter().filter(|a| a.forced).skip(2).collect();
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].seat_id, 1);
    assert_eq!(forced[0].kind, ActionKind::Check);
    assert_eq!(forced[0].street, Street::Flop);

    let expired: Vec<_> = logs
        .matching("action clock expired")
        .into_iter()
        .filter(|e| e.field("table_id") == Some(table.table_id()))
        .collect();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].level, Level::WARN);
    assert_eq!(expired[0].field("seat"), Some("1"));

    table.shutdown().await.unwrap();
    task.await.unwrap();
}
