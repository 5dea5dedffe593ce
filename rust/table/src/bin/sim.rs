//! Plays random legal actions at one table and reports the outcome.
//!
//! Usage: cargo run -p holdem-table --bin holdem-table-sim -- --seats 6 --hands 200

use std::sync::{Arc, Mutex};

use clap::Parser;
use holdem_engine::engine::{HandStatus, LegalAction};
use holdem_engine::errors::EngineError;
use holdem_engine::ledger::InMemoryLedger;
use holdem_engine::player::{PlayerAction, SeatId, TableSeat};
use holdem_table::{spawn_table, EventBus, LogFormat, TableError, TableHandle, Viewer};
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "holdem-table-sim")]
#[command(about = "Simulate Texas Hold'em hands between random players")]
#[command(version)]
struct Args {
    #[arg(long, default_value_t = 6)]
    #[arg(help = "Number of seated players, at least 2")]
    seats: u8,

    #[arg(long, default_value_t = 100)]
    #[arg(help = "Maximum number of hands to play")]
    hands: u32,

    #[arg(long, env = "HOLDEM_SEED")]
    #[arg(help = "RNG seed for reproducible runs")]
    seed: Option<u64>,

    #[arg(long, default_value_t = 1000)]
    #[arg(help = "Starting stack per seat")]
    stack: u32,

    #[arg(long)]
    #[arg(help = "Print the summary and logs as JSON")]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    table_id: String,
    hands_played: u32,
    events_seen: usize,
    starting_total: u64,
    final_total: u64,
    stacks: Vec<TableSeat>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let format = if args.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    if let Err(e) = holdem_table::init_logging_with(format) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let mut settings = holdem_table::load()?;
    if args.seed.is_some() {
        settings.table.seed = args.seed;
    }
    if args.seats < 2 || args.seats > settings.table.max_seats {
        return Err(format!(
            "--seats must be between 2 and {}",
            settings.table.max_seats
        )
        .into());
    }

    let ledger = Arc::new(Mutex::new(InMemoryLedger::with_balances(
        (0..args.seats).map(|seat| (seat, u64::from(args.stack))),
    )));
    let bus = EventBus::with_buffer(settings.event_buffer);
    let (table, task) = spawn_table(&settings, &bus, Box::new(ledger.clone()))?;
    let mut observer = bus.subscribe(table.table_id(), Viewer::Observer);

    for seat in 0..args.seats {
        table.seat_player(TableSeat::new(seat, args.stack)).await?;
    }

    let mut rng = match settings.table.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed ^ 0x5eed),
        None => ChaCha20Rng::seed_from_u64(rand::rng().random()),
    };

    let mut hands_played = 0;
    let mut events_seen = 0;
    for _ in 0..args.hands {
        let hand_id = match table.start_hand().await {
            Ok(id) => id,
            Err(TableError::Engine(EngineError::NotEnoughSeats { .. })) => break,
            Err(e) => return Err(e.into()),
        };
        play_hand(&table, &hand_id, &mut rng).await?;
        hands_played += 1;
        while let Ok(_event) = observer.receiver().try_recv() {
            events_seen += 1;
        }
    }

    let stacks = table.seats().await?;
    table.shutdown().await?;
    task.await?;

    let final_total = ledger
        .lock()
        .map(|l| l.total())
        .map_err(|_| "ledger lock poisoned")?;
    let summary = Summary {
        table_id: table.table_id().to_string(),
        hands_played,
        events_seen,
        starting_total: u64::from(args.stack) * u64::from(args.seats),
        final_total,
        stacks,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Table {}", summary.table_id);
        println!("Hands played: {}", summary.hands_played);
        println!("Events seen: {}", summary.events_seen);
        for seat in &summary.stacks {
            println!("  seat {}: {}", seat.seat_id, seat.stack);
        }
        println!(
            "Chips: {} at start, {} at end",
            summary.starting_total, summary.final_total
        );
    }
    if summary.starting_total != summary.final_total {
        return Err("ledger total drifted during simulation".into());
    }
    Ok(())
}

async fn play_hand(
    table: &TableHandle,
    hand_id: &str,
    rng: &mut ChaCha20Rng,
) -> Result<(), TableError> {
    loop {
        let Some(state) = table.hand_state(hand_id, Viewer::Observer).await? else {
            return Ok(());
        };
        if state.status != HandStatus::InProgress {
            return Ok(());
        }
        let Some(seat) = state.to_act else {
            return Ok(());
        };
        let action = pick_action(&state.legal_actions, rng);
        tracing::debug!(hand_id = %hand_id, seat = seat, action = ?action, "sim action");
        act(table, hand_id, seat, action).await?;
    }
}

async fn act(
    table: &TableHandle,
    hand_id: &str,
    seat: SeatId,
    action: PlayerAction,
) -> Result<(), TableError> {
    match table.act(hand_id, seat, action).await {
        Err(e) if e.is_rejected_action() => {
            tracing::warn!(hand_id = %hand_id, seat = seat, error = %e, "sim action rejected, folding");
            table.force_timeout(hand_id, seat).await
        }
        other => other,
    }
}

fn pick_action(legal: &[LegalAction], rng: &mut ChaCha20Rng) -> PlayerAction {
    match legal.choose(rng) {
        Some(LegalAction::Fold) | None => PlayerAction::Fold,
        Some(LegalAction::Check) => PlayerAction::Check,
        Some(LegalAction::Call { .. }) => PlayerAction::Call,
        Some(LegalAction::Raise { min_to, max_to }) => {
            PlayerAction::Raise(rng.random_range(*min_to..=*max_to))
        }
        Some(LegalAction::AllIn { .. }) => PlayerAction::AllIn,
    }
}
