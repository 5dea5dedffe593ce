//! One tokio task per table.
//!
//! The task owns the [`Table`] outright; everything else talks to it through
//! a [`TableHandle`] that sends commands over a bounded channel and awaits
//! the reply. Commands for one table are therefore applied strictly in
//! arrival order, and tables never share state with each other.

use std::time::Duration;

use holdem_engine::engine::{HandState, HandStatus};
use holdem_engine::errors::EngineError;
use holdem_engine::game::Table;
use holdem_engine::ledger::ChipLedger;
use holdem_engine::logger::{CheckpointSink, HandLogger};
use holdem_engine::player::{PlayerAction, SeatId, TableSeat};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::errors::TableError;
use crate::events::{EventBus, TableId, Viewer};
use crate::settings::TableSettings;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

#[derive(Debug)]
enum Command {
    SeatPlayer {
        seat: TableSeat,
        reply: Reply<()>,
    },
    SitOut {
        seat_id: SeatId,
        sitting_out: bool,
        reply: Reply<()>,
    },
    Seats {
        reply: oneshot::Sender<Vec<TableSeat>>,
    },
    StartHand {
        reply: Reply<String>,
    },
    Act {
        hand_id: String,
        seat_id: SeatId,
        action: PlayerAction,
        reply: Reply<()>,
    },
    Timeout {
        hand_id: String,
        seat_id: SeatId,
        reply: Reply<()>,
    },
    State {
        hand_id: String,
        viewer: Viewer,
        reply: oneshot::Sender<Option<HandState>>,
    },
    Abort {
        hand_id: String,
        reason: String,
        reply: Reply<()>,
    },
    Recover {
        hand_id: String,
        reply: Reply<HandState>,
    },
    RetrySettlement {
        hand_id: String,
        reply: Reply<()>,
    },
    Shutdown,
}

/// Cloneable address of a running table task.
#[derive(Debug, Clone)]
pub struct TableHandle {
    table_id: TableId,
    tx: mpsc::Sender<Command>,
}

/// Builds a table from settings and starts its task.
pub fn spawn_table(
    settings: &TableSettings,
    bus: &EventBus,
    ledger: Box<dyn ChipLedger>,
) -> Result<(TableHandle, JoinHandle<()>), TableError> {
    settings.validate()?;
    let checkpoints: Box<dyn CheckpointSink> = match &settings.checkpoint_path {
        Some(path) => Box::new(
            HandLogger::open(path).map_err(|e| EngineError::Persistence(e.to_string()))?,
        ),
        None => Box::new(HandLogger::in_memory()),
    };
    let table_id = Uuid::new_v4().to_string();
    let table = Table::new(
        settings.table.clone(),
        Box::new(bus.sink(&table_id)),
        checkpoints,
        ledger,
    )?;
    Ok(spawn_with(
        table_id,
        table,
        settings.command_buffer,
        settings.action_timeout(),
    ))
}

/// Starts a task for an already assembled table.
pub fn spawn_with(
    table_id: TableId,
    table: Table,
    command_buffer: usize,
    action_timeout: Option<Duration>,
) -> (TableHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(command_buffer.max(1));
    tracing::info!(table_id = %table_id, "table task starting");
    let task = tokio::spawn(run(table_id.clone(), table, rx, action_timeout));
    (TableHandle { table_id, tx }, task)
}

impl TableHandle {
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    pub async fn seat_player(&self, seat: TableSeat) -> Result<(), TableError> {
        self.call(|reply| Command::SeatPlayer { seat, reply }).await
    }

    pub async fn set_sitting_out(&self, seat_id: SeatId, sitting_out: bool) -> Result<(), TableError> {
        self.call(|reply| Command::SitOut {
            seat_id,
            sitting_out,
            reply,
        })
        .await
    }

    pub async fn seats(&self) -> Result<Vec<TableSeat>, TableError> {
        self.ask(|reply| Command::Seats { reply }).await
    }

    pub async fn start_hand(&self) -> Result<String, TableError> {
        self.call(|reply| Command::StartHand { reply }).await
    }

    pub async fn act(&self, hand_id: &str, seat_id: SeatId, action: PlayerAction) -> Result<(), TableError> {
        let hand_id = hand_id.to_string();
        self.call(|reply| Command::Act {
            hand_id,
            seat_id,
            action,
            reply,
        })
        .await
    }

    pub async fn force_timeout(&self, hand_id: &str, seat_id: SeatId) -> Result<(), TableError> {
        let hand_id = hand_id.to_string();
        self.call(|reply| Command::Timeout {
            hand_id,
            seat_id,
            reply,
        })
        .await
    }

    /// The hand as `viewer` may see it; other seats' hole cards stay hidden
    /// until they are shown down.
    pub async fn hand_state(
        &self,
        hand_id: &str,
        viewer: Viewer,
    ) -> Result<Option<HandState>, TableError> {
        let hand_id = hand_id.to_string();
        self.ask(|reply| Command::State {
            hand_id,
            viewer,
            reply,
        })
        .await
    }

    pub async fn abort_hand(&self, hand_id: &str, reason: &str) -> Result<(), TableError> {
        let (hand_id, reason) = (hand_id.to_string(), reason.to_string());
        self.call(|reply| Command::Abort {
            hand_id,
            reason,
            reply,
        })
        .await
    }

    /// Restores the hand from its latest checkpoint and returns it as an
    /// observer sees it.
    pub async fn recover_from_checkpoint(&self, hand_id: &str) -> Result<HandState, TableError> {
        let hand_id = hand_id.to_string();
        self.call(|reply| Command::Recover { hand_id, reply }).await
    }

    pub async fn retry_settlement(&self, hand_id: &str) -> Result<(), TableError> {
        let hand_id = hand_id.to_string();
        self.call(|reply| Command::RetrySettlement { hand_id, reply })
            .await
    }

    /// Asks the task to stop once it has handled everything queued before.
    pub async fn shutdown(&self) -> Result<(), TableError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| TableError::Closed(self.table_id.clone()))
    }

    async fn call<T, F>(&self, make: F) -> Result<T, TableError>
    where
        F: FnOnce(Reply<T>) -> Command,
    {
        Ok(self.ask(make).await??)
    }

    async fn ask<T, F>(&self, make: F) -> Result<T, TableError>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| TableError::Closed(self.table_id.clone()))?;
        rx.await
            .map_err(|_| TableError::Closed(self.table_id.clone()))
    }
}

/// Seat on the clock and when its time runs out.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Deadline {
    hand_id: String,
    seat_id: SeatId,
    /// Length of the action log when the clock started
    decision: usize,
    at: Instant,
}

async fn run(
    table_id: TableId,
    mut table: Table,
    mut rx: mpsc::Receiver<Command>,
    action_timeout: Option<Duration>,
) {
    let mut deadline: Option<Deadline> = None;
    loop {
        let cmd = match deadline.as_ref().map(|d| d.at) {
            Some(at) => tokio::select! {
                cmd = rx.recv() => cmd,
                _ = tokio::time::sleep_until(at) => {
                    if let Some(expired) = deadline.take() {
                        expire(&table_id, &mut table, &expired);
                    }
                    deadline = arm(&table, action_timeout, None);
                    continue;
                }
            },
            None => rx.recv().await,
        };
        let Some(cmd) = cmd else {
            break;
        };
        if matches!(cmd, Command::Shutdown) {
            break;
        }
        handle(&mut table, cmd);
        deadline = arm(&table, action_timeout, deadline.take());
    }
    tracing::info!(table_id = %table_id, "table task stopped");
}

fn handle(table: &mut Table, cmd: Command) {
    // A dropped receiver only means the caller stopped waiting
    match cmd {
        Command::SeatPlayer { seat, reply } => {
            let _ = reply.send(table.seat_player(seat));
        }
        Command::SitOut {
            seat_id,
            sitting_out,
            reply,
        } => {
            let _ = reply.send(table.set_sitting_out(seat_id, sitting_out));
        }
        Command::Seats { reply } => {
            let _ = reply.send(table.seats());
        }
        Command::StartHand { reply } => {
            let _ = reply.send(table.start_hand());
        }
        Command::Act {
            hand_id,
            seat_id,
            action,
            reply,
        } => {
            let _ = reply.send(table.apply_action(&hand_id, seat_id, action));
        }
        Command::Timeout {
            hand_id,
            seat_id,
            reply,
        } => {
            let _ = reply.send(table.force_timeout(&hand_id, seat_id));
        }
        Command::State {
            hand_id,
            viewer,
            reply,
        } => {
            let _ = reply.send(table.hand_state_for(&hand_id, viewer.seat()));
        }
        Command::Abort {
            hand_id,
            reason,
            reply,
        } => {
            let _ = reply.send(table.abort_hand(&hand_id, &reason));
        }
        Command::Recover { hand_id, reply } => {
            let res = table
                .recover_from_checkpoint(&hand_id)
                .map(|full| table.hand_state_for(&hand_id, None).unwrap_or(full));
            let _ = reply.send(res);
        }
        Command::RetrySettlement { hand_id, reply } => {
            let _ = reply.send(table.retry_settlement(&hand_id));
        }
        Command::Shutdown => {}
    }
}

/// Puts the seat to act on the clock. The running clock is kept only while
/// the same decision is pending: same hand, same seat, no action since.
fn arm(table: &Table, timeout: Option<Duration>, current: Option<Deadline>) -> Option<Deadline> {
    let timeout = timeout?;
    let hand = table.current_hand()?;
    if hand.status() != HandStatus::InProgress {
        return None;
    }
    let seat_id = hand.to_act()?;
    let decision = hand.actions().len();
    match current {
        Some(d) if d.hand_id == hand.id() && d.seat_id == seat_id && d.decision == decision => {
            Some(d)
        }
        _ => Some(Deadline {
            hand_id: hand.id().to_string(),
            seat_id,
            decision,
            at: Instant::now() + timeout,
        }),
    }
}

fn expire(table_id: &str, table: &mut Table, deadline: &Deadline) {
    tracing::warn!(
        table_id = %table_id,
        hand_id = %deadline.hand_id,
        seat = deadline.seat_id,
        "action clock expired"
    );
    if let Err(err) = table.force_timeout(&deadline.hand_id, deadline.seat_id) {
        tracing::error!(
            table_id = %table_id,
            hand_id = %deadline.hand_id,
            error = %err,
            "timeout action failed"
        );
    }
}
