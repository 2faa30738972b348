//! Layout session simulator.
//!
//! Runs a [`Controller`] on the tokio session driver against a simulated
//! command station. The simulated station confirms every turnout it is
//! asked to switch, and a walker plays the train's feedback contacts in
//! travel order until the train is handed back to manual control.
//!
//! # Usage
//!
//! Demo layout (five blocks in a row, one fixed route):
//! ```sh
//! cargo run --bin layout_sim --features runtime
//! ```
//!
//! Your own layout document:
//! ```sh
//! cargo run --bin layout_sim --features runtime -- layout.json <train-id> <route-id>
//! ```
//!
//! Set `LOG_LEVEL=debug` to follow every handler decision.

use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{info, warn};

use trainz_dispatch::config::{Config, SessionConfig};
use trainz_dispatch::controller::{Controller, RouteAssignment, TrainSnapshot};
use trainz_dispatch::document::LayoutDocument;
use trainz_dispatch::hal::mock::line_layout;
use trainz_dispatch::layout::{
    BlockId, Direction, Layout, Route, RouteId, RouteStep, Scheduling, Train, TrainId, TrainState,
};
use trainz_dispatch::logger::LoggerConfig;
use trainz_dispatch::reservation::ReservationManager;
use trainz_dispatch::runtime::{spawn_session, SessionHandle};
use trainz_dispatch::traits::{CommandInterface, InterfaceCommand, InterfaceEvent};

/// Session tick interval
const TICK_MS: u64 = 50;

/// Time a simulated train needs from one feedback contact to the next
const CONTACT_SPACING_MS: u64 = 600;

/// Give up after this many contacts
const MAX_CONTACTS: usize = 200;

// ============================================================================
// Simulated command station
// ============================================================================

/// Logs every command and echoes turnout positions back as confirmations.
struct SimStation {
    echo: mpsc::UnboundedSender<InterfaceEvent>,
}

impl CommandInterface for SimStation {
    type Error = mpsc::error::SendError<InterfaceEvent>;

    fn execute(&mut self, command: &InterfaceCommand) -> Result<(), Self::Error> {
        info!(command = command.name(), ?command, "station");
        if let InterfaceCommand::SetTurnout { address, state } = command {
            self.echo.send(InterfaceEvent::TurnoutChanged {
                address: *address,
                state: *state,
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    LoggerConfig::from_env().init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (layout, train, route) = match args.as_slice() {
        [] => demo_layout()?,
        [path, train, route] => {
            let layout = LayoutDocument::load_from_path(path)?.into_layout()?;
            let train = TrainId(train.parse().context("train id must be a number")?);
            let route = RouteId(route.parse().context("route id must be a number")?);
            (layout, train, route)
        }
        _ => bail!("usage: layout_sim [<layout.json> <train-id> <route-id>]"),
    };

    println!("=================================");
    println!("  trainz-dispatch layout simulator");
    println!("=================================");

    let (echo, mut confirmations) = mpsc::unbounded_channel();
    let config = Config::default().with_session(SessionConfig::default().with_name("layout_sim"));
    let walker = layout.clone();
    let controller = Controller::new(layout, SimStation { echo }, config);
    let session = spawn_session(controller, Duration::from_millis(TICK_MS));

    // Turnout confirmations flow back into the session
    let forwarder = session.event_sender();
    tokio::spawn(async move {
        while let Some(event) = confirmations.recv().await {
            if forwarder.send(event).await.is_err() {
                break;
            }
        }
    });

    let report = session.start(train, RouteAssignment::Fixed(route)).await?;
    if !report.is_clean() {
        bail!("train {train} halted on start: {:?}", report.errors);
    }

    let outcome = walk(&session, &walker, train).await;
    let controller = session.shutdown().await?;
    outcome?;

    let snapshot = controller.snapshot(train)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Play the train's contacts until it is back under manual control.
async fn walk(
    session: &SessionHandle<SimStation>,
    layout: &Layout,
    train: TrainId,
) -> anyhow::Result<()> {
    for _ in 0..MAX_CONTACTS {
        tokio::time::sleep(Duration::from_millis(CONTACT_SPACING_MS)).await;
        let snapshot = train_snapshot(session, train).await?;
        if let Some(error) = &snapshot.runtime_error {
            bail!("train {train} halted: {error}");
        }
        if snapshot.scheduling == Scheduling::Unmanaged && snapshot.state == TrainState::Stopped {
            info!(train = %train, block = ?snapshot.block, "train handed back");
            return Ok(());
        }
        if snapshot.requested_speed_kph == 0 {
            // Waiting at a station or for a block to free up
            continue;
        }
        let Some((device_id, contact_id)) = next_contact(layout, &snapshot)? else {
            warn!(train = %train, "no contact ahead, waiting");
            continue;
        };
        for detected in [true, false] {
            session
                .interface_event(InterfaceEvent::Feedback {
                    device_id,
                    contact_id,
                    detected,
                })
                .await?;
        }
    }
    bail!("train {train} did not finish within {MAX_CONTACTS} contacts")
}

async fn train_snapshot(
    session: &SessionHandle<SimStation>,
    train: TrainId,
) -> anyhow::Result<TrainSnapshot> {
    session
        .snapshots()
        .await?
        .into_iter()
        .find(|s| s.id == train)
        .with_context(|| format!("train {train} is not on the layout"))
}

/// Contact the train reaches next: inside its block, else the entry
/// contact of the first leading block.
fn next_contact(layout: &Layout, snapshot: &TrainSnapshot) -> anyhow::Result<Option<(u16, u16)>> {
    let Some(block) = snapshot.block else {
        return Ok(None);
    };
    let block = layout.block(block)?;
    let feedback = match block.feedback_ahead(snapshot.direction, snapshot.position) {
        Some((feedback, _)) => Some(feedback),
        None => match snapshot.leading_blocks.first() {
            Some(next) => {
                let direction = arrival_direction(layout, block.id, *next, snapshot.direction);
                layout.block(*next)?.entry_feedback(direction)
            }
            None => None,
        },
    };
    Ok(match feedback {
        Some(id) => {
            let feedback = layout.feedback(id)?;
            Some((feedback.device_id, feedback.contact_id))
        }
        None => None,
    })
}

/// Direction the train travels in `to` after leaving `from`.
fn arrival_direction(layout: &Layout, from: BlockId, to: BlockId, direction: Direction) -> Direction {
    layout
        .reachable_from(from, direction)
        .into_iter()
        .find(|reach| reach.block == to)
        .map(|reach| reach.direction)
        .unwrap_or(direction)
}

/// Five blocks in a row with a station stop in the middle.
fn demo_layout() -> anyhow::Result<(Layout, TrainId, RouteId)> {
    let mut layout = line_layout(5)?;
    layout.add_train(Train::new(TrainId(1), "ICE", 3).with_max_speed_kph(160))?;
    let steps = (1..=5)
        .map(|id| {
            let step = RouteStep::block(BlockId(id), Direction::Next);
            if id == 3 {
                step.with_waiting_time_ms(3_000)
            } else {
                step
            }
        })
        .collect();
    layout.add_route(Route::fixed(RouteId(1), "west to east", steps))?;

    ReservationManager::default().place_train(&mut layout, TrainId(1), BlockId(1), Direction::Next, 1)?;
    Ok((layout, TrainId(1), RouteId(1)))
}
