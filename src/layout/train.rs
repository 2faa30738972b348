//! Trains and their scheduling state.

use super::block::Direction;
use super::ids::{BlockId, RouteId, TrainId, TurnoutId};
use crate::error::InvariantError;
use crate::speed::Decoder;

/// Movement state of a train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TrainState {
    #[default]
    Stopped,
    Running,
    Braking,
    Stopping,
}

/// Who drives the train.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum Scheduling {
    /// Driven by hand, ignored by the scheduler.
    #[default]
    Unmanaged,
    /// Driven by the scheduler. `finishing` asks it to stop at the next
    /// designated stop and hand the train back.
    Managed { finishing: bool },
}

impl Scheduling {
    /// Returns true when the scheduler drives the train.
    pub const fn is_managed(&self) -> bool {
        matches!(self, Scheduling::Managed { .. })
    }

    /// Returns true when the train has been asked to finish.
    pub const fn is_finishing(&self) -> bool {
        matches!(self, Scheduling::Managed { finishing: true })
    }
}

/// Why a train is braking or stopping. A train carries at most one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum StopTrigger {
    /// Stop and hand the train back to manual control.
    CompleteStop,
    /// Stop until the blocks ahead can be reserved.
    TemporaryStop,
    /// Stop at a designated stop and restart after a delay.
    StopAndRestart { after_ms: u64 },
}

/// Blocks and turnouts held by a train, one segment per block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedSegment {
    pub block: BlockId,
    pub direction: Direction,
    /// Turnouts between the previous segment and this block.
    pub turnouts: Vec<TurnoutId>,
    /// Route step this block belongs to.
    pub step: usize,
}

/// A train on the layout.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Train {
    pub id: TrainId,
    pub name: String,
    /// Locomotive decoder address.
    pub address: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    pub decoder: Decoder,
    pub locomotive_length_cm: Option<f64>,
    pub wagons_length_cm: Option<f64>,
    pub max_speed_kph: u16,
    /// Overrides the scheduler's default look-ahead.
    pub max_leading_blocks: Option<usize>,
    /// Ramp speed changes instead of jumping.
    #[cfg_attr(feature = "serde", serde(default))]
    pub inertia: bool,

    /// Block holding the head of the train.
    pub block: Option<BlockId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub position: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    pub direction: Direction,

    #[cfg_attr(feature = "serde", serde(skip))]
    pub state: TrainState,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub scheduling: Scheduling,
    #[cfg_attr(feature = "serde", serde(skip))]
    stop_trigger: Option<StopTrigger>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub route: Option<RouteId>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub route_step_index: usize,
    /// Step the current run of the route started from.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub start_route_index: usize,
    /// Blocks reserved ahead of the head, nearest first.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub leading: Vec<ReservedSegment>,
    /// Blocks under the train, tail first, head last.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub occupied: Vec<ReservedSegment>,
    /// Speed last asked for by the scheduler.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub requested_speed_kph: u16,
    /// Speed step last sent to the decoder.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub speed_steps: u8,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub restart_at_ms: Option<u64>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub runtime_error: Option<InvariantError>,
}

impl Train {
    /// Create an unplaced, unmanaged train.
    pub fn new(id: TrainId, name: &str, address: u16) -> Self {
        Self {
            id,
            name: name.to_string(),
            address,
            decoder: Decoder::default(),
            locomotive_length_cm: None,
            wagons_length_cm: None,
            max_speed_kph: 120,
            max_leading_blocks: None,
            inertia: true,
            block: None,
            position: 0,
            direction: Direction::Next,
            state: TrainState::Stopped,
            scheduling: Scheduling::Unmanaged,
            stop_trigger: None,
            route: None,
            route_step_index: 0,
            start_route_index: 0,
            leading: Vec::new(),
            occupied: Vec::new(),
            requested_speed_kph: 0,
            speed_steps: 0,
            restart_at_ms: None,
            runtime_error: None,
        }
    }

    /// Set the decoder protocol.
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Set locomotive and wagon lengths.
    pub fn with_length_cm(mut self, locomotive: f64, wagons: f64) -> Self {
        self.locomotive_length_cm = Some(locomotive);
        self.wagons_length_cm = Some(wagons);
        self
    }

    /// Set the top speed.
    pub fn with_max_speed_kph(mut self, kph: u16) -> Self {
        self.max_speed_kph = kph;
        self
    }

    /// Set a per-train look-ahead.
    pub fn with_max_leading_blocks(mut self, blocks: usize) -> Self {
        self.max_leading_blocks = Some(blocks.max(1));
        self
    }

    /// Enable or disable speed ramps.
    pub fn with_inertia(mut self, inertia: bool) -> Self {
        self.inertia = inertia;
        self
    }

    /// Total length, `None` when the locomotive length is unknown.
    pub fn length_cm(&self) -> Option<f64> {
        self.locomotive_length_cm
            .map(|loco| loco + self.wagons_length_cm.unwrap_or(0.0))
    }

    pub fn is_managed(&self) -> bool {
        self.scheduling.is_managed()
    }

    pub fn is_finishing(&self) -> bool {
        self.scheduling.is_finishing()
    }

    pub fn stop_trigger(&self) -> Option<StopTrigger> {
        self.stop_trigger
    }

    /// Replace the stop trigger. Any pending restart is dropped.
    pub fn set_stop_trigger(&mut self, trigger: StopTrigger) {
        self.stop_trigger = Some(trigger);
        self.restart_at_ms = None;
    }

    /// Clear the stop trigger and any pending restart.
    pub fn clear_stop_trigger(&mut self) {
        self.stop_trigger = None;
        self.restart_at_ms = None;
    }

    /// Milliseconds left before a scheduled restart, `None` when none is pending.
    pub fn time_until_automatic_restart(&self, now_ms: u64) -> Option<u64> {
        self.restart_at_ms.map(|at| at.saturating_sub(now_ms))
    }

    /// Forget everything the scheduler knows about the train, keeping its
    /// configuration and where it stands.
    pub fn reset_session_state(&mut self) {
        self.state = TrainState::Stopped;
        self.scheduling = Scheduling::Unmanaged;
        self.clear_stop_trigger();
        self.route = None;
        self.route_step_index = 0;
        self.start_route_index = 0;
        self.leading.clear();
        self.occupied.clear();
        self.requested_speed_kph = 0;
        self.speed_steps = 0;
        self.runtime_error = None;
    }

    /// Block ids currently ahead of the head.
    pub fn leading_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.leading.iter().map(|s| s.block)
    }

    /// Block ids under the train, tail first.
    pub fn occupied_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.occupied.iter().map(|s| s.block)
    }
}
