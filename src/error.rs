//! Error types.
//!
//! [`InvariantError`] is raised when the scheduler finds the layout in a
//! state that contradicts its own bookkeeping. The controller flags the
//! affected train and skips it until the error is cleared; other trains
//! keep running.
//!
//! [`ScriptError`] reports authoring problems when converting a route
//! script, [`LayoutError`] reports problems while building a layout.

use thiserror::Error;

use crate::layout::{BlockId, Direction, FeedbackId, RouteId, StationId, TrainId, TurnoutId};

/// Bookkeeping contradictions detected while processing events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("train {train} stopped in {actual} but its destination is {expected}")]
    DestinationBlockMismatch {
        train: TrainId,
        expected: BlockId,
        actual: BlockId,
    },

    #[error("train {train} reached its destination heading {actual}, expected {expected}")]
    DestinationDirectionMismatch {
        train: TrainId,
        expected: Direction,
        actual: Direction,
    },

    #[error("block {block} has no usable feedback for direction {direction}")]
    FeedbackNotFound { block: BlockId, direction: Direction },

    #[error("train {train} is not registered in block {block}")]
    TrainNotFoundInBlock { train: TrainId, block: BlockId },

    #[error("train {0} is not located in any block")]
    TrainNotPlaced(TrainId),

    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("unknown train {0}")]
    UnknownTrain(TrainId),

    #[error("unknown turnout {0}")]
    UnknownTurnout(TurnoutId),

    #[error("unknown feedback {0}")]
    UnknownFeedback(FeedbackId),

    #[error("unknown station {0}")]
    UnknownStation(StationId),

    #[error("unknown route {0}")]
    UnknownRoute(RouteId),

    #[error("route {route} does not start in block {block} where train {train} stands")]
    RouteStartMismatch {
        route: RouteId,
        train: TrainId,
        block: BlockId,
    },

    #[error("no transition path from {from} to {to}")]
    MissingTransition { from: BlockId, to: BlockId },

    #[error("route step {index} is out of range for route {route}")]
    RouteStepOutOfRange { route: RouteId, index: usize },

    #[error("event cascade deeper than {0} levels")]
    CascadeTooDeep(usize),
}

/// Problems found while converting a route script into a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script has no commands")]
    EmptyScript,

    #[error("script must begin with a start command")]
    MissingStartCommand,

    #[error("start command {0} appears after the first command")]
    UnexpectedStartCommand(String),

    #[error("command {command} references undefined block {block:?}")]
    UndefinedBlock { command: String, block: String },

    #[error("command {command} references undefined station {station:?}")]
    UndefinedStation { command: String, station: String },

    #[error("command {0} does not specify a direction")]
    UndefinedDirection(String),

    #[error("loop {0} must repeat at least once")]
    InvalidLoopCount(String),
}

/// Problems found while building a layout registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    #[error("{kind} {id} referenced by {by} does not exist")]
    MissingReference {
        kind: &'static str,
        id: u32,
        by: String,
    },

    #[error("socket {0} is already linked")]
    SocketInUse(String),

    #[error("block {0} is already reserved")]
    BlockOccupied(BlockId),

    #[error("position {position} is outside block {block}")]
    InvalidPosition { block: BlockId, position: usize },

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

pub type Result<T> = std::result::Result<T, InvariantError>;
