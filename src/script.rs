//! Route scripts.
//!
//! A script is the authored form of a fixed route: a start command naming
//! the block the train departs from, followed by moves to blocks or
//! stations and loops repeating a group of moves. [`RouteScript::to_route`]
//! flattens it into [`RouteStep`]s, tagging every step with the id of the
//! command it came from.
//!
//! ```rust
//! use trainz_dispatch::hal::mock::line_layout;
//! use trainz_dispatch::layout::{Direction, RouteId};
//! use trainz_dispatch::script::{MoveTarget, RouteScript, ScriptCommand};
//!
//! let layout = line_layout(3).unwrap();
//! let script = RouteScript::new("shuttle")
//!     .with_command(ScriptCommand::start("c1", "B1", Direction::Next))
//!     .with_command(ScriptCommand::go("c2", MoveTarget::block("B3", Direction::Next)));
//!
//! let route = script.to_route(&layout, RouteId(1)).unwrap();
//! assert_eq!(route.steps.len(), 2);
//! assert_eq!(route.steps[1].source.as_deref(), Some("c2"));
//! ```

use crate::error::ScriptError;
use crate::layout::{Direction, Layout, Route, RouteId, RouteMode, RouteStep, StepTarget};

/// Destination of a move command.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum MoveTarget {
    Block {
        name: String,
        direction: Option<Direction>,
        waiting_time_ms: Option<u64>,
    },
    Station {
        name: String,
        waiting_time_ms: Option<u64>,
    },
}

impl MoveTarget {
    pub fn block(name: &str, direction: Direction) -> Self {
        MoveTarget::Block {
            name: name.to_string(),
            direction: Some(direction),
            waiting_time_ms: None,
        }
    }

    pub fn station(name: &str) -> Self {
        MoveTarget::Station {
            name: name.to_string(),
            waiting_time_ms: None,
        }
    }

    /// Stop at the target for `ms` before continuing.
    pub fn waiting(mut self, ms: u64) -> Self {
        match &mut self {
            MoveTarget::Block {
                waiting_time_ms, ..
            }
            | MoveTarget::Station {
                waiting_time_ms, ..
            } => *waiting_time_ms = Some(ms),
        }
        self
    }
}

/// What a script command does.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "action", rename_all = "snake_case"))]
pub enum ScriptAction {
    /// Departure block. Must be the first command and only appear once.
    Start {
        block: String,
        direction: Option<Direction>,
    },
    /// Travel to a block or station.
    Move { target: MoveTarget },
    /// Repeat the nested commands.
    Loop {
        repeat: u32,
        commands: Vec<ScriptCommand>,
    },
}

/// One authored command.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScriptCommand {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub action: ScriptAction,
}

impl ScriptCommand {
    pub fn start(id: &str, block: &str, direction: Direction) -> Self {
        Self {
            id: id.to_string(),
            action: ScriptAction::Start {
                block: block.to_string(),
                direction: Some(direction),
            },
        }
    }

    pub fn go(id: &str, target: MoveTarget) -> Self {
        Self {
            id: id.to_string(),
            action: ScriptAction::Move { target },
        }
    }

    pub fn repeat(id: &str, repeat: u32, commands: Vec<ScriptCommand>) -> Self {
        Self {
            id: id.to_string(),
            action: ScriptAction::Loop { repeat, commands },
        }
    }
}

/// An authored route.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteScript {
    pub name: String,
    pub commands: Vec<ScriptCommand>,
}

impl RouteScript {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            commands: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: ScriptCommand) -> Self {
        self.commands.push(command);
        self
    }

    /// Flatten the script into a fixed route.
    pub fn to_route(&self, layout: &Layout, id: RouteId) -> Result<Route, ScriptError> {
        let (first, rest) = self.commands.split_first().ok_or(ScriptError::EmptyScript)?;
        let ScriptAction::Start { block, direction } = &first.action else {
            return Err(ScriptError::MissingStartCommand);
        };

        let start = layout
            .block_named(block)
            .ok_or_else(|| ScriptError::UndefinedBlock {
                command: first.id.clone(),
                block: block.clone(),
            })?;
        let direction = direction.ok_or_else(|| ScriptError::UndefinedDirection(first.id.clone()))?;

        let mut steps = vec![RouteStep::block(start.id, direction).with_source(&first.id)];
        Self::expand(layout, rest, &mut steps)?;

        Ok(Route {
            id,
            name: self.name.clone(),
            mode: RouteMode::Fixed,
            steps,
        })
    }

    fn expand(
        layout: &Layout,
        commands: &[ScriptCommand],
        steps: &mut Vec<RouteStep>,
    ) -> Result<(), ScriptError> {
        for command in commands {
            match &command.action {
                ScriptAction::Start { .. } => {
                    return Err(ScriptError::UnexpectedStartCommand(command.id.clone()));
                }
                ScriptAction::Move { target } => {
                    steps.push(Self::step(layout, &command.id, target)?);
                }
                ScriptAction::Loop { repeat, commands } => {
                    if *repeat == 0 {
                        return Err(ScriptError::InvalidLoopCount(command.id.clone()));
                    }
                    for _ in 0..*repeat {
                        Self::expand(layout, commands, steps)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn step(layout: &Layout, command: &str, target: &MoveTarget) -> Result<RouteStep, ScriptError> {
        let (target, waiting_time_ms) = match target {
            MoveTarget::Block {
                name,
                direction,
                waiting_time_ms,
            } => {
                let block = layout
                    .block_named(name)
                    .ok_or_else(|| ScriptError::UndefinedBlock {
                        command: command.to_string(),
                        block: name.clone(),
                    })?;
                let direction =
                    direction.ok_or_else(|| ScriptError::UndefinedDirection(command.to_string()))?;
                (
                    StepTarget::Block {
                        block: block.id,
                        direction,
                    },
                    *waiting_time_ms,
                )
            }
            MoveTarget::Station {
                name,
                waiting_time_ms,
            } => {
                let station =
                    layout
                        .station_named(name)
                        .ok_or_else(|| ScriptError::UndefinedStation {
                            command: command.to_string(),
                            station: name.clone(),
                        })?;
                (StepTarget::Station { station: station.id }, *waiting_time_ms)
            }
        };
        Ok(RouteStep {
            target,
            waiting_time_ms,
            source: Some(command.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::line_layout;
    use crate::layout::{BlockId, Station, StationElement, StationId};

    fn layout() -> Layout {
        let mut layout = line_layout(4).unwrap();
        layout
            .add_station(Station::new(
                StationId(1),
                "Central",
                &[StationElement {
                    block: BlockId(3),
                    direction: Direction::Next,
                }],
            ))
            .unwrap();
        layout
    }

    #[test]
    fn converts_moves_and_stations() {
        let script = RouteScript::new("r")
            .with_command(ScriptCommand::start("s", "B1", Direction::Next))
            .with_command(ScriptCommand::go("m1", MoveTarget::block("B2", Direction::Next)))
            .with_command(ScriptCommand::go("m2", MoveTarget::station("Central").waiting(30_000)));

        let route = script.to_route(&layout(), RouteId(5)).unwrap();
        assert_eq!(route.mode, RouteMode::Fixed);
        assert_eq!(route.steps.len(), 3);
        assert_eq!(
            route.steps[2].target,
            StepTarget::Station {
                station: StationId(1)
            }
        );
        assert_eq!(route.steps[2].waiting_time_ms, Some(30_000));
    }

    #[test]
    fn loops_repeat_their_commands() {
        let script = RouteScript::new("r")
            .with_command(ScriptCommand::start("s", "B1", Direction::Next))
            .with_command(ScriptCommand::repeat(
                "l",
                2,
                vec![
                    ScriptCommand::go("a", MoveTarget::block("B2", Direction::Next)),
                    ScriptCommand::go("b", MoveTarget::block("B3", Direction::Next)),
                ],
            ));
        let route = script.to_route(&layout(), RouteId(1)).unwrap();
        let sources: Vec<_> = route.steps.iter().map(|s| s.source.clone().unwrap()).collect();
        assert_eq!(sources, vec!["s", "a", "b", "a", "b"]);
    }

    #[test]
    fn empty_script_rejected() {
        let err = RouteScript::new("r").to_route(&layout(), RouteId(1)).unwrap_err();
        assert_eq!(err, ScriptError::EmptyScript);
    }

    #[test]
    fn must_begin_with_start() {
        let script = RouteScript::new("r")
            .with_command(ScriptCommand::go("m", MoveTarget::block("B2", Direction::Next)));
        assert_eq!(
            script.to_route(&layout(), RouteId(1)).unwrap_err(),
            ScriptError::MissingStartCommand
        );
    }

    #[test]
    fn second_start_rejected() {
        let script = RouteScript::new("r")
            .with_command(ScriptCommand::start("s1", "B1", Direction::Next))
            .with_command(ScriptCommand::start("s2", "B2", Direction::Next));
        assert_eq!(
            script.to_route(&layout(), RouteId(1)).unwrap_err(),
            ScriptError::UnexpectedStartCommand("s2".to_string())
        );
    }

    #[test]
    fn undefined_references() {
        let bad_block = RouteScript::new("r")
            .with_command(ScriptCommand::start("s", "B1", Direction::Next))
            .with_command(ScriptCommand::go("m", MoveTarget::block("Nowhere", Direction::Next)));
        assert!(matches!(
            bad_block.to_route(&layout(), RouteId(1)),
            Err(ScriptError::UndefinedBlock { .. })
        ));

        let bad_station = RouteScript::new("r")
            .with_command(ScriptCommand::start("s", "B1", Direction::Next))
            .with_command(ScriptCommand::go("m", MoveTarget::station("Harbour")));
        assert!(matches!(
            bad_station.to_route(&layout(), RouteId(1)),
            Err(ScriptError::UndefinedStation { .. })
        ));

        let no_direction = RouteScript::new("r")
            .with_command(ScriptCommand::start("s", "B1", Direction::Next))
            .with_command(ScriptCommand::go(
                "m",
                MoveTarget::Block {
                    name: "B2".to_string(),
                    direction: None,
                    waiting_time_ms: None,
                },
            ));
        assert_eq!(
            no_direction.to_route(&layout(), RouteId(1)).unwrap_err(),
            ScriptError::UndefinedDirection("m".to_string())
        );
    }

    #[test]
    fn zero_loop_rejected() {
        let script = RouteScript::new("r")
            .with_command(ScriptCommand::start("s", "B1", Direction::Next))
            .with_command(ScriptCommand::repeat("l", 0, vec![]));
        assert_eq!(
            script.to_route(&layout(), RouteId(1)).unwrap_err(),
            ScriptError::InvalidLoopCount("l".to_string())
        );
    }
}
