//! Routes, route steps and stations.

use super::block::{BlockCategory, Direction};
use super::ids::{BlockId, RouteId, StationId};

/// What a train is asked to reach at one step of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum StepTarget {
    /// A specific block travelled in a specific direction.
    Block { block: BlockId, direction: Direction },
    /// Any suitable block of a station.
    Station { station: StationId },
}

/// One step of a route.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteStep {
    pub target: StepTarget,
    /// Stop here for this long before continuing.
    pub waiting_time_ms: Option<u64>,
    /// Script command this step was generated from.
    pub source: Option<String>,
}

impl RouteStep {
    /// A pass-through block step.
    pub fn block(block: BlockId, direction: Direction) -> Self {
        Self {
            target: StepTarget::Block { block, direction },
            waiting_time_ms: None,
            source: None,
        }
    }

    /// A station step. Trains always stop at stations.
    pub fn station(station: StationId) -> Self {
        Self {
            target: StepTarget::Station { station },
            waiting_time_ms: None,
            source: None,
        }
    }

    /// Set the stop duration.
    pub fn with_waiting_time_ms(mut self, ms: u64) -> Self {
        self.waiting_time_ms = Some(ms);
        self
    }

    /// Tag the step with the command that produced it.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Returns true for station steps.
    pub fn is_station(&self) -> bool {
        matches!(self.target, StepTarget::Station { .. })
    }
}

/// Where an automatic-once route must end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Destination {
    pub block: BlockId,
    /// Required travel direction on arrival, any when `None`.
    pub direction: Option<Direction>,
}

/// How a route was produced and how it ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum RouteMode {
    /// Authored route, ends at its last step.
    #[default]
    Fixed,
    /// Generated station to station, runs until the train is finished.
    Automatic,
    /// Generated towards one destination, stops there for good.
    AutomaticOnce { destination: Destination },
}

impl RouteMode {
    /// Returns true for router-generated modes.
    pub const fn is_automatic(&self) -> bool {
        !matches!(self, RouteMode::Fixed)
    }
}

/// An ordered list of steps.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: RouteMode,
    pub steps: Vec<RouteStep>,
}

impl Route {
    /// Create an authored route.
    pub fn fixed(id: RouteId, name: &str, steps: Vec<RouteStep>) -> Self {
        Self {
            id,
            name: name.to_string(),
            mode: RouteMode::Fixed,
            steps,
        }
    }

    /// Index of the last step, `None` for an empty route.
    pub fn last_step_index(&self) -> Option<usize> {
        self.steps.len().checked_sub(1)
    }

    /// Returns true when `index` is the last step.
    pub fn is_last_step(&self, index: usize) -> bool {
        self.last_step_index() == Some(index)
    }
}

/// One block of a station and the direction trains use it in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationElement {
    pub block: BlockId,
    pub direction: Direction,
}

/// A group of interchangeable blocks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub elements: Vec<StationElement>,
}

impl Station {
    /// Create a station.
    pub fn new(id: StationId, name: &str, elements: &[StationElement]) -> Self {
        Self {
            id,
            name: name.to_string(),
            elements: elements.to_vec(),
        }
    }
}

/// A route step resolved to a concrete block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedStep {
    pub block: BlockId,
    pub direction: Direction,
    pub waiting_time_ms: Option<u64>,
    pub is_station: bool,
}

impl ResolvedStep {
    /// Returns true when a train on a route in `mode` must stop in this block.
    ///
    /// Steps with a waiting time and station steps always stop. Station
    /// blocks stop fixed and endless automatic routes; an automatic-once run
    /// only stops at its destination.
    pub fn is_designated_stop(&self, mode: RouteMode, category: BlockCategory) -> bool {
        self.waiting_time_ms.is_some()
            || self.is_station
            || (!matches!(mode, RouteMode::AutomaticOnce { .. })
                && category == BlockCategory::Station)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_step_index() {
        let empty = Route::fixed(RouteId(1), "empty", vec![]);
        assert_eq!(empty.last_step_index(), None);

        let route = Route::fixed(
            RouteId(2),
            "loop",
            vec![
                RouteStep::block(BlockId(1), Direction::Next),
                RouteStep::block(BlockId(2), Direction::Next),
            ],
        );
        assert!(route.is_last_step(1));
        assert!(!route.is_last_step(0));
    }

    #[test]
    fn step_builders() {
        let step = RouteStep::station(StationId(3))
            .with_waiting_time_ms(5_000)
            .with_source("cmd-2");
        assert!(step.is_station());
        assert_eq!(step.waiting_time_ms, Some(5_000));
        assert_eq!(step.source.as_deref(), Some("cmd-2"));
    }

    #[test]
    fn automatic_modes() {
        assert!(!RouteMode::Fixed.is_automatic());
        assert!(RouteMode::Automatic.is_automatic());
        let once = RouteMode::AutomaticOnce {
            destination: Destination {
                block: BlockId(9),
                direction: None,
            },
        };
        assert!(once.is_automatic());
    }

    #[test]
    fn station_blocks_stop_all_but_once_runs() {
        let plain = ResolvedStep {
            block: BlockId(2),
            direction: Direction::Next,
            waiting_time_ms: None,
            is_station: false,
        };
        let once = RouteMode::AutomaticOnce {
            destination: Destination {
                block: BlockId(9),
                direction: None,
            },
        };
        assert!(plain.is_designated_stop(RouteMode::Fixed, BlockCategory::Station));
        assert!(plain.is_designated_stop(RouteMode::Automatic, BlockCategory::Station));
        assert!(!plain.is_designated_stop(once, BlockCategory::Station));
        assert!(!plain.is_designated_stop(RouteMode::Fixed, BlockCategory::Free));

        let waiting = ResolvedStep {
            waiting_time_ms: Some(1_000),
            ..plain
        };
        assert!(waiting.is_designated_stop(once, BlockCategory::Free));
    }
}
