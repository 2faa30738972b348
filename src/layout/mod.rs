//! Layout registry.
//!
//! A [`Layout`] owns every block, turnout, feedback, train, station and
//! route, plus the transitions linking block and turnout sockets. Elements
//! are keyed by typed ids in ordered maps, so iteration order (and with it
//! event dispatch order) is deterministic.
//!
//! # Building a layout
//!
//! ```rust
//! use trainz_dispatch::layout::*;
//!
//! let mut layout = Layout::new();
//! layout.add_feedback(Feedback::new(FeedbackId(1), "F1", 1, 1)).unwrap();
//! layout.add_feedback(Feedback::new(FeedbackId(2), "F2", 1, 2)).unwrap();
//! layout
//!     .add_block(Block::new(BlockId(1), "West", BlockCategory::Free).with_feedbacks(&[FeedbackId(1)]))
//!     .unwrap();
//! layout
//!     .add_block(Block::new(BlockId(2), "East", BlockCategory::Station).with_feedbacks(&[FeedbackId(2)]))
//!     .unwrap();
//! layout
//!     .link(SocketRef::block(BlockId(1), BlockSide::Next), SocketRef::block(BlockId(2), BlockSide::Previous))
//!     .unwrap();
//!
//! let path = layout.path_between(BlockId(1), Direction::Next, BlockId(2), Direction::Next);
//! assert_eq!(path, Some(vec![]));
//! ```

mod block;
mod ids;
mod route;
mod train;
mod turnout;

pub use block::*;
pub use ids::*;
pub use route::*;
pub use train::*;
pub use turnout::*;

use std::collections::BTreeMap;

use crate::error::{InvariantError, LayoutError};

/// Turnout chains longer than this are treated as unreachable.
const MAX_TURNOUT_CHAIN: usize = 32;

// ============================================================================
// Feedback
// ============================================================================

/// A track contact reporting train presence.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Feedback {
    pub id: FeedbackId,
    pub name: String,
    /// Feedback module address.
    pub device_id: u16,
    /// Contact number on the module.
    pub contact_id: u16,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub detected: bool,
}

impl Feedback {
    pub fn new(id: FeedbackId, name: &str, device_id: u16, contact_id: u16) -> Self {
        Self {
            id,
            name: name.to_string(),
            device_id,
            contact_id,
            detected: false,
        }
    }
}

// ============================================================================
// Sockets and transitions
// ============================================================================

/// A connection point of a block or turnout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum SocketRef {
    Block { block: BlockId, side: BlockSide },
    Turnout { turnout: TurnoutId, socket: u8 },
}

impl SocketRef {
    pub const fn block(block: BlockId, side: BlockSide) -> Self {
        SocketRef::Block { block, side }
    }

    pub const fn turnout(turnout: TurnoutId, socket: u8) -> Self {
        SocketRef::Turnout { turnout, socket }
    }
}

impl core::fmt::Display for SocketRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SocketRef::Block { block, side } => write!(f, "{block}:{side:?}"),
            SocketRef::Turnout { turnout, socket } => write!(f, "{turnout}:{socket}"),
        }
    }
}

/// A piece of track joining two sockets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transition {
    pub a: SocketRef,
    pub b: SocketRef,
}

/// A block reachable from another one and the turnout states leading there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reach {
    pub block: BlockId,
    /// Travel direction on entering `block`.
    pub direction: Direction,
    pub turnouts: Vec<(TurnoutId, TurnoutState)>,
}

// ============================================================================
// Layout
// ============================================================================

/// Registry of all layout elements.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    blocks: BTreeMap<BlockId, Block>,
    turnouts: BTreeMap<TurnoutId, Turnout>,
    feedbacks: BTreeMap<FeedbackId, Feedback>,
    trains: BTreeMap<TrainId, Train>,
    stations: BTreeMap<StationId, Station>,
    routes: BTreeMap<RouteId, Route>,
    transitions: Vec<Transition>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a block. All of its feedbacks must already be registered.
    pub fn add_block(&mut self, block: Block) -> Result<(), LayoutError> {
        if self.blocks.contains_key(&block.id) {
            return Err(LayoutError::DuplicateId {
                kind: "block",
                id: block.id.0,
            });
        }
        let explicit = [
            block.brake_feedback_next,
            block.stop_feedback_next,
            block.brake_feedback_previous,
            block.stop_feedback_previous,
        ];
        for feedback in block.feedbacks.iter().copied().chain(explicit.into_iter().flatten()) {
            if !self.feedbacks.contains_key(&feedback) {
                return Err(LayoutError::MissingReference {
                    kind: "feedback",
                    id: feedback.0,
                    by: block.id.to_string(),
                });
            }
        }
        self.blocks.insert(block.id, block);
        Ok(())
    }

    pub fn add_turnout(&mut self, turnout: Turnout) -> Result<(), LayoutError> {
        if self.turnouts.contains_key(&turnout.id) {
            return Err(LayoutError::DuplicateId {
                kind: "turnout",
                id: turnout.id.0,
            });
        }
        self.turnouts.insert(turnout.id, turnout);
        Ok(())
    }

    pub fn add_feedback(&mut self, feedback: Feedback) -> Result<(), LayoutError> {
        if self.feedbacks.contains_key(&feedback.id) {
            return Err(LayoutError::DuplicateId {
                kind: "feedback",
                id: feedback.id.0,
            });
        }
        self.feedbacks.insert(feedback.id, feedback);
        Ok(())
    }

    /// Register a train. Its block, if any, is not reserved; placement goes
    /// through the reservation manager.
    pub fn add_train(&mut self, train: Train) -> Result<(), LayoutError> {
        if self.trains.contains_key(&train.id) {
            return Err(LayoutError::DuplicateId {
                kind: "train",
                id: train.id.0,
            });
        }
        self.trains.insert(train.id, train);
        Ok(())
    }

    pub fn add_station(&mut self, station: Station) -> Result<(), LayoutError> {
        if self.stations.contains_key(&station.id) {
            return Err(LayoutError::DuplicateId {
                kind: "station",
                id: station.id.0,
            });
        }
        for element in &station.elements {
            if !self.blocks.contains_key(&element.block) {
                return Err(LayoutError::MissingReference {
                    kind: "block",
                    id: element.block.0,
                    by: station.id.to_string(),
                });
            }
        }
        self.stations.insert(station.id, station);
        Ok(())
    }

    /// Register an authored route, or replace a generated one.
    pub fn add_route(&mut self, route: Route) -> Result<(), LayoutError> {
        if !route.id.is_automatic() && self.routes.contains_key(&route.id) {
            return Err(LayoutError::DuplicateId {
                kind: "route",
                id: route.id.0,
            });
        }
        self.routes.insert(route.id, route);
        Ok(())
    }

    /// Store a generated route, replacing any previous one with the same id.
    pub fn set_route(&mut self, route: Route) {
        self.routes.insert(route.id, route);
    }

    /// Join two sockets with a piece of track.
    pub fn link(&mut self, a: SocketRef, b: SocketRef) -> Result<(), LayoutError> {
        for socket in [a, b] {
            match socket {
                SocketRef::Block { block, .. } if !self.blocks.contains_key(&block) => {
                    return Err(LayoutError::MissingReference {
                        kind: "block",
                        id: block.0,
                        by: "transition".to_string(),
                    });
                }
                SocketRef::Turnout { turnout, socket } => {
                    let t = self.turnouts.get(&turnout).ok_or_else(|| {
                        LayoutError::MissingReference {
                            kind: "turnout",
                            id: turnout.0,
                            by: "transition".to_string(),
                        }
                    })?;
                    if socket >= t.category.socket_count() {
                        return Err(LayoutError::MissingReference {
                            kind: "turnout socket",
                            id: socket as u32,
                            by: turnout.to_string(),
                        });
                    }
                }
                _ => {}
            }
            if self.linked(socket).is_some() {
                return Err(LayoutError::SocketInUse(socket.to_string()));
            }
        }
        self.transitions.push(Transition { a, b });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn block(&self, id: BlockId) -> Result<&Block, InvariantError> {
        self.blocks.get(&id).ok_or(InvariantError::UnknownBlock(id))
    }

    pub fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, InvariantError> {
        self.blocks.get_mut(&id).ok_or(InvariantError::UnknownBlock(id))
    }

    pub fn turnout(&self, id: TurnoutId) -> Result<&Turnout, InvariantError> {
        self.turnouts.get(&id).ok_or(InvariantError::UnknownTurnout(id))
    }

    pub fn turnout_mut(&mut self, id: TurnoutId) -> Result<&mut Turnout, InvariantError> {
        self.turnouts
            .get_mut(&id)
            .ok_or(InvariantError::UnknownTurnout(id))
    }

    pub fn feedback(&self, id: FeedbackId) -> Result<&Feedback, InvariantError> {
        self.feedbacks.get(&id).ok_or(InvariantError::UnknownFeedback(id))
    }

    pub fn feedback_mut(&mut self, id: FeedbackId) -> Result<&mut Feedback, InvariantError> {
        self.feedbacks
            .get_mut(&id)
            .ok_or(InvariantError::UnknownFeedback(id))
    }

    pub fn train(&self, id: TrainId) -> Result<&Train, InvariantError> {
        self.trains.get(&id).ok_or(InvariantError::UnknownTrain(id))
    }

    pub fn train_mut(&mut self, id: TrainId) -> Result<&mut Train, InvariantError> {
        self.trains.get_mut(&id).ok_or(InvariantError::UnknownTrain(id))
    }

    pub fn station(&self, id: StationId) -> Result<&Station, InvariantError> {
        self.stations.get(&id).ok_or(InvariantError::UnknownStation(id))
    }

    pub fn route(&self, id: RouteId) -> Result<&Route, InvariantError> {
        self.routes.get(&id).ok_or(InvariantError::UnknownRoute(id))
    }

    /// Route assigned to `train`, `None` when it has none.
    pub fn route_of(&self, train: TrainId) -> Result<Option<&Route>, InvariantError> {
        match self.train(train)?.route {
            Some(id) => self.route(id).map(Some),
            None => Ok(None),
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn turnouts(&self) -> impl Iterator<Item = &Turnout> {
        self.turnouts.values()
    }

    pub fn feedbacks(&self) -> impl Iterator<Item = &Feedback> {
        self.feedbacks.values()
    }

    pub fn trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Train ids in registration order.
    pub fn train_ids(&self) -> Vec<TrainId> {
        self.trains.keys().copied().collect()
    }

    pub fn block_named(&self, name: &str) -> Option<&Block> {
        self.blocks.values().find(|b| b.name == name)
    }

    pub fn station_named(&self, name: &str) -> Option<&Station> {
        self.stations.values().find(|s| s.name == name)
    }

    pub fn feedback_at(&self, device_id: u16, contact_id: u16) -> Option<FeedbackId> {
        self.feedbacks
            .values()
            .find(|f| f.device_id == device_id && f.contact_id == contact_id)
            .map(|f| f.id)
    }

    pub fn turnout_at(&self, address: u16) -> Option<TurnoutId> {
        self.turnouts
            .values()
            .find(|t| t.address == address)
            .map(|t| t.id)
    }

    pub fn train_at(&self, address: u16) -> Option<TrainId> {
        self.trains
            .values()
            .find(|t| t.address == address)
            .map(|t| t.id)
    }

    /// Snapshot of every block and turnout owner, for comparisons in tests
    /// and diagnostics.
    pub fn reservation_snapshot(&self) -> Vec<(SocketRef, Option<TrainId>)> {
        let blocks = self.blocks.values().map(|b| {
            (
                SocketRef::block(b.id, BlockSide::Previous),
                b.reservation.map(|r| r.train),
            )
        });
        let turnouts = self
            .turnouts
            .values()
            .map(|t| (SocketRef::turnout(t.id, 0), t.reservation));
        blocks.chain(turnouts).collect()
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Socket at the other end of the track attached to `socket`.
    pub fn linked(&self, socket: SocketRef) -> Option<SocketRef> {
        self.transitions.iter().find_map(|t| {
            if t.a == socket {
                Some(t.b)
            } else if t.b == socket {
                Some(t.a)
            } else {
                None
            }
        })
    }

    /// Every block reachable when leaving `block` in `direction`, across any
    /// combination of turnout states.
    pub fn reachable_from(&self, block: BlockId, direction: Direction) -> Vec<Reach> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.walk(
            SocketRef::block(block, direction.exit_side()),
            &mut path,
            &mut out,
        );
        out
    }

    fn walk(
        &self,
        from: SocketRef,
        path: &mut Vec<(TurnoutId, TurnoutState)>,
        out: &mut Vec<Reach>,
    ) {
        if path.len() > MAX_TURNOUT_CHAIN {
            return;
        }
        let Some(to) = self.linked(from) else {
            return;
        };
        match to {
            SocketRef::Block { block, side } => out.push(Reach {
                block,
                direction: Direction::entering_through(side),
                turnouts: path.clone(),
            }),
            SocketRef::Turnout { turnout, socket } => {
                let Some(t) = self.turnouts.get(&turnout) else {
                    return;
                };
                if path.iter().any(|(id, _)| *id == turnout) {
                    return;
                }
                for &state in t.category.states() {
                    if let Some(exit) = t.category.exit_socket(state, socket) {
                        path.push((turnout, state));
                        self.walk(SocketRef::turnout(turnout, exit), path, out);
                        path.pop();
                    }
                }
            }
        }
    }

    /// Turnout states joining `from` (left in `from_direction`) to `to`
    /// (entered in `to_direction`). `None` when no track connects them.
    pub fn path_between(
        &self,
        from: BlockId,
        from_direction: Direction,
        to: BlockId,
        to_direction: Direction,
    ) -> Option<Vec<(TurnoutId, TurnoutState)>> {
        self.reachable_from(from, from_direction)
            .into_iter()
            .find(|r| r.block == to && r.direction == to_direction)
            .map(|r| r.turnouts)
    }

    /// Resolve a route step to a block. Station steps prefer a block already
    /// held by `train`, then the first free one; `None` when every block of
    /// the station is taken.
    pub fn resolve_step(
        &self,
        step: &RouteStep,
        train: TrainId,
    ) -> Result<Option<ResolvedStep>, InvariantError> {
        match step.target {
            StepTarget::Block { block, direction } => {
                self.block(block)?;
                Ok(Some(ResolvedStep {
                    block,
                    direction,
                    waiting_time_ms: step.waiting_time_ms,
                    is_station: false,
                }))
            }
            StepTarget::Station { station } => {
                let station = self.station(station)?;
                let mut owned = None;
                let mut free = None;
                for element in &station.elements {
                    let block = self.block(element.block)?;
                    if block.is_reserved_by(train) && owned.is_none() {
                        owned = Some(*element);
                    } else if block.is_free() && free.is_none() {
                        free = Some(*element);
                    }
                }
                Ok(owned.or(free).map(|element| ResolvedStep {
                    block: element.block,
                    direction: element.direction,
                    waiting_time_ms: step.waiting_time_ms,
                    is_station: true,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// B1 -> T1 -> (straight) B2 / (branch) B3
    fn junction() -> Layout {
        let mut layout = Layout::new();
        for (id, name) in [(1, "F1"), (2, "F2"), (3, "F3")] {
            layout
                .add_feedback(Feedback::new(FeedbackId(id), name, 1, id as u16))
                .unwrap();
        }
        for id in 1..=3 {
            layout
                .add_block(
                    Block::new(BlockId(id), &format!("B{id}"), BlockCategory::Free)
                        .with_feedbacks(&[FeedbackId(id)]),
                )
                .unwrap();
        }
        layout
            .add_turnout(Turnout::new(TurnoutId(1), "T1", TurnoutCategory::SingleLeft, 10))
            .unwrap();
        layout
            .link(
                SocketRef::block(BlockId(1), BlockSide::Next),
                SocketRef::turnout(TurnoutId(1), 0),
            )
            .unwrap();
        layout
            .link(
                SocketRef::turnout(TurnoutId(1), 1),
                SocketRef::block(BlockId(2), BlockSide::Previous),
            )
            .unwrap();
        layout
            .link(
                SocketRef::turnout(TurnoutId(1), 2),
                SocketRef::block(BlockId(3), BlockSide::Previous),
            )
            .unwrap();
        layout
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut layout = junction();
        let err = layout
            .add_block(Block::new(BlockId(1), "again", BlockCategory::Free))
            .unwrap_err();
        assert_eq!(err, LayoutError::DuplicateId { kind: "block", id: 1 });
    }

    #[test]
    fn block_with_unknown_feedback_rejected() {
        let mut layout = Layout::new();
        let err = layout
            .add_block(
                Block::new(BlockId(1), "B1", BlockCategory::Free).with_feedbacks(&[FeedbackId(9)]),
            )
            .unwrap_err();
        assert!(matches!(err, LayoutError::MissingReference { kind: "feedback", id: 9, .. }));
    }

    #[test]
    fn socket_can_only_be_linked_once() {
        let mut layout = junction();
        let err = layout
            .link(
                SocketRef::block(BlockId(1), BlockSide::Next),
                SocketRef::block(BlockId(3), BlockSide::Next),
            )
            .unwrap_err();
        assert!(matches!(err, LayoutError::SocketInUse(_)));
    }

    #[test]
    fn reachable_through_turnout() {
        let layout = junction();
        let reach = layout.reachable_from(BlockId(1), Direction::Next);
        assert_eq!(reach.len(), 2);
        assert_eq!(reach[0].block, BlockId(2));
        assert_eq!(reach[0].turnouts, vec![(TurnoutId(1), TurnoutState::Straight)]);
        assert_eq!(reach[1].block, BlockId(3));
        assert_eq!(reach[1].turnouts, vec![(TurnoutId(1), TurnoutState::BranchLeft)]);
    }

    #[test]
    fn path_respects_entry_direction() {
        let layout = junction();
        assert!(layout
            .path_between(BlockId(1), Direction::Next, BlockId(3), Direction::Next)
            .is_some());
        assert!(layout
            .path_between(BlockId(1), Direction::Next, BlockId(3), Direction::Previous)
            .is_none());
        assert!(layout
            .path_between(BlockId(1), Direction::Previous, BlockId(2), Direction::Next)
            .is_none());
    }

    #[test]
    fn reverse_path_through_trailing_turnout() {
        let layout = junction();
        let path = layout
            .path_between(BlockId(3), Direction::Previous, BlockId(1), Direction::Previous)
            .unwrap();
        assert_eq!(path, vec![(TurnoutId(1), TurnoutState::BranchLeft)]);
    }

    #[test]
    fn station_step_prefers_owned_block() {
        let mut layout = junction();
        layout
            .add_station(Station::new(
                StationId(1),
                "Central",
                &[
                    StationElement { block: BlockId(2), direction: Direction::Next },
                    StationElement { block: BlockId(3), direction: Direction::Next },
                ],
            ))
            .unwrap();
        let step = RouteStep::station(StationId(1));

        let resolved = layout.resolve_step(&step, TrainId(1)).unwrap().unwrap();
        assert_eq!(resolved.block, BlockId(2));
        assert!(resolved.is_station);

        layout.block_mut(BlockId(3)).unwrap().reservation = Some(BlockReservation {
            train: TrainId(1),
            direction: Direction::Next,
        });
        let resolved = layout.resolve_step(&step, TrainId(1)).unwrap().unwrap();
        assert_eq!(resolved.block, BlockId(3));

        layout.block_mut(BlockId(2)).unwrap().reservation = Some(BlockReservation {
            train: TrainId(2),
            direction: Direction::Next,
        });
        layout.block_mut(BlockId(3)).unwrap().reservation = Some(BlockReservation {
            train: TrainId(2),
            direction: Direction::Next,
        });
        assert_eq!(layout.resolve_step(&step, TrainId(1)).unwrap(), None);
    }

    #[test]
    fn lookup_by_hardware_address() {
        let layout = junction();
        assert_eq!(layout.feedback_at(1, 2), Some(FeedbackId(2)));
        assert_eq!(layout.feedback_at(2, 2), None);
        assert_eq!(layout.turnout_at(10), Some(TurnoutId(1)));
    }
}
