//! Block and turnout reservation.
//!
//! [`ReservationManager`] is the only code that changes block and turnout
//! ownership. Leading reservations are all-or-nothing: the manager first
//! computes the full look-ahead, then claims it while recording an undo log,
//! and rolls the log back if any element turns out to be held by another
//! train.
//!
//! # Look-ahead
//!
//! Starting at the step after the train's current one, blocks are added
//! until any of:
//!
//! - the train's leading-block limit is reached
//! - the blocks added so far are long enough to hold the train
//! - the route ends
//! - a designated stop block was added (it is included)
//!
//! # Occupancy
//!
//! Occupied segments are kept tail first. After the head moves into a new
//! block, tail blocks that the train no longer covers are released. A train
//! of unknown length keeps only its head block; a block of unknown length
//! is assumed to hold the rest of the train.

use tracing::{debug, trace};

use crate::config::SchedulerConfig;
use crate::error::{InvariantError, LayoutError};
use crate::layout::{
    BlockId, BlockReservation, Direction, Layout, ReservedSegment, TrainId, TurnoutId,
    TurnoutState,
};

/// A block the look-ahead wants, with the turnout states leading into it.
#[derive(Clone, Debug, PartialEq, Eq)]
struct PlannedSegment {
    block: BlockId,
    direction: Direction,
    step: usize,
    turnouts: Vec<(TurnoutId, TurnoutState)>,
}

/// Prior ownership of an element touched by a reservation attempt.
enum Undo {
    Block {
        id: BlockId,
        previous: Option<BlockReservation>,
    },
    Turnout {
        id: TurnoutId,
        requested: TurnoutState,
        owner: Option<TrainId>,
    },
}

/// Claims and releases blocks and turnouts on behalf of trains.
#[derive(Clone, Debug)]
pub struct ReservationManager {
    default_max_leading_blocks: usize,
}

impl ReservationManager {
    pub fn new(default_max_leading_blocks: usize) -> Self {
        Self {
            default_max_leading_blocks: default_max_leading_blocks.max(1),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.default_max_leading_blocks)
    }

    /// Reserve the blocks ahead of `train` along its route.
    ///
    /// Returns the turnouts whose requested state changed and now need a
    /// command, or `None` when nothing could be reserved. A `None` leaves
    /// every reservation exactly as it was.
    pub fn reserve_leading_blocks(
        &self,
        layout: &mut Layout,
        train: TrainId,
    ) -> Result<Option<Vec<TurnoutId>>, InvariantError> {
        let Some(plan) = self.plan(layout, train)? else {
            return Ok(None);
        };
        if plan.is_empty() {
            trace!(%train, "nothing left to reserve on route");
            return Ok(None);
        }

        let mut undo = Vec::new();
        let mut changed = Vec::new();
        match Self::claim(layout, train, &plan, &mut undo, &mut changed) {
            Ok(true) => {}
            Ok(false) => {
                Self::rollback(layout, undo);
                return Ok(None);
            }
            Err(e) => {
                Self::rollback(layout, undo);
                return Err(e);
            }
        }

        // Drop leading segments the new plan no longer covers
        let previous = std::mem::take(&mut layout.train_mut(train)?.leading);
        for segment in previous {
            let block_kept = plan.iter().any(|p| p.block == segment.block);
            let stale_turnouts: Vec<TurnoutId> = segment
                .turnouts
                .iter()
                .copied()
                .filter(|t| !plan.iter().any(|p| p.turnouts.iter().any(|(id, _)| id == t)))
                .collect();
            let stale = ReservedSegment {
                turnouts: stale_turnouts,
                ..segment
            };
            Self::release_segment(layout, train, &stale, !block_kept)?;
        }

        let leading = plan
            .iter()
            .map(|p| ReservedSegment {
                block: p.block,
                direction: p.direction,
                turnouts: p.turnouts.iter().map(|(t, _)| *t).collect(),
                step: p.step,
            })
            .collect::<Vec<_>>();
        debug!(
            %train,
            leading = ?leading.iter().map(|s| s.block).collect::<Vec<_>>(),
            "reserved leading blocks"
        );
        layout.train_mut(train)?.leading = leading;
        Ok(Some(changed))
    }

    /// Compute the look-ahead. `None` when a station step has no free block.
    fn plan(
        &self,
        layout: &Layout,
        id: TrainId,
    ) -> Result<Option<Vec<PlannedSegment>>, InvariantError> {
        let train = layout.train(id)?;
        let Some(route_id) = train.route else {
            return Ok(None);
        };
        let route = layout.route(route_id)?;
        let current = train.block.ok_or(InvariantError::TrainNotPlaced(id))?;
        let max = train
            .max_leading_blocks
            .unwrap_or(self.default_max_leading_blocks)
            .max(1);
        let train_length = train.length_cm();

        let mut plan = Vec::new();
        let mut from = (current, train.direction);
        let mut covered = 0.0;
        for index in train.route_step_index + 1..route.steps.len() {
            if plan.len() >= max {
                break;
            }
            let Some(step) = layout.resolve_step(&route.steps[index], id)? else {
                debug!(train = %id, step = index, "no free block at station");
                return Ok(None);
            };
            let turnouts = layout
                .path_between(from.0, from.1, step.block, step.direction)
                .ok_or(InvariantError::MissingTransition {
                    from: from.0,
                    to: step.block,
                })?;
            let block = layout.block(step.block)?;
            plan.push(PlannedSegment {
                block: step.block,
                direction: step.direction,
                step: index,
                turnouts,
            });

            if step.is_designated_stop(route.mode, block.category) {
                break;
            }
            if let (Some(needed), Some(length)) = (train_length, block.length_cm) {
                covered += length;
                if covered >= needed {
                    break;
                }
            }
            from = (step.block, step.direction);
        }
        Ok(Some(plan))
    }

    /// Claim every element of `plan`. `Ok(false)` when another train holds
    /// one of them; the caller rolls back `undo`.
    fn claim(
        layout: &mut Layout,
        id: TrainId,
        plan: &[PlannedSegment],
        undo: &mut Vec<Undo>,
        changed: &mut Vec<TurnoutId>,
    ) -> Result<bool, InvariantError> {
        let train = layout.train(id)?;
        let occupied_blocks: Vec<BlockId> = train.occupied_blocks().collect();
        let occupied_turnouts: Vec<TurnoutId> = train
            .occupied
            .iter()
            .flat_map(|s| s.turnouts.iter().copied())
            .collect();

        for segment in plan {
            for &(turnout_id, state) in &segment.turnouts {
                let turnout = layout.turnout_mut(turnout_id)?;
                if turnout.reservation.is_some_and(|owner| owner != id) {
                    trace!(train = %id, turnout = %turnout_id, "turnout held by another train");
                    return Ok(false);
                }
                if occupied_turnouts.contains(&turnout_id) && turnout.requested_state != state {
                    return Ok(false);
                }
                undo.push(Undo::Turnout {
                    id: turnout_id,
                    requested: turnout.requested_state,
                    owner: turnout.reservation,
                });
                let newly_requested = turnout.requested_state != state
                    || (turnout.reservation.is_none() && !turnout.is_settled());
                turnout.reservation = Some(id);
                turnout.requested_state = state;
                if newly_requested && !turnout.is_settled() && !changed.contains(&turnout_id) {
                    changed.push(turnout_id);
                }
            }

            if occupied_blocks.contains(&segment.block) {
                return Ok(false);
            }
            let block = layout.block_mut(segment.block)?;
            if block.is_reserved_by_other(id) {
                trace!(train = %id, block = %segment.block, "block held by another train");
                return Ok(false);
            }
            undo.push(Undo::Block {
                id: segment.block,
                previous: block.reservation,
            });
            block.reservation = Some(BlockReservation {
                train: id,
                direction: segment.direction,
            });
        }
        Ok(true)
    }

    fn rollback(layout: &mut Layout, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::Block { id, previous } => {
                    if let Ok(block) = layout.block_mut(id) {
                        block.reservation = previous;
                    }
                }
                Undo::Turnout {
                    id,
                    requested,
                    owner,
                } => {
                    if let Ok(turnout) = layout.turnout_mut(id) {
                        turnout.requested_state = requested;
                        turnout.reservation = owner;
                    }
                }
            }
        }
    }

    /// Release a segment's turnouts and, when `release_block` is set, its
    /// block. Elements held by other trains are left alone.
    fn release_segment(
        layout: &mut Layout,
        train: TrainId,
        segment: &ReservedSegment,
        release_block: bool,
    ) -> Result<(), InvariantError> {
        if release_block {
            let block = layout.block_mut(segment.block)?;
            if block.is_reserved_by(train) {
                block.reservation = None;
            }
        }
        for turnout_id in &segment.turnouts {
            let turnout = layout.turnout_mut(*turnout_id)?;
            if turnout.reservation == Some(train) {
                turnout.reservation = None;
            }
        }
        Ok(())
    }

    /// Release every leading segment of `train`.
    pub fn release_leading_blocks(
        &self,
        layout: &mut Layout,
        train: TrainId,
    ) -> Result<(), InvariantError> {
        let t = layout.train_mut(train)?;
        let leading = std::mem::take(&mut t.leading);
        if leading.is_empty() {
            return Ok(());
        }
        let occupied_blocks: Vec<BlockId> = t.occupied_blocks().collect();
        let occupied_turnouts: Vec<TurnoutId> = t
            .occupied
            .iter()
            .flat_map(|s| s.turnouts.iter().copied())
            .collect();

        for segment in leading {
            let turnouts = segment
                .turnouts
                .iter()
                .copied()
                .filter(|t| !occupied_turnouts.contains(t))
                .collect();
            let release_block = !occupied_blocks.contains(&segment.block);
            Self::release_segment(
                layout,
                train,
                &ReservedSegment {
                    turnouts,
                    ..segment
                },
                release_block,
            )?;
        }
        debug!(%train, "released leading blocks");
        Ok(())
    }

    /// Move the first leading segment under the train and make it the head
    /// block. Returns the entered segment, `None` when nothing was reserved.
    pub fn occupy_next_block(
        &self,
        layout: &mut Layout,
        train: TrainId,
    ) -> Result<Option<ReservedSegment>, InvariantError> {
        let t = layout.train_mut(train)?;
        if t.leading.is_empty() {
            return Ok(None);
        }
        let segment = t.leading.remove(0);
        t.occupied.push(segment.clone());
        t.block = Some(segment.block);
        t.direction = segment.direction;
        self.trim_occupied(layout, train)?;
        Ok(Some(segment))
    }

    /// Release tail blocks the train no longer covers.
    pub fn trim_occupied(&self, layout: &mut Layout, train: TrainId) -> Result<(), InvariantError> {
        let t = layout.train(train)?;
        let keep = match t.length_cm() {
            None => 1,
            Some(length) => {
                let mut keep = 1;
                let mut covered = 0.0;
                for segment in t.occupied.iter().rev().skip(1) {
                    if covered >= length {
                        break;
                    }
                    keep += 1;
                    covered += layout.block(segment.block)?.length_cm.unwrap_or(f64::INFINITY);
                }
                keep
            }
        };
        let excess = t.occupied.len().saturating_sub(keep);
        if excess == 0 {
            return Ok(());
        }

        let released: Vec<ReservedSegment> =
            layout.train_mut(train)?.occupied.drain(..excess).collect();
        for segment in &released {
            Self::release_segment(layout, train, segment, true)?;
        }
        trace!(
            %train,
            released = ?released.iter().map(|s| s.block).collect::<Vec<_>>(),
            "trimmed tail"
        );
        Ok(())
    }

    /// Put `train` in `block`, releasing wherever it was before.
    pub fn place_train(
        &self,
        layout: &mut Layout,
        train: TrainId,
        block: BlockId,
        direction: Direction,
        position: usize,
    ) -> Result<(), LayoutError> {
        let target = layout.block(block)?;
        if target.is_reserved_by_other(train) {
            return Err(LayoutError::BlockOccupied(block));
        }
        if position > target.feedbacks.len() {
            return Err(LayoutError::InvalidPosition { block, position });
        }
        self.remove_train(layout, train)?;

        layout.block_mut(block)?.reservation = Some(BlockReservation { train, direction });
        let t = layout.train_mut(train)?;
        t.block = Some(block);
        t.direction = direction;
        t.position = position;
        t.occupied = vec![ReservedSegment {
            block,
            direction,
            turnouts: Vec::new(),
            step: 0,
        }];
        debug!(%train, %block, %direction, position, "placed train");
        Ok(())
    }

    /// Take `train` off the layout, releasing everything it holds.
    pub fn remove_train(&self, layout: &mut Layout, train: TrainId) -> Result<(), InvariantError> {
        let t = layout.train_mut(train)?;
        let segments: Vec<ReservedSegment> =
            t.leading.drain(..).chain(t.occupied.drain(..)).collect();
        t.block = None;
        t.position = 0;
        for segment in &segments {
            Self::release_segment(layout, train, segment, true)?;
        }
        Ok(())
    }
}

impl Default for ReservationManager {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}
