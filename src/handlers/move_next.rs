use tracing::debug;

use super::{planned_stop, HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};

/// Move the train's head into the first leading block when that block's
/// entry feedback fires.
pub struct MoveToNextBlock;

impl TrainHandler for MoveToNextBlock {
    fn events(&self) -> &'static [EventKind] {
        &[EventKind::FeedbackTriggered]
    }

    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError> {
        let Some(trigger) = ctx.trigger else {
            return Ok(vec![]);
        };
        let train = ctx.layout.train(ctx.train)?;
        let Some(next) = train.leading.first() else {
            return Ok(vec![]);
        };
        let block = ctx.layout.block(next.block)?;
        let entry = block
            .entry_feedback(next.direction)
            .ok_or(InvariantError::FeedbackNotFound {
                block: next.block,
                direction: next.direction,
            })?;
        if entry != trigger {
            return Ok(vec![]);
        }
        if !block.is_reserved_by(ctx.train) {
            return Err(InvariantError::TrainNotFoundInBlock {
                train: ctx.train,
                block: next.block,
            });
        }

        let Some(segment) = ctx.reservations.occupy_next_block(ctx.layout, ctx.train)? else {
            return Ok(vec![]);
        };
        let position = ctx.layout.block(segment.block)?.entry_position(segment.direction);
        let train = ctx.layout.train_mut(ctx.train)?;
        train.position = position;
        train.route_step_index = segment.step;
        debug!(
            train = %ctx.train,
            block = %segment.block,
            step = segment.step,
            "moved to next block"
        );

        if planned_stop(ctx.layout, ctx.train)?.is_none() {
            ctx.reserve_with_reroute()?;
        }
        Ok(vec![LayoutEvent::MovedToNextBlock(ctx.train)])
    }

    fn name(&self) -> &'static str {
        "move_to_next_block"
    }
}
