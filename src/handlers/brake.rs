use tracing::debug;

use super::{stop_reason, HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};
use crate::layout::TrainState;

/// Slow down at the brake feedback of a block the train must stop in.
pub struct Brake;

impl TrainHandler for Brake {
    fn events(&self) -> &'static [EventKind] {
        &[
            EventKind::FeedbackTriggered,
            EventKind::StateChanged,
            EventKind::MovedInsideBlock,
            EventKind::MovedToNextBlock,
        ]
    }

    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError> {
        let Some(trigger) = ctx.trigger else {
            return Ok(vec![]);
        };
        let train = ctx.layout.train(ctx.train)?;
        if train.state != TrainState::Running {
            return Ok(vec![]);
        }
        let block_id = train.block.ok_or(InvariantError::TrainNotPlaced(ctx.train))?;
        let direction = train.direction;
        let Some(reason) = stop_reason(ctx.layout, ctx.train)? else {
            return Ok(vec![]);
        };
        let block = ctx.layout.block(block_id)?;
        let brake = block
            .brake_feedback(direction)
            .ok_or(InvariantError::FeedbackNotFound {
                block: block_id,
                direction,
            })?;
        if brake != trigger {
            return Ok(vec![]);
        }
        let speed = block.braking_speed_kph.unwrap_or(ctx.config.braking_speed_kph);

        let train = ctx.layout.train_mut(ctx.train)?;
        train.set_stop_trigger(reason);
        train.state = TrainState::Braking;
        ctx.request_speed(speed)?;
        debug!(train = %ctx.train, block = %block_id, ?reason, speed, "braking");
        Ok(vec![LayoutEvent::StateChanged(ctx.train)])
    }

    fn name(&self) -> &'static str {
        "brake"
    }
}
