use tracing::trace;

use super::{HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};
use crate::layout::{SpeedLimit as BlockSpeedLimit, TrainState};

/// Clamp the requested speed to what the track around the train allows.
///
/// - limited blocks and branch turnouts under or just ahead of the train
///   impose the limited speed
/// - a turnout ahead that has not confirmed its position imposes the
///   braking speed
pub struct SpeedLimit;

impl TrainHandler for SpeedLimit {
    fn events(&self) -> &'static [EventKind] {
        EventKind::ALL
    }

    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError> {
        let train = ctx.layout.train(ctx.train)?;
        let Some(block_id) = train.block else {
            return Ok(vec![]);
        };
        let block = ctx.layout.block(block_id)?;
        let braking = block.braking_speed_kph.unwrap_or(ctx.config.braking_speed_kph);
        let base = match train.state {
            TrainState::Running => train.max_speed_kph,
            TrainState::Braking => braking,
            TrainState::Stopped | TrainState::Stopping => return Ok(vec![]),
        };

        let mut limit = base;
        if block.speed_limit == BlockSpeedLimit::Limited {
            limit = limit.min(ctx.config.limited_speed_kph);
        }
        let underneath = train.occupied.iter().flat_map(|s| s.turnouts.iter());
        let ahead = train.leading.first().map(|s| s.turnouts.as_slice()).unwrap_or(&[]);
        for id in underneath.chain(ahead.iter()) {
            let turnout = ctx.layout.turnout(*id)?;
            if turnout.limits_speed() {
                limit = limit.min(ctx.config.limited_speed_kph);
            }
        }
        for id in ahead {
            if !ctx.layout.turnout(*id)?.is_settled() {
                limit = limit.min(braking);
            }
        }
        if let Some(next) = train.leading.first() {
            if ctx.layout.block(next.block)?.speed_limit == BlockSpeedLimit::Limited {
                limit = limit.min(ctx.config.limited_speed_kph);
            }
        }

        if limit != train.requested_speed_kph {
            trace!(train = %ctx.train, from = train.requested_speed_kph, to = limit, "speed adjusted");
            ctx.request_speed(limit)?;
        }
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "speed_limit"
    }
}
