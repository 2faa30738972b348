use tracing::debug;

use super::{planned_stop, HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};
use crate::layout::{StopTrigger, TrainState};

/// Depart when the blocks ahead can be reserved.
///
/// Runs for a train at rest without a pending restart, or for one braking
/// only because nothing was reserved ahead.
pub struct Start;

impl TrainHandler for Start {
    fn events(&self) -> &'static [EventKind] {
        &[
            EventKind::SchedulingChanged,
            EventKind::RestartTimerExpired,
            EventKind::TurnoutChanged,
            EventKind::StateChanged,
            EventKind::MovedInsideBlock,
            EventKind::MovedToNextBlock,
        ]
    }

    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError> {
        let train = ctx.layout.train(ctx.train)?;
        if !train.is_managed() || train.block.is_none() {
            return Ok(vec![]);
        }
        let can_start = match (train.state, train.stop_trigger()) {
            (TrainState::Stopped, None | Some(StopTrigger::TemporaryStop)) => {
                train.restart_at_ms.is_none()
            }
            (TrainState::Braking, Some(StopTrigger::TemporaryStop)) => true,
            _ => false,
        };
        if !can_start {
            return Ok(vec![]);
        }
        let state = train.state;
        let finishing = train.is_finishing();
        let index = train.route_step_index;
        let max_speed = train.max_speed_kph;
        let Some(route) = ctx.layout.route_of(ctx.train)? else {
            return Ok(vec![]);
        };
        let at_last_step = route.is_last_step(index);

        let planned = planned_stop(ctx.layout, ctx.train)?;
        if state == TrainState::Stopped
            && ((finishing && at_last_step) || planned == Some(StopTrigger::CompleteStop))
        {
            return ctx.finalize_stop();
        }
        if planned.is_some() {
            return Ok(vec![]);
        }
        if !ctx.reserve_with_reroute()? {
            debug!(train = %ctx.train, "cannot start, nothing reserved ahead");
            return Ok(vec![]);
        }

        let train = ctx.layout.train_mut(ctx.train)?;
        train.state = TrainState::Running;
        train.clear_stop_trigger();
        ctx.request_speed(max_speed)?;
        debug!(train = %ctx.train, "started");
        Ok(vec![LayoutEvent::StateChanged(ctx.train)])
    }

    fn name(&self) -> &'static str {
        "start"
    }
}
