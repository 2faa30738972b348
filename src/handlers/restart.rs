use tracing::debug;

use super::{HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};
use crate::layout::StopTrigger;

/// Resume from the current step once a restart delay has elapsed.
pub struct RestartTimer;

impl TrainHandler for RestartTimer {
    fn events(&self) -> &'static [EventKind] {
        &[EventKind::RestartTimerExpired]
    }

    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError> {
        let train = ctx.layout.train_mut(ctx.train)?;
        if train.is_finishing() {
            return Ok(vec![]);
        }
        train.start_route_index = train.route_step_index;
        if matches!(train.stop_trigger(), Some(StopTrigger::StopAndRestart { .. })) {
            train.clear_stop_trigger();
        }
        debug!(train = %ctx.train, step = train.route_step_index, "restart delay elapsed");
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "restart_timer"
    }
}
