use tracing::debug;

use super::{planned_stop, HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};
use crate::layout::TrainState;

/// React to a train being handed to or taken from the scheduler.
///
/// A managed train at rest restarts its route from the first step and
/// reserves ahead. An unmanaged train gives back everything ahead of it.
pub struct SchedulingChanged;

impl TrainHandler for SchedulingChanged {
    fn events(&self) -> &'static [EventKind] {
        &[EventKind::SchedulingChanged]
    }

    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError> {
        let train = ctx.layout.train_mut(ctx.train)?;
        if !train.is_managed() {
            train.clear_stop_trigger();
            ctx.reservations.release_leading_blocks(ctx.layout, ctx.train)?;
            debug!(train = %ctx.train, "train unmanaged");
            return Ok(vec![]);
        }
        if train.state != TrainState::Stopped {
            return Ok(vec![]);
        }

        train.route_step_index = 0;
        train.start_route_index = 0;
        if planned_stop(ctx.layout, ctx.train)?.is_none() {
            let reserved = ctx.reserve_with_reroute()?;
            debug!(train = %ctx.train, reserved, "train managed");
        }
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "scheduling_changed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::Bench;
    use crate::hal::mock::line_layout;
    use crate::layout::{BlockId, Scheduling, StopTrigger, TrainId};

    #[test]
    fn managed_train_reserves_from_route_start() {
        let mut bench = Bench::new(line_layout(4).unwrap()).with_train(1, &[1, 2, 3]);
        bench.train_mut().route_step_index = 2;
        bench
            .run(&SchedulingChanged, LayoutEvent::SchedulingChanged(TrainId(1)))
            .unwrap();
        let train = bench.train();
        assert_eq!(train.route_step_index, 0);
        assert_eq!(train.leading_blocks().collect::<Vec<_>>(), vec![BlockId(2), BlockId(3)]);
    }

    #[test]
    fn unmanaged_train_releases_ahead() {
        let mut bench = Bench::new(line_layout(4).unwrap()).with_train(1, &[1, 2, 3]);
        bench
            .run(&SchedulingChanged, LayoutEvent::SchedulingChanged(TrainId(1)))
            .unwrap();
        bench.train_mut().scheduling = Scheduling::Unmanaged;
        bench.train_mut().set_stop_trigger(StopTrigger::TemporaryStop);

        bench
            .run(&SchedulingChanged, LayoutEvent::SchedulingChanged(TrainId(1)))
            .unwrap();
        let train = bench.train();
        assert!(train.leading.is_empty());
        assert!(train.stop_trigger().is_none());
        assert!(bench.layout.block(BlockId(1)).unwrap().is_reserved_by(TrainId(1)));
        assert!(bench.layout.block(BlockId(2)).unwrap().is_free());
    }

    #[test]
    fn moving_train_keeps_its_cursor() {
        let mut bench = Bench::new(line_layout(4).unwrap()).with_train(1, &[1, 2, 3]);
        bench.train_mut().state = TrainState::Running;
        bench.train_mut().route_step_index = 1;
        bench
            .run(&SchedulingChanged, LayoutEvent::SchedulingChanged(TrainId(1)))
            .unwrap();
        assert_eq!(bench.train().route_step_index, 1);
        assert!(bench.train().leading.is_empty());
    }
}
