use tracing::{debug, info};

use super::{is_halting, route_stop, stop_reason, HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};
use crate::layout::{RouteMode, StopTrigger, TrainState};

/// Stop at the stop feedback of a block the train must stop in.
///
/// A complete stop hands the train back to manual control at once. When an
/// automatic-once route ends here, the arrival block and direction are
/// checked against the destination.
pub struct Stop;

impl TrainHandler for Stop {
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
        if is_halting(train.state) {
            return Ok(vec![]);
        }
        let block_id = train.block.ok_or(InvariantError::TrainNotPlaced(ctx.train))?;
        let direction = train.direction;
        let Some(reason) = stop_reason(ctx.layout, ctx.train)? else {
            return Ok(vec![]);
        };
        let stop = ctx
            .layout
            .block(block_id)?
            .stop_feedback(direction)
            .ok_or(InvariantError::FeedbackNotFound {
                block: block_id,
                direction,
            })?;
        if stop != trigger {
            return Ok(vec![]);
        }
        let route_complete = route_stop(ctx.layout, ctx.train)? == Some(StopTrigger::CompleteStop);

        ctx.reservations.release_leading_blocks(ctx.layout, ctx.train)?;
        let train = ctx.layout.train_mut(ctx.train)?;
        train.set_stop_trigger(reason);
        train.state = TrainState::Stopping;
        ctx.request_speed(0)?;
        debug!(train = %ctx.train, block = %block_id, ?reason, "stopping");

        let mut events = vec![LayoutEvent::StateChanged(ctx.train)];
        if reason == StopTrigger::CompleteStop {
            if route_complete {
                self.check_destination(ctx)?;
            }
            info!(train = %ctx.train, block = %block_id, "route complete");
            events.extend(ctx.finalize_stop()?);
        }
        Ok(events)
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

impl Stop {
    fn check_destination(&self, ctx: &HandlerContext<'_>) -> Result<(), InvariantError> {
        let Some(route) = ctx.layout.route_of(ctx.train)? else {
            return Ok(());
        };
        let RouteMode::AutomaticOnce { destination } = route.mode else {
            return Ok(());
        };
        let train = ctx.layout.train(ctx.train)?;
        let block = train.block.ok_or(InvariantError::TrainNotPlaced(ctx.train))?;
        if block != destination.block {
            return Err(InvariantError::DestinationBlockMismatch {
                train: ctx.train,
                expected: destination.block,
                actual: block,
            });
        }
        if let Some(expected) = destination.direction {
            if expected != train.direction {
                return Err(InvariantError::DestinationDirectionMismatch {
                    train: ctx.train,
                    expected,
                    actual: train.direction,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::Bench;
    use crate::hal::mock::line_layout;
    use crate::layout::{
        BlockId, Destination, Direction, FeedbackId, Route, RouteId, RouteStep, TrainId,
    };

    const T1: TrainId = TrainId(1);

    #[test]
    fn route_end_stops_completely() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(2, &[1, 2]);
        bench.train_mut().route_step_index = 1;
        bench.train_mut().state = TrainState::Braking;

        let events = bench
            .run(&Stop, LayoutEvent::FeedbackTriggered(FeedbackId(22)))
            .unwrap();
        assert_eq!(
            events,
            vec![LayoutEvent::StateChanged(T1), LayoutEvent::SchedulingChanged(T1)]
        );
        assert_eq!(bench.train().state, TrainState::Stopping);
        assert!(!bench.train().is_managed());
        assert_eq!(bench.outbox.speed_requests, vec![(T1, 0)]);
    }

    #[test]
    fn station_stop_keeps_train_managed() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(2, &[1, 2, 3]);
        bench.layout.set_route(Route::fixed(
            RouteId(1),
            "test",
            vec![
                RouteStep::block(BlockId(1), Direction::Next),
                RouteStep::block(BlockId(2), Direction::Next).with_waiting_time_ms(30_000),
                RouteStep::block(BlockId(3), Direction::Next),
            ],
        ));
        bench.train_mut().route_step_index = 1;
        bench.train_mut().state = TrainState::Running;

        let events = bench
            .run(&Stop, LayoutEvent::FeedbackTriggered(FeedbackId(22)))
            .unwrap();
        assert_eq!(events, vec![LayoutEvent::StateChanged(T1)]);
        assert!(bench.train().is_managed());
        assert_eq!(
            bench.train().stop_trigger(),
            Some(StopTrigger::StopAndRestart { after_ms: 30_000 })
        );
    }

    #[test]
    fn wrong_arrival_direction_is_reported() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(2, &[1, 2]);
        let route = Route {
            id: RouteId(1),
            name: "once".to_string(),
            mode: RouteMode::AutomaticOnce {
                destination: Destination {
                    block: BlockId(2),
                    direction: Some(Direction::Previous),
                },
            },
            steps: vec![
                RouteStep::block(BlockId(1), Direction::Next),
                RouteStep::block(BlockId(2), Direction::Next),
            ],
        };
        bench.layout.set_route(route);
        bench.train_mut().route_step_index = 1;
        bench.train_mut().state = TrainState::Braking;

        let err = bench
            .run(&Stop, LayoutEvent::FeedbackTriggered(FeedbackId(22)))
            .unwrap_err();
        assert_eq!(
            err,
            InvariantError::DestinationDirectionMismatch {
                train: T1,
                expected: Direction::Previous,
                actual: Direction::Next,
            }
        );
    }

    #[test]
    fn route_ending_short_of_destination_is_reported() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(2, &[1, 2]);
        let route = Route {
            id: RouteId(1),
            name: "once".to_string(),
            mode: RouteMode::AutomaticOnce {
                destination: Destination {
                    block: BlockId(3),
                    direction: None,
                },
            },
            steps: vec![
                RouteStep::block(BlockId(1), Direction::Next),
                RouteStep::block(BlockId(2), Direction::Next),
            ],
        };
        bench.layout.set_route(route);
        bench.train_mut().route_step_index = 1;
        bench.train_mut().state = TrainState::Running;

        let err = bench
            .run(&Stop, LayoutEvent::FeedbackTriggered(FeedbackId(22)))
            .unwrap_err();
        assert!(matches!(err, InvariantError::DestinationBlockMismatch { .. }));
    }

    #[test]
    fn user_stop_short_of_destination_is_not_an_error() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(2, &[1, 2, 3]);
        bench.layout.set_route(Route {
            id: RouteId(1),
            name: "once".to_string(),
            mode: RouteMode::AutomaticOnce {
                destination: Destination {
                    block: BlockId(3),
                    direction: None,
                },
            },
            steps: vec![
                RouteStep::block(BlockId(1), Direction::Next),
                RouteStep::block(BlockId(2), Direction::Next),
                RouteStep::block(BlockId(3), Direction::Next),
            ],
        });
        bench.train_mut().route_step_index = 1;
        bench.train_mut().state = TrainState::Braking;
        bench.train_mut().set_stop_trigger(StopTrigger::CompleteStop);

        let events = bench
            .run(&Stop, LayoutEvent::FeedbackTriggered(FeedbackId(22)))
            .unwrap();
        assert_eq!(
            events,
            vec![LayoutEvent::StateChanged(T1), LayoutEvent::SchedulingChanged(T1)]
        );
        assert!(!bench.train().is_managed());
    }

    #[test]
    fn already_stopping_is_ignored() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(2, &[1, 2]);
        bench.train_mut().route_step_index = 1;
        bench.train_mut().state = TrainState::Stopping;
        let events = bench
            .run(&Stop, LayoutEvent::FeedbackTriggered(FeedbackId(22)))
            .unwrap();
        assert!(events.is_empty());
    }
}
