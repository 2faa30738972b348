use tracing::debug;

use super::{planned_stop, HandlerContext, TrainHandler};
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};

/// Advance the train past the next feedback of its current block.
pub struct MoveInsideBlock;

impl TrainHandler for MoveInsideBlock {
    fn events(&self) -> &'static [EventKind] {
        &[EventKind::FeedbackTriggered]
    }

    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError> {
        let Some(trigger) = ctx.trigger else {
            return Ok(vec![]);
        };
        let train = ctx.layout.train(ctx.train)?;
        let Some(block_id) = train.block else {
            return Ok(vec![]);
        };
        let block = ctx.layout.block(block_id)?;
        let Some((feedback, position)) = block.feedback_ahead(train.direction, train.position)
        else {
            return Ok(vec![]);
        };
        if feedback != trigger {
            return Ok(vec![]);
        }
        if !block.is_reserved_by(ctx.train) {
            return Err(InvariantError::TrainNotFoundInBlock {
                train: ctx.train,
                block: block_id,
            });
        }

        ctx.layout.train_mut(ctx.train)?.position = position;
        debug!(train = %ctx.train, block = %block_id, position, "moved inside block");

        if planned_stop(ctx.layout, ctx.train)?.is_none() {
            ctx.reserve_with_reroute()?;
        }
        Ok(vec![LayoutEvent::MovedInsideBlock(ctx.train)])
    }

    fn name(&self) -> &'static str {
        "move_inside_block"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::Bench;
    use crate::hal::mock::line_layout;
    use crate::layout::{BlockId, FeedbackId};

    #[test]
    fn advances_on_feedback_ahead() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(1, &[1, 2, 3]);
        let events = bench
            .run(&MoveInsideBlock, LayoutEvent::FeedbackTriggered(FeedbackId(12)))
            .unwrap();
        assert_eq!(events, vec![LayoutEvent::MovedInsideBlock(crate::layout::TrainId(1))]);
        assert_eq!(bench.train().position, 2);
        let leading: Vec<_> = bench.train().leading_blocks().collect();
        assert_eq!(leading, vec![BlockId(2), BlockId(3)]);
    }

    #[test]
    fn repeated_feedback_is_ignored() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(1, &[1, 2, 3]);
        let event = LayoutEvent::FeedbackTriggered(FeedbackId(12));
        bench.run(&MoveInsideBlock, event).unwrap();
        let snapshot = bench.layout.reservation_snapshot();

        let events = bench.run(&MoveInsideBlock, event).unwrap();
        assert!(events.is_empty());
        assert_eq!(bench.train().position, 2);
        assert_eq!(bench.layout.reservation_snapshot(), snapshot);
    }

    #[test]
    fn other_feedback_is_ignored() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(1, &[1, 2, 3]);
        let events = bench
            .run(&MoveInsideBlock, LayoutEvent::FeedbackTriggered(FeedbackId(22)))
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(bench.train().position, 1);
    }

    #[test]
    fn block_not_held_by_train_is_an_invariant_error() {
        let mut bench = Bench::new(line_layout(3).unwrap()).with_train(1, &[1, 2, 3]);
        bench.layout.block_mut(BlockId(1)).unwrap().reservation = None;
        let err = bench
            .run(&MoveInsideBlock, LayoutEvent::FeedbackTriggered(FeedbackId(12)))
            .unwrap_err();
        assert!(matches!(err, InvariantError::TrainNotFoundInBlock { .. }));
    }
}
