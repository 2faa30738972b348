//! Train handlers.
//!
//! Every layout event is offered to each train through an ordered chain of
//! [`TrainHandler`]s. A handler declares the event kinds it reacts to and,
//! when invoked, may mutate the layout through its [`HandlerContext`] and
//! return follow-up events. The controller dispatches follow-ups depth-first
//! before the next handler in the chain runs.
//!
//! # Chain order
//!
//! | Handler | Reacts to | Does |
//! |---------|-----------|------|
//! | [`MoveInsideBlock`] | feedback | advances the position within the block |
//! | [`MoveToNextBlock`] | feedback | moves the head into the first leading block |
//! | [`SchedulingChanged`] | scheduling changed | reserves or releases ahead |
//! | [`RestartTimer`] | restart timer expired | resumes from the current step |
//! | [`Start`] | most events | departs when blocks ahead can be reserved |
//! | [`Brake`] | feedback, movement | slows down at the brake feedback |
//! | [`Stop`] | feedback, movement | stops at the stop feedback |
//! | [`SpeedLimit`] | every event | clamps the requested speed |

mod brake;
mod move_inside;
mod move_next;
mod restart;
mod scheduling;
mod speed_limit;
mod start;
mod stop;

pub use brake::Brake;
pub use move_inside::MoveInsideBlock;
pub use move_next::MoveToNextBlock;
pub use restart::RestartTimer;
pub use scheduling::SchedulingChanged;
pub use speed_limit::SpeedLimit;
pub use start::Start;
pub use stop::Stop;

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::error::InvariantError;
use crate::events::{EventKind, LayoutEvent};
use crate::layout::{
    FeedbackId, Layout, Route, RouteMode, Scheduling, StopTrigger, TrainId, TrainState, TurnoutId,
};
use crate::reservation::ReservationManager;
use crate::router::AutomaticRouter;
use crate::traits::InterfaceCommand;

// ============================================================================
// Handler contract
// ============================================================================

/// One step of the per-train event procedure.
pub trait TrainHandler: Send + Sync {
    /// Event kinds this handler is invoked for.
    fn events(&self) -> &'static [EventKind];

    /// React to `ctx.event` for `ctx.train`. Returned events are dispatched
    /// before the next handler runs.
    fn process(&self, ctx: &mut HandlerContext<'_>) -> Result<Vec<LayoutEvent>, InvariantError>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// The default chain, in dispatch order.
pub fn default_handlers() -> Vec<Box<dyn TrainHandler>> {
    vec![
        Box::new(MoveInsideBlock),
        Box::new(MoveToNextBlock),
        Box::new(SchedulingChanged),
        Box::new(RestartTimer),
        Box::new(Start),
        Box::new(Brake),
        Box::new(Stop),
        Box::new(SpeedLimit),
    ]
}

/// Side effects collected during a dispatch, applied by the controller
/// once the whole cascade has run.
#[derive(Debug, Default)]
pub struct Outbox {
    /// Speed requests in km/h, in order. The last one per train wins.
    pub speed_requests: Vec<(TrainId, u16)>,
    /// Commands for the send queue and whether they are priority.
    pub commands: Vec<(InterfaceCommand, bool)>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.speed_requests.is_empty() && self.commands.is_empty()
    }
}

/// Everything a handler may touch.
pub struct HandlerContext<'a> {
    pub layout: &'a mut Layout,
    pub train: TrainId,
    pub event: LayoutEvent,
    /// Feedback that started this dispatch, carried through follow-ups.
    pub trigger: Option<FeedbackId>,
    pub now_ms: u64,
    pub config: &'a SchedulerConfig,
    pub reservations: &'a ReservationManager,
    pub router: &'a mut dyn AutomaticRouter,
    pub outbox: &'a mut Outbox,
}

impl HandlerContext<'_> {
    /// Ask for a new speed and remember it as the requested one.
    pub fn request_speed(&mut self, kph: u16) -> Result<(), InvariantError> {
        self.layout.train_mut(self.train)?.requested_speed_kph = kph;
        self.outbox.speed_requests.push((self.train, kph));
        Ok(())
    }

    /// Reserve the blocks ahead and queue commands for turnouts that
    /// must move. Returns false when nothing could be reserved.
    pub fn reserve(&mut self) -> Result<bool, InvariantError> {
        let Some(changed) = self
            .reservations
            .reserve_leading_blocks(self.layout, self.train)?
        else {
            return Ok(false);
        };
        self.queue_turnouts(&changed)?;
        Ok(true)
    }

    /// Like [`reserve`](Self::reserve), asking the router for a new route
    /// and retrying once when a generated route is exhausted or blocked.
    ///
    /// A new route that cannot be reserved either is dropped again: the
    /// train keeps its previous route and cursor, which its leading
    /// segments still index into.
    pub fn reserve_with_reroute(&mut self) -> Result<bool, InvariantError> {
        if self.reserve()? {
            return Ok(true);
        }
        let Some(route) = self.layout.route_of(self.train)?.cloned() else {
            return Ok(false);
        };
        if !route.mode.is_automatic() {
            return Ok(false);
        }
        let Some(steps) = self.router.update_automatic_route(self.layout, self.train) else {
            debug!(train = %self.train, "router found no route");
            return Ok(false);
        };
        debug!(train = %self.train, steps = steps.len(), "rerouted");
        let train = self.layout.train_mut(self.train)?;
        let cursor = (train.route_step_index, train.start_route_index);
        train.route_step_index = 0;
        train.start_route_index = 0;
        self.layout.set_route(Route {
            steps,
            ..route.clone()
        });
        if self.reserve()? {
            return Ok(true);
        }

        debug!(train = %self.train, "new route blocked, keeping the previous one");
        self.layout.set_route(route);
        let train = self.layout.train_mut(self.train)?;
        (train.route_step_index, train.start_route_index) = cursor;
        Ok(false)
    }

    fn queue_turnouts(&mut self, turnouts: &[TurnoutId]) -> Result<(), InvariantError> {
        for id in turnouts {
            let turnout = self.layout.turnout(*id)?;
            self.outbox.commands.push((
                InterfaceCommand::SetTurnout {
                    address: turnout.address,
                    state: turnout.requested_state,
                },
                false,
            ));
        }
        Ok(())
    }

    /// Stop for good: release what lies ahead and hand the train back.
    pub fn finalize_stop(&mut self) -> Result<Vec<LayoutEvent>, InvariantError> {
        self.reservations.release_leading_blocks(self.layout, self.train)?;
        let train = self.layout.train_mut(self.train)?;
        train.scheduling = Scheduling::Unmanaged;
        train.clear_stop_trigger();
        debug!(train = %self.train, "scheduling finished");
        Ok(vec![LayoutEvent::SchedulingChanged(self.train)])
    }
}

// ============================================================================
// Stop predicates
// ============================================================================

/// The stop planned in the train's current block, if any. A stop
/// requested by the user wins over the route.
pub fn planned_stop(layout: &Layout, id: TrainId) -> Result<Option<StopTrigger>, InvariantError> {
    if layout.train(id)?.stop_trigger() == Some(StopTrigger::CompleteStop) {
        return Ok(Some(StopTrigger::CompleteStop));
    }
    route_stop(layout, id)
}

/// The stop the route alone asks for in the train's current block.
///
/// Designated stops are ignored at the step the current run started from,
/// so a train can leave them.
pub fn route_stop(layout: &Layout, id: TrainId) -> Result<Option<StopTrigger>, InvariantError> {
    let train = layout.train(id)?;
    let Some(route) = layout.route_of(id)? else {
        return Ok(None);
    };
    let index = train.route_step_index;
    let step = route
        .steps
        .get(index)
        .ok_or(InvariantError::RouteStepOutOfRange {
            route: route.id,
            index,
        })?;
    let block_id = train.block.ok_or(InvariantError::TrainNotPlaced(id))?;
    let block = layout.block(block_id)?;
    let at_start = index == train.start_route_index;
    let designated = !at_start
        && layout
            .resolve_step(step, id)?
            .is_some_and(|resolved| resolved.is_designated_stop(route.mode, block.category));
    let restart = StopTrigger::StopAndRestart {
        after_ms: step.waiting_time_ms.unwrap_or(block.waiting_time_ms),
    };
    let last = route.is_last_step(index);

    let stop = match route.mode {
        RouteMode::Fixed => {
            if (designated && train.is_finishing()) || last {
                Some(StopTrigger::CompleteStop)
            } else if designated {
                Some(restart)
            } else {
                None
            }
        }
        RouteMode::Automatic => {
            if designated && train.is_finishing() {
                Some(StopTrigger::CompleteStop)
            } else if designated {
                Some(restart)
            } else {
                None
            }
        }
        RouteMode::AutomaticOnce { destination } => {
            if destination.block == block_id || (!at_start && last) {
                Some(StopTrigger::CompleteStop)
            } else {
                None
            }
        }
    };
    Ok(stop)
}

/// Why the train must stop in its current block: a planned stop, or a
/// temporary one when nothing is reserved ahead.
pub fn stop_reason(layout: &Layout, id: TrainId) -> Result<Option<StopTrigger>, InvariantError> {
    if let Some(stop) = planned_stop(layout, id)? {
        return Ok(Some(stop));
    }
    if layout.train(id)?.leading.is_empty() {
        return Ok(Some(StopTrigger::TemporaryStop));
    }
    Ok(None)
}

/// Returns true for states in which the train is coming to rest or at rest.
pub(crate) fn is_halting(state: TrainState) -> bool {
    matches!(state, TrainState::Stopped | TrainState::Stopping)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::hal::mock::ScriptedRouter;
    use crate::layout::{BlockId, Direction, Route, RouteId, RouteStep, Train};

    /// Owns everything a [`HandlerContext`] borrows.
    pub struct Bench {
        pub layout: Layout,
        pub config: SchedulerConfig,
        pub reservations: ReservationManager,
        pub router: ScriptedRouter,
        pub outbox: Outbox,
    }

    impl Bench {
        pub fn new(layout: Layout) -> Self {
            Self {
                layout,
                config: SchedulerConfig::default(),
                reservations: ReservationManager::new(2),
                router: ScriptedRouter::new(),
                outbox: Outbox::default(),
            }
        }

        /// Place managed train 1 in `block` on a fixed route over `blocks`.
        pub fn with_train(mut self, block: u32, blocks: &[u32]) -> Self {
            let id = TrainId(1);
            self.layout.add_train(Train::new(id, "T1", 3)).unwrap();
            self.reservations
                .place_train(&mut self.layout, id, BlockId(block), Direction::Next, 1)
                .unwrap();
            let steps = blocks
                .iter()
                .map(|b| RouteStep::block(BlockId(*b), Direction::Next))
                .collect();
            self.layout
                .add_route(Route::fixed(RouteId(1), "test", steps))
                .unwrap();
            let train = self.layout.train_mut(id).unwrap();
            train.route = Some(RouteId(1));
            train.scheduling = Scheduling::Managed { finishing: false };
            self
        }

        pub fn run(
            &mut self,
            handler: &dyn TrainHandler,
            event: LayoutEvent,
        ) -> Result<Vec<LayoutEvent>, InvariantError> {
            let mut ctx = HandlerContext {
                layout: &mut self.layout,
                train: TrainId(1),
                event,
                trigger: event.feedback(),
                now_ms: 0,
                config: &self.config,
                reservations: &self.reservations,
                router: &mut self.router,
                outbox: &mut self.outbox,
            };
            handler.process(&mut ctx)
        }

        pub fn train(&self) -> &Train {
            self.layout.train(TrainId(1)).unwrap()
        }

        pub fn train_mut(&mut self) -> &mut Train {
            self.layout.train_mut(TrainId(1)).unwrap()
        }
    }
}
