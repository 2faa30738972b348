//! Controller facade tying the scheduler together.
//!
//! This module provides [`Controller`], the single entry point for
//! everything that happens on a layout session.
//!
//! # Overview
//!
//! The controller:
//! - Maps command station notifications to [`LayoutEvent`]s
//! - Runs every event through the handler chain, depth-first, until no
//!   handler produces a follow-up
//! - Turns requested speeds into inertia ramps and decoder commands
//! - Paces outgoing commands through the send queue
//! - Fires restart timers and reports trains coming to rest
//! - Flags trains whose bookkeeping went wrong and skips them until cleared
//!
//! # Example
//!
//! ```rust
//! use trainz_dispatch::config::Config;
//! use trainz_dispatch::controller::{Controller, RouteAssignment};
//! use trainz_dispatch::hal::mock::{line_layout, MockInterface};
//! use trainz_dispatch::layout::*;
//!
//! let mut layout = line_layout(3).unwrap();
//! layout.add_train(Train::new(TrainId(1), "ICE", 3)).unwrap();
//! layout
//!     .add_route(Route::fixed(
//!         RouteId(1),
//!         "west to east",
//!         vec![
//!             RouteStep::block(BlockId(1), Direction::Next),
//!             RouteStep::block(BlockId(2), Direction::Next),
//!             RouteStep::block(BlockId(3), Direction::Next),
//!         ],
//!     ))
//!     .unwrap();
//!
//! let mut controller = Controller::new(layout, MockInterface::new(), Config::default());
//! controller.place_train(TrainId(1), BlockId(1), Direction::Next, 1).unwrap();
//!
//! let report = controller.start(TrainId(1), RouteAssignment::Fixed(RouteId(1)), 0).unwrap();
//! assert!(report.is_clean());
//!
//! // Main loop - call tick() regularly to ramp speeds and send commands
//! for step in 0..10 {
//!     controller.tick(step * 100);
//! }
//!
//! let snapshot = controller.snapshot(TrainId(1)).unwrap();
//! assert_eq!(snapshot.state, TrainState::Running);
//! assert_eq!(snapshot.leading_blocks, vec![BlockId(2), BlockId(3)]);
//! ```
//!
//! # Runtime errors
//!
//! A handler returning an [`InvariantError`] halts only the train it was
//! processing:
//!
//! ```rust,ignore
//! let report = controller.handle_interface_event(event, now);
//! for (train, error) in &report.errors {
//!     // the train keeps its reservations but ignores every event
//!     controller.clear_runtime_error(*train)?;
//! }
//! ```

use tracing::{debug, error, info, info_span, trace, warn, Span};

use crate::config::Config;
use crate::error::{InvariantError, LayoutError};
use crate::events::{EventKind, LayoutEvent};
use crate::handlers::{default_handlers, HandlerContext, Outbox, TrainHandler};
use crate::inertia::{InertiaController, RampCompletion};
use crate::layout::{
    BlockId, Destination, Direction, FeedbackId, Layout, Route, RouteId, RouteMode, RouteStep,
    Scheduling, StopTrigger, TrainId, TrainState,
};
use crate::priority::{SendQueue, SEND_QUEUE_CAPACITY};
use crate::reservation::ReservationManager;
use crate::router::{AutomaticRouter, ShortestPathRouter};
use crate::script::RouteScript;
use crate::timer::TaskScheduler;
use crate::traits::{CommandInterface, InterfaceCommand, InterfaceEvent};

// ============================================================================
// Public types
// ============================================================================

/// How a train started with [`Controller::start`] finds its way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAssignment {
    /// Follow an authored route. Its first step must be the train's block.
    Fixed(RouteId),
    /// Roam between stations for as long as the train is managed.
    Automatic,
    /// Drive to a destination and hand the train back there.
    AutomaticOnce(Destination),
}

/// What a dispatch did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchReport {
    /// Every event dispatched, in dispatch order.
    pub events: Vec<LayoutEvent>,
    /// Trains halted during the dispatch.
    pub errors: Vec<(TrainId, InvariantError)>,
}

impl DispatchReport {
    /// Returns true when no train was halted.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn absorb(&mut self, other: DispatchReport) {
        self.events.extend(other.events);
        self.errors.extend(other.errors);
    }
}

/// Train state snapshot for UIs and logs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrainSnapshot {
    pub id: TrainId,
    pub name: String,
    pub block: Option<BlockId>,
    pub position: usize,
    pub direction: Direction,
    pub state: TrainState,
    pub scheduling: Scheduling,
    pub stop_trigger: Option<StopTrigger>,
    pub route: Option<RouteId>,
    pub route_step_index: usize,
    pub leading_blocks: Vec<BlockId>,
    pub occupied_blocks: Vec<BlockId>,
    pub requested_speed_kph: u16,
    pub speed_steps: u8,
    /// Milliseconds before an automatic restart
    pub restart_in_ms: Option<u64>,
    /// Message of the error that halted the train
    pub runtime_error: Option<String>,
}

// ============================================================================
// Controller
// ============================================================================

/// Layout session controller.
///
/// # Type Parameter
///
/// - `I`: The command station connection ([`CommandInterface`] trait)
///
/// # Thread Safety
///
/// The controller is not shared between threads. Every mutation happens
/// through `&mut self`, so a dispatch always runs to completion before the
/// next event is looked at. Use [`crate::runtime`] to drive it from a
/// single tokio task.
pub struct Controller<I: CommandInterface> {
    layout: Layout,
    interface: I,
    config: Config,
    reservations: ReservationManager,
    router: Box<dyn AutomaticRouter + Send>,
    handlers: Vec<Box<dyn TrainHandler>>,
    outbox: Outbox,
    inertia: InertiaController,
    send_queue: SendQueue<SEND_QUEUE_CAPACITY>,
    restart_timers: TaskScheduler<TrainId>,
    span: Span,
    now_ms: u64,
}

impl<I: CommandInterface> Controller<I> {
    /// Creates a controller with the default handler chain and router.
    pub fn new(layout: Layout, interface: I, config: Config) -> Self {
        let span = info_span!("session", session = %config.session.name);
        Self {
            reservations: ReservationManager::from_config(&config.scheduler),
            router: Box::new(ShortestPathRouter::new()),
            handlers: default_handlers(),
            outbox: Outbox::default(),
            inertia: InertiaController::new(config.inertia.clone()),
            send_queue: SendQueue::new(config.interface.min_command_interval_ms),
            restart_timers: TaskScheduler::new(),
            span,
            now_ms: 0,
            layout,
            interface,
            config,
        }
    }

    /// Replace the automatic router.
    pub fn with_router<R: AutomaticRouter + Send + 'static>(mut self, router: R) -> Self {
        self.router = Box::new(router);
        self
    }

    /// Replace the handler chain.
    pub fn with_handlers(mut self, handlers: Vec<Box<dyn TrainHandler>>) -> Self {
        self.handlers = handlers;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn interface(&self) -> &I {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Latest time seen by the controller.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Number of commands waiting for transmission.
    pub fn pending_commands(&self) -> usize {
        self.send_queue.len()
    }

    /// State snapshot of one train.
    pub fn snapshot(&self, train: TrainId) -> Result<TrainSnapshot, InvariantError> {
        let t = self.layout.train(train)?;
        Ok(TrainSnapshot {
            id: t.id,
            name: t.name.clone(),
            block: t.block,
            position: t.position,
            direction: t.direction,
            state: t.state,
            scheduling: t.scheduling,
            stop_trigger: t.stop_trigger(),
            route: t.route,
            route_step_index: t.route_step_index,
            leading_blocks: t.leading_blocks().collect(),
            occupied_blocks: t.occupied_blocks().collect(),
            requested_speed_kph: t.requested_speed_kph,
            speed_steps: t.speed_steps,
            restart_in_ms: t.time_until_automatic_restart(self.now_ms),
            runtime_error: t.runtime_error.as_ref().map(ToString::to_string),
        })
    }

    /// Snapshots of every train, in id order.
    pub fn snapshots(&self) -> Vec<TrainSnapshot> {
        self.layout
            .train_ids()
            .into_iter()
            .filter_map(|id| self.snapshot(id).ok())
            .collect()
    }

    // ------------------------------------------------------------------
    // Layout edits
    // ------------------------------------------------------------------

    /// Put a train on the layout. It must not be managed.
    pub fn place_train(
        &mut self,
        train: TrainId,
        block: BlockId,
        direction: Direction,
        position: usize,
    ) -> Result<(), LayoutError> {
        let span = self.span.clone();
        let _enter = span.enter();
        if self.layout.train(train)?.is_managed() {
            self.set_unmanaged(train, self.now_ms)?;
        }
        self.reservations
            .place_train(&mut self.layout, train, block, direction, position)?;
        let t = self.layout.train_mut(train)?;
        t.state = TrainState::Stopped;
        t.route_step_index = 0;
        t.start_route_index = 0;
        Ok(())
    }

    /// Take a train off the layout.
    ///
    /// The train is unmanaged and stopped, and everything it held is
    /// released. Trains waiting for those blocks retry at once.
    pub fn remove_train(
        &mut self,
        train: TrainId,
        now_ms: u64,
    ) -> Result<DispatchReport, InvariantError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);

        self.reservations.remove_train(&mut self.layout, train)?;
        let t = self.layout.train_mut(train)?;
        t.scheduling = Scheduling::Unmanaged;
        t.clear_stop_trigger();
        t.state = TrainState::Stopped;
        t.requested_speed_kph = 0;
        t.speed_steps = 0;
        let command = InterfaceCommand::SetSpeed {
            address: t.address,
            decoder: t.decoder,
            steps: 0,
        };
        log_cancelled(self.inertia.cancel_and_set(train, 0));
        self.enqueue(command, false);
        info!(%train, "train removed from layout");

        Ok(self.dispatch(LayoutEvent::StateChanged(train)))
    }

    /// Convert a route script and register the route under `id`.
    pub fn add_script(&mut self, id: RouteId, script: &RouteScript) -> Result<(), LayoutError> {
        let route = script.to_route(&self.layout, id)?;
        debug!(route = %id, steps = route.steps.len(), "route script added");
        self.layout.add_route(route)
    }

    // ------------------------------------------------------------------
    // User requests
    // ------------------------------------------------------------------

    /// Hand a placed train to the scheduler.
    ///
    /// Anything reserved ahead of the train is released and its route
    /// restarts from the first step. A train still moving brakes until the
    /// blocks ahead of it are reserved again.
    pub fn start(
        &mut self,
        train: TrainId,
        assignment: RouteAssignment,
        now_ms: u64,
    ) -> Result<DispatchReport, InvariantError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);

        let t = self.layout.train(train)?;
        let block = t.block.ok_or(InvariantError::TrainNotPlaced(train))?;
        let direction = t.direction;
        let route = match assignment {
            RouteAssignment::Fixed(id) => {
                let route = self.layout.route(id)?;
                let first = route
                    .steps
                    .first()
                    .ok_or(InvariantError::RouteStepOutOfRange { route: id, index: 0 })?;
                let resolved = self.layout.resolve_step(first, train)?;
                if resolved.map(|r| r.block) != Some(block) {
                    return Err(InvariantError::RouteStartMismatch {
                        route: id,
                        train,
                        block,
                    });
                }
                id
            }
            RouteAssignment::Automatic | RouteAssignment::AutomaticOnce(_) => {
                let id = RouteId::automatic_for(train);
                let mode = match assignment {
                    RouteAssignment::AutomaticOnce(destination) => {
                        RouteMode::AutomaticOnce { destination }
                    }
                    _ => RouteMode::Automatic,
                };
                self.layout.set_route(Route {
                    id,
                    name: format!("automatic {train}"),
                    mode,
                    steps: vec![RouteStep::block(block, direction)],
                });
                id
            }
        };

        self.reservations.release_leading_blocks(&mut self.layout, train)?;
        let braking_speed = self.layout.block(block)?.braking_speed_kph;
        let t = self.layout.train_mut(train)?;
        t.route = Some(route);
        t.route_step_index = 0;
        t.start_route_index = 0;
        t.scheduling = Scheduling::Managed { finishing: false };
        t.runtime_error = None;
        t.clear_stop_trigger();
        if matches!(t.state, TrainState::Running | TrainState::Braking) {
            let kph = braking_speed.unwrap_or(self.config.scheduler.braking_speed_kph);
            t.state = TrainState::Braking;
            t.set_stop_trigger(StopTrigger::TemporaryStop);
            t.requested_speed_kph = kph;
            self.outbox.speed_requests.push((train, kph));
        }
        info!(%train, route = %route, ?assignment, "train managed");

        Ok(self.dispatch(LayoutEvent::SchedulingChanged(train)))
    }

    /// Stop a managed train for good at the next stop feedback.
    ///
    /// A train already at rest is handed back at once.
    pub fn stop(&mut self, train: TrainId, now_ms: u64) -> Result<DispatchReport, InvariantError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);

        let t = self.layout.train_mut(train)?;
        if !t.is_managed() {
            return Ok(DispatchReport::default());
        }
        t.set_stop_trigger(StopTrigger::CompleteStop);
        info!(%train, "stop requested");
        if t.state == TrainState::Stopped {
            t.scheduling = Scheduling::Unmanaged;
            return Ok(self.dispatch(LayoutEvent::SchedulingChanged(train)));
        }
        self.sync_restart_timers();
        Ok(DispatchReport::default())
    }

    /// Let a managed train complete its route up to the next designated
    /// stop, then hand it back.
    ///
    /// A train already at rest is handed back at once.
    pub fn finish(&mut self, train: TrainId, now_ms: u64) -> Result<DispatchReport, InvariantError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);

        let t = self.layout.train_mut(train)?;
        if !t.is_managed() {
            return Ok(DispatchReport::default());
        }
        info!(%train, "finish requested");
        if t.state == TrainState::Stopped {
            t.scheduling = Scheduling::Unmanaged;
            return Ok(self.dispatch(LayoutEvent::SchedulingChanged(train)));
        }
        t.scheduling = Scheduling::Managed { finishing: true };
        Ok(DispatchReport::default())
    }

    /// Take a train away from the scheduler. Its speed is left alone.
    pub fn set_unmanaged(
        &mut self,
        train: TrainId,
        now_ms: u64,
    ) -> Result<DispatchReport, InvariantError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);

        let t = self.layout.train_mut(train)?;
        if !t.is_managed() {
            return Ok(DispatchReport::default());
        }
        t.scheduling = Scheduling::Unmanaged;
        info!(%train, "train unmanaged by user");
        Ok(self.dispatch(LayoutEvent::SchedulingChanged(train)))
    }

    /// Resume event processing for a halted train.
    pub fn clear_runtime_error(&mut self, train: TrainId) -> Result<(), InvariantError> {
        let t = self.layout.train_mut(train)?;
        if let Some(err) = t.runtime_error.take() {
            info!(%train, error = %err, "runtime error cleared");
        }
        Ok(())
    }

    /// Cut track power and take every train away from the scheduler.
    pub fn emergency_stop_all(&mut self, now_ms: u64) {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);
        warn!("emergency stop");

        self.send_queue.clear_normal();
        if !self.send_queue.push(InterfaceCommand::Stop, true) {
            error!("emergency stop could not be queued");
        }
        for id in self.layout.train_ids() {
            if let Err(err) = self.reservations.release_leading_blocks(&mut self.layout, id) {
                warn!(train = %id, error = %err, "could not release leading blocks");
            }
            log_cancelled(self.inertia.cancel_and_set(id, 0));
            if let Ok(t) = self.layout.train_mut(id) {
                t.scheduling = Scheduling::Unmanaged;
                t.clear_stop_trigger();
                t.state = TrainState::Stopped;
                t.requested_speed_kph = 0;
                t.speed_steps = 0;
            }
        }
        self.sync_restart_timers();
        self.flush_send_queue();
    }

    // ------------------------------------------------------------------
    // Interface events and time
    // ------------------------------------------------------------------

    /// Feed a command station notification into the scheduler.
    ///
    /// Only the rising edge of a feedback contact is an event.
    pub fn handle_interface_event(&mut self, event: InterfaceEvent, now_ms: u64) -> DispatchReport {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);

        match self.map_interface_event(event) {
            Some(layout_event) => self.dispatch(layout_event),
            None => DispatchReport::default(),
        }
    }

    fn map_interface_event(&mut self, event: InterfaceEvent) -> Option<LayoutEvent> {
        match event {
            InterfaceEvent::Feedback {
                device_id,
                contact_id,
                detected,
            } => {
                let Some(id) = self.layout.feedback_at(device_id, contact_id) else {
                    debug!(device_id, contact_id, "unknown feedback");
                    return None;
                };
                let feedback = self.layout.feedback_mut(id).ok()?;
                let rising = detected && !feedback.detected;
                feedback.detected = detected;
                rising.then_some(LayoutEvent::FeedbackTriggered(id))
            }
            InterfaceEvent::TurnoutChanged { address, state } => {
                let Some(id) = self.layout.turnout_at(address) else {
                    debug!(address, "unknown turnout");
                    return None;
                };
                self.layout.turnout_mut(id).ok()?.actual_state = state;
                Some(LayoutEvent::TurnoutChanged(id))
            }
            InterfaceEvent::SpeedChanged { address, steps } => {
                let Some(id) = self.layout.train_at(address) else {
                    debug!(address, "unknown locomotive");
                    return None;
                };
                self.layout.train_mut(id).ok()?.speed_steps = steps;
                self.inertia.observe(id, steps);
                Some(LayoutEvent::SpeedChanged(id))
            }
            InterfaceEvent::DirectionChanged { address, forward } => {
                let Some(id) = self.layout.train_at(address) else {
                    debug!(address, "unknown locomotive");
                    return None;
                };
                debug!(train = %id, forward, "locomotive direction reported");
                Some(LayoutEvent::DirectionChanged(id))
            }
        }
    }

    /// Advance ramps and timers to `now_ms` and send what is due.
    ///
    /// Call this regularly from the main loop.
    pub fn tick(&mut self, now_ms: u64) -> DispatchReport {
        let span = self.span.clone();
        let _enter = span.enter();
        self.advance_clock(now_ms);
        let mut report = DispatchReport::default();

        let ramp = self.inertia.update(self.now_ms);
        for update in ramp.updates {
            let Ok(t) = self.layout.train_mut(update.train) else {
                continue;
            };
            t.speed_steps = update.steps;
            let command = InterfaceCommand::SetSpeed {
                address: t.address,
                decoder: t.decoder,
                steps: update.steps,
            };
            self.enqueue(command, false);
        }
        for completion in ramp.completions {
            if !completion.cancelled && completion.steps == 0 {
                report.absorb(self.came_to_rest(completion.train));
            }
        }

        for train in self.restart_timers.due(self.now_ms) {
            if let Ok(t) = self.layout.train_mut(train) {
                t.restart_at_ms = None;
            }
            debug!(%train, "restart timer expired");
            report.absorb(self.dispatch(LayoutEvent::RestartTimerExpired(train)));
        }

        self.flush_send_queue();
        report
    }

    fn came_to_rest(&mut self, train: TrainId) -> DispatchReport {
        let Ok(t) = self.layout.train_mut(train) else {
            return DispatchReport::default();
        };
        if t.state != TrainState::Stopping {
            return DispatchReport::default();
        }
        t.state = TrainState::Stopped;
        if let Some(StopTrigger::StopAndRestart { after_ms }) = t.stop_trigger() {
            if t.is_managed() && self.config.scheduler.automatic_restart {
                t.restart_at_ms = Some(self.now_ms.saturating_add(after_ms));
                debug!(%train, after_ms, "restart scheduled");
            }
        }
        debug!(%train, "train stopped");
        self.dispatch(LayoutEvent::StateChanged(train))
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Run `event` and its whole cascade, then apply the side effects.
    fn dispatch(&mut self, event: LayoutEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        trace!(?event, "dispatching");
        self.deliver(event, event.feedback(), 0, &mut report);
        self.flush_outbox();
        self.sync_restart_timers();
        report
    }

    fn deliver(
        &mut self,
        event: LayoutEvent,
        trigger: Option<FeedbackId>,
        depth: usize,
        report: &mut DispatchReport,
    ) {
        report.events.push(event);
        let targets = match event.target_train() {
            Some(train) => vec![train],
            None => self.layout.train_ids(),
        };
        for train in targets {
            self.deliver_to(train, event, trigger, depth, report);
        }
    }

    fn deliver_to(
        &mut self,
        train: TrainId,
        event: LayoutEvent,
        trigger: Option<FeedbackId>,
        depth: usize,
        report: &mut DispatchReport,
    ) {
        let kind = event.kind();
        for index in 0..self.handlers.len() {
            // Re-checked per handler, earlier handlers may release the train
            let t = match self.layout.train(train) {
                Ok(t) => t,
                Err(err) => {
                    warn!(%train, error = %err, "event for unknown train");
                    return;
                }
            };
            if t.runtime_error.is_some() {
                return;
            }
            if !t.is_managed() && kind != EventKind::SchedulingChanged {
                return;
            }
            if !self.handlers[index].events().contains(&kind) {
                continue;
            }

            let result = {
                let mut ctx = HandlerContext {
                    layout: &mut self.layout,
                    train,
                    event,
                    trigger,
                    now_ms: self.now_ms,
                    config: &self.config.scheduler,
                    reservations: &self.reservations,
                    router: &mut *self.router,
                    outbox: &mut self.outbox,
                };
                self.handlers[index].process(&mut ctx)
            };

            match result {
                Ok(follow_ups) => {
                    for follow_up in follow_ups {
                        if depth >= self.config.scheduler.max_cascade_depth {
                            self.halt(train, InvariantError::CascadeTooDeep(depth + 1), report);
                            return;
                        }
                        self.deliver(follow_up, trigger, depth + 1, report);
                    }
                }
                Err(err) => {
                    error!(
                        %train,
                        handler = self.handlers[index].name(),
                        ?event,
                        "handler failed"
                    );
                    self.halt(train, err, report);
                    return;
                }
            }
        }
    }

    fn halt(&mut self, train: TrainId, err: InvariantError, report: &mut DispatchReport) {
        error!(%train, error = %err, "train halted");
        if let Ok(t) = self.layout.train_mut(train) {
            t.runtime_error = Some(err.clone());
        }
        report.errors.push((train, err));
    }

    // ------------------------------------------------------------------
    // Side effects
    // ------------------------------------------------------------------

    fn flush_outbox(&mut self) {
        let outbox = core::mem::take(&mut self.outbox);
        for (train, kph) in outbox.speed_requests {
            let Ok(t) = self.layout.train(train) else {
                continue;
            };
            let steps = t.decoder.steps_for_kph(kph, t.max_speed_kph);
            log_cancelled(self.inertia.request(train, steps, t.inertia, self.now_ms));
        }
        for (command, priority) in outbox.commands {
            self.enqueue(command, priority);
        }
    }

    fn enqueue(&mut self, command: InterfaceCommand, priority: bool) {
        // Rejections are logged by the queue
        let _ = self.send_queue.push(command, priority);
    }

    fn flush_send_queue(&mut self) {
        loop {
            match self.send_queue.poll(self.now_ms, &mut self.interface) {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(err) => {
                    warn!(?err, "command interface refused command");
                    break;
                }
            }
        }
    }

    /// Bring the timer table in line with the trains' pending restarts.
    fn sync_restart_timers(&mut self) {
        for t in self.layout.trains() {
            match t.restart_at_ms {
                None => {
                    self.restart_timers.cancel(t.id);
                }
                Some(at) if self.restart_timers.deadline(t.id) != Some(at) => {
                    self.restart_timers
                        .schedule(t.id, at.saturating_sub(self.now_ms), self.now_ms);
                }
                Some(_) => {}
            }
        }
    }

    fn advance_clock(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}

/// Trace the completion of a replaced ramp.
fn log_cancelled(completion: Option<RampCompletion>) {
    if let Some(completion) = completion {
        trace!(
            train = %completion.train,
            steps = completion.steps,
            cancelled = completion.cancelled,
            "speed ramp replaced"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
