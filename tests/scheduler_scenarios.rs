//! End-to-end scheduling runs on small line layouts.
//!
//! Block `Bn` has feedbacks `Fn1` and `Fn2`. Travelling `Next`, `Fn1` is the
//! entry (and brake) feedback and `Fn2` the stop feedback.

use trainz_dispatch::{
    hal::mock::{line_layout, MockInterface, ScriptedRouter},
    layout::{
        BlockCategory, BlockId, Destination, Direction, Layout, Route, RouteId, RouteStep,
        StopTrigger, Train, TrainId, TrainState,
    },
    Config, Controller, InterfaceCommand, InterfaceEvent, RouteAssignment,
};

const T1: TrainId = TrainId(1);
const T2: TrainId = TrainId(2);

fn feedback(contact: u16) -> InterfaceEvent {
    InterfaceEvent::Feedback {
        device_id: 1,
        contact_id: contact,
        detected: true,
    }
}

fn steps(blocks: &[u32]) -> Vec<RouteStep> {
    blocks
        .iter()
        .map(|b| RouteStep::block(BlockId(*b), Direction::Next))
        .collect()
}

fn with_trains(mut layout: Layout) -> Layout {
    layout
        .add_train(Train::new(T1, "ICE", 3).with_inertia(false))
        .unwrap();
    layout
        .add_train(Train::new(T2, "Freight", 4).with_inertia(false))
        .unwrap();
    layout
}

/// Run the feedbacks in order, failing on any halted train.
fn pass(controller: &mut Controller<MockInterface>, contacts: &[u16], now: &mut u64) {
    for contact in contacts {
        *now += 100;
        let report = controller.handle_interface_event(feedback(*contact), *now);
        assert!(report.is_clean(), "F{contact}: {:?}", report.errors);
    }
}

/// Ramp to zero, then wait out the settle delay.
fn come_to_rest(controller: &mut Controller<MockInterface>, now: &mut u64) {
    *now += 100;
    controller.tick(*now);
    *now += 2_000;
    controller.tick(*now);
}

fn leading(controller: &Controller<MockInterface>, train: TrainId) -> Vec<BlockId> {
    controller.snapshot(train).unwrap().leading_blocks
}

// ============================================================================
// Automatic once
// ============================================================================

fn automatic_once_to_b3() -> Controller<MockInterface> {
    let router = ScriptedRouter::new().respond(Some(steps(&[1, 2, 3])));
    let mut controller = Controller::new(
        with_trains(line_layout(4).unwrap()),
        MockInterface::new(),
        Config::default(),
    )
    .with_router(router);
    controller
        .place_train(T1, BlockId(1), Direction::Next, 1)
        .unwrap();
    let destination = Destination {
        block: BlockId(3),
        direction: None,
    };
    let report = controller
        .start(T1, RouteAssignment::AutomaticOnce(destination), 0)
        .unwrap();
    assert!(report.is_clean());
    controller
}

#[test]
fn automatic_once_passes_intermediate_block() {
    let mut controller = automatic_once_to_b3();
    let mut now = 0;
    assert_eq!(leading(&controller, T1), vec![BlockId(2), BlockId(3)]);

    pass(&mut controller, &[12, 21], &mut now);

    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.block, Some(BlockId(2)));
    assert_eq!(snapshot.state, TrainState::Running);
    assert_eq!(snapshot.leading_blocks, vec![BlockId(3)]);
    assert_eq!(snapshot.stop_trigger, None);
    assert!(controller.layout().block(BlockId(1)).unwrap().is_free());
}

#[test]
fn automatic_once_stops_completely_at_destination() {
    let mut controller = automatic_once_to_b3();
    let mut now = 0;

    pass(&mut controller, &[12, 21, 22, 31], &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Braking);
    assert_eq!(snapshot.stop_trigger, Some(StopTrigger::CompleteStop));
    assert_eq!(snapshot.requested_speed_kph, 30);

    pass(&mut controller, &[32], &mut now);
    let train = controller.layout().train(T1).unwrap();
    assert_eq!(train.state, TrainState::Stopping);
    assert!(!train.is_managed());
    assert!(train.leading.is_empty());

    come_to_rest(&mut controller, &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Stopped);
    assert_eq!(snapshot.block, Some(BlockId(3)));
    assert_eq!(snapshot.runtime_error, None);
}

// ============================================================================
// Fixed route with a station stop
// ============================================================================

#[test]
fn station_stop_restarts_after_waiting_time() {
    let mut layout = with_trains(line_layout(4).unwrap());
    layout.block_mut(BlockId(2)).unwrap().category = BlockCategory::Station;
    layout
        .add_route(Route::fixed(
            RouteId(1),
            "with station",
            vec![
                RouteStep::block(BlockId(1), Direction::Next),
                RouteStep::block(BlockId(2), Direction::Next).with_waiting_time_ms(30_000),
                RouteStep::block(BlockId(3), Direction::Next),
                RouteStep::block(BlockId(4), Direction::Next),
            ],
        ))
        .unwrap();
    let mut controller = Controller::new(layout, MockInterface::new(), Config::default());
    controller
        .place_train(T1, BlockId(1), Direction::Next, 1)
        .unwrap();
    controller
        .start(T1, RouteAssignment::Fixed(RouteId(1)), 0)
        .unwrap();
    // The look-ahead ends at the station
    assert_eq!(leading(&controller, T1), vec![BlockId(2)]);

    let mut now = 0;
    pass(&mut controller, &[12, 21, 22], &mut now);
    let train = controller.layout().train(T1).unwrap();
    assert_eq!(train.state, TrainState::Stopping);
    assert!(train.is_managed());

    come_to_rest(&mut controller, &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Stopped);
    assert_eq!(
        snapshot.stop_trigger,
        Some(StopTrigger::StopAndRestart { after_ms: 30_000 })
    );
    assert_eq!(snapshot.restart_in_ms, Some(30_000));

    let rested_at = now;
    controller.tick(rested_at + 29_999);
    assert_eq!(controller.snapshot(T1).unwrap().state, TrainState::Stopped);

    let report = controller.tick(rested_at + 30_000);
    assert!(report.is_clean());
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Running);
    assert_eq!(snapshot.block, Some(BlockId(2)));
    assert_eq!(snapshot.leading_blocks, vec![BlockId(3), BlockId(4)]);
    assert_eq!(snapshot.restart_in_ms, None);
}

#[test]
fn station_block_stops_a_fixed_route_for_its_waiting_time() {
    let mut layout = with_trains(line_layout(4).unwrap());
    let station = layout.block_mut(BlockId(2)).unwrap();
    station.category = BlockCategory::Station;
    station.waiting_time_ms = 30_000;
    layout
        .add_route(Route::fixed(RouteId(1), "through station", steps(&[1, 2, 3, 4])))
        .unwrap();
    let mut controller = Controller::new(layout, MockInterface::new(), Config::default());
    controller
        .place_train(T1, BlockId(1), Direction::Next, 1)
        .unwrap();
    controller
        .start(T1, RouteAssignment::Fixed(RouteId(1)), 0)
        .unwrap();
    assert_eq!(leading(&controller, T1), vec![BlockId(2)]);

    let mut now = 0;
    pass(&mut controller, &[12, 21], &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Braking);
    assert!(snapshot.leading_blocks.is_empty());

    pass(&mut controller, &[22], &mut now);
    let train = controller.layout().train(T1).unwrap();
    assert_eq!(train.state, TrainState::Stopping);
    assert!(train.is_managed());

    come_to_rest(&mut controller, &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Stopped);
    assert_eq!(snapshot.block, Some(BlockId(2)));
    assert_eq!(
        snapshot.stop_trigger,
        Some(StopTrigger::StopAndRestart { after_ms: 30_000 })
    );
    assert_eq!(snapshot.restart_in_ms, Some(30_000));

    controller.tick(now + 30_000);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Running);
    assert_eq!(snapshot.leading_blocks, vec![BlockId(3), BlockId(4)]);
}

#[test]
fn finishing_train_stops_for_good_at_station() {
    let mut layout = with_trains(line_layout(4).unwrap());
    layout
        .add_route(Route::fixed(
            RouteId(1),
            "with station",
            vec![
                RouteStep::block(BlockId(1), Direction::Next),
                RouteStep::block(BlockId(2), Direction::Next).with_waiting_time_ms(30_000),
                RouteStep::block(BlockId(3), Direction::Next),
            ],
        ))
        .unwrap();
    let mut controller = Controller::new(layout, MockInterface::new(), Config::default());
    controller
        .place_train(T1, BlockId(1), Direction::Next, 1)
        .unwrap();
    controller
        .start(T1, RouteAssignment::Fixed(RouteId(1)), 0)
        .unwrap();
    controller.finish(T1, 10).unwrap();

    let mut now = 10;
    pass(&mut controller, &[12, 21, 22], &mut now);
    let train = controller.layout().train(T1).unwrap();
    assert_eq!(train.state, TrainState::Stopping);
    assert!(!train.is_managed());

    come_to_rest(&mut controller, &mut now);
    assert_eq!(controller.snapshot(T1).unwrap().restart_in_ms, None);
}

// ============================================================================
// Blocked look-ahead
// ============================================================================

fn blocked_at_b4() -> (Controller<MockInterface>, u64) {
    let router = ScriptedRouter::new().respond(Some(steps(&[1, 2, 3, 4, 5])));
    let mut controller = Controller::new(
        with_trains(line_layout(5).unwrap()),
        MockInterface::new(),
        Config::default(),
    )
    .with_router(router);
    controller
        .place_train(T1, BlockId(1), Direction::Next, 1)
        .unwrap();
    controller
        .place_train(T2, BlockId(4), Direction::Next, 1)
        .unwrap();
    controller
        .start(T1, RouteAssignment::Automatic, 0)
        .unwrap();

    let mut now = 0;
    pass(&mut controller, &[12, 21], &mut now);
    // B4 is held, the reservation of B3 survives the failed attempt
    assert_eq!(leading(&controller, T1), vec![BlockId(3)]);
    assert!(controller
        .layout()
        .block(BlockId(4))
        .unwrap()
        .is_reserved_by(T2));

    pass(&mut controller, &[22, 31], &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.block, Some(BlockId(3)));
    assert_eq!(snapshot.state, TrainState::Braking);
    assert_eq!(snapshot.stop_trigger, Some(StopTrigger::TemporaryStop));
    assert!(snapshot.leading_blocks.is_empty());
    (controller, now)
}

#[test]
fn blocked_train_resumes_once_block_is_released() {
    let (mut controller, mut now) = blocked_at_b4();

    // Every train sees the other one's state change and retries
    let report = controller.remove_train(T2, now).unwrap();
    assert!(report.is_clean());
    assert_eq!(controller.snapshot(T1).unwrap().state, TrainState::Running);

    pass(&mut controller, &[32], &mut now);

    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Running);
    assert_eq!(snapshot.stop_trigger, None);
    assert_eq!(snapshot.requested_speed_kph, 120);
    assert_eq!(snapshot.leading_blocks, vec![BlockId(4), BlockId(5)]);
    assert!(snapshot.runtime_error.is_none());
}

#[test]
fn blocked_train_waits_at_stop_feedback() {
    let (mut controller, mut now) = blocked_at_b4();

    pass(&mut controller, &[32], &mut now);
    let train = controller.layout().train(T1).unwrap();
    assert_eq!(train.state, TrainState::Stopping);
    assert!(train.is_managed());
    assert_eq!(train.stop_trigger(), Some(StopTrigger::TemporaryStop));

    come_to_rest(&mut controller, &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Stopped);
    assert_eq!(snapshot.restart_in_ms, None);
    assert!(controller
        .layout()
        .block(BlockId(4))
        .unwrap()
        .is_reserved_by(T2));

    controller.remove_train(T2, now + 100).unwrap();
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Running);
    assert_eq!(snapshot.leading_blocks, vec![BlockId(4), BlockId(5)]);
}

#[test]
fn blocked_new_route_keeps_the_previous_one() {
    // The second route is offered at B2 but is blocked at B4 as well
    let router = ScriptedRouter::new()
        .respond(Some(steps(&[1, 2, 3, 4, 5])))
        .respond(Some(steps(&[2, 3, 4, 5])));
    let mut controller = Controller::new(
        with_trains(line_layout(5).unwrap()),
        MockInterface::new(),
        Config::default(),
    )
    .with_router(router);
    controller
        .place_train(T1, BlockId(1), Direction::Next, 1)
        .unwrap();
    controller
        .place_train(T2, BlockId(4), Direction::Next, 1)
        .unwrap();
    controller
        .start(T1, RouteAssignment::Automatic, 0)
        .unwrap();

    let mut now = 0;
    pass(&mut controller, &[12, 21], &mut now);
    let train = controller.layout().train(T1).unwrap();
    assert_eq!(train.route_step_index, 1);
    let route = controller.layout().route(train.route.unwrap()).unwrap();
    assert_eq!(route.steps.len(), 5);
    assert_eq!(leading(&controller, T1), vec![BlockId(3)]);

    pass(&mut controller, &[22, 31], &mut now);
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.block, Some(BlockId(3)));
    assert_eq!(snapshot.state, TrainState::Braking);
    assert_eq!(snapshot.stop_trigger, Some(StopTrigger::TemporaryStop));
    assert!(snapshot.runtime_error.is_none());
    assert_eq!(controller.layout().train(T1).unwrap().route_step_index, 2);

    controller.remove_train(T2, now).unwrap();
    let snapshot = controller.snapshot(T1).unwrap();
    assert_eq!(snapshot.state, TrainState::Running);
    assert_eq!(snapshot.leading_blocks, vec![BlockId(4), BlockId(5)]);
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn speed_commands_follow_the_state_machine() {
    let mut controller = automatic_once_to_b3();
    let mut now = 0;
    controller.tick(now);
    pass(&mut controller, &[12, 21, 22, 31], &mut now);
    controller.tick(now);
    pass(&mut controller, &[32], &mut now);
    come_to_rest(&mut controller, &mut now);

    let speeds: Vec<u8> = controller
        .interface()
        .commands
        .iter()
        .filter_map(|c| match c {
            InterfaceCommand::SetSpeed { address: 3, steps, .. } => Some(*steps),
            _ => None,
        })
        .collect();
    // Full speed, braking speed (30 of 120 km/h), stop
    assert_eq!(speeds, vec![126, 32, 0]);
}
