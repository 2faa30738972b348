//! Mock implementations for testing without a command station.
//!
//! This module provides a recording [`MockInterface`], a [`ScriptedRouter`]
//! that replays canned automatic routes, and two small layouts used across
//! the unit and integration tests.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockInterface`] | [`CommandInterface`] | Records every command sent |
//! | [`ScriptedRouter`] | [`AutomaticRouter`] | Queued route responses |
//!
//! # Example
//!
//! ```rust
//! use trainz_dispatch::hal::mock::{line_layout, MockInterface};
//! use trainz_dispatch::layout::{BlockId, FeedbackId};
//! use trainz_dispatch::traits::{CommandInterface, InterfaceCommand};
//!
//! let layout = line_layout(3).unwrap();
//! assert_eq!(layout.block(BlockId(2)).unwrap().feedbacks, vec![FeedbackId(21), FeedbackId(22)]);
//!
//! let mut interface = MockInterface::new();
//! interface.execute(&InterfaceCommand::Stop).unwrap();
//! assert_eq!(interface.take_commands(), vec![InterfaceCommand::Stop]);
//! ```
//!
//! [`CommandInterface`]: crate::traits::CommandInterface
//! [`AutomaticRouter`]: crate::router::AutomaticRouter

use std::collections::VecDeque;

use crate::error::LayoutError;
use crate::layout::{
    Block, BlockCategory, BlockId, BlockSide, Feedback, FeedbackId, Layout, RouteStep, SocketRef,
    TrainId, Turnout, TurnoutCategory, TurnoutId,
};
use crate::router::AutomaticRouter;
use crate::traits::{CommandInterface, InterfaceCommand};

// ============================================================================
// Interface Mock
// ============================================================================

/// Mock command interface for testing.
///
/// Records every command it executes. A failing mock refuses every
/// command without recording it.
#[derive(Debug, Default)]
pub struct MockInterface {
    /// Commands executed so far, oldest first.
    pub commands: Vec<InterfaceCommand>,
    fail: bool,
}

impl MockInterface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `execute` call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Return and forget the recorded commands.
    pub fn take_commands(&mut self) -> Vec<InterfaceCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl CommandInterface for MockInterface {
    type Error = ();

    fn execute(&mut self, command: &InterfaceCommand) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.commands.push(command.clone());
        Ok(())
    }
}

// ============================================================================
// Router Mock
// ============================================================================

/// Router returning queued responses in order, then `None`.
#[derive(Debug, Default)]
pub struct ScriptedRouter {
    responses: VecDeque<Option<Vec<RouteStep>>>,
    /// Number of times a route was asked for.
    pub calls: usize,
}

impl ScriptedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the answer to the next request.
    pub fn respond(mut self, steps: Option<Vec<RouteStep>>) -> Self {
        self.responses.push_back(steps);
        self
    }
}

impl AutomaticRouter for ScriptedRouter {
    fn update_automatic_route(&mut self, _layout: &Layout, _train: TrainId) -> Option<Vec<RouteStep>> {
        self.calls += 1;
        self.responses.pop_front().flatten()
    }
}

// ============================================================================
// Test Layouts
// ============================================================================

/// Block `id` with feedbacks `id*10+1` and `id*10+2` on device 1.
fn add_block(layout: &mut Layout, id: u32) -> Result<(), LayoutError> {
    let feedbacks = [FeedbackId(id * 10 + 1), FeedbackId(id * 10 + 2)];
    for feedback in feedbacks {
        layout.add_feedback(Feedback::new(
            feedback,
            &format!("F{}", feedback.0),
            1,
            feedback.0 as u16,
        ))?;
    }
    layout.add_block(
        Block::new(BlockId(id), &format!("B{id}"), BlockCategory::Free)
            .with_feedbacks(&feedbacks)
            .with_length_cm(100.0),
    )
}

/// `n` blocks in a row, `B1` to `Bn`, each 100cm long with two feedbacks.
///
/// `Bi:next` is linked to `B(i+1):previous`.
pub fn line_layout(n: u32) -> Result<Layout, LayoutError> {
    let mut layout = Layout::new();
    for id in 1..=n {
        add_block(&mut layout, id)?;
    }
    for id in 1..n {
        layout.link(
            SocketRef::block(BlockId(id), BlockSide::Next),
            SocketRef::block(BlockId(id + 1), BlockSide::Previous),
        )?;
    }
    Ok(layout)
}

/// `B1` leading into turnout `T1` (single left, address 10), whose
/// straight leg goes to `B2` and branch leg to `B3`.
pub fn junction_layout() -> Result<Layout, LayoutError> {
    let mut layout = Layout::new();
    for id in 1..=3 {
        add_block(&mut layout, id)?;
    }
    layout.add_turnout(Turnout::new(TurnoutId(1), "T1", TurnoutCategory::SingleLeft, 10))?;
    let links = [
        (
            SocketRef::block(BlockId(1), BlockSide::Next),
            SocketRef::turnout(TurnoutId(1), 0),
        ),
        (
            SocketRef::turnout(TurnoutId(1), 1),
            SocketRef::block(BlockId(2), BlockSide::Previous),
        ),
        (
            SocketRef::turnout(TurnoutId(1), 2),
            SocketRef::block(BlockId(3), BlockSide::Previous),
        ),
    ];
    for (a, b) in links {
        layout.link(a, b)?;
    }
    Ok(layout)
}
