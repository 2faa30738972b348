//! Command interface abstraction.
//!
//! The scheduler never talks to a command station directly. It emits
//! [`InterfaceCommand`]s through a [`CommandInterface`] and receives
//! [`InterfaceEvent`]s back (feedback contacts, turnout confirmations,
//! locomotive speed and direction reports).
//!
//! # Implementation
//!
//! For testing, use [`MockInterface`](crate::hal::MockInterface), which
//! records every command it is given.
//!
//! ```rust
//! use trainz_dispatch::hal::MockInterface;
//! use trainz_dispatch::traits::{CommandInterface, InterfaceCommand};
//!
//! let mut interface = MockInterface::new();
//! interface.execute(&InterfaceCommand::Go).unwrap();
//! assert_eq!(interface.commands, vec![InterfaceCommand::Go]);
//! ```

use crate::layout::TurnoutState;
use crate::speed::Decoder;

/// Command sent to the layout's command station.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "command", rename_all = "snake_case"))]
pub enum InterfaceCommand {
    /// Set a locomotive's speed step.
    SetSpeed {
        address: u16,
        decoder: Decoder,
        steps: u8,
    },
    /// Set a locomotive's travel direction.
    SetDirection {
        address: u16,
        decoder: Decoder,
        forward: bool,
    },
    /// Switch a turnout.
    SetTurnout { address: u16, state: TurnoutState },
    /// Turn track power on.
    Go,
    /// Turn track power off.
    Stop,
    /// Ask the command station to report known locomotives.
    QueryLocomotives,
}

impl InterfaceCommand {
    /// Returns the command name as a lowercase string.
    pub const fn name(&self) -> &'static str {
        match self {
            InterfaceCommand::SetSpeed { .. } => "set_speed",
            InterfaceCommand::SetDirection { .. } => "set_direction",
            InterfaceCommand::SetTurnout { .. } => "set_turnout",
            InterfaceCommand::Go => "go",
            InterfaceCommand::Stop => "stop",
            InterfaceCommand::QueryLocomotives => "query_locomotives",
        }
    }
}

/// Notification from the command station.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", rename_all = "snake_case"))]
pub enum InterfaceEvent {
    /// A feedback contact changed state.
    Feedback {
        device_id: u16,
        contact_id: u16,
        detected: bool,
    },
    /// A turnout reports its position.
    TurnoutChanged { address: u16, state: TurnoutState },
    /// A locomotive reports its speed step.
    SpeedChanged { address: u16, steps: u8 },
    /// A locomotive reports its direction.
    DirectionChanged { address: u16, forward: bool },
}

/// Connection to a command station.
///
/// `execute` hands a command over for transmission. Results come back
/// asynchronously as [`InterfaceEvent`]s.
pub trait CommandInterface {
    /// Error type for failed transmissions.
    type Error: core::fmt::Debug;

    /// Send one command.
    fn execute(&mut self, command: &InterfaceCommand) -> Result<(), Self::Error>;
}

impl<T: CommandInterface + ?Sized> CommandInterface for Box<T> {
    type Error = T::Error;

    fn execute(&mut self, command: &InterfaceCommand) -> Result<(), Self::Error> {
        (**self).execute(command)
    }
}
