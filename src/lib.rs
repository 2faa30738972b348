//! # trainz-dispatch
//!
//! A block reservation and train movement scheduler for model railway
//! layouts driven through a digital command station.
//!
//! ## Features
//!
//! - **Block reservations**: A train only moves into track it holds, and a
//!   block or turnout is never held by two trains
//! - **Routes**: Fixed routes, endless automatic routing to stations, and
//!   one-shot automatic runs to a destination block
//! - **Train state machine**: Running, braking, stopping and stopped, with
//!   timed restarts at stations
//! - **Speed handling**: Block and turnout speed limits, inertia ramps and
//!   decoder step conversion
//! - **Priority sending**: Emergency stop always goes out first
//!
//! ## Architecture
//!
//! The crate is structured to allow testing without a command station:
//!
//! - `layout` - Track graph, trains and routes
//! - `reservation` - Leading/occupied block bookkeeping
//! - `handlers` - Event handler chain implementing the train state machine
//! - `controller` - Facade dispatching events through the chain
//! - `runtime` - Tokio session driver (feature `runtime`)
//! - `hal` - Mock command station, scripted router and test layouts
//!
//! ## Example
//!
//! ```rust
//! use trainz_dispatch::{
//!     Config, Controller, RouteAssignment,
//!     hal::mock::{line_layout, MockInterface},
//!     layout::{BlockId, Destination, Direction, Train, TrainId},
//!     traits::InterfaceEvent,
//! };
//!
//! let mut layout = line_layout(3).unwrap();
//! layout.add_train(Train::new(TrainId(1), "ICE", 3)).unwrap();
//!
//! let mut controller = Controller::new(layout, MockInterface::new(), Config::default());
//! controller.place_train(TrainId(1), BlockId(1), Direction::Next, 1).unwrap();
//!
//! // Drive to B3 and stop there
//! let destination = Destination { block: BlockId(3), direction: None };
//! controller
//!     .start(TrainId(1), RouteAssignment::AutomaticOnce(destination), 0)
//!     .unwrap();
//!
//! // Feed command station notifications as they arrive
//! let event = InterfaceEvent::Feedback { device_id: 1, contact_id: 12, detected: true };
//! let report = controller.handle_interface_event(event, 100);
//! assert!(report.is_clean());
//!
//! // Call tick() regularly to ramp speeds and send commands
//! controller.tick(200);
//! ```

/// Scheduler, inertia and interface configuration.
pub mod config;
/// Controller facade dispatching events through the handler chain.
pub mod controller;
/// Invariant, script and layout construction errors.
pub mod error;
/// Layout events and their kinds.
pub mod events;
/// Mock command interface, scripted router and test layouts.
pub mod hal;
/// Train handlers forming the movement state machine.
pub mod handlers;
/// Speed ramps towards requested decoder steps.
pub mod inertia;
/// Blocks, turnouts, feedbacks, trains, stations and routes.
pub mod layout;
/// `tracing-subscriber` setup for binaries.
pub mod logger;
/// Prioritised command send queue.
pub mod priority;
/// Leading and occupied block reservations.
pub mod reservation;
/// Automatic route computation.
pub mod router;
/// Route scripts compiled into route steps.
pub mod script;
/// Speed units and decoder step conversion.
pub mod speed;
/// Millisecond timers for restarts and ramps.
pub mod timer;
/// Command station interface traits.
pub mod traits;

/// Layout documents (JSON).
#[cfg(feature = "serde")]
pub mod document;

/// Tokio session driver.
#[cfg(feature = "runtime")]
pub mod runtime;

// Re-exports for convenience
pub use config::{Config, InertiaConfig, InterfaceConfig, SchedulerConfig, SessionConfig};
pub use controller::{Controller, DispatchReport, RouteAssignment, TrainSnapshot};
pub use error::{InvariantError, LayoutError, ScriptError};
pub use events::{EventKind, LayoutEvent};
pub use handlers::TrainHandler;
pub use reservation::ReservationManager;
pub use router::{AutomaticRouter, ShortestPathRouter};
pub use traits::{CommandInterface, InterfaceCommand, InterfaceEvent};

#[cfg(feature = "serde")]
pub use document::LayoutDocument;

#[cfg(feature = "runtime")]
pub use runtime::{spawn_session, SessionHandle};
