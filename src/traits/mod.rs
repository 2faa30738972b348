//! Trait definitions for the scheduler's outer seams.
//!
//! # Submodules
//!
//! - `interface`: command station commands, events and the
//!   [`CommandInterface`] trait
//!
//! The automatic router seam lives in [`crate::router`] next to its default
//! implementation.

pub mod interface;

pub use interface::*;
