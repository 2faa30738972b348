//! Hardware abstraction implementations.
//!
//! This module contains concrete implementations of the traits defined in
//! [`crate::traits`] and [`crate::router`].
//!
//! # Available Implementations
//!
//! - `mock`: Recording interface, scripted router and test layouts

pub mod mock;

pub use mock::*;
