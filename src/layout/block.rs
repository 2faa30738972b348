//! Blocks, feedback contacts and travel direction.
//!
//! A block has two sockets, `previous` and `next`. A train travelling in
//! [`Direction::Next`] enters through the previous socket and leaves through
//! the next one. Feedbacks are listed in the order a train meets them when
//! travelling in [`Direction::Next`].
//!
//! # Position
//!
//! A train's position inside a block counts the feedbacks it has passed,
//! measured from the previous socket:
//!
//! ```text
//!  previous  [f0]   [f1]   [f2]  next
//!     |  p=0  |  p=1 |  p=2 | p=3  |
//! ```
//!
//! Moving `Next` from position `p` the feedback ahead is `f[p]`; moving
//! `Previous` it is `f[p - 1]`.
//!
//! ```rust
//! use trainz_dispatch::layout::{Block, BlockCategory, BlockId, Direction, FeedbackId};
//!
//! let block = Block::new(BlockId(1), "Yard", BlockCategory::Free)
//!     .with_feedbacks(&[FeedbackId(10), FeedbackId(11)]);
//!
//! assert_eq!(block.entry_feedback(Direction::Next), Some(FeedbackId(10)));
//! assert_eq!(block.feedback_ahead(Direction::Next, 1), Some((FeedbackId(11), 2)));
//! assert_eq!(block.feedback_ahead(Direction::Previous, 0), None);
//! ```

use core::fmt;

use super::ids::{BlockId, FeedbackId, TrainId};

/// Direction of travel through a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// From the previous socket towards the next socket.
    #[default]
    Next,
    /// From the next socket towards the previous socket.
    Previous,
}

impl Direction {
    /// Returns the direction as a lowercase string.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Previous => "previous",
        }
    }

    /// Parses a direction from text (case-insensitive).
    pub fn from_text(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("next") {
            Some(Direction::Next)
        } else if text.eq_ignore_ascii_case("previous") {
            Some(Direction::Previous)
        } else {
            None
        }
    }

    /// The reverse direction.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Direction::Next => Direction::Previous,
            Direction::Previous => Direction::Next,
        }
    }

    /// Socket a train leaves through when travelling this way.
    #[inline]
    pub const fn exit_side(self) -> BlockSide {
        match self {
            Direction::Next => BlockSide::Next,
            Direction::Previous => BlockSide::Previous,
        }
    }

    /// Direction of a train that entered a block through `side`.
    #[inline]
    pub const fn entering_through(side: BlockSide) -> Self {
        match side {
            BlockSide::Previous => Direction::Next,
            BlockSide::Next => Direction::Previous,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two sockets of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BlockSide {
    Previous,
    Next,
}

/// Capacity class of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BlockCategory {
    /// Plain running track.
    #[default]
    Free,
    /// Platform track. Scheduled trains stop here.
    Station,
    /// Dead end reached through the previous socket.
    SidingPrevious,
    /// Dead end reached through the next socket.
    SidingNext,
}

/// Speed class of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SpeedLimit {
    #[default]
    Unlimited,
    Limited,
}

/// Ownership record of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockReservation {
    /// Train holding the block.
    pub train: TrainId,
    /// Direction the train travels (or will travel) through the block.
    pub direction: Direction,
}

/// Default stop duration at a block when a route step doesn't set one.
pub const DEFAULT_WAITING_TIME_MS: u64 = 10_000;

/// A track section with ordered feedback contacts.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub category: BlockCategory,
    /// Length in centimetres, `None` when not measured.
    pub length_cm: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default = "default_waiting_time"))]
    pub waiting_time_ms: u64,
    /// Feedbacks in the order met when travelling [`Direction::Next`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub feedbacks: Vec<FeedbackId>,
    pub brake_feedback_next: Option<FeedbackId>,
    pub stop_feedback_next: Option<FeedbackId>,
    pub brake_feedback_previous: Option<FeedbackId>,
    pub stop_feedback_previous: Option<FeedbackId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub speed_limit: SpeedLimit,
    /// Braking speed override for this block (km/h).
    pub braking_speed_kph: Option<u16>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub reservation: Option<BlockReservation>,
}

#[cfg(feature = "serde")]
fn default_waiting_time() -> u64 {
    DEFAULT_WAITING_TIME_MS
}

impl Block {
    /// Create an empty block.
    pub fn new(id: BlockId, name: &str, category: BlockCategory) -> Self {
        Self {
            id,
            name: name.to_string(),
            category,
            length_cm: None,
            waiting_time_ms: DEFAULT_WAITING_TIME_MS,
            feedbacks: Vec::new(),
            brake_feedback_next: None,
            stop_feedback_next: None,
            brake_feedback_previous: None,
            stop_feedback_previous: None,
            speed_limit: SpeedLimit::Unlimited,
            braking_speed_kph: None,
            reservation: None,
        }
    }

    /// Set the feedbacks, ordered for [`Direction::Next`].
    pub fn with_feedbacks(mut self, feedbacks: &[FeedbackId]) -> Self {
        self.feedbacks = feedbacks.to_vec();
        self
    }

    /// Set the length in centimetres.
    pub fn with_length_cm(mut self, length: f64) -> Self {
        self.length_cm = Some(length);
        self
    }

    /// Set the default stop duration.
    pub fn with_waiting_time_ms(mut self, ms: u64) -> Self {
        self.waiting_time_ms = ms;
        self
    }

    /// Set the speed class.
    pub fn with_speed_limit(mut self, limit: SpeedLimit) -> Self {
        self.speed_limit = limit;
        self
    }

    /// Override the brake and stop feedbacks for one direction.
    pub fn with_brake_and_stop(
        mut self,
        direction: Direction,
        brake: FeedbackId,
        stop: FeedbackId,
    ) -> Self {
        match direction {
            Direction::Next => {
                self.brake_feedback_next = Some(brake);
                self.stop_feedback_next = Some(stop);
            }
            Direction::Previous => {
                self.brake_feedback_previous = Some(brake);
                self.stop_feedback_previous = Some(stop);
            }
        }
        self
    }

    /// First feedback met when entering in `direction`.
    pub fn entry_feedback(&self, direction: Direction) -> Option<FeedbackId> {
        match direction {
            Direction::Next => self.feedbacks.first().copied(),
            Direction::Previous => self.feedbacks.last().copied(),
        }
    }

    /// Feedback that starts braking, defaults to the entry feedback.
    pub fn brake_feedback(&self, direction: Direction) -> Option<FeedbackId> {
        let explicit = match direction {
            Direction::Next => self.brake_feedback_next,
            Direction::Previous => self.brake_feedback_previous,
        };
        explicit.or_else(|| self.entry_feedback(direction))
    }

    /// Feedback that stops the train, defaults to the last one met.
    pub fn stop_feedback(&self, direction: Direction) -> Option<FeedbackId> {
        let explicit = match direction {
            Direction::Next => self.stop_feedback_next,
            Direction::Previous => self.stop_feedback_previous,
        };
        explicit.or_else(|| self.entry_feedback(direction.opposite()))
    }

    /// Position of a train that has just passed the entry feedback.
    pub fn entry_position(&self, direction: Direction) -> usize {
        match direction {
            Direction::Next => 1.min(self.feedbacks.len()),
            Direction::Previous => self.feedbacks.len().saturating_sub(1),
        }
    }

    /// Feedback ahead of `position` and the position after passing it.
    pub fn feedback_ahead(&self, direction: Direction, position: usize) -> Option<(FeedbackId, usize)> {
        match direction {
            Direction::Next => self.feedbacks.get(position).map(|f| (*f, position + 1)),
            Direction::Previous => {
                let index = position.checked_sub(1)?;
                self.feedbacks.get(index).map(|f| (*f, index))
            }
        }
    }

    /// Returns true when no train holds the block.
    pub fn is_free(&self) -> bool {
        self.reservation.is_none()
    }

    /// Returns true when `train` holds the block.
    pub fn is_reserved_by(&self, train: TrainId) -> bool {
        self.reservation.is_some_and(|r| r.train == train)
    }

    /// Returns true when a train other than `train` holds the block.
    pub fn is_reserved_by_other(&self, train: TrainId) -> bool {
        self.reservation.is_some_and(|r| r.train != train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_feedback_block() -> Block {
        Block::new(BlockId(1), "Main", BlockCategory::Free).with_feedbacks(&[
            FeedbackId(1),
            FeedbackId(2),
            FeedbackId(3),
        ])
    }

    #[test]
    fn default_brake_and_stop_follow_direction() {
        let block = three_feedback_block();
        assert_eq!(block.brake_feedback(Direction::Next), Some(FeedbackId(1)));
        assert_eq!(block.stop_feedback(Direction::Next), Some(FeedbackId(3)));
        assert_eq!(block.brake_feedback(Direction::Previous), Some(FeedbackId(3)));
        assert_eq!(block.stop_feedback(Direction::Previous), Some(FeedbackId(1)));
    }

    #[test]
    fn explicit_brake_and_stop_override_defaults() {
        let block = three_feedback_block().with_brake_and_stop(
            Direction::Next,
            FeedbackId(2),
            FeedbackId(2),
        );
        assert_eq!(block.brake_feedback(Direction::Next), Some(FeedbackId(2)));
        assert_eq!(block.stop_feedback(Direction::Next), Some(FeedbackId(2)));
        assert_eq!(block.stop_feedback(Direction::Previous), Some(FeedbackId(1)));
    }

    #[test]
    fn entry_positions() {
        let block = three_feedback_block();
        assert_eq!(block.entry_position(Direction::Next), 1);
        assert_eq!(block.entry_position(Direction::Previous), 2);
    }

    #[test]
    fn feedback_ahead_walks_both_ways() {
        let block = three_feedback_block();
        assert_eq!(block.feedback_ahead(Direction::Next, 1), Some((FeedbackId(2), 2)));
        assert_eq!(block.feedback_ahead(Direction::Next, 3), None);
        assert_eq!(block.feedback_ahead(Direction::Previous, 2), Some((FeedbackId(2), 1)));
        assert_eq!(block.feedback_ahead(Direction::Previous, 1), Some((FeedbackId(1), 0)));
        assert_eq!(block.feedback_ahead(Direction::Previous, 0), None);
    }

    #[test]
    fn block_without_feedbacks() {
        let block = Block::new(BlockId(2), "Bare", BlockCategory::Free);
        assert_eq!(block.entry_feedback(Direction::Next), None);
        assert_eq!(block.entry_position(Direction::Next), 0);
        assert_eq!(block.stop_feedback(Direction::Previous), None);
    }

    #[test]
    fn direction_text() {
        assert_eq!(Direction::from_text("NEXT"), Some(Direction::Next));
        assert_eq!(Direction::from_text("previous"), Some(Direction::Previous));
        assert_eq!(Direction::from_text("forward"), None);
        assert_eq!(Direction::Next.opposite(), Direction::Previous);
    }

    #[test]
    fn reservation_queries() {
        let mut block = three_feedback_block();
        assert!(block.is_free());
        block.reservation = Some(BlockReservation {
            train: TrainId(1),
            direction: Direction::Next,
        });
        assert!(block.is_reserved_by(TrainId(1)));
        assert!(block.is_reserved_by_other(TrainId(2)));
        assert!(!block.is_reserved_by_other(TrainId(1)));
    }
}
