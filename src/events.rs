//! Layout events driving the train handlers.

use crate::layout::{FeedbackId, TrainId, TurnoutId};

/// Something that happened on the layout.
///
/// Events tied to one train are delivered to that train only; the others
/// are broadcast to every managed train.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutEvent {
    /// A feedback contact started detecting.
    FeedbackTriggered(FeedbackId),
    /// A train was handed to or taken from the scheduler.
    SchedulingChanged(TrainId),
    /// A train's restart delay elapsed.
    RestartTimerExpired(TrainId),
    /// A turnout confirmed a new position.
    TurnoutChanged(TurnoutId),
    /// A locomotive reported a new direction.
    DirectionChanged(TrainId),
    /// A locomotive reported a new speed.
    SpeedChanged(TrainId),
    /// A train's movement state changed.
    StateChanged(TrainId),
    /// A train passed a feedback inside its block.
    MovedInsideBlock(TrainId),
    /// A train's head entered the next block.
    MovedToNextBlock(TrainId),
}

/// Discriminant of a [`LayoutEvent`], used for handler subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    FeedbackTriggered,
    SchedulingChanged,
    RestartTimerExpired,
    TurnoutChanged,
    DirectionChanged,
    SpeedChanged,
    StateChanged,
    MovedInsideBlock,
    MovedToNextBlock,
}

impl EventKind {
    /// Every event kind.
    pub const ALL: &'static [EventKind] = &[
        EventKind::FeedbackTriggered,
        EventKind::SchedulingChanged,
        EventKind::RestartTimerExpired,
        EventKind::TurnoutChanged,
        EventKind::DirectionChanged,
        EventKind::SpeedChanged,
        EventKind::StateChanged,
        EventKind::MovedInsideBlock,
        EventKind::MovedToNextBlock,
    ];
}

impl LayoutEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            LayoutEvent::FeedbackTriggered(_) => EventKind::FeedbackTriggered,
            LayoutEvent::SchedulingChanged(_) => EventKind::SchedulingChanged,
            LayoutEvent::RestartTimerExpired(_) => EventKind::RestartTimerExpired,
            LayoutEvent::TurnoutChanged(_) => EventKind::TurnoutChanged,
            LayoutEvent::DirectionChanged(_) => EventKind::DirectionChanged,
            LayoutEvent::SpeedChanged(_) => EventKind::SpeedChanged,
            LayoutEvent::StateChanged(_) => EventKind::StateChanged,
            LayoutEvent::MovedInsideBlock(_) => EventKind::MovedInsideBlock,
            LayoutEvent::MovedToNextBlock(_) => EventKind::MovedToNextBlock,
        }
    }

    /// The only train this event is delivered to, `None` for broadcasts.
    pub const fn target_train(&self) -> Option<TrainId> {
        match self {
            LayoutEvent::SchedulingChanged(t)
            | LayoutEvent::RestartTimerExpired(t)
            | LayoutEvent::DirectionChanged(t)
            | LayoutEvent::SpeedChanged(t) => Some(*t),
            _ => None,
        }
    }

    /// The feedback that triggered this event, if it is a feedback event.
    pub const fn feedback(&self) -> Option<FeedbackId> {
        match self {
            LayoutEvent::FeedbackTriggered(f) => Some(*f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_scoped_events() {
        assert_eq!(
            LayoutEvent::SchedulingChanged(TrainId(2)).target_train(),
            Some(TrainId(2))
        );
        assert_eq!(LayoutEvent::StateChanged(TrainId(2)).target_train(), None);
        assert_eq!(LayoutEvent::FeedbackTriggered(FeedbackId(1)).target_train(), None);
    }

    #[test]
    fn kinds_cover_every_event() {
        let events = [
            LayoutEvent::FeedbackTriggered(FeedbackId(1)),
            LayoutEvent::SchedulingChanged(TrainId(1)),
            LayoutEvent::RestartTimerExpired(TrainId(1)),
            LayoutEvent::TurnoutChanged(TurnoutId(1)),
            LayoutEvent::DirectionChanged(TrainId(1)),
            LayoutEvent::SpeedChanged(TrainId(1)),
            LayoutEvent::StateChanged(TrainId(1)),
            LayoutEvent::MovedInsideBlock(TrainId(1)),
            LayoutEvent::MovedToNextBlock(TrainId(1)),
        ];
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, EventKind::ALL);
    }
}
