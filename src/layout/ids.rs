//! Typed identifiers for layout elements.

use core::fmt;

macro_rules! layout_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

layout_id!(
    /// Identifies a block (a track section with feedback sensors).
    BlockId,
    "b"
);
layout_id!(
    /// Identifies a turnout.
    TurnoutId,
    "t"
);
layout_id!(
    /// Identifies a feedback contact.
    FeedbackId,
    "f"
);
layout_id!(
    /// Identifies a train.
    TrainId,
    "train"
);
layout_id!(
    /// Identifies a station (a group of interchangeable blocks).
    StationId,
    "s"
);
layout_id!(
    /// Identifies a route.
    RouteId,
    "r"
);

impl RouteId {
    const AUTOMATIC_BIT: u32 = 1 << 31;

    /// Route slot holding the generated route of `train`.
    ///
    /// Automatic routes live in the upper half of the id space so they never
    /// collide with authored routes.
    pub const fn automatic_for(train: TrainId) -> Self {
        Self(Self::AUTOMATIC_BIT | train.0)
    }

    /// Returns true for ids created by [`RouteId::automatic_for`].
    pub const fn is_automatic(&self) -> bool {
        self.0 & Self::AUTOMATIC_BIT != 0
    }
}
