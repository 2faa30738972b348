//! Turnouts and their socket connections.
//!
//! Sockets are numbered per category:
//!
//! | Category | Sockets | States |
//! |----------|---------|--------|
//! | `SingleLeft` / `SingleRight` | 0 toe, 1 straight, 2 branch | straight (0-1), branch (0-2) |
//! | `ThreeWay` | 0 toe, 1 straight, 2 left, 3 right | straight (0-1), left (0-2), right (0-3) |
//! | `DoubleSlip` | 0, 1 on one side, 2, 3 on the other | straight (0-1, 2-3), branch (0-3, 2-1) |

use super::ids::{TrainId, TurnoutId};

/// Physical kind of turnout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TurnoutCategory {
    SingleLeft,
    SingleRight,
    ThreeWay,
    DoubleSlip,
}

/// Switch position of a turnout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TurnoutState {
    #[default]
    Straight,
    BranchLeft,
    BranchRight,
    /// Crossing position of a double slip.
    Branch,
}

impl TurnoutState {
    /// Returns true for any diverging position.
    pub const fn is_branch(&self) -> bool {
        !matches!(self, TurnoutState::Straight)
    }

    /// Returns the state as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TurnoutState::Straight => "straight",
            TurnoutState::BranchLeft => "branch_left",
            TurnoutState::BranchRight => "branch_right",
            TurnoutState::Branch => "branch",
        }
    }
}

impl TurnoutCategory {
    /// States this category can be switched to.
    pub const fn states(&self) -> &'static [TurnoutState] {
        match self {
            TurnoutCategory::SingleLeft => &[TurnoutState::Straight, TurnoutState::BranchLeft],
            TurnoutCategory::SingleRight => &[TurnoutState::Straight, TurnoutState::BranchRight],
            TurnoutCategory::ThreeWay => &[
                TurnoutState::Straight,
                TurnoutState::BranchLeft,
                TurnoutState::BranchRight,
            ],
            TurnoutCategory::DoubleSlip => &[TurnoutState::Straight, TurnoutState::Branch],
        }
    }

    /// Number of sockets.
    pub const fn socket_count(&self) -> u8 {
        match self {
            TurnoutCategory::SingleLeft | TurnoutCategory::SingleRight => 3,
            TurnoutCategory::ThreeWay | TurnoutCategory::DoubleSlip => 4,
        }
    }

    /// Socket pairs connected in `state`. Empty for unsupported states.
    pub const fn connections(&self, state: TurnoutState) -> &'static [(u8, u8)] {
        match (self, state) {
            (TurnoutCategory::SingleLeft, TurnoutState::Straight)
            | (TurnoutCategory::SingleRight, TurnoutState::Straight)
            | (TurnoutCategory::ThreeWay, TurnoutState::Straight) => &[(0, 1)],
            (TurnoutCategory::SingleLeft, TurnoutState::BranchLeft)
            | (TurnoutCategory::SingleRight, TurnoutState::BranchRight)
            | (TurnoutCategory::ThreeWay, TurnoutState::BranchLeft) => &[(0, 2)],
            (TurnoutCategory::ThreeWay, TurnoutState::BranchRight) => &[(0, 3)],
            (TurnoutCategory::DoubleSlip, TurnoutState::Straight) => &[(0, 1), (2, 3)],
            (TurnoutCategory::DoubleSlip, TurnoutState::Branch) => &[(0, 3), (2, 1)],
            _ => &[],
        }
    }

    /// Returns true when `state` is valid for this category.
    pub fn supports(&self, state: TurnoutState) -> bool {
        self.states().contains(&state)
    }

    /// Socket a train leaves through when entering at `entry` in `state`.
    pub fn exit_socket(&self, state: TurnoutState, entry: u8) -> Option<u8> {
        self.connections(state).iter().find_map(|&(a, b)| {
            if a == entry {
                Some(b)
            } else if b == entry {
                Some(a)
            } else {
                None
            }
        })
    }
}

/// A turnout on the layout.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Turnout {
    pub id: TurnoutId,
    pub name: String,
    pub category: TurnoutCategory,
    /// Accessory decoder address.
    pub address: u16,
    /// Branch positions impose the limited speed class.
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub branch_speed_limited: bool,
    /// State most recently asked for by a reservation.
    #[cfg_attr(feature = "serde", serde(default))]
    pub requested_state: TurnoutState,
    /// State last confirmed by the command interface.
    #[cfg_attr(feature = "serde", serde(default))]
    pub actual_state: TurnoutState,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub reservation: Option<TrainId>,
}

#[cfg(feature = "serde")]
fn default_true() -> bool {
    true
}

impl Turnout {
    /// Create a straight turnout.
    pub fn new(id: TurnoutId, name: &str, category: TurnoutCategory, address: u16) -> Self {
        Self {
            id,
            name: name.to_string(),
            category,
            address,
            branch_speed_limited: true,
            requested_state: TurnoutState::Straight,
            actual_state: TurnoutState::Straight,
            reservation: None,
        }
    }

    /// Set whether branch states limit speed.
    pub fn with_branch_speed_limited(mut self, limited: bool) -> Self {
        self.branch_speed_limited = limited;
        self
    }

    /// Returns true when the confirmed state matches the requested one.
    pub fn is_settled(&self) -> bool {
        self.requested_state == self.actual_state
    }

    /// Returns true when the requested state imposes the limited speed class.
    pub fn limits_speed(&self) -> bool {
        self.branch_speed_limited && self.requested_state.is_branch()
    }
}
