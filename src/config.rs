//! Scheduler configuration.
//!
//! Uses `heapless::String` for short names so the config stays a plain
//! value type that can be cloned into every session.
//!
//! # Example
//!
//! ```rust
//! use trainz_dispatch::config::{Config, InertiaConfig, SchedulerConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.scheduler.default_max_leading_blocks, 2);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_scheduler(SchedulerConfig::default().with_braking_speed_kph(25))
//!     .with_inertia(InertiaConfig::default().with_step_size(2));
//! assert_eq!(config.scheduler.braking_speed_kph, 25);
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (session names)
pub const MAX_SHORT_STRING: usize = 64;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    let take = s.len().min(MAX_SHORT_STRING);
    // Find valid UTF-8 boundary
    let valid_end = s
        .char_indices()
        .take_while(|(i, c)| i + c.len_utf8() <= take)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete scheduler configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Session identification
    pub session: SessionConfig,
    /// Reservation and state machine tuning
    pub scheduler: SchedulerConfig,
    /// Speed ramp behaviour
    pub inertia: InertiaConfig,
    /// Command interface pacing
    pub interface: InterfaceConfig,
}

impl Config {
    /// Set session configuration
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set scheduler configuration
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Set inertia configuration
    pub fn with_inertia(mut self, inertia: InertiaConfig) -> Self {
        self.inertia = inertia;
        self
    }

    /// Set interface configuration
    pub fn with_interface(mut self, interface: InterfaceConfig) -> Self {
        self.interface = interface;
        self
    }
}

// ============================================================================
// Session Config
// ============================================================================

/// Session identification, used as the `session` field of the tracing span
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Human-readable session name
    pub name: ShortString,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: short_string("layout"),
        }
    }
}

impl SessionConfig {
    /// Set the session name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }
}

// ============================================================================
// Scheduler Config
// ============================================================================

/// Reservation look-ahead, speed classes and event dispatch limits
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Leading blocks reserved for trains that don't set their own limit
    pub default_max_leading_blocks: usize,
    /// Speed used while braking towards a stop feedback (km/h)
    pub braking_speed_kph: u16,
    /// Speed for limited blocks and branch turnouts (km/h)
    pub limited_speed_kph: u16,
    /// Maximum nesting of follow-up events within one dispatch
    pub max_cascade_depth: usize,
    /// Schedule restart timers after stops at designated stations
    pub automatic_restart: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_leading_blocks: 2,
            braking_speed_kph: 30,
            limited_speed_kph: 50,
            max_cascade_depth: 64,
            automatic_restart: true,
        }
    }
}

impl SchedulerConfig {
    /// Set the default number of leading blocks
    pub fn with_default_max_leading_blocks(mut self, blocks: usize) -> Self {
        self.default_max_leading_blocks = blocks.max(1);
        self
    }

    /// Set the braking speed
    pub fn with_braking_speed_kph(mut self, kph: u16) -> Self {
        self.braking_speed_kph = kph;
        self
    }

    /// Set the limited speed
    pub fn with_limited_speed_kph(mut self, kph: u16) -> Self {
        self.limited_speed_kph = kph;
        self
    }

    /// Set the maximum follow-up event depth
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Enable or disable restart timers
    pub fn with_automatic_restart(mut self, enabled: bool) -> Self {
        self.automatic_restart = enabled;
        self
    }
}

// ============================================================================
// Inertia Config
// ============================================================================

/// Speed ramp configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InertiaConfig {
    /// Decoder steps per ramp increment
    pub step_size: u8,
    /// Delay between ramp increments in milliseconds
    pub step_interval_ms: u64,
    /// Delay after reaching zero before the stop is reported
    pub stop_settle_delay_ms: u64,
}

impl Default for InertiaConfig {
    fn default() -> Self {
        Self {
            step_size: 4,
            step_interval_ms: 100,
            stop_settle_delay_ms: 1000,
        }
    }
}

impl InertiaConfig {
    /// Set the ramp step size (at least 1)
    pub fn with_step_size(mut self, steps: u8) -> Self {
        self.step_size = steps.max(1);
        self
    }

    /// Set the ramp interval
    pub fn with_step_interval_ms(mut self, ms: u64) -> Self {
        self.step_interval_ms = ms;
        self
    }

    /// Set the settle delay after stopping
    pub fn with_stop_settle_delay_ms(mut self, ms: u64) -> Self {
        self.stop_settle_delay_ms = ms;
        self
    }
}

// ============================================================================
// Interface Config
// ============================================================================

/// Command interface pacing
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InterfaceConfig {
    /// Minimum delay between two commands sent to the interface
    pub min_command_interval_ms: u64,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            min_command_interval_ms: 50,
        }
    }
}

impl InterfaceConfig {
    /// Set the minimum command interval
    pub fn with_min_command_interval_ms(mut self, ms: u64) -> Self {
        self.min_command_interval_ms = ms;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
