//! Speed ramps for locomotives with inertia.
//!
//! Speed requests don't jump straight to the target: the
//! [`InertiaController`] walks each train towards its target in fixed
//! increments, one increment per interval, and reports every intermediate
//! step so the controller can send it to the decoder.
//!
//! # Completion
//!
//! Each request ends in exactly one [`RampCompletion`]:
//!
//! - when the target is reached (for a target of zero, only after the
//!   settle delay, so the stop is reported once the train has really come
//!   to rest)
//! - with `cancelled = true` when a newer request for the same train
//!   replaces it
//!
//! # Example
//!
//! ```rust
//! use trainz_dispatch::inertia::InertiaController;
//! use trainz_dispatch::config::InertiaConfig;
//! use trainz_dispatch::layout::TrainId;
//!
//! let mut ramps = InertiaController::new(InertiaConfig::default());
//! let train = TrainId(1);
//!
//! // Ramp from 0 to 8 in steps of 4 every 100ms
//! assert!(ramps.request(train, 8, true, 0).is_none());
//! let tick = ramps.update(0);
//! assert_eq!(tick.updates[0].steps, 4);
//! let tick = ramps.update(100);
//! assert_eq!(tick.updates[0].steps, 8);
//! assert_eq!(tick.completions.len(), 1);
//! assert!(!tick.completions[0].cancelled);
//! ```

use std::collections::BTreeMap;

use tracing::trace;

use crate::config::InertiaConfig;
use crate::layout::TrainId;

/// An in-progress ramp for one train.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveRamp {
    /// Target speed step.
    pub target: u8,
    /// Step change per interval. `u8::MAX` jumps straight to the target.
    pub step_size: u8,
    /// Time of the next increment.
    pub next_step_ms: u64,
    /// Set once a ramp to zero has arrived; the stop is reported at this time.
    pub settle_until_ms: Option<u64>,
}

/// A speed step to send to a decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeedUpdate {
    pub train: TrainId,
    pub steps: u8,
}

/// End of a ramp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RampCompletion {
    pub train: TrainId,
    /// Speed step at the time the ramp ended.
    pub steps: u8,
    /// The ramp was replaced before it finished.
    pub cancelled: bool,
}

/// Output of one [`InertiaController::update`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RampTick {
    pub updates: Vec<SpeedUpdate>,
    pub completions: Vec<RampCompletion>,
}

/// Per-train speed ramps.
pub struct InertiaController {
    config: InertiaConfig,
    ramps: BTreeMap<TrainId, ActiveRamp>,
    current: BTreeMap<TrainId, u8>,
}

impl InertiaController {
    pub fn new(config: InertiaConfig) -> Self {
        Self {
            config,
            ramps: BTreeMap::new(),
            current: BTreeMap::new(),
        }
    }

    /// Start ramping `train` towards `target`.
    ///
    /// Without inertia the next update jumps to the target. Returns the
    /// cancelled completion of the ramp this request replaces, if any.
    #[must_use]
    pub fn request(
        &mut self,
        train: TrainId,
        target: u8,
        inertia: bool,
        now_ms: u64,
    ) -> Option<RampCompletion> {
        let cancelled = self.ramps.remove(&train).map(|_| RampCompletion {
            train,
            steps: self.current(train),
            cancelled: true,
        });
        let step_size = if inertia {
            self.config.step_size.max(1)
        } else {
            u8::MAX
        };
        self.ramps.insert(
            train,
            ActiveRamp {
                target,
                step_size,
                next_step_ms: now_ms,
                settle_until_ms: None,
            },
        );
        trace!(%train, target, inertia, "speed ramp requested");
        cancelled
    }

    /// Advance every ramp to `now_ms`.
    pub fn update(&mut self, now_ms: u64) -> RampTick {
        let mut tick = RampTick::default();
        let mut finished = Vec::new();

        for (train, ramp) in self.ramps.iter_mut() {
            let current = self.current.entry(*train).or_insert(0);

            if let Some(settle) = ramp.settle_until_ms {
                if now_ms >= settle {
                    finished.push(*train);
                    tick.completions.push(RampCompletion {
                        train: *train,
                        steps: *current,
                        cancelled: false,
                    });
                }
                continue;
            }

            while *current != ramp.target && now_ms >= ramp.next_step_ms {
                *current = if *current < ramp.target {
                    current.saturating_add(ramp.step_size).min(ramp.target)
                } else {
                    current.saturating_sub(ramp.step_size).max(ramp.target)
                };
                ramp.next_step_ms += self.config.step_interval_ms.max(1);
                tick.updates.push(SpeedUpdate {
                    train: *train,
                    steps: *current,
                });
            }

            if *current == ramp.target {
                if ramp.target == 0 {
                    let settle = now_ms + self.config.stop_settle_delay_ms;
                    ramp.settle_until_ms = Some(settle);
                    if now_ms >= settle {
                        finished.push(*train);
                        tick.completions.push(RampCompletion {
                            train: *train,
                            steps: 0,
                            cancelled: false,
                        });
                    }
                } else {
                    finished.push(*train);
                    tick.completions.push(RampCompletion {
                        train: *train,
                        steps: *current,
                        cancelled: false,
                    });
                }
            }
        }

        for train in finished {
            self.ramps.remove(&train);
        }
        tick
    }

    /// Drop the ramp of `train` and force its speed step.
    /// Returns the cancelled completion, if a ramp was active.
    #[must_use]
    pub fn cancel_and_set(&mut self, train: TrainId, steps: u8) -> Option<RampCompletion> {
        let cancelled = self.ramps.remove(&train).map(|_| RampCompletion {
            train,
            steps: self.current(train),
            cancelled: true,
        });
        self.current.insert(train, steps);
        cancelled
    }

    /// Speed step last reported for `train`.
    pub fn current(&self, train: TrainId) -> u8 {
        self.current.get(&train).copied().unwrap_or(0)
    }

    /// Target of the active ramp of `train`.
    pub fn target(&self, train: TrainId) -> Option<u8> {
        self.ramps.get(&train).map(|r| r.target)
    }

    /// Check if a ramp is in progress for `train`
    pub fn is_ramping(&self, train: TrainId) -> bool {
        self.ramps.contains_key(&train)
    }

    /// Record a speed step reported by the decoder without touching ramps.
    pub fn observe(&mut self, train: TrainId, steps: u8) {
        self.current.insert(train, steps);
    }
}
