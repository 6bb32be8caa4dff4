//! Tick-driven timers and spawn sequences.
//!
//! Everything that waits in the simulation owns one of these objects and
//! advances it with the fixed step. Cancelling a wait means dropping or
//! resetting its owner's timer.

use serde::{Deserialize, Serialize};

use crate::enemy_data::EnemyKind;
use crate::math::{fixed_serde, Fixed};
use crate::wave::{EnemyGroup, Wave};

/// One-shot countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Countdown {
    #[serde(with = "fixed_serde")]
    remaining: Fixed,
    running: bool,
}

impl Countdown {
    /// A countdown that fires after `duration`.
    #[must_use]
    pub const fn new(duration: Fixed) -> Self {
        Self {
            remaining: duration,
            running: true,
        }
    }

    /// An inactive countdown.
    #[must_use]
    pub const fn stopped() -> Self {
        Self {
            remaining: Fixed::ZERO,
            running: false,
        }
    }

    /// Restart with a new duration.
    pub fn restart(&mut self, duration: Fixed) {
        *self = Self::new(duration);
    }

    /// Stop without firing.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the countdown is still pending.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Time left, zero once fired.
    #[must_use]
    pub fn remaining(&self) -> Fixed {
        if self.running {
            self.remaining.max(Fixed::ZERO)
        } else {
            Fixed::ZERO
        }
    }

    /// Advance by `dt`; returns `true` on the step it fires.
    pub fn tick(&mut self, dt: Fixed) -> bool {
        if !self.running {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= Fixed::ZERO {
            self.running = false;
            return true;
        }
        false
    }
}

/// Periodic timer that carries leftover time between fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Interval {
    #[serde(with = "fixed_serde")]
    period: Fixed,
    #[serde(with = "fixed_serde")]
    until_next: Fixed,
}

impl Interval {
    /// Fire first after `delay`, then every `period`.
    #[must_use]
    pub const fn new(delay: Fixed, period: Fixed) -> Self {
        Self {
            period,
            until_next: delay,
        }
    }

    /// Period between fires.
    #[must_use]
    pub const fn period(&self) -> Fixed {
        self.period
    }

    /// Advance by `dt`; returns how many times the interval fired.
    pub fn tick(&mut self, dt: Fixed) -> u32 {
        self.until_next -= dt;
        let mut fired = 0;
        while self.until_next <= Fixed::ZERO {
            fired += 1;
            if self.period <= Fixed::ZERO {
                self.until_next = Fixed::ZERO;
                break;
            }
            self.until_next += self.period;
        }
        fired
    }
}

/// A request to place one enemy on the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpawnRequest {
    /// Wave the enemy belongs to.
    pub wave: u32,
    /// Enemy type.
    pub kind: EnemyKind,
}

/// Resumable emission of a wave's groups.
///
/// Each group emits `amount` enemies, waiting `delay_between` after every
/// spawn, then waits `delay_to_next` before the following group. The first
/// enemy of a sequence spawns on the first advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnSequence {
    wave: u32,
    groups: Vec<EnemyGroup>,
    group: usize,
    emitted: u32,
    #[serde(with = "fixed_serde")]
    wait: Fixed,
    finished: bool,
}

impl SpawnSequence {
    /// Sequence for a wave's groups.
    #[must_use]
    pub fn new(wave: &Wave) -> Self {
        Self {
            wave: wave.index,
            groups: wave.groups.clone(),
            group: 0,
            emitted: 0,
            wait: Fixed::ZERO,
            finished: false,
        }
    }

    /// Wave number being spawned.
    #[must_use]
    pub const fn wave(&self) -> u32 {
        self.wave
    }

    /// Whether every group has been emitted and waited out.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Emit every spawn due at the current time, then advance the clock by `dt`.
    /// Returns `true` once finished.
    pub fn advance(&mut self, dt: Fixed, out: &mut Vec<SpawnRequest>) -> bool {
        if self.finished {
            return true;
        }

        while self.wait <= Fixed::ZERO {
            let Some(group) = self.groups.get(self.group) else {
                self.finished = true;
                break;
            };
            if self.emitted < group.amount {
                out.push(SpawnRequest {
                    wave: self.wave,
                    kind: group.kind,
                });
                self.emitted += 1;
                self.wait += group.delay_between;
            } else {
                self.wait += group.delay_to_next;
                self.group += 1;
                self.emitted = 0;
            }
        }
        if !self.finished {
            self.wait -= dt;
        }
        self.finished
    }
}
