//! Timer bookkeeping for the sans-IO engines.
//!
//! Engines never sleep. They arm timers through a [`TimerSet`], which hands
//! back [`TimerCommand`]s for a driver to execute, and later receive the
//! [`TimerToken`] back when the timer fires. Every token carries a
//! generation number that is never reused, so a token that was cancelled (or
//! superseded by a re-arm) is rejected by [`TimerSet::fire`] even if the
//! driver delivers it late.

use std::time::Duration;

/// Identifies one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken<K> {
    pub kind: K,
    pub generation: u64,
}

/// Instruction for the driver that owns real time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand<K> {
    /// Deliver `token` back to the engine after `after` has elapsed.
    Schedule { token: TimerToken<K>, after: Duration },
    /// Drop a previously scheduled token.
    Cancel { token: TimerToken<K> },
}

/// The armed timers of one engine instance.
#[derive(Debug)]
pub struct TimerSet<K> {
    armed: Vec<TimerToken<K>>,
    next_generation: u64,
}

impl<K> Default for TimerSet<K> {
    fn default() -> Self {
        Self {
            armed: Vec::new(),
            next_generation: 0,
        }
    }
}

impl<K: Copy + Eq> TimerSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer of `kind`, replacing any timer of the same kind.
    pub fn arm(&mut self, kind: K, after: Duration) -> Vec<TimerCommand<K>> {
        let mut commands: Vec<_> = self.cancel(kind).into_iter().collect();
        self.next_generation += 1;
        let token = TimerToken {
            kind,
            generation: self.next_generation,
        };
        self.armed.push(token);
        commands.push(TimerCommand::Schedule { token, after });
        commands
    }

    /// Cancel the armed timer of `kind`, if any.
    pub fn cancel(&mut self, kind: K) -> Option<TimerCommand<K>> {
        let idx = self.armed.iter().position(|t| t.kind == kind)?;
        let token = self.armed.swap_remove(idx);
        Some(TimerCommand::Cancel { token })
    }

    /// Cancel every armed timer.
    pub fn cancel_all(&mut self) -> Vec<TimerCommand<K>> {
        self.armed
            .drain(..)
            .map(|token| TimerCommand::Cancel { token })
            .collect()
    }

    pub fn is_armed(&self, kind: K) -> bool {
        self.armed.iter().any(|t| t.kind == kind)
    }

    /// Accept a fired token. Returns `true` only for a token that is still
    /// armed, and disarms it so it cannot be accepted twice.
    pub fn fire(&mut self, token: TimerToken<K>) -> bool {
        match self.armed.iter().position(|t| *t == token) {
            Some(idx) => {
                self.armed.swap_remove(idx);
                true
            }
            None => false,
        }
    }
}

/// Monotonic time source, measured from the start of a session.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Clock backed by `tokio::time::Instant`, so paused-time tests advance it.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Milliseconds between two session timestamps, saturating at zero.
pub fn elapsed_ms(from: Duration, to: Duration) -> u64 {
    to.saturating_sub(from).as_millis() as u64
}
