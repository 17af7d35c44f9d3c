//! Trail making test: connect numbered circles in ascending order as fast
//! as possible. Wrong picks count as errors and do not advance the trail.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SubmitError};
use crate::gonogo::Position;
use crate::timer::elapsed_ms;

/// Placement attempts per circle before giving up on the layout.
const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailMakingConfig {
    pub circles: usize,
    /// Minimum center distance between circles, in percent of the display.
    pub min_distance_pct: f32,
    /// Half-open band, in percent of the display, for both axes.
    pub position_range_pct: (f32, f32),
    /// Completion time that still earns full marks.
    pub target_secs: f64,
    pub penalty_per_sec: f64,
    pub penalty_per_error: f64,
}

impl Default for TrailMakingConfig {
    fn default() -> Self {
        Self {
            circles: 12,
            min_distance_pct: 12.0,
            position_range_pct: (5.0, 85.0),
            target_secs: 25.0,
            penalty_per_sec: 2.0,
            penalty_per_error: 10.0,
        }
    }
}

impl TrailMakingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |msg: &str| Err(ConfigError::new("trail_making", msg));
        if self.circles < 2 {
            return err("circles must be at least 2");
        }
        let (lo, hi) = self.position_range_pct;
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo >= hi {
            return err("position_range_pct must be a non-empty band inside [0, 100]");
        }
        if self.min_distance_pct < 0.0 {
            return err("min_distance_pct must not be negative");
        }
        if self.target_secs < 0.0 || self.penalty_per_sec < 0.0 || self.penalty_per_error < 0.0 {
            return err("target and penalties must not be negative");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub number: usize,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailMakingMetrics {
    pub completion_ms: u64,
    pub errors: usize,
    /// 0..=100 after time and error penalties.
    pub score: f64,
}

/// Full marks up to the target time, then linear penalties for extra
/// seconds and for errors, rounded and clamped to [0, 100].
pub fn trail_score(config: &TrailMakingConfig, completion_ms: u64, errors: usize) -> f64 {
    let secs = completion_ms as f64 / 1000.0;
    let time_penalty = ((secs - config.target_secs) * config.penalty_per_sec).max(0.0);
    let error_penalty = errors as f64 * config.penalty_per_error;
    (100.0 - time_penalty - error_penalty).round().clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailMakingState {
    Instructions,
    Running { next: usize, started: Duration },
    Results,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrailMakingEffect {
    Show { circles: Vec<Circle> },
    Hit { number: usize },
    Miss { picked: usize, expected: usize },
    /// A pick the engine refused; not counted as an error.
    Rejected(SubmitError),
    Completed(TrailMakingMetrics),
}

pub struct TrailMakingEngine {
    config: TrailMakingConfig,
    circles: Vec<Circle>,
    state: TrailMakingState,
    errors: usize,
}

impl TrailMakingEngine {
    /// Validate `config` and lay out the circles with rejection sampling.
    pub fn new(config: TrailMakingConfig, rng: &mut impl Rng) -> Result<Self, ConfigError> {
        config.validate()?;
        let (lo, hi) = config.position_range_pct;
        let mut circles: Vec<Circle> = Vec::with_capacity(config.circles);

        for number in 1..=config.circles {
            let position = (0..MAX_PLACEMENT_ATTEMPTS)
                .map(|_| Position {
                    x_pct: rng.random_range(lo..hi),
                    y_pct: rng.random_range(lo..hi),
                })
                .find(|p| {
                    circles
                        .iter()
                        .all(|c| distance(&c.position, p) >= config.min_distance_pct)
                })
                .ok_or_else(|| {
                    ConfigError::new(
                        "trail_making",
                        "circles do not fit at the requested minimum distance",
                    )
                })?;
            circles.push(Circle { number, position });
        }

        Ok(Self {
            config,
            circles,
            state: TrailMakingState::Instructions,
            errors: 0,
        })
    }

    pub fn state(&self) -> TrailMakingState {
        self.state
    }

    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn is_complete(&self) -> bool {
        self.state == TrailMakingState::Results
    }

    pub fn start(&mut self, now: Duration) -> Vec<TrailMakingEffect> {
        if self.state != TrailMakingState::Instructions {
            return Vec::new();
        }
        self.errors = 0;
        self.state = TrailMakingState::Running {
            next: 1,
            started: now,
        };
        vec![TrailMakingEffect::Show {
            circles: self.circles.clone(),
        }]
    }

    /// The participant picked circle `number`.
    pub fn pick(&mut self, number: usize, now: Duration) -> Result<Vec<TrailMakingEffect>, SubmitError> {
        let TrailMakingState::Running { next, started } = self.state else {
            return Err(SubmitError::NotAcceptingInput);
        };
        if !(1..=self.circles.len()).contains(&number) {
            return Err(SubmitError::NoSuchCircle(number));
        }

        if number != next {
            self.errors += 1;
            tracing::debug!(picked = number, expected = next, "trail error");
            return Ok(vec![TrailMakingEffect::Miss {
                picked: number,
                expected: next,
            }]);
        }

        let mut fx = vec![TrailMakingEffect::Hit { number }];
        if number == self.circles.len() {
            let completion_ms = elapsed_ms(started, now);
            let metrics = TrailMakingMetrics {
                completion_ms,
                errors: self.errors,
                score: trail_score(&self.config, completion_ms, self.errors),
            };
            tracing::info!(
                completion_ms,
                errors = self.errors,
                score = metrics.score,
                "trail making complete"
            );
            self.state = TrailMakingState::Results;
            fx.push(TrailMakingEffect::Completed(metrics));
        } else {
            self.state = TrailMakingState::Running {
                next: next + 1,
                started,
            };
        }
        Ok(fx)
    }
}

fn distance(a: &Position, b: &Position) -> f32 {
    ((a.x_pct - b.x_pct).powi(2) + (a.y_pct - b.y_pct).powi(2)).sqrt()
}
