//! Go/No-Go reaction-time task.
//!
//! Each trial runs `Wait → Stimulus → Feedback`. Input while waiting is a
//! false start; input on a green (Go) stimulus is a success with a reaction
//! time; input on a red (No-Go) stimulus is a commission error; letting the
//! response window lapse is a miss on Go and a correct withhold on No-Go.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timer::{elapsed_ms, TimerCommand, TimerSet, TimerToken};

/// Go/No-Go timing and batch parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoNoGoConfig {
    /// Trials per session. False starts consume a slot.
    pub total_trials: usize,
    /// Chance that a trial is a Go trial.
    pub go_probability: f64,
    /// Half-open range the pre-stimulus wait is drawn from.
    pub wait_range_ms: (u64, u64),
    pub response_window_ms: u64,
    pub feedback_ms: u64,
    /// Half-open band, in percent of the display, for both axes.
    pub position_range_pct: (f32, f32),
}

impl Default for GoNoGoConfig {
    fn default() -> Self {
        Self {
            total_trials: 15,
            go_probability: 0.70,
            wait_range_ms: (1500, 3500),
            response_window_ms: 2000,
            feedback_ms: 1500,
            position_range_pct: (20.0, 80.0),
        }
    }
}

impl GoNoGoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |msg: &str| Err(ConfigError::new("go_no_go", msg));
        if self.total_trials == 0 {
            return err("total_trials must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.go_probability) {
            return err("go_probability must be within [0, 1]");
        }
        if self.wait_range_ms.0 >= self.wait_range_ms.1 {
            return err("wait_range_ms must be a non-empty range");
        }
        if self.response_window_ms == 0 {
            return err("response_window_ms must be positive");
        }
        let (lo, hi) = self.position_range_pct;
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo >= hi {
            return err("position_range_pct must be a non-empty band inside [0, 100]");
        }
        Ok(())
    }
}

/// Whether a stimulus asks for a response or for inhibition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusKind {
    Go,
    NoGo,
}

impl StimulusKind {
    pub fn color(self) -> &'static str {
        match self {
            StimulusKind::Go => "green",
            StimulusKind::NoGo => "red",
        }
    }
}

impl fmt::Display for StimulusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StimulusKind::Go => write!(f, "go"),
            StimulusKind::NoGo => write!(f, "no-go"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
}

impl Shape {
    pub const ALL: [Shape; 3] = [Shape::Circle, Shape::Square, Shape::Triangle];
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Circle => write!(f, "circle"),
            Shape::Square => write!(f, "square"),
            Shape::Triangle => write!(f, "triangle"),
        }
    }
}

/// Stimulus drawn for one trial ordinal at batch-init time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusConfig {
    pub kind: StimulusKind,
    pub shape: Shape,
}

/// Stimulus placement in percent of the display area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x_pct: f32,
    pub y_pct: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Miss,
    CommissionError,
    FalseStart,
}

/// One recorded trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub ordinal: usize,
    pub kind: StimulusKind,
    pub outcome: Outcome,
    /// Present for a Go success or a commission error only.
    pub reaction_time_ms: Option<u64>,
}

/// Outcome-specific feedback text.
pub fn feedback_message(kind: StimulusKind, outcome: Outcome) -> &'static str {
    match (kind, outcome) {
        (StimulusKind::Go, Outcome::Success) => "Great! Fast response.",
        (StimulusKind::NoGo, Outcome::Success) => "Correct! You held back.",
        (_, Outcome::Miss) => "Too slow! Respond faster to green shapes.",
        (_, Outcome::CommissionError) => "Oops! Don't respond to red shapes.",
        (_, Outcome::FalseStart) => "Too soon! Wait for the shape to appear.",
    }
}

/// Aggregate results delivered on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoNoGoMetrics {
    /// Mean over successful Go trials; 0 when there are none.
    pub avg_reaction_time_ms: f64,
    pub score: f64,
    pub accuracy: f64,
    pub commission_errors: usize,
    pub omission_errors: usize,
    pub false_starts: usize,
    pub trials: Vec<Trial>,
}

/// Score a trial log.
///
/// `score` starts from accuracy and loses 10 points for an average Go
/// reaction time above 600ms and another 10 above 1000ms.
pub fn compute_metrics(trials: &[Trial], total_trials: usize) -> GoNoGoMetrics {
    let count = |outcome: Outcome| trials.iter().filter(|t| t.outcome == outcome).count();

    let successes = count(Outcome::Success);
    let accuracy = if total_trials == 0 {
        0.0
    } else {
        successes as f64 / total_trials as f64 * 100.0
    };

    let go_times: Vec<u64> = trials
        .iter()
        .filter(|t| t.kind == StimulusKind::Go && t.outcome == Outcome::Success)
        .filter_map(|t| t.reaction_time_ms)
        .collect();
    let avg_reaction_time_ms = if go_times.is_empty() {
        0.0
    } else {
        go_times.iter().sum::<u64>() as f64 / go_times.len() as f64
    };

    let mut score = accuracy;
    if avg_reaction_time_ms > 600.0 {
        score -= 10.0;
    }
    if avg_reaction_time_ms > 1000.0 {
        score -= 10.0;
    }

    GoNoGoMetrics {
        avg_reaction_time_ms,
        score: score.clamp(0.0, 100.0),
        accuracy,
        commission_errors: count(Outcome::CommissionError),
        omission_errors: count(Outcome::Miss),
        false_starts: count(Outcome::FalseStart),
        trials: trials.to_vec(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoNoGoTimer {
    Onset,
    ResponseWindow,
    Feedback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GoNoGoState {
    Ready,
    Wait {
        ordinal: usize,
    },
    Stimulus {
        ordinal: usize,
        onset: Duration,
        position: Position,
    },
    Feedback {
        ordinal: usize,
    },
    Results,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GoNoGoEffect {
    Timer(TimerCommand<GoNoGoTimer>),
    Waiting {
        ordinal: usize,
        total: usize,
    },
    ShowStimulus {
        ordinal: usize,
        stimulus: StimulusConfig,
        position: Position,
    },
    ShowFeedback {
        trial: Trial,
        message: &'static str,
    },
    Completed(GoNoGoMetrics),
}

/// Sans-IO Go/No-Go state machine.
pub struct GoNoGoEngine<R: Rng> {
    config: GoNoGoConfig,
    rng: R,
    stimuli: Vec<StimulusConfig>,
    state: GoNoGoState,
    timers: TimerSet<GoNoGoTimer>,
    trials: Vec<Trial>,
}

impl<R: Rng> GoNoGoEngine<R> {
    /// Validate `config` and draw the stimulus for every trial ordinal.
    pub fn new(config: GoNoGoConfig, mut rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let stimuli = (0..config.total_trials)
            .map(|_| StimulusConfig {
                kind: if rng.random_bool(config.go_probability) {
                    StimulusKind::Go
                } else {
                    StimulusKind::NoGo
                },
                shape: Shape::ALL[rng.random_range(0..Shape::ALL.len())],
            })
            .collect();

        Ok(Self {
            config,
            rng,
            stimuli,
            state: GoNoGoState::Ready,
            timers: TimerSet::new(),
            trials: Vec::new(),
        })
    }

    pub fn state(&self) -> GoNoGoState {
        self.state
    }

    pub fn stimuli(&self) -> &[StimulusConfig] {
        &self.stimuli
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn is_complete(&self) -> bool {
        self.state == GoNoGoState::Results
    }

    /// Enter the wait phase of trial 0.
    pub fn start(&mut self, _now: Duration) -> Vec<GoNoGoEffect> {
        let mut fx = Vec::new();
        if self.state == GoNoGoState::Ready {
            self.begin_wait(0, &mut fx);
        }
        fx
    }

    /// Participant input (click, tap or key press).
    pub fn respond(&mut self, now: Duration) -> Vec<GoNoGoEffect> {
        let mut fx = Vec::new();
        match self.state {
            GoNoGoState::Wait { ordinal } => {
                tracing::debug!(ordinal, "false start");
                self.record(ordinal, Outcome::FalseStart, None, &mut fx);
            }
            GoNoGoState::Stimulus { ordinal, onset, .. } => {
                let reaction_time = elapsed_ms(onset, now);
                let outcome = match self.stimuli[ordinal].kind {
                    StimulusKind::Go => Outcome::Success,
                    StimulusKind::NoGo => Outcome::CommissionError,
                };
                self.record(ordinal, outcome, Some(reaction_time), &mut fx);
            }
            _ => tracing::debug!(state = ?self.state, "input ignored"),
        }
        fx
    }

    pub fn timer_fired(
        &mut self,
        token: TimerToken<GoNoGoTimer>,
        now: Duration,
    ) -> Vec<GoNoGoEffect> {
        let mut fx = Vec::new();
        if !self.timers.fire(token) {
            tracing::debug!(?token, "stale timer discarded");
            return fx;
        }

        match (token.kind, self.state) {
            (GoNoGoTimer::Onset, GoNoGoState::Wait { ordinal }) => {
                let (lo, hi) = self.config.position_range_pct;
                let position = Position {
                    x_pct: self.rng.random_range(lo..hi),
                    y_pct: self.rng.random_range(lo..hi),
                };
                self.transition_to(
                    GoNoGoState::Stimulus {
                        ordinal,
                        onset: now,
                        position,
                    },
                    &mut fx,
                );
                self.arm(GoNoGoTimer::ResponseWindow, self.config.response_window_ms, &mut fx);
                fx.push(GoNoGoEffect::ShowStimulus {
                    ordinal,
                    stimulus: self.stimuli[ordinal],
                    position,
                });
            }
            (GoNoGoTimer::ResponseWindow, GoNoGoState::Stimulus { ordinal, .. }) => {
                let outcome = match self.stimuli[ordinal].kind {
                    StimulusKind::Go => Outcome::Miss,
                    StimulusKind::NoGo => Outcome::Success,
                };
                self.record(ordinal, outcome, None, &mut fx);
            }
            (GoNoGoTimer::Feedback, GoNoGoState::Feedback { ordinal }) => {
                if ordinal + 1 < self.config.total_trials {
                    self.begin_wait(ordinal + 1, &mut fx);
                } else {
                    self.finish(&mut fx);
                }
            }
            (kind, state) => {
                tracing::warn!(?kind, ?state, "timer fired in unexpected state");
            }
        }
        fx
    }

    /// Single choke point for state changes: every armed timer from the
    /// previous state is cancelled first.
    fn transition_to(&mut self, state: GoNoGoState, fx: &mut Vec<GoNoGoEffect>) {
        fx.extend(self.timers.cancel_all().into_iter().map(GoNoGoEffect::Timer));
        tracing::debug!(from = ?self.state, to = ?state, "go/no-go transition");
        self.state = state;
    }

    fn arm(&mut self, kind: GoNoGoTimer, ms: u64, fx: &mut Vec<GoNoGoEffect>) {
        fx.extend(
            self.timers
                .arm(kind, Duration::from_millis(ms))
                .into_iter()
                .map(GoNoGoEffect::Timer),
        );
    }

    fn begin_wait(&mut self, ordinal: usize, fx: &mut Vec<GoNoGoEffect>) {
        let (lo, hi) = self.config.wait_range_ms;
        let wait = self.rng.random_range(lo..hi);
        self.transition_to(GoNoGoState::Wait { ordinal }, fx);
        self.arm(GoNoGoTimer::Onset, wait, fx);
        fx.push(GoNoGoEffect::Waiting {
            ordinal,
            total: self.config.total_trials,
        });
    }

    fn record(
        &mut self,
        ordinal: usize,
        outcome: Outcome,
        reaction_time_ms: Option<u64>,
        fx: &mut Vec<GoNoGoEffect>,
    ) {
        let kind = self.stimuli[ordinal].kind;
        let trial = Trial {
            ordinal,
            kind,
            outcome,
            reaction_time_ms,
        };
        tracing::debug!(?trial, "trial recorded");
        self.trials.push(trial.clone());

        self.transition_to(GoNoGoState::Feedback { ordinal }, fx);
        self.arm(GoNoGoTimer::Feedback, self.config.feedback_ms, fx);
        fx.push(GoNoGoEffect::ShowFeedback {
            trial,
            message: feedback_message(kind, outcome),
        });
    }

    fn finish(&mut self, fx: &mut Vec<GoNoGoEffect>) {
        self.transition_to(GoNoGoState::Results, fx);
        let metrics = compute_metrics(&self.trials, self.config.total_trials);
        tracing::info!(
            score = metrics.score,
            accuracy = metrics.accuracy,
            avg_rt_ms = metrics.avg_reaction_time_ms,
            "go/no-go complete"
        );
        fx.push(GoNoGoEffect::Completed(metrics));
    }
}
