//! Digit span test with adaptive level.
//!
//! A forward sub-test is followed by a backward sub-test. Each starts at the
//! configured level, grows by one digit on every correct answer and allows a
//! bounded number of attempts per level.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SubmitError};
use crate::timer::{TimerCommand, TimerSet, TimerToken};

/// Nominal maximum of `forward_score + backward_score`.
pub const NOMINAL_MAX_SCORE: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitSpanConfig {
    pub start_level: usize,
    pub max_attempts: u32,
    pub display_base_ms: u64,
    pub display_per_digit_ms: u64,
}

impl Default for DigitSpanConfig {
    fn default() -> Self {
        Self {
            start_level: 3,
            max_attempts: 2,
            display_base_ms: 2000,
            display_per_digit_ms: 500,
        }
    }
}

impl DigitSpanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_level == 0 {
            return Err(ConfigError::new("digit_span", "start_level must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::new("digit_span", "max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// How long a sequence of `level` digits stays on screen.
    pub fn display_duration(&self, level: usize) -> Duration {
        Duration::from_millis(self.display_base_ms + level as u64 * self.display_per_digit_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanPhase {
    Forward,
    Backward,
}

impl fmt::Display for SpanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanPhase::Forward => write!(f, "forward"),
            SpanPhase::Backward => write!(f, "backward"),
        }
    }
}

/// One submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitSpanAttempt {
    pub phase: SpanPhase,
    pub level: usize,
    pub sequence: Vec<u8>,
    pub user_answer: String,
    pub correct: bool,
}

/// Highest level completed in each phase, 0 if none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitSpanScores {
    pub forward_score: usize,
    pub backward_score: usize,
}

impl DigitSpanScores {
    pub fn total(&self) -> usize {
        self.forward_score + self.backward_score
    }
}

/// The answer expected for `sequence` in `phase`.
pub fn expected_answer(phase: SpanPhase, sequence: &[u8]) -> String {
    let digits = sequence.iter().map(|d| char::from(b'0' + d));
    match phase {
        SpanPhase::Forward => digits.collect(),
        SpanPhase::Backward => digits.rev().collect(),
    }
}

/// Keep only the ASCII digits of a typed answer.
pub fn digits_only(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Where the test goes after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Show {
        phase: SpanPhase,
        level: usize,
        attempt: u32,
    },
    Results,
}

/// Transition rule for one answer at `(phase, level, attempt)`.
pub fn next_step(
    config: &DigitSpanConfig,
    phase: SpanPhase,
    level: usize,
    attempt: u32,
    correct: bool,
) -> Step {
    if correct {
        return Step::Show {
            phase,
            level: level + 1,
            attempt: 0,
        };
    }
    let attempt = attempt + 1;
    if attempt < config.max_attempts {
        return Step::Show {
            phase,
            level,
            attempt,
        };
    }
    match phase {
        SpanPhase::Forward => Step::Show {
            phase: SpanPhase::Backward,
            level: config.start_level,
            attempt: 0,
        },
        SpanPhase::Backward => Step::Results,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigitSpanState {
    Instructions,
    Show {
        phase: SpanPhase,
        level: usize,
        attempt: u32,
        sequence: Vec<u8>,
    },
    Input {
        phase: SpanPhase,
        level: usize,
        attempt: u32,
        sequence: Vec<u8>,
    },
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitSpanTimer {
    Display,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigitSpanEffect {
    Timer(TimerCommand<DigitSpanTimer>),
    ShowSequence {
        phase: SpanPhase,
        level: usize,
        attempt: u32,
        sequence: Vec<u8>,
        display_for: Duration,
    },
    AwaitInput {
        phase: SpanPhase,
        level: usize,
        expected_len: usize,
    },
    Answered(DigitSpanAttempt),
    /// Emitted by drivers, never by the engine, when a submission is refused.
    Rejected(SubmitError),
    Completed(DigitSpanScores),
}

/// Sans-IO digit span state machine.
pub struct DigitSpanEngine<R: Rng> {
    config: DigitSpanConfig,
    rng: R,
    state: DigitSpanState,
    timers: TimerSet<DigitSpanTimer>,
    attempts: Vec<DigitSpanAttempt>,
    scores: DigitSpanScores,
}

impl<R: Rng> DigitSpanEngine<R> {
    pub fn new(config: DigitSpanConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rng,
            state: DigitSpanState::Instructions,
            timers: TimerSet::new(),
            attempts: Vec::new(),
            scores: DigitSpanScores::default(),
        })
    }

    pub fn state(&self) -> &DigitSpanState {
        &self.state
    }

    pub fn attempts(&self) -> &[DigitSpanAttempt] {
        &self.attempts
    }

    pub fn scores(&self) -> DigitSpanScores {
        self.scores
    }

    pub fn is_complete(&self) -> bool {
        self.state == DigitSpanState::Results
    }

    /// Leave the instructions and show the first forward sequence.
    pub fn start(&mut self) -> Vec<DigitSpanEffect> {
        let mut fx = Vec::new();
        if self.state == DigitSpanState::Instructions {
            self.show(SpanPhase::Forward, self.config.start_level, 0, &mut fx);
        }
        fx
    }

    /// Whether `input` may be submitted right now.
    pub fn can_submit(&self, input: &str) -> bool {
        match &self.state {
            DigitSpanState::Input { level, .. } => digits_only(input).len() == *level,
            _ => false,
        }
    }

    pub fn timer_fired(&mut self, token: TimerToken<DigitSpanTimer>) -> Vec<DigitSpanEffect> {
        let mut fx = Vec::new();
        if !self.timers.fire(token) {
            tracing::debug!(?token, "stale timer discarded");
            return fx;
        }
        if let DigitSpanState::Show {
            phase,
            level,
            attempt,
            sequence,
        } = &self.state
        {
            let (phase, level, attempt, sequence) = (*phase, *level, *attempt, sequence.clone());
            self.transition_to(
                DigitSpanState::Input {
                    phase,
                    level,
                    attempt,
                    sequence,
                },
                &mut fx,
            );
            fx.push(DigitSpanEffect::AwaitInput {
                phase,
                level,
                expected_len: level,
            });
        }
        fx
    }

    /// Check an answer and move to the next sequence, phase, or results.
    pub fn submit(&mut self, answer: &str) -> Result<Vec<DigitSpanEffect>, SubmitError> {
        let DigitSpanState::Input {
            phase,
            level,
            attempt,
            sequence,
        } = &self.state
        else {
            return Err(SubmitError::NotAcceptingInput);
        };
        let (phase, level, attempt) = (*phase, *level, *attempt);

        let answer = digits_only(answer);
        let actual = answer.len();
        if actual != level {
            return Err(SubmitError::WrongLength {
                expected: level,
                actual,
            });
        }

        let correct = answer == expected_answer(phase, sequence);
        let record = DigitSpanAttempt {
            phase,
            level,
            sequence: sequence.clone(),
            user_answer: answer,
            correct,
        };
        tracing::debug!(%phase, level, attempt, correct, "digit span answer");
        self.attempts.push(record.clone());

        if correct {
            match phase {
                SpanPhase::Forward => self.scores.forward_score = self.scores.forward_score.max(level),
                SpanPhase::Backward => {
                    self.scores.backward_score = self.scores.backward_score.max(level)
                }
            }
        }

        let mut fx = vec![DigitSpanEffect::Answered(record)];
        match next_step(&self.config, phase, level, attempt, correct) {
            Step::Show {
                phase,
                level,
                attempt,
            } => self.show(phase, level, attempt, &mut fx),
            Step::Results => {
                self.transition_to(DigitSpanState::Results, &mut fx);
                tracing::info!(
                    forward = self.scores.forward_score,
                    backward = self.scores.backward_score,
                    "digit span complete"
                );
                fx.push(DigitSpanEffect::Completed(self.scores));
            }
        }
        Ok(fx)
    }

    fn transition_to(&mut self, state: DigitSpanState, fx: &mut Vec<DigitSpanEffect>) {
        fx.extend(self.timers.cancel_all().into_iter().map(DigitSpanEffect::Timer));
        self.state = state;
    }

    fn show(&mut self, phase: SpanPhase, level: usize, attempt: u32, fx: &mut Vec<DigitSpanEffect>) {
        let sequence: Vec<u8> = (0..level).map(|_| self.rng.random_range(1..=9)).collect();
        let display_for = self.config.display_duration(level);

        self.transition_to(
            DigitSpanState::Show {
                phase,
                level,
                attempt,
                sequence: sequence.clone(),
            },
            fx,
        );
        fx.extend(
            self.timers
                .arm(DigitSpanTimer::Display, display_for)
                .into_iter()
                .map(DigitSpanEffect::Timer),
        );
        fx.push(DigitSpanEffect::ShowSequence {
            phase,
            level,
            attempt,
            sequence,
            display_for,
        });
    }
}
