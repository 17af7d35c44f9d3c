//! Stroop color test.
//!
//! Each trial shows a color word printed in an ink color, drawn
//! independently, so word and ink agree only by chance. The participant
//! names the ink, not the word. There are no timers: a trial lasts until it
//! is answered, and the response time runs from the moment it was shown.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SubmitError};
use crate::timer::elapsed_ms;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StroopConfig {
    pub total_trials: usize,
}

impl Default for StroopConfig {
    fn default() -> Self {
        Self { total_trials: 15 }
    }
}

impl StroopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_trials == 0 {
            return Err(ConfigError::new("stroop", "total_trials must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InkColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
}

impl InkColor {
    pub const ALL: [InkColor; 5] = [
        InkColor::Red,
        InkColor::Blue,
        InkColor::Green,
        InkColor::Yellow,
        InkColor::Purple,
    ];
}

impl fmt::Display for InkColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InkColor::Red => write!(f, "RED"),
            InkColor::Blue => write!(f, "BLUE"),
            InkColor::Green => write!(f, "GREEN"),
            InkColor::Yellow => write!(f, "YELLOW"),
            InkColor::Purple => write!(f, "PURPLE"),
        }
    }
}

/// Accepts a color name in any case, or its first letter.
impl FromStr for InkColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        InkColor::ALL
            .into_iter()
            .find(|c| {
                let name = c.to_string();
                name == s || (s.len() == 1 && name.starts_with(&s))
            })
            .ok_or_else(|| format!("unknown color: {s}"))
    }
}

/// A word and the ink it is printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StroopTrial {
    pub word: InkColor,
    pub ink: InkColor,
}

impl StroopTrial {
    pub fn is_congruent(&self) -> bool {
        self.word == self.ink
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StroopResponse {
    /// 1-based.
    pub trial: usize,
    pub word: InkColor,
    pub ink: InkColor,
    pub answer: InkColor,
    pub correct: bool,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StroopMetrics {
    pub correct_count: usize,
    pub total_trials: usize,
    pub avg_response_time_ms: f64,
    pub responses: Vec<StroopResponse>,
}

impl StroopMetrics {
    pub fn from_responses(responses: &[StroopResponse], total_trials: usize) -> Self {
        let avg_response_time_ms = if responses.is_empty() {
            0.0
        } else {
            responses.iter().map(|r| r.response_time_ms).sum::<u64>() as f64
                / responses.len() as f64
        };
        Self {
            correct_count: responses.iter().filter(|r| r.correct).count(),
            total_trials,
            avg_response_time_ms,
            responses: responses.to_vec(),
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_trials == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.total_trials as f64 * 100.0
        }
    }

    pub fn interpretation(&self) -> &'static str {
        let accuracy = self.accuracy();
        if accuracy >= 90.0 {
            "Excellent attention and processing speed!"
        } else if accuracy >= 75.0 {
            "Good attention and processing speed."
        } else if accuracy >= 60.0 {
            "Fair attention and processing speed."
        } else {
            "Attention may need improvement. Consider consulting a healthcare professional."
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StroopState {
    Instructions,
    Trial { index: usize, shown_at: Duration },
    Results,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StroopEffect {
    Show {
        index: usize,
        total: usize,
        trial: StroopTrial,
    },
    Answered(StroopResponse),
    Completed(StroopMetrics),
}

pub struct StroopEngine {
    config: StroopConfig,
    trials: Vec<StroopTrial>,
    state: StroopState,
    responses: Vec<StroopResponse>,
}

impl StroopEngine {
    /// Validate `config` and draw every trial up front.
    pub fn new(config: StroopConfig, rng: &mut impl Rng) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut pick = || InkColor::ALL[rng.random_range(0..InkColor::ALL.len())];
        let trials = (0..config.total_trials)
            .map(|_| StroopTrial {
                word: pick(),
                ink: pick(),
            })
            .collect();
        Ok(Self {
            config,
            trials,
            state: StroopState::Instructions,
            responses: Vec::new(),
        })
    }

    pub fn state(&self) -> StroopState {
        self.state
    }

    pub fn trials(&self) -> &[StroopTrial] {
        &self.trials
    }

    pub fn responses(&self) -> &[StroopResponse] {
        &self.responses
    }

    pub fn is_complete(&self) -> bool {
        self.state == StroopState::Results
    }

    pub fn start(&mut self, now: Duration) -> Vec<StroopEffect> {
        let mut fx = Vec::new();
        if self.state == StroopState::Instructions {
            self.show(0, now, &mut fx);
        }
        fx
    }

    /// Name the ink color of the trial on screen.
    pub fn answer(
        &mut self,
        answer: InkColor,
        now: Duration,
    ) -> Result<Vec<StroopEffect>, SubmitError> {
        let StroopState::Trial { index, shown_at } = self.state else {
            return Err(SubmitError::NotAcceptingInput);
        };
        let trial = self.trials[index];
        let response = StroopResponse {
            trial: index + 1,
            word: trial.word,
            ink: trial.ink,
            answer,
            correct: answer == trial.ink,
            response_time_ms: elapsed_ms(shown_at, now),
        };
        tracing::debug!(?response, "stroop answer");
        self.responses.push(response.clone());

        let mut fx = vec![StroopEffect::Answered(response)];
        if index + 1 < self.config.total_trials {
            self.show(index + 1, now, &mut fx);
        } else {
            self.state = StroopState::Results;
            let metrics = StroopMetrics::from_responses(&self.responses, self.config.total_trials);
            tracing::info!(
                correct = metrics.correct_count,
                avg_ms = metrics.avg_response_time_ms,
                "stroop complete"
            );
            fx.push(StroopEffect::Completed(metrics));
        }
        Ok(fx)
    }

    fn show(&mut self, index: usize, now: Duration, fx: &mut Vec<StroopEffect>) {
        self.state = StroopState::Trial {
            index,
            shown_at: now,
        };
        fx.push(StroopEffect::Show {
            index,
            total: self.config.total_trials,
            trial: self.trials[index],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn engine(trials: usize) -> StroopEngine {
        StroopEngine::new(
            StroopConfig {
                total_trials: trials,
            },
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap()
    }

    fn wrong(color: InkColor) -> InkColor {
        if color == InkColor::Red {
            InkColor::Blue
        } else {
            InkColor::Red
        }
    }

    #[test]
    fn parses_names_and_initials() {
        assert_eq!("red".parse::<InkColor>(), Ok(InkColor::Red));
        assert_eq!(" Purple ".parse::<InkColor>(), Ok(InkColor::Purple));
        assert_eq!("y".parse::<InkColor>(), Ok(InkColor::Yellow));
        assert!("orange".parse::<InkColor>().is_err());
        assert!("".parse::<InkColor>().is_err());
    }

    #[test]
    fn rejects_zero_trials() {
        let config = StroopConfig { total_trials: 0 };
        assert!(StroopEngine::new(config, &mut StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn answer_before_start_is_rejected() {
        let mut e = engine(3);
        assert_eq!(
            e.answer(InkColor::Red, ms(0)),
            Err(SubmitError::NotAcceptingInput)
        );
    }

    #[test]
    fn ink_not_word_is_scored() {
        let mut e = engine(1);
        e.start(ms(0));
        let trial = e.trials()[0];
        let fx = e.answer(trial.ink, ms(840)).unwrap();
        let StroopEffect::Answered(response) = &fx[0] else {
            panic!("expected answer, got {fx:?}");
        };
        assert!(response.correct);
        assert_eq!(response.response_time_ms, 840);
        assert_eq!(response.trial, 1);
    }

    #[test]
    fn response_time_runs_from_each_show() {
        let mut e = engine(2);
        e.start(ms(100));
        let first = e.trials()[0].ink;
        e.answer(first, ms(600)).unwrap();
        let second = e.trials()[1].ink;
        e.answer(wrong(second), ms(1_300)).unwrap();

        let times: Vec<u64> = e.responses().iter().map(|r| r.response_time_ms).collect();
        assert_eq!(times, vec![500, 700]);
        assert!(!e.responses()[1].correct);
    }

    #[test]
    fn completes_with_metrics() {
        let mut e = engine(4);
        e.start(ms(0));
        let mut fx = Vec::new();
        let mut now = 0;
        for i in 0..4 {
            now += 1_000;
            let ink = e.trials()[i].ink;
            let answer = if i == 0 { wrong(ink) } else { ink };
            fx = e.answer(answer, ms(now)).unwrap();
        }
        let Some(StroopEffect::Completed(metrics)) = fx.last() else {
            panic!("expected completion, got {fx:?}");
        };
        assert_eq!(metrics.correct_count, 3);
        assert_eq!(metrics.accuracy(), 75.0);
        assert_eq!(metrics.avg_response_time_ms, 1_000.0);
        assert_eq!(metrics.interpretation(), "Good attention and processing speed.");
        assert!(e.is_complete());
        assert_eq!(
            e.answer(InkColor::Red, ms(now)),
            Err(SubmitError::NotAcceptingInput)
        );
    }

    #[test]
    fn interpretation_thresholds() {
        let metrics = |correct| StroopMetrics {
            correct_count: correct,
            total_trials: 10,
            avg_response_time_ms: 0.0,
            responses: vec![],
        };
        assert_eq!(metrics(9).interpretation(), "Excellent attention and processing speed!");
        assert_eq!(metrics(6).interpretation(), "Fair attention and processing speed.");
        assert!(metrics(5).interpretation().starts_with("Attention may need improvement"));
    }
}
