//! Memory recall test: memorize a list of words, sit through a short
//! distraction, then write the words back in order.
//!
//! Scoring is positional. Slot `i` counts only if it holds word `i`,
//! compared case-insensitively after trimming.

use std::collections::HashSet;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SubmitError};
use crate::timer::{TimerCommand, TimerSet, TimerToken};

pub const WORD_BANK: [&str; 98] = [
    "ELEPHANT", "PIANO", "GARDEN", "MOUNTAIN", "BUTTERFLY", "OCEAN", "TELESCOPE", "LIBRARY",
    "RAINBOW", "COMPASS", "DIAMOND", "VOLCANO", "CATHEDRAL", "ANCHOR", "LIGHTHOUSE", "PENGUIN",
    "SAXOPHONE", "MEADOW", "CANYON", "DRAGONFLY", "GLACIER", "MICROSCOPE", "MUSEUM", "SUNSET",
    "BINOCULARS", "EMERALD", "AVALANCHE", "PYRAMID", "HARBOR", "FORTRESS", "DOLPHIN", "VIOLIN",
    "ORCHARD", "SUMMIT", "FIREFLY", "WATERFALL", "STETHOSCOPE", "GALLERY", "HORIZON", "SEXTANT",
    "SAPPHIRE", "EARTHQUAKE", "TEMPLE", "BEACON", "CASTLE", "LEOPARD", "TRUMPET", "PRAIRIE",
    "VALLEY", "HONEYBEE", "RIVER", "BAROMETER", "ARCHIVE", "SUNRISE", "RUBY", "TORNADO",
    "MONASTERY", "CITADEL", "TIGER", "CLARINET", "SAVANNA", "PLATEAU", "LADYBUG", "DESERT",
    "THERMOMETER", "SANCTUARY", "TWILIGHT", "PERISCOPE", "PEARL", "HURRICANE", "PAGODA",
    "WATCHTOWER", "BASTION", "CHEETAH", "FLUTE", "TUNDRA", "RIDGE", "CRICKET", "FOREST",
    "CHRONOMETER", "OBSERVATORY", "DAWN", "QUADRANT", "OPAL", "BLIZZARD", "SHRINE", "TURRET",
    "RAMPART", "PANTHER", "OBOE", "JUNGLE", "PEAK", "GRASSHOPPER", "SWAMP", "ALTIMETER",
    "PLANETARIUM", "DUSK", "ASTROLABE",
];

/// Number the participant counts down from during the distraction.
pub const DISTRACTION_COUNT_FROM: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryRecallConfig {
    pub words_to_display: usize,
    pub memorize_ms: u64,
    pub distraction_ms: u64,
    /// Pool the words are drawn from, without replacement.
    pub word_bank: Vec<String>,
}

impl Default for MemoryRecallConfig {
    fn default() -> Self {
        Self {
            words_to_display: 10,
            memorize_ms: 10_000,
            distraction_ms: 5_000,
            word_bank: WORD_BANK.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl MemoryRecallConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |msg: &str| Err(ConfigError::new("memory_recall", msg));
        if self.words_to_display == 0 {
            return err("words_to_display must be at least 1");
        }
        if self.memorize_ms == 0 {
            return err("memorize_ms must be positive");
        }
        if self.word_bank.iter().any(|w| w.trim().is_empty()) {
            return err("word_bank must not contain blank words");
        }
        let distinct: HashSet<String> = self.word_bank.iter().map(|w| normalize(w)).collect();
        if distinct.len() < self.words_to_display {
            return err("word_bank has fewer distinct words than words_to_display");
        }
        Ok(())
    }
}

fn normalize(word: &str) -> String {
    word.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalledWord {
    pub word: String,
    pub answer: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecallOutcome {
    pub score: usize,
    pub max_score: usize,
    pub items: Vec<RecalledWord>,
}

impl MemoryRecallOutcome {
    /// Score `answers` against `words` slot by slot. Missing slots are blank
    /// and extra answers are ignored.
    pub fn score(words: &[String], answers: &[String]) -> Self {
        let items: Vec<RecalledWord> = words
            .iter()
            .enumerate()
            .map(|(i, word)| {
                let answer = answers.get(i).map(|a| a.trim().to_string()).unwrap_or_default();
                RecalledWord {
                    word: word.clone(),
                    correct: normalize(&answer) == normalize(word),
                    answer,
                }
            })
            .collect();
        Self {
            score: items.iter().filter(|i| i.correct).count(),
            max_score: words.len(),
            items,
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.max_score == 0 {
            0.0
        } else {
            self.score as f64 / self.max_score as f64 * 100.0
        }
    }

    pub fn interpretation(&self) -> &'static str {
        let p = self.percentage();
        if p >= 80.0 {
            "Excellent memory performance!"
        } else if p >= 60.0 {
            "Good memory performance."
        } else if p >= 40.0 {
            "Fair memory performance."
        } else {
            "Memory may need attention. Consider consulting a healthcare professional."
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRecallTimer {
    Memorize,
    Distraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRecallState {
    Instructions,
    Memorize,
    Distraction,
    Recall,
    Results,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryRecallEffect {
    Timer(TimerCommand<MemoryRecallTimer>),
    ShowWords {
        words: Vec<String>,
        display_for: Duration,
    },
    Distraction {
        count_from: u32,
        duration: Duration,
    },
    AwaitRecall {
        slots: usize,
    },
    /// A submission the engine refused; state is unchanged.
    Rejected(SubmitError),
    Completed(MemoryRecallOutcome),
}

pub struct MemoryRecallEngine {
    config: MemoryRecallConfig,
    words: Vec<String>,
    state: MemoryRecallState,
    timers: TimerSet<MemoryRecallTimer>,
}

impl MemoryRecallEngine {
    /// Validate `config` and draw the word list.
    pub fn new(config: MemoryRecallConfig, rng: &mut impl Rng) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut seen = HashSet::new();
        let mut pool: Vec<String> = config
            .word_bank
            .iter()
            .map(|w| normalize(w))
            .filter(|w| seen.insert(w.clone()))
            .collect();
        pool.shuffle(rng);
        pool.truncate(config.words_to_display);
        tracing::debug!(words = ?pool, "memory recall words drawn");

        Ok(Self {
            config,
            words: pool,
            state: MemoryRecallState::Instructions,
            timers: TimerSet::new(),
        })
    }

    pub fn state(&self) -> MemoryRecallState {
        self.state
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_complete(&self) -> bool {
        self.state == MemoryRecallState::Results
    }

    pub fn start(&mut self) -> Vec<MemoryRecallEffect> {
        let mut fx = Vec::new();
        if self.state == MemoryRecallState::Instructions {
            self.transition_to(MemoryRecallState::Memorize, &mut fx);
            self.arm(MemoryRecallTimer::Memorize, self.config.memorize_ms, &mut fx);
            fx.push(MemoryRecallEffect::ShowWords {
                words: self.words.clone(),
                display_for: Duration::from_millis(self.config.memorize_ms),
            });
        }
        fx
    }

    pub fn timer_fired(&mut self, token: TimerToken<MemoryRecallTimer>) -> Vec<MemoryRecallEffect> {
        let mut fx = Vec::new();
        if !self.timers.fire(token) {
            tracing::debug!(?token, "stale timer discarded");
            return fx;
        }
        match (token.kind, self.state) {
            (MemoryRecallTimer::Memorize, MemoryRecallState::Memorize) => {
                if self.config.distraction_ms == 0 {
                    self.enter_recall(&mut fx);
                } else {
                    self.transition_to(MemoryRecallState::Distraction, &mut fx);
                    self.arm(
                        MemoryRecallTimer::Distraction,
                        self.config.distraction_ms,
                        &mut fx,
                    );
                    fx.push(MemoryRecallEffect::Distraction {
                        count_from: DISTRACTION_COUNT_FROM,
                        duration: Duration::from_millis(self.config.distraction_ms),
                    });
                }
            }
            (MemoryRecallTimer::Distraction, MemoryRecallState::Distraction) => {
                self.enter_recall(&mut fx);
            }
            (kind, state) => tracing::warn!(?kind, ?state, "timer fired in unexpected state"),
        }
        fx
    }

    /// Submit the recalled words, one per slot in display order.
    pub fn submit(&mut self, answers: &[String]) -> Result<Vec<MemoryRecallEffect>, SubmitError> {
        if self.state != MemoryRecallState::Recall {
            return Err(SubmitError::NotAcceptingInput);
        }
        let outcome = MemoryRecallOutcome::score(&self.words, answers);
        tracing::info!(
            score = outcome.score,
            max = outcome.max_score,
            "memory recall complete"
        );
        let mut fx = Vec::new();
        self.transition_to(MemoryRecallState::Results, &mut fx);
        fx.push(MemoryRecallEffect::Completed(outcome));
        Ok(fx)
    }

    fn enter_recall(&mut self, fx: &mut Vec<MemoryRecallEffect>) {
        self.transition_to(MemoryRecallState::Recall, fx);
        fx.push(MemoryRecallEffect::AwaitRecall {
            slots: self.words.len(),
        });
    }

    fn transition_to(&mut self, state: MemoryRecallState, fx: &mut Vec<MemoryRecallEffect>) {
        fx.extend(self.timers.cancel_all().into_iter().map(MemoryRecallEffect::Timer));
        tracing::debug!(from = ?self.state, to = ?state, "memory recall transition");
        self.state = state;
    }

    fn arm(&mut self, kind: MemoryRecallTimer, ms: u64, fx: &mut Vec<MemoryRecallEffect>) {
        fx.extend(
            self.timers
                .arm(kind, Duration::from_millis(ms))
                .into_iter()
                .map(MemoryRecallEffect::Timer),
        );
    }
}
