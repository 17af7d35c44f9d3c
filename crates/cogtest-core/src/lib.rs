//! cogtest-core — Cognitive test engines, ports, and scoring.
//!
//! Every engine (Go/No-Go, audio recall, digit span, Stroop, memory recall,
//! trail making) is a sans-IO state machine: it consumes events and returns
//! effects. The [`session`] module runs them against real time on tokio,
//! talking to the outside world only through the ports in [`traits`].

pub mod audio_recall;
pub mod digit_span;
pub mod error;
pub mod gonogo;
pub mod memory_recall;
pub mod report;
pub mod session;
pub mod similarity;
pub mod stroop;
pub mod timer;
pub mod traits;
pub mod trail_making;
