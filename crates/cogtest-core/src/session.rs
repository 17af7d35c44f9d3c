//! Async drivers that run the sans-IO engines against real time.
//!
//! A driver owns one engine, a [`TimerDriver`] that turns timer commands into
//! spawned `tokio::time::sleep` tasks, and the channels through which
//! participant input, fired timers, and capability callbacks arrive. Every
//! non-timer effect is handed to a [`Presenter`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio_recall::{
    AudioRecallEffect, AudioRecallEngine, AudioRecallOutcome, AudioRecallState, AudioRecallTimer,
    Capabilities,
};
use crate::digit_span::{DigitSpanEffect, DigitSpanEngine, DigitSpanScores};
use crate::error::{ScoringError, SessionError};
use crate::gonogo::{GoNoGoEffect, GoNoGoEngine, GoNoGoMetrics};
use crate::memory_recall::{MemoryRecallEffect, MemoryRecallEngine, MemoryRecallOutcome};
use crate::stroop::{InkColor, StroopEffect, StroopEngine, StroopMetrics};
use crate::timer::{Clock, TimerCommand, TimerToken};
use crate::trail_making::{TrailMakingEffect, TrailMakingEngine, TrailMakingMetrics};
use crate::traits::{
    MicrophoneAccess, Presenter, RecognizerEvent, SimilarityScorer, SpeechRecognizer,
    SpeechSynthesizer,
};

/// Executes [`TimerCommand`]s with spawned sleep tasks. Fired tokens are sent
/// back on the channel given to [`TimerDriver::new`].
pub struct TimerDriver<K> {
    tasks: HashMap<u64, JoinHandle<()>>,
    fired: mpsc::UnboundedSender<TimerToken<K>>,
}

impl<K: Copy + Send + 'static> TimerDriver<K> {
    pub fn new(fired: mpsc::UnboundedSender<TimerToken<K>>) -> Self {
        Self {
            tasks: HashMap::new(),
            fired,
        }
    }

    pub fn execute(&mut self, command: TimerCommand<K>) {
        match command {
            TimerCommand::Schedule { token, after } => {
                let fired = self.fired.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = fired.send(token);
                });
                self.tasks.insert(token.generation, handle);
            }
            TimerCommand::Cancel { token } => {
                if let Some(handle) = self.tasks.remove(&token.generation) {
                    handle.abort();
                }
            }
        }
    }

    /// Drop bookkeeping for a token that has been delivered.
    pub fn forget(&mut self, token: TimerToken<K>) {
        self.tasks.remove(&token.generation);
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

impl<K> Drop for TimerDriver<K> {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

/// Run a Go/No-Go session to completion.
///
/// Each message on `responses` is one participant response. If the input
/// channel closes the session keeps running on its timers, recording the
/// remaining trials as if nobody responded.
pub async fn run_go_no_go<R: Rng>(
    mut engine: GoNoGoEngine<R>,
    clock: &dyn Clock,
    mut responses: mpsc::Receiver<()>,
    presenter: &dyn Presenter<GoNoGoEffect>,
) -> Result<GoNoGoMetrics, SessionError> {
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
    let mut timers = TimerDriver::new(timer_tx);
    let mut input_open = true;

    let mut fx = engine.start(clock.now());
    loop {
        for effect in fx {
            match effect {
                GoNoGoEffect::Timer(command) => timers.execute(command),
                GoNoGoEffect::Completed(metrics) => {
                    presenter.present(&GoNoGoEffect::Completed(metrics.clone()));
                    return Ok(metrics);
                }
                other => presenter.present(&other),
            }
        }

        fx = tokio::select! {
            Some(token) = timer_rx.recv() => {
                timers.forget(token);
                engine.timer_fired(token, clock.now())
            }
            response = responses.recv(), if input_open => match response {
                Some(()) => engine.respond(clock.now()),
                None => {
                    tracing::debug!("response channel closed, continuing on timers");
                    input_open = false;
                    Vec::new()
                }
            },
            else => return Err(SessionError::InputClosed),
        };
    }
}

/// Participant input for a digit span session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigitSpanInput {
    Submit(String),
}

/// Run a digit span session to completion. Rejected submissions are
/// presented as [`DigitSpanEffect::Rejected`] and leave the engine unchanged.
pub async fn run_digit_span<R: Rng>(
    mut engine: DigitSpanEngine<R>,
    mut input: mpsc::Receiver<DigitSpanInput>,
    presenter: &dyn Presenter<DigitSpanEffect>,
) -> Result<DigitSpanScores, SessionError> {
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
    let mut timers = TimerDriver::new(timer_tx);

    let mut fx = engine.start();
    loop {
        for effect in fx {
            match effect {
                DigitSpanEffect::Timer(command) => timers.execute(command),
                DigitSpanEffect::Completed(scores) => {
                    presenter.present(&DigitSpanEffect::Completed(scores));
                    return Ok(scores);
                }
                other => presenter.present(&other),
            }
        }

        fx = tokio::select! {
            Some(token) = timer_rx.recv() => {
                timers.forget(token);
                engine.timer_fired(token)
            }
            message = input.recv() => match message {
                Some(DigitSpanInput::Submit(answer)) => match engine.submit(&answer) {
                    Ok(fx) => fx,
                    Err(e) => {
                        tracing::debug!(%e, "submission rejected");
                        vec![DigitSpanEffect::Rejected(e)]
                    }
                },
                None => return Err(SessionError::InputClosed),
            },
        };
    }
}

/// Run a Stroop session to completion. Each message on `answers` names the
/// ink color of the trial on screen.
pub async fn run_stroop(
    mut engine: StroopEngine,
    clock: &dyn Clock,
    mut answers: mpsc::Receiver<InkColor>,
    presenter: &dyn Presenter<StroopEffect>,
) -> Result<StroopMetrics, SessionError> {
    let mut fx = engine.start(clock.now());
    loop {
        for effect in fx {
            if let StroopEffect::Completed(metrics) = &effect {
                presenter.present(&effect);
                return Ok(metrics.clone());
            }
            presenter.present(&effect);
        }

        let Some(answer) = answers.recv().await else {
            return Err(SessionError::InputClosed);
        };
        fx = engine.answer(answer, clock.now()).unwrap_or_else(|e| {
            tracing::debug!(%e, "stroop answer rejected");
            Vec::new()
        });
    }
}

/// Run a memory recall session to completion. Words submitted before the
/// recall screen are rejected and presented as [`MemoryRecallEffect::Rejected`].
pub async fn run_memory_recall(
    mut engine: MemoryRecallEngine,
    mut answers: mpsc::Receiver<Vec<String>>,
    presenter: &dyn Presenter<MemoryRecallEffect>,
) -> Result<MemoryRecallOutcome, SessionError> {
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
    let mut timers = TimerDriver::new(timer_tx);

    let mut fx = engine.start();
    loop {
        for effect in fx {
            match effect {
                MemoryRecallEffect::Timer(command) => timers.execute(command),
                MemoryRecallEffect::Completed(outcome) => {
                    presenter.present(&MemoryRecallEffect::Completed(outcome.clone()));
                    return Ok(outcome);
                }
                other => presenter.present(&other),
            }
        }

        fx = tokio::select! {
            Some(token) = timer_rx.recv() => {
                timers.forget(token);
                engine.timer_fired(token)
            }
            message = answers.recv() => match message {
                Some(words) => engine.submit(&words).unwrap_or_else(|e| {
                    tracing::debug!(%e, "recall submitted early");
                    vec![MemoryRecallEffect::Rejected(e)]
                }),
                None => return Err(SessionError::InputClosed),
            },
        };
    }
}

/// Run a trail making session to completion. Each message on `picks` is the
/// number of the circle the participant selected.
pub async fn run_trail_making(
    mut engine: TrailMakingEngine,
    clock: &dyn Clock,
    mut picks: mpsc::Receiver<usize>,
    presenter: &dyn Presenter<TrailMakingEffect>,
) -> Result<TrailMakingMetrics, SessionError> {
    let mut fx = engine.start(clock.now());
    loop {
        for effect in fx {
            if let TrailMakingEffect::Completed(metrics) = &effect {
                presenter.present(&effect);
                return Ok(metrics.clone());
            }
            presenter.present(&effect);
        }

        let Some(number) = picks.recv().await else {
            return Err(SessionError::InputClosed);
        };
        fx = engine.pick(number, clock.now()).unwrap_or_else(|e| {
            tracing::debug!(%e, "pick rejected");
            vec![TrailMakingEffect::Rejected(e)]
        });
    }
}

/// The speech and scoring capabilities an audio recall session runs on.
#[derive(Clone)]
pub struct SpeechServices {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub microphone: Arc<dyn MicrophoneAccess>,
    pub scorer: Arc<dyn SimilarityScorer>,
}

impl SpeechServices {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            speech_synthesis: self.synthesizer.is_available(),
            speech_recognition: self.recognizer.is_available(),
        }
    }
}

/// Participant input for an audio recall session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRecallInput {
    Start,
    Play,
    StartRecording,
    StopRecording,
    TryAgain,
    Advance,
}

/// Side of the audio recall driver that talks to the capabilities.
struct AudioRecallIo<'a> {
    services: &'a SpeechServices,
    timers: TimerDriver<AudioRecallTimer>,
    playback_tx: mpsc::UnboundedSender<()>,
    recognizer_tx: mpsc::UnboundedSender<RecognizerEvent>,
    score_tx: mpsc::UnboundedSender<Result<f64, ScoringError>>,
    playback: Option<JoinHandle<()>>,
}

impl AudioRecallIo<'_> {
    /// Execute one effect. A recognizer that refuses to start produces an
    /// error event for the engine.
    fn execute(&mut self, effect: AudioRecallEffect) -> Option<RecognizerEvent> {
        match effect {
            AudioRecallEffect::Timer(command) => self.timers.execute(command),
            AudioRecallEffect::Speak(utterance) => {
                let synthesizer = Arc::clone(&self.services.synthesizer);
                let done = self.playback_tx.clone();
                self.playback = Some(tokio::spawn(async move {
                    synthesizer.speak(&utterance).await;
                    let _ = done.send(());
                }));
            }
            AudioRecallEffect::CancelSpeech => {
                self.services.synthesizer.cancel();
                if let Some(handle) = self.playback.take() {
                    handle.abort();
                }
            }
            AudioRecallEffect::StartRecognizer => {
                if let Err(code) = self.services.recognizer.start(self.recognizer_tx.clone()) {
                    tracing::warn!(?code, "recognizer failed to start");
                    return Some(RecognizerEvent::Error(code));
                }
            }
            AudioRecallEffect::StopRecognizer => self.services.recognizer.stop(),
            AudioRecallEffect::AbortRecognizer => self.services.recognizer.abort(),
            AudioRecallEffect::Compare(request) => {
                let scorer = Arc::clone(&self.services.scorer);
                let done = self.score_tx.clone();
                tokio::spawn(async move {
                    let result = scorer.score(&request).await;
                    let _ = done.send(result);
                });
            }
            AudioRecallEffect::Prompt(_)
            | AudioRecallEffect::Error(_)
            | AudioRecallEffect::Completed(_) => {}
        }
        None
    }
}

/// Run an audio recall session to completion.
///
/// Microphone permission is checked when the session starts and again before
/// every recording. If the input channel closes, playback and capture are
/// torn down and [`SessionError::InputClosed`] is returned.
pub async fn run_audio_recall<R: Rng>(
    mut engine: AudioRecallEngine<R>,
    services: &SpeechServices,
    mut input: mpsc::Receiver<AudioRecallInput>,
    presenter: &dyn Presenter<AudioRecallEffect>,
) -> Result<AudioRecallOutcome, SessionError> {
    if let AudioRecallState::Unsupported { missing } = engine.state() {
        return Err(SessionError::Unsupported {
            missing: missing.clone(),
        });
    }

    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
    let (playback_tx, mut playback_rx) = mpsc::unbounded_channel();
    let (recognizer_tx, mut recognizer_rx) = mpsc::unbounded_channel();
    let (score_tx, mut score_rx) = mpsc::unbounded_channel();
    let mut io = AudioRecallIo {
        services,
        timers: TimerDriver::new(timer_tx),
        playback_tx,
        recognizer_tx,
        score_tx,
        playback: None,
    };

    engine.set_mic_permission(services.microphone.check().await);

    loop {
        let fx = tokio::select! {
            Some(token) = timer_rx.recv() => {
                io.timers.forget(token);
                engine.timer_fired(token)
            }
            Some(()) = playback_rx.recv() => engine.playback_ended(),
            Some(event) = recognizer_rx.recv() => engine.recognizer_event(event),
            Some(result) = score_rx.recv() => engine.comparison_finished(result),
            message = input.recv() => match message {
                Some(AudioRecallInput::Start) => engine.start(),
                Some(AudioRecallInput::Play) => engine.play(),
                Some(AudioRecallInput::StartRecording) => {
                    engine.set_mic_permission(services.microphone.check().await);
                    engine.start_recording()
                }
                Some(AudioRecallInput::StopRecording) => engine.stop_recording(),
                Some(AudioRecallInput::TryAgain) => engine.try_again(),
                Some(AudioRecallInput::Advance) => engine.advance(),
                None => {
                    for effect in engine.shutdown() {
                        io.execute(effect);
                    }
                    return Err(SessionError::InputClosed);
                }
            },
        };

        let mut queue = VecDeque::from(fx);
        while let Some(effect) = queue.pop_front() {
            if let AudioRecallEffect::Completed(outcome) = &effect {
                presenter.present(&effect);
                return Ok(outcome.clone());
            }
            if !matches!(effect, AudioRecallEffect::Timer(_)) {
                presenter.present(&effect);
            }
            if let Some(event) = io.execute(effect) {
                queue.extend(engine.recognizer_event(event));
            }
        }
    }
}
