//! Audio recall test: hear a sentence, repeat it, get a similarity score.
//!
//! The engine is `Instructions → Listen → Record → Results`, repeated per
//! round, ending in `Summary`. The sentence chosen for a round travels inside
//! the state payload from `Listen` through `Record` and `Comparing` to
//! `Results`, so the text compared is always the text that was spoken.
//!
//! Recording tolerates the quirks of browser recognizers: a speech-end signal
//! with no preceding speech-start is ignored, a genuine speech end waits a
//! grace period for trailing final results, and a hard ceiling stops capture
//! regardless.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, ConfigError, ScoringError};
use crate::similarity::{resolve_score, PerformanceTier, ScoreSource};
use crate::timer::{TimerCommand, TimerSet, TimerToken};
use crate::traits::{
    CompareRequest, MicPermission, RecognitionSegment, RecognizerErrorCode, RecognizerEvent,
    Utterance,
};

pub const DEFAULT_SENTENCES: [&str; 5] = [
    "The quick brown fox jumps over the lazy dog.",
    "A journey of a thousand miles begins with a single step.",
    "In the middle of difficulty lies opportunity for growth and learning.",
    "The greatest glory in living lies not in never falling, but in rising every time we fall.",
    "Believe you can and you are halfway there, success comes to those who persevere.",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioRecallConfig {
    pub total_rounds: usize,
    pub sentences: Vec<String>,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub speech_volume: f32,
    /// Microphone warm-up before the recognizer starts.
    pub warm_up_ms: u64,
    /// Wait after a genuine speech end before stopping.
    pub grace_ms: u64,
    /// Hard limit on a capture session.
    pub ceiling_ms: u64,
    pub correct_threshold: f64,
}

impl Default for AudioRecallConfig {
    fn default() -> Self {
        Self {
            total_rounds: 3,
            sentences: DEFAULT_SENTENCES.iter().map(|s| s.to_string()).collect(),
            speech_rate: 0.9,
            speech_pitch: 1.0,
            speech_volume: 1.0,
            warm_up_ms: 1500,
            grace_ms: 2000,
            ceiling_ms: 10_000,
            correct_threshold: crate::similarity::CORRECT_THRESHOLD,
        }
    }
}

impl AudioRecallConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let err = |msg: &str| Err(ConfigError::new("audio_recall", msg));
        if self.total_rounds == 0 {
            return err("total_rounds must be at least 1");
        }
        if self.sentences.is_empty() {
            return err("sentence pool must not be empty");
        }
        if self.sentences.iter().any(|s| s.trim().is_empty()) {
            return err("sentence pool must not contain blank sentences");
        }
        if self.ceiling_ms == 0 {
            return err("ceiling_ms must be positive");
        }
        if !(0.0..=100.0).contains(&self.correct_threshold) {
            return err("correct_threshold must be within [0, 100]");
        }
        Ok(())
    }
}

/// Speech capabilities of the hosting runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub speech_synthesis: bool,
    pub speech_recognition: bool,
}

impl Capabilities {
    pub fn is_supported(&self) -> bool {
        self.speech_synthesis && self.speech_recognition
    }

    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.speech_synthesis {
            missing.push("speech synthesis");
        }
        if !self.speech_recognition {
            missing.push("speech recognition");
        }
        missing
    }
}

/// Accumulated recognizer output for one capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    finalized: Vec<String>,
    interim: String,
}

impl Transcript {
    /// Fold one result event in. Final segments are appended in arrival
    /// order; the interim text is replaced by the event's interim segments.
    pub fn apply(&mut self, segments: &[RecognitionSegment]) {
        let mut interim = Vec::new();
        for segment in segments {
            let text = segment.transcript.trim();
            if text.is_empty() {
                continue;
            }
            if segment.is_final {
                self.finalized.push(text.to_string());
            } else {
                interim.push(text);
            }
        }
        self.interim = interim.join(" ");
    }

    /// Finalized text if any, otherwise the latest interim text.
    pub fn best(&self) -> String {
        if self.finalized.is_empty() {
            self.interim.clone()
        } else {
            self.finalized.join(" ")
        }
    }
}

/// A live recognizer session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveCapture {
    /// `Start` has been seen for this session.
    pub started: bool,
    pub speech_detected: bool,
    pub stopping: bool,
    pub transcript: Transcript,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Idle,
    WarmingUp,
    Active(ActiveCapture),
}

/// A completed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallRound {
    /// 1-based.
    pub round_number: usize,
    pub original_text: String,
    pub spoken_text: String,
    pub similarity_score: f64,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallDetails {
    pub average_score: f64,
    pub round_results: Vec<RecallRound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRecallOutcome {
    pub correct_round_count: usize,
    pub total_rounds: usize,
    pub details: RecallDetails,
}

impl AudioRecallOutcome {
    pub fn from_rounds(rounds: &[RecallRound], total_rounds: usize) -> Self {
        let average_score = if rounds.is_empty() {
            0.0
        } else {
            rounds.iter().map(|r| r.similarity_score).sum::<f64>() / rounds.len() as f64
        };
        Self {
            correct_round_count: rounds.iter().filter(|r| r.correct).count(),
            total_rounds,
            details: RecallDetails {
                average_score,
                round_results: rounds.to_vec(),
            },
        }
    }

    pub fn performance_tier(&self) -> PerformanceTier {
        PerformanceTier::from_average(self.details.average_score)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioRecallState {
    Unsupported {
        missing: Vec<&'static str>,
    },
    Instructions,
    Listen {
        round: usize,
        sentence: String,
        playing: bool,
    },
    Record {
        round: usize,
        sentence: String,
        capture: Capture,
    },
    Comparing {
        round: usize,
        sentence: String,
        spoken: String,
    },
    Results {
        round: usize,
        sentence: String,
        spoken: String,
        similarity: f64,
        source: ScoreSource,
    },
    Summary(AudioRecallOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRecallTimer {
    WarmUp,
    Grace,
    Ceiling,
}

/// What the participant should be looking at. `round` is 0-based.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPrompt {
    Listen { round: usize, total: usize },
    Record { round: usize },
    Capturing { round: usize },
    Comparing { round: usize },
    Results {
        round: usize,
        spoken: String,
        similarity: f64,
        correct: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioRecallEffect {
    Timer(TimerCommand<AudioRecallTimer>),
    Prompt(AudioPrompt),
    Speak(Utterance),
    CancelSpeech,
    StartRecognizer,
    StopRecognizer,
    AbortRecognizer,
    Compare(CompareRequest),
    Error(CaptureError),
    Completed(AudioRecallOutcome),
}

/// Sans-IO audio recall state machine.
pub struct AudioRecallEngine<R: Rng> {
    config: AudioRecallConfig,
    rng: R,
    state: AudioRecallState,
    timers: TimerSet<AudioRecallTimer>,
    mic: MicPermission,
    rounds: Vec<RecallRound>,
    last_error: Option<CaptureError>,
}

impl<R: Rng> AudioRecallEngine<R> {
    pub fn new(
        config: AudioRecallConfig,
        capabilities: Capabilities,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = if capabilities.is_supported() {
            AudioRecallState::Instructions
        } else {
            tracing::warn!(missing = ?capabilities.missing(), "audio recall unsupported");
            AudioRecallState::Unsupported {
                missing: capabilities.missing(),
            }
        };
        Ok(Self {
            config,
            rng,
            state,
            timers: TimerSet::new(),
            mic: MicPermission::Checking,
            rounds: Vec::new(),
            last_error: None,
        })
    }

    pub fn state(&self) -> &AudioRecallState {
        &self.state
    }

    pub fn rounds(&self) -> &[RecallRound] {
        &self.rounds
    }

    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn mic_permission(&self) -> MicPermission {
        self.mic
    }

    pub fn set_mic_permission(&mut self, permission: MicPermission) {
        tracing::debug!(?permission, "microphone permission");
        self.mic = permission;
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, AudioRecallState::Summary(_))
    }

    /// Leave the instructions and enter round 1.
    pub fn start(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        if self.state == AudioRecallState::Instructions {
            self.rounds.clear();
            let sentence = self.pick_sentence();
            self.enter_listen(0, sentence, &mut fx);
        }
        fx
    }

    /// Play the round's sentence.
    pub fn play(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        if let AudioRecallState::Listen {
            sentence, playing, ..
        } = &mut self.state
        {
            if *playing {
                return fx;
            }
            *playing = true;
            fx.push(AudioRecallEffect::Speak(Utterance {
                text: sentence.clone(),
                rate: self.config.speech_rate,
                pitch: self.config.speech_pitch,
                volume: self.config.speech_volume,
            }));
        }
        fx
    }

    /// End-of-playback notification from the synthesizer.
    pub fn playback_ended(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        if let AudioRecallState::Listen {
            round,
            sentence,
            playing: true,
        } = &self.state
        {
            let (round, sentence) = (*round, sentence.clone());
            self.transition_to(
                AudioRecallState::Record {
                    round,
                    sentence,
                    capture: Capture::Idle,
                },
                &mut fx,
            );
            fx.push(AudioRecallEffect::Prompt(AudioPrompt::Record { round }));
        }
        fx
    }

    /// Participant pressed "start recording".
    pub fn start_recording(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        let AudioRecallState::Record {
            capture: Capture::Idle,
            ..
        } = &self.state
        else {
            return fx;
        };

        if self.mic == MicPermission::Denied {
            self.surface(CaptureError::MicrophoneDenied, &mut fx);
            return fx;
        }

        self.last_error = None;
        self.set_capture(Capture::WarmingUp);
        self.arm(AudioRecallTimer::WarmUp, self.config.warm_up_ms, &mut fx);
        fx
    }

    /// Participant pressed "stop".
    pub fn stop_recording(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        let AudioRecallState::Record { capture, .. } = &mut self.state else {
            return fx;
        };
        match capture {
            Capture::WarmingUp => {
                *capture = Capture::Idle;
                self.cancel(AudioRecallTimer::WarmUp, &mut fx);
            }
            Capture::Active(active) if !active.stopping => {
                active.stopping = true;
                self.cancel(AudioRecallTimer::Ceiling, &mut fx);
                self.cancel(AudioRecallTimer::Grace, &mut fx);
                fx.push(AudioRecallEffect::StopRecognizer);
            }
            _ => {}
        }
        fx
    }

    pub fn timer_fired(&mut self, token: TimerToken<AudioRecallTimer>) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        if !self.timers.fire(token) {
            tracing::debug!(?token, "stale timer discarded");
            return fx;
        }
        let AudioRecallState::Record { round, capture, .. } = &mut self.state else {
            return fx;
        };
        let round = *round;

        match (token.kind, capture) {
            (AudioRecallTimer::WarmUp, capture @ Capture::WarmingUp) => {
                *capture = Capture::Active(ActiveCapture::default());
                // reset whatever session the recognizer may still hold
                fx.push(AudioRecallEffect::AbortRecognizer);
                fx.push(AudioRecallEffect::StartRecognizer);
                self.arm(AudioRecallTimer::Ceiling, self.config.ceiling_ms, &mut fx);
                fx.push(AudioRecallEffect::Prompt(AudioPrompt::Capturing { round }));
            }
            (AudioRecallTimer::Grace, Capture::Active(active)) if !active.stopping => {
                tracing::debug!("grace period elapsed, stopping recognizer");
                active.stopping = true;
                self.cancel(AudioRecallTimer::Ceiling, &mut fx);
                fx.push(AudioRecallEffect::StopRecognizer);
            }
            (AudioRecallTimer::Ceiling, Capture::Active(active)) => {
                tracing::debug!("capture ceiling reached, forcing stop");
                active.stopping = true;
                self.cancel(AudioRecallTimer::Grace, &mut fx);
                fx.push(AudioRecallEffect::StopRecognizer);
            }
            (kind, capture) => {
                tracing::warn!(?kind, ?capture, "timer fired in unexpected capture state");
            }
        }
        fx
    }

    /// Feed one recognizer event.
    pub fn recognizer_event(&mut self, event: RecognizerEvent) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        let AudioRecallState::Record {
            capture: Capture::Active(active),
            ..
        } = &mut self.state
        else {
            tracing::debug!(?event, "recognizer event outside capture ignored");
            return fx;
        };

        match event {
            RecognizerEvent::Start => {
                active.started = true;
                active.speech_detected = false;
                active.transcript = Transcript::default();
            }
            RecognizerEvent::SpeechStart if active.started => {
                active.speech_detected = true;
            }
            RecognizerEvent::Result(segments) if active.started => {
                active.transcript.apply(&segments);
            }
            RecognizerEvent::SpeechEnd if active.started => {
                if !active.speech_detected {
                    tracing::debug!("ignoring speech end before any speech");
                } else if !active.stopping && !self.timers.is_armed(AudioRecallTimer::Grace) {
                    self.arm(AudioRecallTimer::Grace, self.config.grace_ms, &mut fx);
                }
            }
            RecognizerEvent::Error(code) => self.recognizer_error(code, &mut fx),
            // once stopping, any End closes the capture even if Start never arrived
            RecognizerEvent::End if active.started || active.stopping => {
                self.finish_capture(&mut fx)
            }
            other => tracing::debug!(event = ?other, "recognizer event ignored"),
        }
        fx
    }

    /// Result of the similarity scoring call for the pending comparison.
    pub fn comparison_finished(
        &mut self,
        result: Result<f64, ScoringError>,
    ) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        let AudioRecallState::Comparing {
            round,
            sentence,
            spoken,
        } = &self.state
        else {
            tracing::debug!("comparison result outside comparing ignored");
            return fx;
        };
        let (round, sentence, spoken) = (*round, sentence.clone(), spoken.clone());

        let (similarity, source) = resolve_score(result, &sentence, &spoken);
        let correct = similarity >= self.config.correct_threshold;
        tracing::info!(round = round + 1, similarity, ?source, correct, "round scored");

        self.transition_to(
            AudioRecallState::Results {
                round,
                sentence,
                spoken: spoken.clone(),
                similarity,
                source,
            },
            &mut fx,
        );
        fx.push(AudioRecallEffect::Prompt(AudioPrompt::Results {
            round,
            spoken,
            similarity,
            correct,
        }));
        fx
    }

    /// Repeat the same sentence without recording a round.
    pub fn try_again(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        if let AudioRecallState::Results {
            round, sentence, ..
        } = &self.state
        {
            let (round, sentence) = (*round, sentence.clone());
            self.enter_listen(round, sentence, &mut fx);
        }
        fx
    }

    /// Keep the round's result and go to the next round or the summary.
    pub fn advance(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx = Vec::new();
        let AudioRecallState::Results {
            round,
            sentence,
            spoken,
            similarity,
            ..
        } = &self.state
        else {
            return fx;
        };
        let round = *round;
        self.rounds.push(RecallRound {
            round_number: round + 1,
            original_text: sentence.clone(),
            spoken_text: spoken.clone(),
            similarity_score: *similarity,
            correct: *similarity >= self.config.correct_threshold,
        });

        if round + 1 < self.config.total_rounds {
            let sentence = self.pick_sentence();
            self.enter_listen(round + 1, sentence, &mut fx);
        } else {
            let outcome = AudioRecallOutcome::from_rounds(&self.rounds, self.config.total_rounds);
            tracing::info!(
                correct = outcome.correct_round_count,
                average = outcome.details.average_score,
                "audio recall complete"
            );
            self.transition_to(AudioRecallState::Summary(outcome.clone()), &mut fx);
            fx.push(AudioRecallEffect::Completed(outcome));
        }
        fx
    }

    /// Tear down: cancel timers, playback and capture.
    pub fn shutdown(&mut self) -> Vec<AudioRecallEffect> {
        let mut fx: Vec<_> = self
            .timers
            .cancel_all()
            .into_iter()
            .map(AudioRecallEffect::Timer)
            .collect();
        fx.push(AudioRecallEffect::CancelSpeech);
        fx.push(AudioRecallEffect::AbortRecognizer);
        fx
    }

    fn recognizer_error(&mut self, code: RecognizerErrorCode, fx: &mut Vec<AudioRecallEffect>) {
        let error = match code {
            RecognizerErrorCode::Aborted => {
                tracing::debug!("recognizer aborted");
                return;
            }
            RecognizerErrorCode::NoSpeech => CaptureError::NoSpeech,
            RecognizerErrorCode::NotAllowed => {
                self.mic = MicPermission::Denied;
                CaptureError::MicrophoneDenied
            }
            RecognizerErrorCode::AudioCapture => CaptureError::AudioCapture,
            RecognizerErrorCode::Other(code) => CaptureError::Recognition(code),
        };
        tracing::warn!(%error, "recognizer error");
        self.back_to_idle(fx);
        self.surface(error, fx);
    }

    fn finish_capture(&mut self, fx: &mut Vec<AudioRecallEffect>) {
        let AudioRecallState::Record {
            round,
            sentence,
            capture: Capture::Active(active),
        } = &self.state
        else {
            return;
        };
        let (round, sentence) = (*round, sentence.clone());
        let spoken = active.transcript.best().trim().to_string();

        if spoken.is_empty() {
            self.back_to_idle(fx);
            self.surface(CaptureError::EmptyTranscript, fx);
            return;
        }
        if sentence.trim().is_empty() {
            tracing::error!(round, "no reference sentence for comparison");
            self.back_to_idle(fx);
            self.surface(CaptureError::MissingSentence, fx);
            return;
        }

        tracing::debug!(round = round + 1, %spoken, "capture finished");
        self.transition_to(
            AudioRecallState::Comparing {
                round,
                sentence: sentence.clone(),
                spoken: spoken.clone(),
            },
            fx,
        );
        fx.push(AudioRecallEffect::Prompt(AudioPrompt::Comparing { round }));
        fx.push(AudioRecallEffect::Compare(CompareRequest {
            original: sentence,
            spoken,
        }));
    }

    fn back_to_idle(&mut self, fx: &mut Vec<AudioRecallEffect>) {
        if let AudioRecallState::Record {
            round, sentence, ..
        } = &self.state
        {
            let (round, sentence) = (*round, sentence.clone());
            self.transition_to(
                AudioRecallState::Record {
                    round,
                    sentence,
                    capture: Capture::Idle,
                },
                fx,
            );
        }
    }

    fn surface(&mut self, error: CaptureError, fx: &mut Vec<AudioRecallEffect>) {
        self.last_error = Some(error.clone());
        fx.push(AudioRecallEffect::Error(error));
    }

    fn enter_listen(&mut self, round: usize, sentence: String, fx: &mut Vec<AudioRecallEffect>) {
        self.last_error = None;
        self.transition_to(
            AudioRecallState::Listen {
                round,
                sentence,
                playing: false,
            },
            fx,
        );
        fx.push(AudioRecallEffect::Prompt(AudioPrompt::Listen {
            round,
            total: self.config.total_rounds,
        }));
    }

    fn set_capture(&mut self, next: Capture) {
        if let AudioRecallState::Record { capture, .. } = &mut self.state {
            *capture = next;
        }
    }

    fn pick_sentence(&mut self) -> String {
        let idx = self.rng.random_range(0..self.config.sentences.len());
        self.config.sentences[idx].clone()
    }

    /// Single choke point for state changes: every armed timer from the
    /// previous state is cancelled first.
    fn transition_to(&mut self, state: AudioRecallState, fx: &mut Vec<AudioRecallEffect>) {
        fx.extend(self.timers.cancel_all().into_iter().map(AudioRecallEffect::Timer));
        self.state = state;
    }

    fn arm(&mut self, kind: AudioRecallTimer, ms: u64, fx: &mut Vec<AudioRecallEffect>) {
        fx.extend(
            self.timers
                .arm(kind, Duration::from_millis(ms))
                .into_iter()
                .map(AudioRecallEffect::Timer),
        );
    }

    fn cancel(&mut self, kind: AudioRecallTimer, fx: &mut Vec<AudioRecallEffect>) {
        fx.extend(self.timers.cancel(kind).map(AudioRecallEffect::Timer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SUPPORTED: Capabilities = Capabilities {
        speech_synthesis: true,
        speech_recognition: true,
    };

    fn engine_with(config: AudioRecallConfig) -> AudioRecallEngine<StdRng> {
        let mut e = AudioRecallEngine::new(config, SUPPORTED, StdRng::seed_from_u64(5)).unwrap();
        e.set_mic_permission(MicPermission::Granted);
        e
    }

    fn engine() -> AudioRecallEngine<StdRng> {
        engine_with(AudioRecallConfig::default())
    }

    fn scheduled(
        fx: &[AudioRecallEffect],
        kind: AudioRecallTimer,
    ) -> Option<TimerToken<AudioRecallTimer>> {
        fx.iter().find_map(|e| match e {
            AudioRecallEffect::Timer(TimerCommand::Schedule { token, .. }) if token.kind == kind => {
                Some(*token)
            }
            _ => None,
        })
    }

    fn current_sentence(e: &AudioRecallEngine<StdRng>) -> String {
        match e.state() {
            AudioRecallState::Listen { sentence, .. }
            | AudioRecallState::Record { sentence, .. }
            | AudioRecallState::Comparing { sentence, .. }
            | AudioRecallState::Results { sentence, .. } => sentence.clone(),
            other => panic!("no sentence in {other:?}"),
        }
    }

    /// Play the sentence and warm up; returns the ceiling token.
    fn begin_capture(e: &mut AudioRecallEngine<StdRng>) -> TimerToken<AudioRecallTimer> {
        e.play();
        e.playback_ended();
        let fx = e.start_recording();
        let warm_up = scheduled(&fx, AudioRecallTimer::WarmUp).unwrap();
        let fx = e.timer_fired(warm_up);
        assert!(fx.contains(&AudioRecallEffect::StartRecognizer));
        let ceiling = scheduled(&fx, AudioRecallTimer::Ceiling).unwrap();
        e.recognizer_event(RecognizerEvent::Start);
        ceiling
    }

    /// Speak `text` and let the recognizer end; returns the effects of `End`.
    fn capture(e: &mut AudioRecallEngine<StdRng>, text: &str) -> Vec<AudioRecallEffect> {
        begin_capture(e);
        e.recognizer_event(RecognizerEvent::SpeechStart);
        e.recognizer_event(RecognizerEvent::Result(vec![RecognitionSegment::finalized(text)]));
        e.stop_recording();
        e.recognizer_event(RecognizerEvent::End)
    }

    fn compared(fx: &[AudioRecallEffect]) -> CompareRequest {
        fx.iter()
            .find_map(|e| match e {
                AudioRecallEffect::Compare(req) => Some(req.clone()),
                _ => None,
            })
            .expect("comparison requested")
    }

    #[test]
    fn unsupported_runtime_blocks_start() {
        let caps = Capabilities {
            speech_synthesis: true,
            speech_recognition: false,
        };
        let mut e =
            AudioRecallEngine::new(AudioRecallConfig::default(), caps, StdRng::seed_from_u64(1))
                .unwrap();
        assert_eq!(
            e.state(),
            &AudioRecallState::Unsupported {
                missing: vec!["speech recognition"]
            }
        );
        assert!(e.start().is_empty());
    }

    #[test]
    fn rejects_empty_sentence_pool() {
        let config = AudioRecallConfig {
            sentences: vec![],
            ..Default::default()
        };
        assert!(AudioRecallEngine::new(config, SUPPORTED, StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn playback_uses_reduced_rate_then_records() {
        let mut e = engine();
        e.start();
        let sentence = current_sentence(&e);
        assert!(DEFAULT_SENTENCES.contains(&sentence.as_str()));

        let fx = e.play();
        assert_eq!(
            fx,
            vec![AudioRecallEffect::Speak(Utterance {
                text: sentence.clone(),
                rate: 0.9,
                pitch: 1.0,
                volume: 1.0,
            })]
        );
        assert!(e.play().is_empty(), "second play while playing is ignored");

        e.playback_ended();
        assert!(matches!(
            e.state(),
            AudioRecallState::Record { capture: Capture::Idle, .. }
        ));
    }

    #[test]
    fn denied_microphone_blocks_recording_only() {
        let mut e = engine();
        e.set_mic_permission(MicPermission::Denied);
        e.start();
        e.play();
        e.playback_ended();

        let fx = e.start_recording();
        assert_eq!(fx, vec![AudioRecallEffect::Error(CaptureError::MicrophoneDenied)]);
        assert!(matches!(
            e.state(),
            AudioRecallState::Record { capture: Capture::Idle, .. }
        ));

        e.set_mic_permission(MicPermission::Granted);
        let fx = e.start_recording();
        assert!(scheduled(&fx, AudioRecallTimer::WarmUp).is_some());
        assert!(e.last_error().is_none());
    }

    #[test]
    fn warm_up_resets_recognizer_and_arms_ceiling() {
        let mut e = engine();
        e.start();
        e.play();
        e.playback_ended();
        let fx = e.start_recording();
        assert!(fx.contains(&AudioRecallEffect::Timer(TimerCommand::Schedule {
            token: scheduled(&fx, AudioRecallTimer::WarmUp).unwrap(),
            after: Duration::from_millis(1500),
        })));

        let fx = e.timer_fired(scheduled(&fx, AudioRecallTimer::WarmUp).unwrap());
        let abort = fx.iter().position(|f| *f == AudioRecallEffect::AbortRecognizer);
        let start = fx.iter().position(|f| *f == AudioRecallEffect::StartRecognizer);
        assert!(abort.unwrap() < start.unwrap());
        assert!(fx.contains(&AudioRecallEffect::Timer(TimerCommand::Schedule {
            token: scheduled(&fx, AudioRecallTimer::Ceiling).unwrap(),
            after: Duration::from_millis(10_000),
        })));
    }

    #[test]
    fn spurious_speech_end_is_ignored() {
        let mut e = engine();
        e.start();
        begin_capture(&mut e);
        let fx = e.recognizer_event(RecognizerEvent::SpeechEnd);
        assert!(fx.is_empty());
        assert!(matches!(
            e.state(),
            AudioRecallState::Record { capture: Capture::Active(ActiveCapture { stopping: false, .. }), .. }
        ));
    }

    #[test]
    fn genuine_speech_end_waits_grace_then_stops() {
        let mut e = engine();
        e.start();
        let sentence = current_sentence(&e);
        begin_capture(&mut e);

        e.recognizer_event(RecognizerEvent::SpeechStart);
        e.recognizer_event(RecognizerEvent::Result(vec![RecognitionSegment::interim("the quick")]));
        let fx = e.recognizer_event(RecognizerEvent::SpeechEnd);
        let grace = scheduled(&fx, AudioRecallTimer::Grace).unwrap();
        // trailing final result inside the grace period
        e.recognizer_event(RecognizerEvent::Result(vec![RecognitionSegment::finalized(
            "the quick brown fox",
        )]));

        let fx = e.timer_fired(grace);
        assert!(fx.contains(&AudioRecallEffect::StopRecognizer));
        let fx = e.recognizer_event(RecognizerEvent::End);
        let request = compared(&fx);
        assert_eq!(request.original, sentence);
        assert_eq!(request.spoken, "the quick brown fox");
    }

    #[test]
    fn transcript_prefers_final_segments_in_order() {
        let mut t = Transcript::default();
        t.apply(&[RecognitionSegment::interim("the quick")]);
        assert_eq!(t.best(), "the quick");
        t.apply(&[RecognitionSegment::finalized("the quick brown")]);
        t.apply(&[RecognitionSegment::interim("fox")]);
        assert_eq!(t.best(), "the quick brown");
        t.apply(&[
            RecognitionSegment::finalized("fox jumps"),
            RecognitionSegment::interim("over"),
        ]);
        assert_eq!(t.best(), "the quick brown fox jumps");
    }

    #[test]
    fn interim_only_transcript_is_used() {
        let mut e = engine();
        e.start();
        begin_capture(&mut e);
        e.recognizer_event(RecognizerEvent::Result(vec![RecognitionSegment::interim("a journey")]));
        let fx = e.recognizer_event(RecognizerEvent::End);
        assert_eq!(compared(&fx).spoken, "a journey");
    }

    #[test]
    fn ceiling_forces_stop() {
        let mut e = engine();
        e.start();
        let ceiling = begin_capture(&mut e);
        let fx = e.timer_fired(ceiling);
        assert_eq!(fx, vec![AudioRecallEffect::StopRecognizer]);
        // fired once; a duplicate delivery is stale
        assert!(e.timer_fired(ceiling).is_empty());
    }

    #[test]
    fn manual_stop_cancels_ceiling() {
        let mut e = engine();
        e.start();
        let ceiling = begin_capture(&mut e);
        let fx = e.stop_recording();
        assert_eq!(
            fx,
            vec![
                AudioRecallEffect::Timer(TimerCommand::Cancel { token: ceiling }),
                AudioRecallEffect::StopRecognizer,
            ]
        );
        assert!(e.timer_fired(ceiling).is_empty());
        assert!(e.stop_recording().is_empty());
    }

    #[test]
    fn empty_capture_allows_retry_without_counting() {
        let mut e = engine();
        e.start();
        begin_capture(&mut e);
        let fx = e.recognizer_event(RecognizerEvent::End);
        assert!(fx.contains(&AudioRecallEffect::Error(CaptureError::EmptyTranscript)));
        assert!(matches!(
            e.state(),
            AudioRecallState::Record { round: 0, capture: Capture::Idle, .. }
        ));
        assert!(e.rounds().is_empty());
        assert!(scheduled(&e.start_recording(), AudioRecallTimer::WarmUp).is_some());
    }

    #[test]
    fn aborted_error_is_suppressed() {
        let mut e = engine();
        e.start();
        begin_capture(&mut e);
        let fx = e.recognizer_event(RecognizerEvent::Error(RecognizerErrorCode::Aborted));
        assert!(fx.is_empty());
        assert!(e.last_error().is_none());
        assert!(matches!(
            e.state(),
            AudioRecallState::Record { capture: Capture::Active(_), .. }
        ));
    }

    #[test]
    fn transient_errors_return_to_idle() {
        let mut e = engine();
        e.start();
        let ceiling = begin_capture(&mut e);
        let fx = e.recognizer_event(RecognizerEvent::Error(RecognizerErrorCode::NoSpeech));
        assert!(fx.contains(&AudioRecallEffect::Timer(TimerCommand::Cancel { token: ceiling })));
        assert_eq!(e.last_error(), Some(&CaptureError::NoSpeech));
        // the trailing end of the failed session changes nothing
        assert!(e.recognizer_event(RecognizerEvent::End).is_empty());
        assert!(matches!(
            e.state(),
            AudioRecallState::Record { capture: Capture::Idle, .. }
        ));
    }

    #[test]
    fn not_allowed_marks_microphone_denied() {
        let mut e = engine();
        e.start();
        begin_capture(&mut e);
        e.recognizer_event(RecognizerEvent::Error(RecognizerErrorCode::NotAllowed));
        assert_eq!(e.mic_permission(), MicPermission::Denied);
        assert_eq!(
            e.start_recording(),
            vec![AudioRecallEffect::Error(CaptureError::MicrophoneDenied)]
        );
    }

    #[test]
    fn end_before_start_is_stale() {
        let mut e = engine();
        e.start();
        e.play();
        e.playback_ended();
        let fx = e.start_recording();
        e.timer_fired(scheduled(&fx, AudioRecallTimer::WarmUp).unwrap());
        // end of the session that was just reset
        assert!(e.recognizer_event(RecognizerEvent::End).is_empty());
        assert!(e.last_error().is_none());
    }

    #[test]
    fn stop_before_recognizer_start_allows_retry() {
        let mut e = engine();
        e.start();
        e.play();
        e.playback_ended();
        let fx = e.start_recording();
        e.timer_fired(scheduled(&fx, AudioRecallTimer::WarmUp).unwrap());

        assert!(e.stop_recording().contains(&AudioRecallEffect::StopRecognizer));
        let fx = e.recognizer_event(RecognizerEvent::End);
        assert!(fx.contains(&AudioRecallEffect::Error(CaptureError::EmptyTranscript)));
        assert!(matches!(
            e.state(),
            AudioRecallState::Record { capture: Capture::Idle, .. }
        ));
        assert!(scheduled(&e.start_recording(), AudioRecallTimer::WarmUp).is_some());
    }

    #[test]
    fn scorer_failure_falls_back_locally() {
        let mut e = engine_with(AudioRecallConfig {
            sentences: vec!["THE QUICK BROWN FOX".into()],
            ..Default::default()
        });
        e.start();
        capture(&mut e, "the quick brown fox");
        let fx = e.comparison_finished(Err(ScoringError::Network("refused".into())));
        assert!(matches!(
            e.state(),
            AudioRecallState::Results { source: ScoreSource::Fallback, .. }
        ));
        assert!(fx.contains(&AudioRecallEffect::Prompt(AudioPrompt::Results {
            round: 0,
            spoken: "the quick brown fox".into(),
            similarity: 100.0,
            correct: true,
        })));
    }

    #[test]
    fn threshold_is_inclusive_at_seventy() {
        let mut e = engine();
        e.start();
        capture(&mut e, "something");
        let fx = e.comparison_finished(Ok(70.0));
        assert!(fx.iter().any(|f| matches!(
            f,
            AudioRecallEffect::Prompt(AudioPrompt::Results { correct: true, .. })
        )));
        e.advance();
        assert!(e.rounds()[0].correct);
    }

    #[test]
    fn try_again_keeps_sentence_and_round() {
        let mut e = engine();
        e.start();
        let sentence = current_sentence(&e);
        capture(&mut e, "wrong words");
        e.comparison_finished(Ok(20.0));

        e.try_again();
        assert_eq!(
            e.state(),
            &AudioRecallState::Listen {
                round: 0,
                sentence,
                playing: false
            }
        );
        assert!(e.rounds().is_empty());
    }

    #[test]
    fn three_correct_rounds_complete_the_test() {
        let mut e = engine();
        e.start();
        let mut completed = None;
        for (i, score) in [90.0, 85.0, 75.0].into_iter().enumerate() {
            let sentence = current_sentence(&e);
            let fx = capture(&mut e, "words");
            assert_eq!(compared(&fx).original, sentence);
            e.comparison_finished(Ok(score));
            let fx = e.advance();
            assert_eq!(e.rounds().len(), i + 1);
            assert_eq!(e.rounds()[i].original_text, sentence);
            completed = fx.into_iter().find_map(|f| match f {
                AudioRecallEffect::Completed(outcome) => Some(outcome),
                _ => None,
            });
        }

        let outcome = completed.expect("completed after last round");
        assert!(e.is_complete());
        assert_eq!(outcome.correct_round_count, 3);
        assert_eq!(outcome.total_rounds, 3);
        assert!((outcome.details.average_score - 83.333).abs() < 0.01);
        assert_eq!(outcome.performance_tier(), PerformanceTier::Excellent);
    }

    #[test]
    fn correct_rounds_below_eighty_average_are_good_not_excellent() {
        let rounds: Vec<RecallRound> = [72.0, 75.0, 78.0]
            .iter()
            .enumerate()
            .map(|(i, s)| RecallRound {
                round_number: i + 1,
                original_text: "a".into(),
                spoken_text: "a".into(),
                similarity_score: *s,
                correct: *s >= 70.0,
            })
            .collect();
        let outcome = AudioRecallOutcome::from_rounds(&rounds, 3);
        assert_eq!(outcome.correct_round_count, 3);
        assert_eq!(outcome.performance_tier(), PerformanceTier::Good);
    }

    #[test]
    fn comparison_result_outside_comparing_is_ignored() {
        let mut e = engine();
        e.start();
        assert!(e.comparison_finished(Ok(90.0)).is_empty());
    }
}
