//! Test doubles for the speech, microphone, and scoring ports.
//!
//! They let the audio recall driver run end to end without a browser or a
//! scoring service. Time is driven by `tokio::time`, so paused-clock tests
//! stay deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use cogtest_core::error::ScoringError;
use cogtest_core::traits::{
    CompareRequest, MicPermission, MicrophoneAccess, RecognizerErrorCode, RecognizerEvent,
    SimilarityScorer, SpeechRecognizer, SpeechSynthesizer, Utterance,
};

/// Synthesizer that "plays" every utterance for a fixed duration.
pub struct MockSynthesizer {
    available: bool,
    playback: Duration,
    spoken: Mutex<Vec<Utterance>>,
    cancel_count: AtomicU32,
}

impl MockSynthesizer {
    pub fn new(playback: Duration) -> Self {
        Self {
            available: true,
            playback,
            spoken: Mutex::new(Vec::new()),
            cancel_count: AtomicU32::new(0),
        }
    }

    /// A runtime without speech synthesis.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Every utterance spoken so far.
    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> u32 {
        self.cancel_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn speak(&self, utterance: &Utterance) {
        self.spoken.lock().unwrap().push(utterance.clone());
        tokio::time::sleep(self.playback).await;
    }

    fn cancel(&self) {
        self.cancel_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// One scripted recognizer event, delivered `after` the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub after: Duration,
    pub event: RecognizerEvent,
}

impl ScriptStep {
    pub fn new(after_ms: u64, event: RecognizerEvent) -> Self {
        Self {
            after: Duration::from_millis(after_ms),
            event,
        }
    }
}

struct Session {
    events: mpsc::UnboundedSender<RecognizerEvent>,
    task: JoinHandle<()>,
}

/// Recognizer that replays one script per capture session.
///
/// `start` emits `Start` and then the next script's steps. `stop` ends the
/// session with `End`; `abort` reports `Error(Aborted)` followed by `End`,
/// the way browser recognizers do. A session with no script left only
/// emits `Start`.
pub struct ScriptedRecognizer {
    available: bool,
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    session: Mutex<Option<Session>>,
    start_failure: Mutex<Option<RecognizerErrorCode>>,
    start_count: AtomicU32,
    stop_count: AtomicU32,
}

impl ScriptedRecognizer {
    pub fn new(scripts: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            available: true,
            scripts: Mutex::new(scripts.into()),
            session: Mutex::new(None),
            start_failure: Mutex::new(None),
            start_count: AtomicU32::new(0),
            stop_count: AtomicU32::new(0),
        }
    }

    /// A runtime without speech recognition.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }

    /// Make the next `start` call fail with `code`.
    pub fn fail_next_start(&self, code: RecognizerErrorCode) {
        *self.start_failure.lock().unwrap() = Some(code);
    }

    /// Queue a script for a later session.
    pub fn push_script(&self, steps: Vec<ScriptStep>) {
        self.scripts.lock().unwrap().push_back(steps);
    }

    pub fn start_count(&self) -> u32 {
        self.start_count.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> u32 {
        self.stop_count.load(Ordering::Relaxed)
    }

    fn end_session(&self, aborted: bool) {
        let Some(session) = self.session.lock().unwrap().take() else {
            return;
        };
        session.task.abort();
        if aborted {
            let _ = session
                .events
                .send(RecognizerEvent::Error(RecognizerErrorCode::Aborted));
        }
        let _ = session.events.send(RecognizerEvent::End);
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(
        &self,
        events: mpsc::UnboundedSender<RecognizerEvent>,
    ) -> Result<(), RecognizerErrorCode> {
        if let Some(code) = self.start_failure.lock().unwrap().take() {
            return Err(code);
        }
        self.start_count.fetch_add(1, Ordering::Relaxed);

        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let tx = events.clone();
        let task = tokio::spawn(async move {
            let _ = tx.send(RecognizerEvent::Start);
            for step in steps {
                tokio::time::sleep(step.after).await;
                if tx.send(step.event).is_err() {
                    break;
                }
            }
        });

        let previous = self.session.lock().unwrap().replace(Session { events, task });
        if let Some(previous) = previous {
            previous.task.abort();
        }
        Ok(())
    }

    fn stop(&self) {
        self.stop_count.fetch_add(1, Ordering::Relaxed);
        self.end_session(false);
    }

    fn abort(&self) {
        self.end_session(true);
    }
}

/// Microphone access with a settable answer.
pub struct FixedMicrophone {
    permission: Mutex<MicPermission>,
    check_count: AtomicU32,
}

impl FixedMicrophone {
    pub fn new(permission: MicPermission) -> Self {
        Self {
            permission: Mutex::new(permission),
            check_count: AtomicU32::new(0),
        }
    }

    pub fn set(&self, permission: MicPermission) {
        *self.permission.lock().unwrap() = permission;
    }

    pub fn check_count(&self) -> u32 {
        self.check_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MicrophoneAccess for FixedMicrophone {
    async fn check(&self) -> MicPermission {
        self.check_count.fetch_add(1, Ordering::Relaxed);
        *self.permission.lock().unwrap()
    }
}

/// Scorer that replays queued results, then a fixed score.
pub struct FixedScorer {
    queued: Mutex<VecDeque<Result<f64, ScoringError>>>,
    default_score: f64,
    call_count: AtomicU32,
    last_request: Mutex<Option<CompareRequest>>,
}

impl FixedScorer {
    /// A scorer that always answers `score`.
    pub fn new(score: f64) -> Self {
        Self::with_results(Vec::new(), score)
    }

    /// Answer `results` in order, then `default_score`.
    pub fn with_results(results: Vec<Result<f64, ScoringError>>, default_score: f64) -> Self {
        Self {
            queued: Mutex::new(results.into()),
            default_score,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<CompareRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimilarityScorer for FixedScorer {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn score(&self, request: &CompareRequest) -> Result<f64, ScoringError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(self.default_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogtest_core::traits::RecognitionSegment;

    #[tokio::test(start_paused = true)]
    async fn recognizer_replays_script_then_stops() {
        let recognizer = ScriptedRecognizer::new(vec![vec![
            ScriptStep::new(100, RecognizerEvent::SpeechStart),
            ScriptStep::new(
                200,
                RecognizerEvent::Result(vec![RecognitionSegment::finalized("hello there")]),
            ),
        ]]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        recognizer.start(tx).unwrap();

        assert_eq!(rx.recv().await, Some(RecognizerEvent::Start));
        assert_eq!(rx.recv().await, Some(RecognizerEvent::SpeechStart));
        assert!(matches!(rx.recv().await, Some(RecognizerEvent::Result(_))));

        recognizer.stop();
        assert_eq!(rx.recv().await, Some(RecognizerEvent::End));
        assert_eq!(recognizer.start_count(), 1);
        assert_eq!(recognizer.stop_count(), 1);
    }

    #[tokio::test]
    async fn abort_reports_aborted_then_end() {
        let recognizer = ScriptedRecognizer::new(vec![]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        recognizer.start(tx).unwrap();
        assert_eq!(rx.recv().await, Some(RecognizerEvent::Start));

        recognizer.abort();
        assert_eq!(
            rx.recv().await,
            Some(RecognizerEvent::Error(RecognizerErrorCode::Aborted))
        );
        assert_eq!(rx.recv().await, Some(RecognizerEvent::End));

        // no session left
        recognizer.abort();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn start_failure_is_one_shot() {
        let recognizer = ScriptedRecognizer::new(vec![]);
        recognizer.fail_next_start(RecognizerErrorCode::AudioCapture);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(
            recognizer.start(tx),
            Err(RecognizerErrorCode::AudioCapture)
        );
        assert_eq!(recognizer.start_count(), 0);
    }

    #[tokio::test]
    async fn scorer_replays_queue_then_default() {
        let scorer = FixedScorer::with_results(vec![Err(ScoringError::Unavailable)], 88.0);
        let request = CompareRequest {
            original: "a".into(),
            spoken: "b".into(),
        };
        assert!(scorer.score(&request).await.is_err());
        assert_eq!(scorer.score(&request).await.unwrap(), 88.0);
        assert_eq!(scorer.call_count(), 2);
        assert_eq!(scorer.last_request(), Some(request));
    }

    #[tokio::test(start_paused = true)]
    async fn synthesizer_records_and_waits() {
        let synth = MockSynthesizer::new(Duration::from_secs(2));
        let start = tokio::time::Instant::now();
        synth
            .speak(&Utterance {
                text: "hi".into(),
                rate: 0.9,
                pitch: 1.0,
                volume: 1.0,
            })
            .await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(synth.spoken().len(), 1);
    }
}
