//! Capability ports consumed by the engines' async drivers.
//!
//! The speech and scoring capabilities are implemented by the
//! `cogtest-providers` crate (and by test doubles there); drivers only ever
//! see these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ScoringError;

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

/// One text-to-speech request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Text-to-speech capability.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether the runtime exposes speech synthesis at all.
    fn is_available(&self) -> bool;

    /// Speak the utterance. Resolves exactly once, when playback ends.
    async fn speak(&self, utterance: &Utterance);

    /// Stop any playback in progress.
    fn cancel(&self);
}

// ---------------------------------------------------------------------------
// Speech recognition
// ---------------------------------------------------------------------------

/// A transcript segment delivered by the recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionSegment {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionSegment {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// Error codes reported by a recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognizerErrorCode {
    NoSpeech,
    Aborted,
    NotAllowed,
    AudioCapture,
    Other(String),
}

impl RecognizerErrorCode {
    /// Map a Web Speech API style error string.
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => RecognizerErrorCode::NoSpeech,
            "aborted" => RecognizerErrorCode::Aborted,
            "not-allowed" | "service-not-allowed" => RecognizerErrorCode::NotAllowed,
            "audio-capture" => RecognizerErrorCode::AudioCapture,
            other => RecognizerErrorCode::Other(other.to_string()),
        }
    }
}

/// Events emitted by a recognizer session, in the order they occur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognizerEvent {
    Start,
    SpeechStart,
    Result(Vec<RecognitionSegment>),
    SpeechEnd,
    Error(RecognizerErrorCode),
    End,
}

/// Speech-to-text capability.
///
/// `start`, `stop` and `abort` are fire-and-forget; everything the
/// recognizer learns arrives later as [`RecognizerEvent`]s on the sender
/// passed to `start`.
pub trait SpeechRecognizer: Send + Sync {
    /// Whether the runtime exposes speech recognition at all.
    fn is_available(&self) -> bool;

    /// Begin a capture session.
    fn start(&self, events: mpsc::UnboundedSender<RecognizerEvent>)
        -> Result<(), RecognizerErrorCode>;

    /// Finish the session, delivering any pending results followed by `End`.
    fn stop(&self);

    /// Discard the session without results.
    fn abort(&self);
}

// ---------------------------------------------------------------------------
// Microphone permission
// ---------------------------------------------------------------------------

/// Microphone permission as last checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MicPermission {
    Checking,
    Prompt,
    Granted,
    Denied,
}

/// Checks for microphone access.
#[async_trait]
pub trait MicrophoneAccess: Send + Sync {
    async fn check(&self) -> MicPermission;
}

// ---------------------------------------------------------------------------
// Similarity scoring
// ---------------------------------------------------------------------------

/// Request body for a similarity scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRequest {
    pub original: String,
    pub spoken: String,
}

/// Response body of a similarity scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareResponse {
    pub similarity_score: f64,
}

/// External similarity scorer. Scores are expected in [0, 100].
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Human-readable scorer name (e.g. "http").
    fn name(&self) -> &str;

    async fn score(&self, request: &CompareRequest) -> Result<f64, ScoringError>;
}

// ---------------------------------------------------------------------------
// Presentation
// ---------------------------------------------------------------------------

/// Receives every non-timer effect a driver produces, including the final
/// completion effect.
pub trait Presenter<E>: Send + Sync {
    fn present(&self, effect: &E);
}

/// Presenter that discards everything.
pub struct NoopPresenter;

impl<E> Presenter<E> for NoopPresenter {
    fn present(&self, _: &E) {}
}
