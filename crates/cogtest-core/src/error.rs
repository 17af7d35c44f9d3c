//! Error types shared by the engines, drivers, and providers.
//!
//! `ScoringError` lives here rather than in `cogtest-providers` so the audio
//! recall engine can decide on the local fallback without knowing which
//! scorer produced the failure.

use thiserror::Error;

/// Capture failures surfaced to the participant during audio recall.
///
/// The `Display` text is the message shown next to the retry affordance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The recognizer heard nothing before giving up.
    #[error("No speech detected. Please speak clearly and try again.")]
    NoSpeech,

    /// Microphone permission is denied.
    #[error("Microphone access denied. Please allow microphone permissions in browser settings.")]
    MicrophoneDenied,

    /// The audio device could not be opened or read.
    #[error("Could not capture audio. Please check your microphone and try again.")]
    AudioCapture,

    /// Any other recognizer failure, carrying the recognizer's code.
    #[error("Recognition error: {0}. Please try again.")]
    Recognition(String),

    /// Capture ended without any transcript.
    #[error("Could not capture speech. Please try again.")]
    EmptyTranscript,

    /// The round has no usable reference sentence to compare against.
    #[error("System error: Missing original sentence. Please try again.")]
    MissingSentence,
}

/// Errors from a similarity scoring collaborator.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The service returned a non-success status.
    #[error("scoring service error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    /// The request timed out.
    #[error("scoring request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be understood.
    #[error("invalid scoring response: {0}")]
    InvalidResponse(String),

    /// No scoring service is configured.
    #[error("no scoring service configured")]
    Unavailable,
}

/// Rejected participant submissions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The sequence is still on screen, or the test is not running.
    #[error("not accepting input right now")]
    NotAcceptingInput,

    /// Submission is only enabled once the input has the expected length.
    #[error("expected {expected} digits, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// Trail making: there is no circle with this number.
    #[error("no circle numbered {0}")]
    NoSuchCircle(usize),
}

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {section} configuration: {message}")]
pub struct ConfigError {
    pub section: &'static str,
    pub message: String,
}

impl ConfigError {
    pub fn new(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            section,
            message: message.into(),
        }
    }
}

/// Errors that end an async session driver early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The runtime lacks a speech capability the test needs.
    #[error("unsupported runtime, missing: {}", .missing.join(", "))]
    Unsupported { missing: Vec<&'static str> },

    /// The participant input channel closed before the test finished.
    #[error("input channel closed before the test completed")]
    InputClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_error_messages_are_actionable() {
        assert!(CaptureError::NoSpeech.to_string().contains("try again"));
        assert_eq!(
            CaptureError::Recognition("network".into()).to_string(),
            "Recognition error: network. Please try again."
        );
    }

    #[test]
    fn unsupported_lists_missing_capabilities() {
        let err = SessionError::Unsupported {
            missing: vec!["speech synthesis", "speech recognition"],
        };
        assert_eq!(
            err.to_string(),
            "unsupported runtime, missing: speech synthesis, speech recognition"
        );
    }

    #[test]
    fn config_error_names_section() {
        let err = ConfigError::new("go_no_go", "go_probability must be within [0, 1]");
        assert!(err.to_string().starts_with("invalid go_no_go configuration"));
    }
}
