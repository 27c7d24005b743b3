//! Error Classifier
//!
//! Classifies model transport failures into authentication, transient and
//! fatal. Status codes are authoritative; message matching is a fallback for
//! transports that only surface text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport failure classification taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportErrorKind {
    /// Credentials rejected. Never retried.
    Authentication,
    /// Rate limit, quota, timeout or temporary unavailability. Retried with backoff.
    Transient,
    /// Anything else. Surfaced without retry.
    Fatal,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Authentication => write!(f, "Authentication"),
            TransportErrorKind::Transient => write!(f, "Transient"),
            TransportErrorKind::Fatal => write!(f, "Fatal"),
        }
    }
}

/// A classified failure from a model transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Authentication, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Fatal, message)
    }

    /// Classify a bare message with the default classifier.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = ErrorClassifier::new().classify_message(&message);
        Self { kind, message }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

const AUTH_MARKERS: &[&str] = &[
    "401",
    "403",
    "unauthenticated",
    "permission",
    "api key not valid",
    "api_key_invalid",
    "credentials_missing",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "rate limit",
    "resource_exhausted",
    "429",
    "quota",
    "timeout",
    "timed out",
    "deadline",
    "503",
    "unavailable",
];

/// Error classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify by HTTP status, falling back to the response text.
    pub fn classify(&self, status: Option<u16>, message: &str) -> TransportErrorKind {
        match status.and_then(|s| self.classify_status(s)) {
            Some(kind) => kind,
            None => self.classify_message(message),
        }
    }

    /// Status codes with an unambiguous meaning. `None` means "ask the message".
    pub fn classify_status(&self, status: u16) -> Option<TransportErrorKind> {
        match status {
            401 | 403 => Some(TransportErrorKind::Authentication),
            408 | 429 | 502 | 503 | 504 => Some(TransportErrorKind::Transient),
            _ => None,
        }
    }

    /// Substring match over the lower-cased message.
    pub fn classify_message(&self, message: &str) -> TransportErrorKind {
        let msg = message.to_lowercase();

        if AUTH_MARKERS.iter().any(|m| msg.contains(m)) {
            return TransportErrorKind::Authentication;
        }

        if TRANSIENT_MARKERS.iter().any(|m| msg.contains(m)) {
            return TransportErrorKind::Transient;
        }

        TransportErrorKind::Fatal
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
