use std::{fmt::Display, time::Duration};

use thiserror::Error;

use crate::traits::EventStoreError;

/// The closed set of reasons a delivery can be rejected. Every kind is terminal for the current delivery; retrying is
/// left to the provider's redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    UnknownCertificate,
    SignatureMismatch,
    StaleTimestamp,
    MalformedHeaders,
    TamperDetected,
    MalformedPayload,
    UnsupportedAlgorithm,
    BusinessCallbackFailure,
    BusinessCallbackTimeout,
    /// Another delivery of the same event currently holds the reservation.
    EventInFlight,
    /// The deduplication store could not be read or written.
    StoreUnavailable,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownCertificate => "unknown-certificate",
            Self::SignatureMismatch => "signature-mismatch",
            Self::StaleTimestamp => "stale-timestamp",
            Self::MalformedHeaders => "malformed-headers",
            Self::TamperDetected => "tamper-detected",
            Self::MalformedPayload => "malformed-payload",
            Self::UnsupportedAlgorithm => "unsupported-algorithm",
            Self::BusinessCallbackFailure => "business-callback-failure",
            Self::BusinessCallbackTimeout => "business-callback-timeout",
            Self::EventInFlight => "event-in-flight",
            Self::StoreUnavailable => "store-unavailable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Certificate {serial_no} cannot be used. {reason}")]
    UnknownCertificate { serial_no: String, reason: String },
    #[error("Signature does not match the notification (certificate {0})")]
    SignatureMismatch(String),
    #[error("Notification timestamp {timestamp} is {skew_secs}s away from server time")]
    StaleTimestamp { timestamp: i64, skew_secs: i64 },
    #[error("Malformed notification headers. {0}")]
    MalformedHeaders(String),
}

impl VerificationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnknownCertificate { .. } => FailureKind::UnknownCertificate,
            Self::SignatureMismatch(_) => FailureKind::SignatureMismatch,
            Self::StaleTimestamp { .. } => FailureKind::StaleTimestamp,
            Self::MalformedHeaders(_) => FailureKind::MalformedHeaders,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    #[error("The resource failed authentication. It was altered, or encrypted with a different key.")]
    TamperDetected,
    #[error("Malformed notification payload. {0}")]
    MalformedPayload(String),
    #[error("Unsupported resource encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

impl DecryptError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::TamperDetected => FailureKind::TamperDetected,
            Self::MalformedPayload(_) => FailureKind::MalformedPayload,
            Self::UnsupportedAlgorithm(_) => FailureKind::UnsupportedAlgorithm,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("The APIv3 key must be exactly 32 bytes long, but it is {0} bytes")]
pub struct InvalidKeyLength(pub usize);

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Decryption(#[from] DecryptError),
    #[error("Business callback failed for event {event_id}. {reason}")]
    CallbackFailed { event_id: String, reason: String },
    #[error("Business callback for event {event_id} did not finish within {timeout:?}")]
    CallbackTimeout { event_id: String, timeout: Duration },
    #[error("Event {0} is already being processed by another delivery")]
    EventInFlight(String),
    #[error("Event store error. {0}")]
    Store(#[from] EventStoreError),
}

impl NotificationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Verification(e) => e.kind(),
            Self::Decryption(e) => e.kind(),
            Self::CallbackFailed { .. } => FailureKind::BusinessCallbackFailure,
            Self::CallbackTimeout { .. } => FailureKind::BusinessCallbackTimeout,
            Self::EventInFlight(_) => FailureKind::EventInFlight,
            Self::Store(_) => FailureKind::StoreUnavailable,
        }
    }
}
