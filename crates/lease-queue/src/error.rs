//! Errors raised by the queue client and its transports.

use crate::message::MessageId;
use chrono::Duration;
use thiserror::Error;

/// Error returned by every [`QueueClient`](crate::QueueClient) operation
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid item: {reason}")]
    InvalidItem { reason: String },

    #[error("Payload too large: {size} bytes (max: {max_size})")]
    PayloadTooLarge { size: usize, max_size: usize },

    #[error("Payload encoding failed: {0}")]
    Serialization(#[from] SerializationError),

    /// A claimed message whose body the codec rejected. The lease is held
    /// until `handle` is deleted, released or expires.
    #[error("Claimed item could not be decoded: {source}")]
    Undecodable {
        handle: String,
        message_id: Option<MessageId>,
        #[source]
        source: SerializationError,
    },

    #[error("Queue '{queue_name}' has not been created")]
    QueueNotCreated { queue_name: String },

    #[error("Invalid value: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Whether the same call may succeed later without any change by the
    /// caller. Only transport failures can be.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            Self::Configuration(_)
            | Self::InvalidItem { .. }
            | Self::PayloadTooLarge { .. }
            | Self::Serialization(_)
            | Self::Undecodable { .. }
            | Self::QueueNotCreated { .. }
            | Self::Validation(_) => false,
        }
    }

    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Receipt handle of a leased message the error left with the caller
    pub fn receipt_handle(&self) -> Option<&str> {
        match self {
            Self::Undecodable { handle, .. } => Some(handle.as_str()),
            _ => None,
        }
    }

    /// Suggested pause before retrying, for the failures that have one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transport(TransportError::Throttled { .. }) => Some(Duration::seconds(5)),
            Self::Transport(TransportError::Timeout { .. }) => Some(Duration::seconds(1)),
            Self::Transport(TransportError::Network { .. }) => Some(Duration::seconds(5)),
            _ => None,
        }
    }
}

/// Failures reported by a queue transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Queue not found: {queue}")]
    QueueNotFound { queue: String },

    #[error("Queue already exists with different attributes: {queue}")]
    QueueAlreadyExists { queue: String },

    #[error("Invalid or expired receipt handle: {message}")]
    InvalidReceipt { message: String },

    #[error("Request throttled: {message}")]
    Throttled { message: String },

    #[error("Service error: {code} - {message}")]
    Service { code: String, message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },
}

impl TransportError {
    /// Network trouble, timeouts, throttling and unclassified service
    /// faults are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::Throttled { .. } | Self::Service { .. }
        )
    }
}

/// Payload codec failures
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Decoded payload is not UTF-8")]
    InvalidUtf8,
}

/// Problems with a [`QueueConfig`](crate::QueueConfig)
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration value rejected: {message}")]
    Invalid { message: String },

    #[error("Configuration could not be read: {message}")]
    Parsing { message: String },
}

/// A value that does not satisfy a type's invariants
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Required { field: String },

    #[error("{field} is malformed: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("{field} is out of range: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
