//! Queue configuration and backend selection.
//!
//! A [`QueueConfig`] is resolved once (by the caller, typically from files and
//! environment) and handed to every [`QueueClient`](crate::QueueClient). The
//! client never consults process-wide state on its own.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest visibility timeout the service accepts (12 hours)
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: u32 = 43_200;

/// Longest long-poll wait the service accepts
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

/// Hard ceiling on a single message body imposed by SQS
pub const SQS_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Largest body the in-memory backend accepts
pub const MEMORY_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Queue backend selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Amazon SQS (or a compatible endpoint such as LocalStack)
    Sqs,
    /// Process-local queue, for tests and development
    InMemory,
}

impl Backend {
    /// Get maximum message size for backend
    pub fn max_message_size(&self) -> usize {
        match self {
            Self::Sqs => SQS_MAX_MESSAGE_SIZE,
            Self::InMemory => MEMORY_MAX_MESSAGE_SIZE,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqs => write!(f, "sqs"),
            Self::InMemory => write!(f, "in_memory"),
        }
    }
}

/// How `claim_item` treats a receive call that failed softly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveErrorPolicy {
    /// Every transport failure is returned to the caller
    #[default]
    Strict,
    /// A timed-out receive is reported as "no item" (with a warning)
    TimeoutAsEmpty,
}

/// Access credentials for the remote queue service
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl Credentials {
    /// Create credentials from a key pair
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach a temporary session token
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    fn is_complete(&self) -> bool {
        !self.access_key_id.trim().is_empty() && !self.secret_access_key.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Configuration for queue client initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Region identifier, e.g. `us-east-1`
    pub region: String,

    /// Custom endpoint URL (LocalStack, ElasticMQ, VPC endpoints)
    pub endpoint: Option<String>,

    pub credentials: Option<Credentials>,

    /// Lease length used when a claim does not ask for one
    pub default_visibility_timeout_seconds: u32,

    /// Long-poll wait for claims; 0 disables long polling
    pub default_wait_time_seconds: u32,

    /// Prepended to every logical queue name
    pub queue_name_prefix: String,

    /// Largest encoded payload accepted by `create_item`
    pub max_message_size: usize,

    /// Per-request timeout of the transport
    pub request_timeout_seconds: u64,

    pub receive_error_policy: ReceiveErrorPolicy,

    pub backend: Backend,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            credentials: None,
            default_visibility_timeout_seconds: 30,
            default_wait_time_seconds: 0,
            queue_name_prefix: String::new(),
            max_message_size: 256 * 1024, // 256KB
            request_timeout_seconds: 30,
            receive_error_policy: ReceiveErrorPolicy::Strict,
            backend: Backend::Sqs,
        }
    }
}

impl QueueConfig {
    /// Check ranges and required values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Missing`] when credentials are absent or
    /// empty and [`ConfigurationError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match &self.credentials {
            Some(credentials) if credentials.is_complete() => {}
            _ => {
                return Err(ConfigurationError::Missing {
                    key: "credentials".to_string(),
                })
            }
        }

        if self.region.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "region".to_string(),
            });
        }

        if self.default_visibility_timeout_seconds == 0
            || self.default_visibility_timeout_seconds > MAX_VISIBILITY_TIMEOUT_SECONDS
        {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "default_visibility_timeout_seconds must be 1-{}, got {}",
                    MAX_VISIBILITY_TIMEOUT_SECONDS, self.default_visibility_timeout_seconds
                ),
            });
        }

        if self.default_wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "default_wait_time_seconds must be 0-{}, got {}",
                    MAX_WAIT_TIME_SECONDS, self.default_wait_time_seconds
                ),
            });
        }

        let ceiling = self.backend.max_message_size();
        if self.max_message_size == 0 || self.max_message_size > ceiling {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "max_message_size must be 1-{}, got {}",
                    ceiling, self.max_message_size
                ),
            });
        }

        // A long poll must finish before the HTTP request gives up on it
        if self.request_timeout_seconds <= u64::from(self.default_wait_time_seconds) {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "request_timeout_seconds ({}) must exceed default_wait_time_seconds ({})",
                    self.request_timeout_seconds, self.default_wait_time_seconds
                ),
            });
        }

        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint).map_err(|e| ConfigurationError::Invalid {
                message: format!("endpoint '{}' is not a valid URL: {}", endpoint, e),
            })?;
        }

        Ok(())
    }

    /// Endpoint the SQS transport talks to
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://sqs.{}.amazonaws.com", self.region),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
