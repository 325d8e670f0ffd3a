//! Queue names and addresses, message identifiers, and claimed items.

use crate::error::ValidationError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_QUEUE_NAME_LENGTH: usize = 80;

/// Name of a queue as the service accepts it: 1-80 characters of ASCII
/// letters, digits, `-` and `_`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Validate and wrap a full queue name
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > MAX_QUEUE_NAME_LENGTH {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: format!(
                    "'{}' has {} characters, expected 1-{}",
                    name,
                    name.len(),
                    MAX_QUEUE_NAME_LENGTH
                ),
            });
        }

        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: format!("'{}' contains '{}'", name, bad),
            });
        }

        Ok(Self(name))
    }

    /// `{prefix}-{logical}`, or just `logical` when the prefix is empty
    pub fn with_prefix(prefix: &str, logical: &str) -> Result<Self, ValidationError> {
        match prefix {
            "" => Self::new(logical.to_string()),
            _ => Self::new(format!("{}-{}", prefix, logical)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(name: &str) -> Result<Self, ValidationError> {
        name.to_string().try_into()
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(name: String) -> Result<Self, ValidationError> {
        Self::new(name)
    }
}

/// Remote address of a queue as assigned by the service (a URL for SQS)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueAddress(String);

impl QueueAddress {
    pub fn new(address: String) -> Result<Self, ValidationError> {
        if address.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "queue_address".to_string(),
            });
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the service assigns to an enqueued message.
///
/// Local transports mint UUIDs; SQS ids are taken verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Fresh UUID v4 identifier
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(id: &str) -> Result<Self, ValidationError> {
        match id.trim() {
            "" => Err(ValidationError::Required {
                field: "message_id".to_string(),
            }),
            trimmed => Ok(Self(trimmed.to_string())),
        }
    }
}

/// UTC instant, serialized as RFC 3339
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Timestamp `seconds` after this one
    pub fn plus_seconds(&self, seconds: u32) -> Self {
        Self(self.0 + Duration::seconds(i64::from(seconds)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

/// A message as returned by a transport receive call
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: Option<MessageId>,
    pub body: String,
    /// Acknowledgement token; changes on every delivery
    pub receipt_handle: Option<String>,
    pub receive_count: u32,
}

/// A claimed message: decoded payload plus the handle needed to acknowledge it.
///
/// The handle is only valid until the lease expires or the item is deleted or
/// released. A message delivered again carries a different handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item<T> {
    pub data: T,
    pub handle: String,
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(default)]
    pub receive_count: u32,
    pub claimed_at: Timestamp,
    pub lease_expires_at: Timestamp,
}

impl<T> Item<T> {
    /// Build an item from a payload and an acknowledgement handle obtained
    /// elsewhere (e.g. passed between processes)
    pub fn new(data: T, handle: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            data,
            handle: handle.into(),
            message_id: None,
            receive_count: 0,
            claimed_at: now,
            lease_expires_at: now,
        }
    }

    /// Check the item can be acknowledged at all
    pub fn has_handle(&self) -> bool {
        !self.handle.trim().is_empty()
    }

    /// Check if the lease has run out (the message may be visible again)
    pub fn is_lease_expired(&self) -> bool {
        Timestamp::now() >= self.lease_expires_at
    }

    /// Remaining lease, zero once expired
    pub fn time_until_expiry(&self) -> Duration {
        let remaining = self.lease_expires_at.as_datetime() - Utc::now();
        remaining.max(Duration::zero())
    }

    /// Discard the handle and metadata, keeping the payload
    pub fn into_data(self) -> T {
        self.data
    }
}

/// Input of `create_item`: a fresh payload or a previously claimed item whose
/// payload should be queued again.
#[derive(Debug, Clone, PartialEq)]
pub enum Enqueue<T> {
    Payload(T),
    Claimed(Item<T>),
}

impl<T> Enqueue<T> {
    /// Extract the payload that actually goes on the wire
    pub fn into_payload(self) -> T {
        match self {
            Self::Payload(data) => data,
            Self::Claimed(item) => item.into_data(),
        }
    }

    pub fn is_claimed_item(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

impl<T> From<Item<T>> for Enqueue<T> {
    fn from(item: Item<T>) -> Self {
        Self::Claimed(item)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
