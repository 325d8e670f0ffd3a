//! The remote capability the queue client is built on.
//!
//! A transport performs exactly one remote call per method and does no
//! retrying, caching of messages, or lease bookkeeping of its own. Exclusivity
//! of claims is enforced by whatever sits behind it.

use crate::config::Backend;
use crate::error::TransportError;
use crate::message::{MessageId, QueueAddress, QueueName, ReceivedMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// Parameters of a single receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub max_messages: u32,
    pub visibility_timeout_seconds: u32,
    pub wait_time_seconds: u32,
}

impl ReceiveRequest {
    /// Request for one message
    pub fn single(visibility_timeout_seconds: u32, wait_time_seconds: u32) -> Self {
        Self {
            max_messages: 1,
            visibility_timeout_seconds,
            wait_time_seconds,
        }
    }
}

/// Queue attributes a transport can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueAttribute {
    /// Messages available for claiming
    ApproximateNumberOfMessages,
    /// Messages currently claimed
    ApproximateNumberOfMessagesNotVisible,
}

impl QueueAttribute {
    /// Wire name of the attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApproximateNumberOfMessages => "ApproximateNumberOfMessages",
            Self::ApproximateNumberOfMessagesNotVisible => "ApproximateNumberOfMessagesNotVisible",
        }
    }
}

impl fmt::Display for QueueAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interface implemented by specific queue backends (SQS, in-memory)
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Create a queue, returning the existing address if it is already there
    async fn create_queue(&self, name: &QueueName) -> Result<QueueAddress, TransportError>;

    /// Look up a queue without creating it
    async fn get_queue_url(&self, name: &QueueName)
        -> Result<Option<QueueAddress>, TransportError>;

    /// Delete a queue and every message in it
    async fn delete_queue(&self, address: &QueueAddress) -> Result<(), TransportError>;

    /// Enqueue one message body
    async fn send_message(
        &self,
        address: &QueueAddress,
        body: &str,
    ) -> Result<MessageId, TransportError>;

    /// Receive at most `request.max_messages` messages, blocking up to the wait time
    async fn receive_message(
        &self,
        address: &QueueAddress,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, TransportError>;

    /// Reset the visibility timeout of a claimed message
    async fn change_visibility(
        &self,
        address: &QueueAddress,
        receipt_handle: &str,
        visibility_timeout_seconds: u32,
    ) -> Result<(), TransportError>;

    /// Acknowledge (remove) a claimed message
    async fn delete_message(
        &self,
        address: &QueueAddress,
        receipt_handle: &str,
    ) -> Result<(), TransportError>;

    /// Read queue attributes, keyed by wire name
    async fn get_attributes(
        &self,
        address: &QueueAddress,
        attributes: &[QueueAttribute],
    ) -> Result<HashMap<String, String>, TransportError>;

    /// Backend this transport talks to
    fn backend(&self) -> Backend;
}
