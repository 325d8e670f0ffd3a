//! In-memory queue transport for testing and development.
//!
//! This module provides a process-local queue that follows the same lease
//! rules as the remote service:
//! - A received message is hidden until its visibility timeout expires
//! - Every delivery gets a fresh receipt handle; old handles stop working
//! - A visibility change to zero makes the message claimable again at once
//! - Receives long-poll by re-checking the queue until the wait time is up
//!
//! Clones share storage, so several clients built on clones of one transport
//! contend for the same messages.

use crate::config::Backend;
use crate::error::TransportError;
use crate::message::{MessageId, QueueAddress, QueueName, ReceivedMessage, Timestamp};
use crate::transport::{QueueAttribute, QueueTransport, ReceiveRequest};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const ADDRESS_SCHEME: &str = "memory://";
const POLL_INTERVAL: StdDuration = StdDuration::from_millis(25);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Storage for all queues, keyed by address
#[derive(Default)]
struct QueueStorage {
    queues: HashMap<String, InMemoryQueue>,
}

/// Internal queue state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    /// Messages waiting to be claimed (FIFO order)
    messages: VecDeque<StoredMessage>,
    /// Claimed messages keyed by their current receipt handle
    in_flight: HashMap<String, InFlightMessage>,
}

impl InMemoryQueue {
    /// Return every expired lease to the available messages
    fn reclaim_expired(&mut self) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, flight)| flight.is_expired())
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in expired {
            if let Some(flight) = self.in_flight.remove(&handle) {
                self.messages.push_front(flight.message);
            }
        }
    }

    fn visible_count(&self) -> usize {
        self.messages.len()
            + self
                .in_flight
                .values()
                .filter(|flight| flight.is_expired())
                .count()
    }

    fn not_visible_count(&self) -> usize {
        self.in_flight
            .values()
            .filter(|flight| !flight.is_expired())
            .count()
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    receive_count: u32,
}

/// A message currently claimed by a consumer
struct InFlightMessage {
    message: StoredMessage,
    lock_expires_at: Timestamp,
}

impl InFlightMessage {
    fn is_expired(&self) -> bool {
        Timestamp::now() >= self.lock_expires_at
    }
}

// ============================================================================
// InMemoryTransport
// ============================================================================

/// In-memory queue transport implementation
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    storage: Arc<Mutex<QueueStorage>>,
}

impl InMemoryTransport {
    /// Create new in-memory transport with empty storage
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueStorage> {
        // A panic while holding the lock cannot leave a queue half-updated
        self.storage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn address_for(name: &QueueName) -> Result<QueueAddress, TransportError> {
        QueueAddress::new(format!("{}{}", ADDRESS_SCHEME, name.as_str())).map_err(|e| {
            TransportError::MalformedResponse {
                message: e.to_string(),
            }
        })
    }

    /// Run `op` against an existing queue
    fn with_queue<R>(
        &self,
        address: &QueueAddress,
        op: impl FnOnce(&mut InMemoryQueue) -> Result<R, TransportError>,
    ) -> Result<R, TransportError> {
        let mut storage = self.lock();
        let queue = storage.queues.get_mut(address.as_str()).ok_or_else(|| {
            TransportError::QueueNotFound {
                queue: address.to_string(),
            }
        })?;
        op(queue)
    }

    /// Take one available message, leasing it for `visibility_timeout_seconds`
    fn try_claim(
        &self,
        address: &QueueAddress,
        visibility_timeout_seconds: u32,
    ) -> Result<Option<ReceivedMessage>, TransportError> {
        self.with_queue(address, |queue| {
            queue.reclaim_expired();

            let Some(mut message) = queue.messages.pop_front() else {
                return Ok(None);
            };

            message.receive_count += 1;
            let receipt_handle = uuid::Uuid::new_v4().to_string();
            let received = ReceivedMessage {
                message_id: Some(message.message_id.clone()),
                body: message.body.clone(),
                receipt_handle: Some(receipt_handle.clone()),
                receive_count: message.receive_count,
            };

            queue.in_flight.insert(
                receipt_handle,
                InFlightMessage {
                    message,
                    lock_expires_at: Timestamp::now().plus_seconds(visibility_timeout_seconds),
                },
            );

            Ok(Some(received))
        })
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn create_queue(&self, name: &QueueName) -> Result<QueueAddress, TransportError> {
        let address = Self::address_for(name)?;
        self.lock()
            .queues
            .entry(address.as_str().to_string())
            .or_default();
        Ok(address)
    }

    async fn get_queue_url(
        &self,
        name: &QueueName,
    ) -> Result<Option<QueueAddress>, TransportError> {
        let address = Self::address_for(name)?;
        if self.lock().queues.contains_key(address.as_str()) {
            Ok(Some(address))
        } else {
            Ok(None)
        }
    }

    async fn delete_queue(&self, address: &QueueAddress) -> Result<(), TransportError> {
        match self.lock().queues.remove(address.as_str()) {
            Some(_) => Ok(()),
            None => Err(TransportError::QueueNotFound {
                queue: address.to_string(),
            }),
        }
    }

    async fn send_message(
        &self,
        address: &QueueAddress,
        body: &str,
    ) -> Result<MessageId, TransportError> {
        self.with_queue(address, |queue| {
            let message_id = MessageId::new();
            queue.messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: body.to_string(),
                receive_count: 0,
            });
            Ok(message_id)
        })
    }

    async fn receive_message(
        &self,
        address: &QueueAddress,
        request: &ReceiveRequest,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let deadline =
            Instant::now() + StdDuration::from_secs(u64::from(request.wait_time_seconds));

        loop {
            let mut messages = Vec::new();
            while messages.len() < request.max_messages.max(1) as usize {
                match self.try_claim(address, request.visibility_timeout_seconds)? {
                    Some(message) => messages.push(message),
                    None => break,
                }
            }

            if !messages.is_empty() {
                return Ok(messages);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn change_visibility(
        &self,
        address: &QueueAddress,
        receipt_handle: &str,
        visibility_timeout_seconds: u32,
    ) -> Result<(), TransportError> {
        self.with_queue(address, |queue| {
            let flight = match queue.in_flight.get_mut(receipt_handle) {
                Some(flight) if !flight.is_expired() => flight,
                _ => {
                    return Err(TransportError::InvalidReceipt {
                        message: format!("message for handle '{}' is not in flight", receipt_handle),
                    })
                }
            };

            if visibility_timeout_seconds == 0 {
                if let Some(flight) = queue.in_flight.remove(receipt_handle) {
                    queue.messages.push_front(flight.message);
                }
            } else {
                flight.lock_expires_at = Timestamp::now().plus_seconds(visibility_timeout_seconds);
            }
            Ok(())
        })
    }

    async fn delete_message(
        &self,
        address: &QueueAddress,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        // Unknown or stale handles are accepted silently, as acknowledgement is idempotent
        self.with_queue(address, |queue| {
            queue.in_flight.remove(receipt_handle);
            Ok(())
        })
    }

    async fn get_attributes(
        &self,
        address: &QueueAddress,
        attributes: &[QueueAttribute],
    ) -> Result<HashMap<String, String>, TransportError> {
        self.with_queue(address, |queue| {
            Ok(attributes
                .iter()
                .map(|attribute| {
                    let value = match attribute {
                        QueueAttribute::ApproximateNumberOfMessages => queue.visible_count(),
                        QueueAttribute::ApproximateNumberOfMessagesNotVisible => {
                            queue.not_visible_count()
                        }
                    };
                    (attribute.as_str().to_string(), value.to_string())
                })
                .collect())
        })
    }

    fn backend(&self) -> Backend {
        Backend::InMemory
    }
}
