//! The queue client: lease-based claim, release and delete over a transport.

use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::{QueueConfig, ReceiveErrorPolicy};
use crate::error::{QueueError, TransportError};
use crate::lease::LeaseTerms;
use crate::message::{Enqueue, Item, QueueAddress, QueueName, Timestamp};
use crate::transport::{QueueAttribute, QueueTransport, ReceiveRequest};
use crate::transports::transport_for;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Binding of a logical queue name to its remote address
#[derive(Debug)]
pub struct QueueHandle {
    name: QueueName,
    address: RwLock<Option<QueueAddress>>,
    wait_time_seconds: u32,
    visibility_timeout_seconds: u32,
}

impl QueueHandle {
    fn new(name: QueueName, config: &QueueConfig) -> Self {
        Self {
            name,
            address: RwLock::new(None),
            wait_time_seconds: config.default_wait_time_seconds,
            visibility_timeout_seconds: config.default_visibility_timeout_seconds,
        }
    }

    /// Full (prefixed) queue name
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Remote address, if the queue has been created or resolved
    pub fn address(&self) -> Option<QueueAddress> {
        match self.address.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Default long-poll wait for claims
    pub fn wait_time_seconds(&self) -> u32 {
        self.wait_time_seconds
    }

    /// Default lease for claims
    pub fn visibility_timeout_seconds(&self) -> u32 {
        self.visibility_timeout_seconds
    }

    fn set_address(&self, address: Option<QueueAddress>) {
        let mut guard = match self.address.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = address;
    }
}

/// Client for one logical queue.
///
/// Every call is a single request/response exchange with the transport. The
/// client keeps no message state; exclusivity of claims is decided by the
/// service through visibility timeouts, so any number of clients (in this or
/// other processes) may work the same queue.
pub struct QueueClient<C = JsonCodec> {
    transport: Arc<dyn QueueTransport>,
    handle: QueueHandle,
    config: QueueConfig,
    codec: C,
}

impl QueueClient<JsonCodec> {
    /// Create a client without touching the remote service.
    ///
    /// The queue address stays unset until [`create_queue`](Self::create_queue)
    /// or [`resolve_queue`](Self::resolve_queue) succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Configuration`] when the configuration is invalid
    /// (in particular when credentials are absent or empty) and
    /// [`QueueError::Validation`] when the prefixed name is not a legal queue
    /// name.
    pub fn new(
        name: &str,
        config: QueueConfig,
        transport: Arc<dyn QueueTransport>,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        let queue_name = QueueName::with_prefix(&config.queue_name_prefix, name)?;

        debug!(
            queue = %queue_name,
            backend = %transport.backend(),
            "Queue client configured"
        );

        Ok(Self {
            transport,
            handle: QueueHandle::new(queue_name, &config),
            config,
            codec: JsonCodec,
        })
    }

    /// Create a client and provision its queue (idempotently)
    pub async fn connect(
        name: &str,
        config: QueueConfig,
        transport: Arc<dyn QueueTransport>,
    ) -> Result<Self, QueueError> {
        let client = Self::new(name, config, transport)?;
        client.create_queue().await?;
        Ok(client)
    }

    /// Create a client on the transport selected by `config.backend`
    pub async fn from_config(name: &str, config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        let transport = transport_for(&config)?;
        Self::connect(name, config, transport).await
    }
}

impl<C: PayloadCodec> QueueClient<C> {
    /// Replace the payload codec
    pub fn with_codec<D: PayloadCodec>(self, codec: D) -> QueueClient<D> {
        QueueClient {
            transport: self.transport,
            handle: self.handle,
            config: self.config,
            codec,
        }
    }

    pub fn handle(&self) -> &QueueHandle {
        &self.handle
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Remote address of the queue, or `None` (with a warning) if it has not
    /// been created or resolved yet
    pub fn queue_url(&self) -> Option<QueueAddress> {
        let address = self.handle.address();
        if address.is_none() {
            warn!(queue = %self.handle.name, "Queue address requested before the queue exists");
        }
        address
    }

    /// Look the queue up without creating it, storing the address if found
    pub async fn resolve_queue(&self) -> Result<Option<QueueAddress>, QueueError> {
        let address = self.transport.get_queue_url(&self.handle.name).await?;
        if let Some(address) = &address {
            self.handle.set_address(Some(address.clone()));
        }
        Ok(address)
    }

    /// Create the queue, or return the address of the existing one
    pub async fn create_queue(&self) -> Result<QueueAddress, QueueError> {
        let address = self.transport.create_queue(&self.handle.name).await?;

        if let Some(previous) = self.handle.address() {
            if previous != address {
                warn!(
                    queue = %self.handle.name,
                    previous = %previous,
                    current = %address,
                    "Queue address changed"
                );
            }
        }
        self.handle.set_address(Some(address.clone()));

        info!(queue = %self.handle.name, address = %address, "Queue ready");
        Ok(address)
    }

    /// Delete the queue and every undelivered message in it
    pub async fn delete_queue(&self) -> Result<(), QueueError> {
        let address = self.require_address()?;
        self.transport.delete_queue(&address).await?;
        self.handle.set_address(None);

        info!(queue = %self.handle.name, address = %address, "Queue deleted");
        Ok(())
    }

    /// Enqueue a payload.
    ///
    /// Passing back a previously claimed [`Item`] queues only its payload; the
    /// handle is discarded and a warning logged.
    ///
    /// Returns `true` when the transport acknowledged the send.
    pub async fn create_item<T: Serialize>(&self, input: Enqueue<T>) -> Result<bool, QueueError> {
        let address = self.require_address()?;

        if input.is_claimed_item() {
            warn!(
                queue = %self.handle.name,
                "Claimed item passed to create_item; queueing its payload only"
            );
        }
        let payload = input.into_payload();

        let body = self.codec.encode(&payload)?;
        if body.len() > self.config.max_message_size {
            return Err(QueueError::PayloadTooLarge {
                size: body.len(),
                max_size: self.config.max_message_size,
            });
        }

        let message_id = self.transport.send_message(&address, &body).await?;
        debug!(queue = %self.handle.name, message_id = %message_id, "Item queued");

        Ok(!message_id.as_str().is_empty())
    }

    /// Claim one item for `lease_seconds` (0 selects the configured default).
    ///
    /// Returns `Ok(None)` when nothing became available within the negotiated
    /// wait time. A message that arrives without an acknowledgement handle is
    /// also reported as `None`.
    pub async fn claim_item<T: DeserializeOwned>(
        &self,
        lease_seconds: u32,
    ) -> Result<Option<Item<T>>, QueueError> {
        let address = self.require_address()?;
        let terms = LeaseTerms::negotiate(
            lease_seconds,
            self.handle.visibility_timeout_seconds,
            self.handle.wait_time_seconds,
        );

        debug!(
            queue = %self.handle.name,
            visibility_timeout_seconds = terms.visibility_timeout_seconds,
            wait_time_seconds = terms.wait_time_seconds,
            "Claiming item"
        );

        let request = ReceiveRequest::single(terms.visibility_timeout_seconds, terms.wait_time_seconds);
        let claimed_at = Timestamp::now();
        let messages = match self.transport.receive_message(&address, &request).await {
            Ok(messages) => messages,
            Err(TransportError::Timeout { message })
                if self.config.receive_error_policy == ReceiveErrorPolicy::TimeoutAsEmpty =>
            {
                warn!(
                    queue = %self.handle.name,
                    error = %message,
                    "Receive timed out; reporting no item"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let Some(message) = messages.into_iter().next() else {
            return Ok(None);
        };

        let handle = match message.receipt_handle {
            Some(handle) if !handle.trim().is_empty() => handle,
            _ => {
                warn!(
                    queue = %self.handle.name,
                    "Received message without an acknowledgement handle; ignoring it"
                );
                return Ok(None);
            }
        };

        let data = match self.codec.decode(&message.body) {
            Ok(data) => data,
            Err(source) => {
                warn!(
                    queue = %self.handle.name,
                    receive_count = message.receive_count,
                    error = %source,
                    "Claimed item could not be decoded"
                );
                return Err(QueueError::Undecodable {
                    handle,
                    message_id: message.message_id,
                    source,
                });
            }
        };

        Ok(Some(Item {
            data,
            handle,
            message_id: message.message_id,
            receive_count: message.receive_count,
            lease_expires_at: claimed_at.plus_seconds(terms.visibility_timeout_seconds),
            claimed_at,
        }))
    }

    /// Make a claimed item immediately available to any consumer again
    pub async fn release_item<T>(&self, item: &Item<T>) -> Result<bool, QueueError> {
        Self::require_handle(item, "release")?;
        let address = self.require_address()?;

        self.transport
            .change_visibility(&address, &item.handle, 0)
            .await?;
        debug!(queue = %self.handle.name, "Item released");
        Ok(true)
    }

    /// Keep a claimed item hidden for another `seconds` from now
    pub async fn extend_lease<T>(&self, item: &Item<T>, seconds: u32) -> Result<(), QueueError> {
        Self::require_handle(item, "extend")?;
        let address = self.require_address()?;

        let terms = LeaseTerms::negotiate(seconds, self.handle.visibility_timeout_seconds, 0);
        self.transport
            .change_visibility(&address, &item.handle, terms.visibility_timeout_seconds)
            .await?;
        debug!(
            queue = %self.handle.name,
            visibility_timeout_seconds = terms.visibility_timeout_seconds,
            "Lease extended"
        );
        Ok(())
    }

    /// Acknowledge a claimed item, removing it permanently
    pub async fn delete_item<T>(&self, item: &Item<T>) -> Result<(), QueueError> {
        Self::require_handle(item, "delete")?;
        let address = self.require_address()?;

        self.transport
            .delete_message(&address, &item.handle)
            .await?;
        debug!(queue = %self.handle.name, "Item deleted");
        Ok(())
    }

    /// Approximate number of items waiting to be claimed
    pub async fn number_of_items(&self) -> Result<u64, QueueError> {
        self.read_count(QueueAttribute::ApproximateNumberOfMessages)
            .await
    }

    /// Approximate number of items currently claimed
    pub async fn number_of_claimed_items(&self) -> Result<u64, QueueError> {
        self.read_count(QueueAttribute::ApproximateNumberOfMessagesNotVisible)
            .await
    }

    async fn read_count(&self, attribute: QueueAttribute) -> Result<u64, QueueError> {
        let address = self.require_address()?;
        let attributes = self
            .transport
            .get_attributes(&address, &[attribute])
            .await?;

        let value = attributes.get(attribute.as_str()).ok_or_else(|| {
            TransportError::MalformedResponse {
                message: format!("attribute {} missing from response", attribute),
            }
        })?;

        let count = value
            .parse::<u64>()
            .map_err(|e| TransportError::MalformedResponse {
                message: format!("attribute {} is not a count ('{}'): {}", attribute, value, e),
            })?;
        Ok(count)
    }

    fn require_address(&self) -> Result<QueueAddress, QueueError> {
        self.handle
            .address()
            .ok_or_else(|| QueueError::QueueNotCreated {
                queue_name: self.handle.name.to_string(),
            })
    }

    fn require_handle<T>(item: &Item<T>, operation: &str) -> Result<(), QueueError> {
        if item.has_handle() {
            Ok(())
        } else {
            Err(QueueError::InvalidItem {
                reason: format!("cannot {} an item without an acknowledgement handle", operation),
            })
        }
    }
}

impl<C> std::fmt::Debug for QueueClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("handle", &self.handle)
            .field("backend", &self.transport.backend())
            .finish()
    }
}
