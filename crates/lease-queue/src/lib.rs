//! # Lease Queue
//!
//! Client for a lease-based work queue on top of an at-least-once message
//! service such as AWS SQS.
//!
//! This library provides:
//! - Idempotent queue provisioning by name
//! - Claiming an item under a time-limited lease, with long polling
//! - Releasing a claimed item for immediate redelivery
//! - Deleting (acknowledging) a claimed item
//! - Approximate queue depth and in-flight counts
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`config`] - Client configuration and validation
//! - [`message`] - Queue names, addresses and claimed items
//! - [`lease`] - Lease and long-poll negotiation
//! - [`codec`] - Payload encoding
//! - [`transport`] - The remote capability the client is built on
//! - [`transports`] - SQS and in-memory transports
//! - [`client`] - The queue client
//!
//! ## Example
//!
//! ```no_run
//! use lease_queue::{Credentials, Enqueue, Item, QueueClient, QueueConfig};
//!
//! # async fn demo() -> Result<(), lease_queue::QueueError> {
//! let config = QueueConfig {
//!     credentials: Some(Credentials::new("AKID", "SECRET")),
//!     default_wait_time_seconds: 10,
//!     ..QueueConfig::default()
//! };
//! let client = QueueClient::from_config("jobs", config).await?;
//!
//! client.create_item(Enqueue::Payload("resize image 17")).await?;
//!
//! if let Some(item) = client.claim_item::<String>(60).await? {
//!     // ... do the work ...
//!     client.delete_item(&item).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod lease;
pub mod message;
pub mod transport;
pub mod transports;

pub use client::{QueueClient, QueueHandle};
pub use codec::{Base64Codec, JsonCodec, PayloadCodec};
pub use config::{Backend, Credentials, QueueConfig, ReceiveErrorPolicy};
pub use error::{
    ConfigurationError, QueueError, SerializationError, TransportError, ValidationError,
};
pub use lease::{effective_wait_seconds, LeaseTerms};
pub use message::{Enqueue, Item, MessageId, QueueAddress, QueueName, ReceivedMessage, Timestamp};
pub use transport::{QueueAttribute, QueueTransport, ReceiveRequest};
pub use transports::{transport_for, InMemoryTransport, SqsTransport};
