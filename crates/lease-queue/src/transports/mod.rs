//! Queue transport implementations.
//!
//! This module contains concrete implementations of the `QueueTransport`
//! trait for the supported backends, and the factory selecting one of them
//! from configuration.

pub mod memory;
pub mod sqs;

pub use memory::InMemoryTransport;
pub use sqs::SqsTransport;

use crate::config::{Backend, QueueConfig};
use crate::error::ConfigurationError;
use crate::transport::QueueTransport;
use std::sync::Arc;

/// Build the transport named by `config.backend`
pub fn transport_for(config: &QueueConfig) -> Result<Arc<dyn QueueTransport>, ConfigurationError> {
    let transport: Arc<dyn QueueTransport> = match config.backend {
        Backend::Sqs => Arc::new(SqsTransport::new(config)?),
        Backend::InMemory => Arc::new(InMemoryTransport::new()),
    };
    Ok(transport)
}
