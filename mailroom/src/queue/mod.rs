//! Queue module for deferred routing over RabbitMQ.
//!
//! ## Architecture
//!
//! ```text
//! Ingress → mailbox_routing queue → Router worker → Mailroom
//! ```

pub mod job;
pub mod publisher;
pub mod types;

pub use job::{perform_route_job, settle, Settlement};
pub use publisher::Publisher;
pub use types::{RouteJob, ROUTING_QUEUE};
