//! Mailroom - inbound email routing and mailbox dispatch.
//!
//! This library provides shared modules for the two Mailroom binaries:
//! - `mailroom-ingress`: Web server that accepts raw inbound email
//! - `mailroom-router`: Worker that routes queued email to mailboxes
//!
//! ## Architecture
//!
//! ```text
//! Relay/Mailgun → Ingress → mailbox_routing → Router → Mailbox::process()
//! ```
//!
//! Routing itself is synchronous and pure: a [`Router`] picks the first
//! matching rule of a validated table, and a [`Mailroom`] dispatches the email
//! to the [`Mailbox`] bound to that destination.

pub mod config;
pub mod error;
pub mod inbound;
pub mod mailbox;
pub mod mailroom;
pub mod queue;
pub mod routing;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, DispatchError, RouteJobError};
pub use inbound::{InboundEmail, InboundEmailStatus};
pub use mailbox::{BouncingMailbox, DeliveringMailbox, Mailbox, MailboxRegistry, NoopMailbox};
pub use self::mailroom::{application_mailboxes, application_mailroom, load_mailroom, Mailroom};
pub use queue::{perform_route_job, settle, Publisher, RouteJob, Settlement, ROUTING_QUEUE};
pub use routing::{Destination, Matcher, Router, RouterBuilder, RoutingRule};
pub use web::AppState;
