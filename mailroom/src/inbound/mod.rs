//! Inbound email records.
//!
//! ```text
//! raw RFC 5322 source → parse_raw_email() → InboundEmail (pending)
//! ```

pub mod email;
pub mod email_parser;

pub use email::{InboundEmail, InboundEmailStatus};
pub use email_parser::{parse_raw_email, ParsedEmail};
