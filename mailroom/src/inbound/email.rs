//! The inbound email record and its processing lifecycle.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use super::email_parser::{parse_raw_email, ParsedEmail};

/// Lifecycle status of an inbound email.
///
/// Every email starts `Pending`. `Delivered`, `Bounced` and `Failed` are
/// terminal; only the mailbox selected for the email moves it between states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundEmailStatus {
    #[default]
    Pending,
    Processing,
    Delivered,
    Bounced,
    Failed,
}

impl InboundEmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundEmailStatus::Pending => "pending",
            InboundEmailStatus::Processing => "processing",
            InboundEmailStatus::Delivered => "delivered",
            InboundEmailStatus::Bounced => "bounced",
            InboundEmailStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InboundEmailStatus::Delivered | InboundEmailStatus::Bounced | InboundEmailStatus::Failed
        )
    }
}

impl fmt::Display for InboundEmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One received message: its raw source, the parsed fields routing looks at,
/// and its mutable status.
#[derive(Debug, Clone)]
pub struct InboundEmail {
    message_id: String,
    message_checksum: String,
    source: Vec<u8>,
    mail: ParsedEmail,
    status: InboundEmailStatus,
}

impl InboundEmail {
    /// Build a pending inbound email from raw RFC 5322 source.
    ///
    /// The bytes are kept as received; 8-bit bodies in legacy charsets are
    /// never re-encoded. When the message carries no Message-Id, one is
    /// derived from the source checksum so redelivered copies of the same
    /// bytes agree.
    pub fn from_source(source: impl Into<Vec<u8>>) -> Result<Self> {
        let source = source.into();
        let mail = parse_raw_email(&source)?;
        let message_checksum = checksum(&source);

        let message_id = match mail.message_id.clone() {
            Some(id) => id,
            None => {
                info!(generated_id = %message_checksum, "inbound_email_message_id_fallback");
                message_checksum.clone()
            }
        };

        Ok(Self {
            message_id,
            message_checksum,
            source,
            mail,
            status: InboundEmailStatus::Pending,
        })
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// SHA-256 hex digest of the raw source.
    pub fn message_checksum(&self) -> &str {
        &self.message_checksum
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn mail(&self) -> &ParsedEmail {
        &self.mail
    }

    /// Subject header, or the empty string when absent.
    pub fn subject(&self) -> &str {
        self.mail.subject.as_deref().unwrap_or("")
    }

    /// Every address the message was sent to.
    ///
    /// Order: To, Cc, Bcc, X-Original-To, X-Forwarded-To.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.mail
            .to
            .iter()
            .chain(&self.mail.cc)
            .chain(&self.mail.bcc)
            .chain(&self.mail.x_original_to)
            .chain(&self.mail.x_forwarded_to)
            .map(String::as_str)
    }

    pub fn status(&self) -> InboundEmailStatus {
        self.status
    }

    /// Whether the email has reached a terminal status.
    pub fn is_processed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn processing(&mut self) {
        self.transition(InboundEmailStatus::Processing);
    }

    pub fn delivered(&mut self) {
        self.transition(InboundEmailStatus::Delivered);
    }

    pub fn bounced(&mut self) {
        self.transition(InboundEmailStatus::Bounced);
    }

    pub fn failed(&mut self) {
        self.transition(InboundEmailStatus::Failed);
    }

    fn transition(&mut self, to: InboundEmailStatus) {
        info!(
            message_id = %self.message_id,
            from = %self.status,
            to = %to,
            "inbound_email_status_changed"
        );
        self.status = to;
    }
}

fn checksum(source: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source);
    hex::encode(hasher.finalize())
}
