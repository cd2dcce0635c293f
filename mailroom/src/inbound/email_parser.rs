//! RFC 5322 Email Parser using mailparse.
//!
//! Extracts the headers routing rules look at (subject and every recipient
//! header) plus the first plain-text and HTML bodies from a raw message.

use anyhow::{Context, Result};
use mailparse::{addrparse_header, parse_mail, MailAddr, MailHeader, MailHeaderMap, ParsedMail};
use tracing::{debug, info, warn};

/// Parsed email result.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    /// Message-Id header value (without angle brackets)
    pub message_id: Option<String>,
    /// Subject header value
    pub subject: Option<String>,
    /// Bare addresses from the From header
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub x_original_to: Vec<String>,
    pub x_forwarded_to: Vec<String>,
    /// First text/plain body
    pub text: Option<String>,
    /// First text/html body
    pub html: Option<String>,
}

/// Parse raw RFC 5322 email content.
///
/// # Arguments
///
/// * `raw_content` - Raw email bytes (headers + body), exactly as received
///
/// # Returns
///
/// A `ParsedEmail` with the routing-relevant headers and bodies extracted.
pub fn parse_raw_email(raw_content: &[u8]) -> Result<ParsedEmail> {
    info!(
        raw_content_length = raw_content.len(),
        "email_parse_start"
    );

    if raw_content.is_empty() {
        anyhow::bail!("Failed to parse email: empty message");
    }

    let mail = parse_mail(raw_content).context("Failed to parse email")?;

    let message_id = mail
        .headers
        .get_first_value("Message-Id")
        .map(|id| id.trim().trim_matches(|c| c == '<' || c == '>').to_string())
        .filter(|id| !id.is_empty());

    let subject = mail.headers.get_first_value("Subject");

    let result = ParsedEmail {
        message_id,
        subject,
        from: address_list(&mail.headers, "From"),
        to: address_list(&mail.headers, "To"),
        cc: address_list(&mail.headers, "Cc"),
        bcc: address_list(&mail.headers, "Bcc"),
        x_original_to: address_list(&mail.headers, "X-Original-To"),
        x_forwarded_to: address_list(&mail.headers, "X-Forwarded-To"),
        text: find_body(&mail, "text/plain"),
        html: find_body(&mail, "text/html"),
    };

    info!(
        message_id = ?result.message_id,
        subject = ?result.subject,
        to_count = result.to.len(),
        has_text = result.text.is_some(),
        has_html = result.html.is_some(),
        "email_parse_complete"
    );

    Ok(result)
}

/// Collect bare addresses from every occurrence of an address header.
///
/// Group syntax (`team: a@x, b@x;`) is flattened into its members.
fn address_list(headers: &[MailHeader<'_>], name: &str) -> Vec<String> {
    let mut addresses = Vec::new();

    for header in headers.get_all_headers(name) {
        match addrparse_header(header) {
            Ok(list) => {
                for addr in list.iter() {
                    match addr {
                        MailAddr::Single(single) => addresses.push(single.addr.clone()),
                        MailAddr::Group(group) => {
                            addresses.extend(group.addrs.iter().map(|s| s.addr.clone()))
                        }
                    }
                }
            }
            Err(e) => {
                warn!(header = name, error = %e, "email_address_header_invalid");
            }
        }
    }

    addresses
}

/// Find the first non-empty body of the given MIME type.
///
/// Walks nested multipart structures depth-first, so in
/// multipart/alternative the first matching alternative wins.
fn find_body(mail: &ParsedMail, mimetype: &str) -> Option<String> {
    let content_type = mail.ctype.mimetype.as_str();

    if content_type.starts_with("multipart/") {
        return mail.subparts.iter().find_map(|part| find_body(part, mimetype));
    }

    if content_type != mimetype {
        return None;
    }

    match mail.get_body() {
        Ok(body) if !body.trim().is_empty() => {
            debug!(content_type = content_type, body_length = body.len(), "email_body_found");
            Some(body)
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "email_body_extraction_failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_email() {
        let raw = r#"Message-Id: <test123@example.com>
From: Sender <sender@example.com>
To: test@example.com
Subject: valid subject
Content-Type: text/plain

Hello World"#;

        let result = parse_raw_email(raw.as_bytes()).unwrap();

        assert_eq!(result.message_id, Some("test123@example.com".to_string()));
        assert_eq!(result.subject, Some("valid subject".to_string()));
        assert_eq!(result.from, vec!["sender@example.com".to_string()]);
        assert_eq!(result.to, vec!["test@example.com".to_string()]);
        assert!(result.text.unwrap().contains("Hello World"));
        assert!(result.html.is_none());
    }

    #[test]
    fn test_parse_address_lists() {
        let raw = r#"To: "Alice" <alice@example.com>, bob@example.com
Cc: team: carol@example.com, dave@example.com;
X-Original-To: inbox@example.com
Subject: Addresses

Body"#;

        let result = parse_raw_email(raw.as_bytes()).unwrap();

        assert_eq!(
            result.to,
            vec!["alice@example.com".to_string(), "bob@example.com".to_string()]
        );
        assert_eq!(
            result.cc,
            vec!["carol@example.com".to_string(), "dave@example.com".to_string()]
        );
        assert!(result.bcc.is_empty());
        assert_eq!(result.x_original_to, vec!["inbox@example.com".to_string()]);
    }

    #[test]
    fn test_parse_multipart_alternative() {
        let raw = r#"Message-Id: <multi123@example.com>
Subject: Multipart Test
Content-Type: multipart/alternative; boundary="boundary123"

--boundary123
Content-Type: text/plain

Plain text version

--boundary123
Content-Type: text/html

<html><body>HTML version</body></html>

--boundary123--"#;

        let result = parse_raw_email(raw.as_bytes()).unwrap();

        assert_eq!(result.message_id, Some("multi123@example.com".to_string()));
        assert!(result.text.unwrap().contains("Plain text version"));
        assert!(result.html.unwrap().contains("HTML version"));
    }

    #[test]
    fn test_parse_nested_multipart() {
        let raw = r#"Message-Id: <nested@example.com>
Content-Type: multipart/mixed; boundary="outer"

--outer
Content-Type: multipart/alternative; boundary="inner"

--inner
Content-Type: text/plain

Plain text

--inner
Content-Type: text/html

<html><body>Nested HTML</body></html>

--inner--

--outer--"#;

        let result = parse_raw_email(raw.as_bytes()).unwrap();

        assert!(result.html.unwrap().contains("Nested HTML"));
        assert!(result.text.unwrap().contains("Plain text"));
    }

    #[test]
    fn test_parse_message_id_without_brackets() {
        let raw = r#"Message-Id: test456@example.com
Subject: Hi

Body"#;

        let result = parse_raw_email(raw.as_bytes()).unwrap();

        assert_eq!(result.message_id, Some("test456@example.com".to_string()));
    }

    #[test]
    fn test_parse_no_message_id() {
        let raw = r#"Subject: No Message ID

Body"#;

        let result = parse_raw_email(raw.as_bytes()).unwrap();

        assert!(result.message_id.is_none());
        assert!(result.to.is_empty());
    }

    #[test]
    fn test_parse_8bit_latin1_body() {
        let raw: &[u8] =
            b"Subject: menu\nContent-Type: text/plain; charset=iso-8859-1\nContent-Transfer-Encoding: 8bit\n\nCaf\xE9";

        let result = parse_raw_email(raw).unwrap();

        assert_eq!(result.subject, Some("menu".to_string()));
        assert_eq!(result.text.as_deref(), Some("Caf\u{e9}"));
    }

    #[test]
    fn test_parse_invalid_input_fails() {
        assert!(parse_raw_email(b"").is_err());
        assert!(parse_raw_email(b" Subject: folded too early\n\nBody").is_err());
    }
}
