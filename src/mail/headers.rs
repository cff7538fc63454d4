use chrono::{DateTime, Utc};
use mailparse::{MailAddr, MailHeaderMap};
use serde::{Deserialize, Serialize};

/// A parsed mailbox from an address header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub display_name: Option<String>,
    pub email: String,
}

/// Descriptive header fields stored next to a message for indexing.
///
/// Nothing in the sync path reads these back; they only make the stored
/// documents searchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailHeaders {
    pub subject: Option<String>,
    pub from: Option<Address>,
    pub to: Option<Vec<Address>>,
    pub cc: Option<Vec<Address>>,
    /// Sent date from the `Date` header
    pub date: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
}

/// Result of header extraction.
#[derive(Debug, Clone, Default)]
pub struct ParsedHeaders {
    pub headers: MailHeaders,
    /// Raw `Date` value that could not be parsed, if any
    pub rejected_date: Option<String>,
    /// Set when the header block itself could not be parsed
    pub malformed: bool,
}

impl MailHeaders {
    /// Parse only the header block of a raw RFC 5322 message.
    ///
    /// Never fails: an unparsable date or header block yields empty fields
    /// and is reported through [`ParsedHeaders`].
    pub fn parse(content: &[u8]) -> ParsedHeaders {
        let (headers, _) = match mailparse::parse_headers(content) {
            Ok(parsed) => parsed,
            Err(_) => {
                return ParsedHeaders {
                    malformed: true,
                    ..Default::default()
                }
            }
        };

        let mut rejected_date = None;
        let date = headers.get_first_value("Date").and_then(|raw| {
            let parsed = mailparse::dateparse(&raw)
                .ok()
                .and_then(|ts| DateTime::from_timestamp(ts, 0));
            if parsed.is_none() {
                rejected_date = Some(raw);
            }
            parsed
        });

        let parsed = Self {
            subject: headers.get_first_value("Subject"),
            from: headers
                .get_first_value("From")
                .and_then(|raw| address_list(&raw).into_iter().next()),
            to: headers.get_first_value("To").map(|raw| address_list(&raw)),
            cc: headers.get_first_value("Cc").map(|raw| address_list(&raw)),
            date,
            message_id: headers
                .get_first_value("Message-Id")
                .map(|id| id.trim().to_string()),
        };

        ParsedHeaders {
            headers: parsed,
            rejected_date,
            malformed: false,
        }
    }
}

/// Flatten an address header into single mailboxes, expanding groups.
fn address_list(raw: &str) -> Vec<Address> {
    let Ok(list) = mailparse::addrparse(raw) else {
        return Vec::new();
    };

    let mut addresses = Vec::new();
    for addr in list.iter() {
        match addr {
            MailAddr::Single(info) => addresses.push(Address {
                display_name: info.display_name.clone(),
                email: info.addr.clone(),
            }),
            MailAddr::Group(group) => {
                addresses.extend(group.addrs.iter().map(|info| Address {
                    display_name: info.display_name.clone(),
                    email: info.addr.clone(),
                }));
            }
        }
    }
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"From: Alice Example <alice@example.com>\r\n\
To: bob@example.com, Carol <carol@example.com>\r\n\
Cc: team: dave@example.com, erin@example.com;\r\n\
Subject: Quarterly numbers\r\n\
Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
Message-Id: <1234@local.machine.example>\r\n\
\r\n\
Body text\r\n";

    #[test]
    fn test_extracts_descriptive_fields() {
        let parsed = MailHeaders::parse(RAW);
        assert!(!parsed.malformed);
        assert!(parsed.rejected_date.is_none());

        let headers = parsed.headers;
        assert_eq!(headers.subject.as_deref(), Some("Quarterly numbers"));
        assert_eq!(
            headers.from,
            Some(Address {
                display_name: Some("Alice Example".to_string()),
                email: "alice@example.com".to_string(),
            })
        );
        let to = headers.to.unwrap();
        assert_eq!(to.len(), 2);
        assert_eq!(to[1].email, "carol@example.com");
        assert_eq!(headers.cc.unwrap().len(), 2);
        assert_eq!(
            headers.message_id.as_deref(),
            Some("<1234@local.machine.example>")
        );
        assert_eq!(
            headers.date.unwrap().to_rfc3339(),
            "2003-07-01T08:52:37+00:00"
        );
    }

    #[test]
    fn test_invalid_date_is_recovered() {
        let raw = b"From: alice@example.com\r\nDate: sometime last week\r\n\r\nhi\r\n";
        let parsed = MailHeaders::parse(raw);
        assert!(parsed.headers.date.is_none());
        assert_eq!(parsed.rejected_date.as_deref(), Some("sometime last week"));
        assert_eq!(parsed.headers.from.unwrap().email, "alice@example.com");
    }

    #[test]
    fn test_missing_headers_are_none() {
        let parsed = MailHeaders::parse(b"Subject: only a subject\r\n\r\n");
        let headers = parsed.headers;
        assert_eq!(headers.subject.as_deref(), Some("only a subject"));
        assert!(headers.from.is_none());
        assert!(headers.to.is_none());
        assert!(headers.cc.is_none());
        assert!(headers.date.is_none());
        assert!(parsed.rejected_date.is_none());
    }
}
