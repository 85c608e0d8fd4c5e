//! Decoding of raw fetched messages into [`Email`] records.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};

use super::mail::RawMessage;
use crate::inbox::{Email, normalize_message_id, unknown_date};

/// Decoder settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Keep raw attachment bytes in [`Email::attachment_data`].
    pub keep_attachment_data: bool,
}

/// A message that could not be decoded. Recoverable: skip and continue.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The server returned no body section.
    #[error("message {0} has no body")]
    MissingBody(u32),

    /// The body is not valid MIME.
    #[error("message {seq} is not valid MIME: {source}")]
    Parse {
        /// Sequence number of the message.
        seq: u32,
        /// Parser error.
        #[source]
        source: mailparse::MailParseError,
    },
}

/// Decodes one fetched message.
///
/// # Errors
///
/// Returns [`DecodeError`] when the body is missing or unparseable.
pub fn decode_message(raw: &RawMessage, options: &DecodeOptions) -> Result<Email, DecodeError> {
    let body = raw.body.as_deref().ok_or(DecodeError::MissingBody(raw.seq))?;
    let parsed = mailparse::parse_mail(body).map_err(|source| DecodeError::Parse {
        seq: raw.seq,
        source,
    })?;
    let headers = parsed.headers.as_slice();

    let mut email = Email {
        message_id: header_id(&parsed, "Message-ID"),
        from: headers
            .get_first_value("From")
            .map(|value| addresses(&value).into_iter().next().unwrap_or(value))
            .unwrap_or_default(),
        to: header_addresses(&parsed, "To"),
        cc: header_addresses(&parsed, "Cc"),
        bcc: header_addresses(&parsed, "Bcc"),
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        date: headers
            .get_first_value("Date")
            .and_then(|value| parse_date(&value))
            .unwrap_or_else(unknown_date),
        in_reply_to: header_id(&parsed, "In-Reply-To"),
        is_read: raw.is_seen(),
        seq: raw.seq,
        ..Email::default()
    };

    let mut parts = Parts::default();
    collect_parts(&parsed, options, &mut parts);

    email.body_html = parts.html;
    email.body = match (parts.text, &email.body_html) {
        (Some(text), _) => text,
        (None, Some(html)) => strip_html_tags(html),
        (None, None) => String::new(),
    };
    email.attachments = parts.attachment_names;
    email.attachment_data = parts.attachment_data;

    Ok(email)
}

#[derive(Default)]
struct Parts {
    text: Option<String>,
    html: Option<String>,
    attachment_names: Vec<String>,
    attachment_data: BTreeMap<String, Vec<u8>>,
}

fn collect_parts(part: &ParsedMail<'_>, options: &DecodeOptions, parts: &mut Parts) {
    if !part.subparts.is_empty() {
        for subpart in &part.subparts {
            collect_parts(subpart, options, parts);
        }
        return;
    }

    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .cloned()
        .or_else(|| part.ctype.params.get("name").cloned());
    let is_attachment =
        matches!(disposition.disposition, DispositionType::Attachment) || filename.is_some();

    if is_attachment {
        let name = filename
            .unwrap_or_else(|| format!("attachment-{}", parts.attachment_names.len() + 1));
        if options.keep_attachment_data
            && let Ok(data) = part.get_body_raw()
        {
            parts.attachment_data.insert(name.clone(), data);
        }
        parts.attachment_names.push(name);
        return;
    }

    let mime_type = part.ctype.mimetype.to_ascii_lowercase();
    let slot = if mime_type == "text/plain" {
        &mut parts.text
    } else if mime_type == "text/html" {
        &mut parts.html
    } else {
        return;
    };
    if slot.is_none()
        && let Ok(body) = part.get_body()
    {
        *slot = Some(body);
    }
}

fn header_id(parsed: &ParsedMail<'_>, name: &str) -> String {
    parsed
        .headers
        .get_first_value(name)
        .map(|value| normalize_message_id(&value).to_string())
        .unwrap_or_default()
}

fn header_addresses(parsed: &ParsedMail<'_>, name: &str) -> Vec<String> {
    parsed
        .headers
        .get_all_values(name)
        .iter()
        .flat_map(|value| addresses(value))
        .collect()
}

/// Renders an address header as `Name <addr>` / `addr` entries.
fn addresses(value: &str) -> Vec<String> {
    let Ok(list) = mailparse::addrparse(value) else {
        return value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    };

    let mut out = Vec::new();
    for addr in list.iter() {
        match addr {
            MailAddr::Single(info) => out.push(format_single(info)),
            MailAddr::Group(group) => out.extend(group.addrs.iter().map(format_single)),
        }
    }
    out
}

fn format_single(info: &mailparse::SingleInfo) -> String {
    match &info.display_name {
        Some(name) if !name.is_empty() => format!("{name} <{}>", info.addr),
        _ => info.addr.clone(),
    }
}

/// Parses a Date header, keeping the sender's offset when possible.
fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value).ok().or_else(|| {
        mailparse::dateparse(value)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .map(|date| date.fixed_offset())
    })
}

/// Converts an HTML body to rough plain text.
#[must_use]
pub fn strip_html_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut chars = html.chars();
    while let Some(c) = chars.next() {
        if c != '<' {
            text.push(c);
            continue;
        }
        let mut tag = String::new();
        for c in chars.by_ref() {
            if c == '>' {
                break;
            }
            tag.push(c);
        }
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match name.as_str() {
            "br" | "div" | "li" | "tr" => text.push('\n'),
            "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" if tag.starts_with('/') => {
                text.push_str("\n\n");
            }
            _ => {}
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(body: &str, flags: &[&str]) -> RawMessage {
        RawMessage {
            seq: 3,
            flags: flags.iter().map(|f| (*f).to_string()).collect(),
            body: Some(body.replace('\n', "\r\n").into_bytes()),
        }
    }

    const SIMPLE: &str = "From: \"Jane Doe\" <jane@example.com>
To: bob@x.com, Carol <carol@y.org>
Cc: dave@z.net
Subject: Quarterly report
Date: Tue, 2 Jan 2024 15:04:05 +0200
Message-ID: <abc123@example.com>
In-Reply-To: <prev@example.com>
Content-Type: text/plain; charset=utf-8

Numbers attached.
";

    #[test]
    fn decodes_headers_and_body() {
        let email = decode_message(&raw(SIMPLE, &["\\Seen"]), &DecodeOptions::default()).unwrap();
        assert_eq!(email.message_id, "abc123@example.com");
        assert_eq!(email.in_reply_to, "prev@example.com");
        assert_eq!(email.from, "Jane Doe <jane@example.com>");
        assert_eq!(email.to, ["bob@x.com", "Carol <carol@y.org>"]);
        assert_eq!(email.cc, ["dave@z.net"]);
        assert!(email.bcc.is_empty());
        assert_eq!(email.subject, "Quarterly report");
        assert_eq!(email.date.to_rfc3339(), "2024-01-02T15:04:05+02:00");
        assert_eq!(email.body.trim(), "Numbers attached.");
        assert!(email.body_html.is_none());
        assert!(email.is_read);
        assert_eq!(email.seq, 3);
    }

    #[test]
    fn unseen_without_flag() {
        let email = decode_message(&raw(SIMPLE, &[]), &DecodeOptions::default()).unwrap();
        assert!(!email.is_read);
    }

    const MULTIPART: &str = "From: a@x.com
Subject: With file
Date: Wed, 3 Jan 2024 10:00:00 +0000
MIME-Version: 1.0
Content-Type: multipart/mixed; boundary=\"b1\"

--b1
Content-Type: multipart/alternative; boundary=\"b2\"

--b2
Content-Type: text/plain

plain version
--b2
Content-Type: text/html

<p>html version</p>
--b2--
--b1
Content-Type: application/pdf; name=\"report.pdf\"
Content-Disposition: attachment; filename=\"report.pdf\"
Content-Transfer-Encoding: base64

aGVsbG8=
--b1--
";

    #[test]
    fn multipart_with_attachment() {
        let email = decode_message(&raw(MULTIPART, &[]), &DecodeOptions::default()).unwrap();
        assert_eq!(email.body.trim(), "plain version");
        assert_eq!(email.body_html.as_deref().map(str::trim), Some("<p>html version</p>"));
        assert_eq!(email.attachments, ["report.pdf"]);
        assert!(email.attachment_data.is_empty());
        assert!(email.message_id.is_empty());
    }

    #[test]
    fn keeps_attachment_bytes_when_asked() {
        let options = DecodeOptions {
            keep_attachment_data: true,
        };
        let email = decode_message(&raw(MULTIPART, &[]), &options).unwrap();
        assert_eq!(email.attachment_data["report.pdf"], b"hello");
    }

    #[test]
    fn html_only_falls_back_to_text() {
        let body = "From: a@x.com
Subject: Promo
Content-Type: text/html

<div>Hello<br>there &amp; welcome</div>
";
        let email = decode_message(&raw(body, &[]), &DecodeOptions::default()).unwrap();
        assert_eq!(email.body, "Hello\nthere & welcome");
        assert!(email.body_html.is_some());
    }

    #[test]
    fn missing_date_uses_epoch() {
        let body = "From: a@x.com\nSubject: undated\n\nhi\n";
        let email = decode_message(&raw(body, &[]), &DecodeOptions::default()).unwrap();
        assert_eq!(email.date, unknown_date());
    }

    #[test]
    fn missing_body_is_an_error() {
        let raw = RawMessage {
            seq: 9,
            ..RawMessage::default()
        };
        let err = decode_message(&raw, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::MissingBody(9)));
    }

    #[test]
    fn strips_tags() {
        assert_eq!(
            strip_html_tags("<h1>Title</h1><p>One</p><p>Two &lt;3</p>"),
            "Title\n\nOne\n\nTwo <3"
        );
    }
}
