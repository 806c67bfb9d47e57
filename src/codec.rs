//! Text codec for entry payloads.
//!
//! An entry is stored as a delimited metadata block followed by the body
//! verbatim:
//!
//! ```text
//! ---
//! title: <string>
//! createdAt: <ISO-8601>
//! updatedAt: <ISO-8601>
//! folderId: <string>        (only when set)
//! ---
//!
//! <body>
//! ```
//!
//! Decoding is tolerant: a payload without a metadata block is treated as
//! pure body (title taken from a leading `# ` heading, or the id), and
//! missing fields fall back to the current time. Newlines and backslashes
//! in the title are escaped inside the block so a value can never span
//! header lines; `decode(encode(e)) == e` holds for any entry whose body
//! contains no line equal to the delimiter.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::eid::Eid;
use crate::entries::{self, Entry};

const DELIMITER: &str = "---";

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("payload is not valid utf-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("metadata block opened but never closed")]
    UnterminatedHeader,
}

pub fn encode(entry: &Entry) -> String {
    let mut out = String::with_capacity(entry.content.len() + 128);

    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&format!("title: {}\n", escape_value(&entry.title)));
    out.push_str(&format!("createdAt: {}\n", format_ts(&entry.created_at)));
    out.push_str(&format!("updatedAt: {}\n", format_ts(&entry.updated_at)));
    if let Some(folder_id) = &entry.folder_id {
        out.push_str(&format!("folderId: {folder_id}\n"));
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(&entry.content);

    out
}

pub fn decode(id: &Eid, payload: &[u8]) -> Result<Entry, FormatError> {
    let text = std::str::from_utf8(payload)?;

    let Some(rest) = strip_open_delimiter(text) else {
        // no metadata block at all: the whole payload is the body
        return Ok(entry_from_body(id, text));
    };

    let (header, after) = split_header(rest).ok_or(FormatError::UnterminatedHeader)?;

    // exactly one blank line separates the block from the body
    let body = after.strip_prefix('\n').unwrap_or(after);

    let mut title = None;
    let mut created_at = None;
    let mut updated_at = None;
    let mut folder_id = None;

    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);

        match key {
            "title" => title = Some(unescape_value(value)),
            "createdAt" => created_at = parse_ts(value),
            "updatedAt" => updated_at = parse_ts(value),
            "folderId" if !value.is_empty() => folder_id = Some(Eid::from(value)),
            _ => {}
        }
    }

    let now = entries::now();
    Ok(Entry {
        id: id.clone(),
        title: title.unwrap_or_else(|| derive_title(id, body)),
        content: body.to_string(),
        created_at: created_at.unwrap_or(now),
        updated_at: updated_at.unwrap_or(now),
        folder_id,
    })
}

/// Header values are single lines; embedded newlines would otherwise
/// leak into the next header line and be dropped on decode.
fn escape_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn strip_open_delimiter(text: &str) -> Option<&str> {
    if text == DELIMITER {
        return Some("");
    }
    text.strip_prefix("---\n")
}

/// Split the remainder after the opening delimiter into the header block
/// and everything after the closing delimiter line. `None` means the
/// block never closes.
fn split_header(rest: &str) -> Option<(&str, &str)> {
    if rest.is_empty() {
        // "---" alone: an empty, closed block with no body
        return Some(("", ""));
    }
    if let Some(after) = rest.strip_prefix("---\n") {
        return Some(("", after));
    }
    if rest == DELIMITER {
        return Some(("", ""));
    }
    if let Some(idx) = rest.find("\n---\n") {
        return Some((&rest[..idx], &rest[idx + 5..]));
    }
    if let Some(header) = rest.strip_suffix("\n---") {
        return Some((header, ""));
    }
    None
}

fn entry_from_body(id: &Eid, body: &str) -> Entry {
    let now = entries::now();
    Entry {
        id: id.clone(),
        title: derive_title(id, body),
        content: body.to_string(),
        created_at: now,
        updated_at: now,
        folder_id: None,
    }
}

/// Title for a payload without one: a leading markdown heading wins,
/// otherwise the id stands in.
fn derive_title(id: &Eid, body: &str) -> String {
    body.lines()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.strip_prefix("# "))
        .map(|heading| heading.trim().to_string())
        .unwrap_or_else(|| id.to_string())
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
