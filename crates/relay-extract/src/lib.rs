//! Tolerant scraping of report artifacts from semi-structured payload text.
//!
//! This is a linear scanner, not a JSON parser: malformed, truncated or
//! double-encoded text yields fewer records, never an error.

use std::borrow::Cow;

use relay_protocol::{Arg, CapturedRecord};
use serde_json::Value;

const S3_POINTER_MARKER: &str = "PayloadS3Pointer";
const S3_BUCKET_KEY: &str = "s3BucketName";
const S3_OBJECT_KEY: &str = "s3Key";
const REPORT_NAME_KEY: &str = "reportName";
const REPORT_XML_KEY: &str = "reportResultXml";

const ESCAPED_QUOTE: &str = "\\\"";

/// Records found in the first text-bearing argument of a call.
pub fn extract(args: &[Arg]) -> Vec<CapturedRecord> {
    match candidate_text(args) {
        Some(text) => extract_text(&text),
        None => Vec::new(),
    }
}

/// First argument, in order, that is a string or exposes a text body.
pub fn candidate_text(args: &[Arg]) -> Option<String> {
    args.iter().find_map(|arg| match arg {
        Arg::Null => None,
        Arg::Text(text) => Some(text.clone()),
        Arg::Value(Value::String(text)) => Some(text.clone()),
        Arg::Value(_) => None,
        Arg::Message(message) => message.text(),
    })
}

pub fn extract_text(text: &str) -> Vec<CapturedRecord> {
    let mut records = Vec::new();
    if text.is_empty() {
        return records;
    }

    let normalized = normalize(text);
    let text: &str = &normalized;

    if text.contains(S3_POINTER_MARKER) && text.contains(S3_BUCKET_KEY) {
        let record = CapturedRecord::s3_pointer(
            json_string_value(text, S3_BUCKET_KEY),
            json_string_value(text, S3_OBJECT_KEY),
        );
        if record.has_values() {
            records.push(record);
        }
    }

    if text.contains(&quoted(REPORT_XML_KEY)) || text.contains(&quoted(REPORT_NAME_KEY)) {
        let record = CapturedRecord::report_response(
            json_string_value(text, REPORT_NAME_KEY),
            json_string_value(text, REPORT_XML_KEY),
        );
        if record.has_values() {
            records.push(record);
        }
    }

    records
}

/// Every bucket/key pair in `text`, in order of appearance.
///
/// Unlike [`extract_text`] this needs no pointer-type marker, and each
/// `s3BucketName` occurrence pairs with the `s3Key` that follows it before the
/// next bucket. Used for scraping relay logs, where one line can carry many.
pub fn scan_s3_pointers(text: &str) -> Vec<CapturedRecord> {
    let normalized = normalize(text);
    let text: &str = &normalized;
    let starts = text
        .match_indices(&quoted(S3_BUCKET_KEY))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();

    starts
        .iter()
        .enumerate()
        .filter_map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(text.len());
            let segment = &text[start..end];
            let record = CapturedRecord::s3_pointer(
                json_string_value(segment, S3_BUCKET_KEY),
                json_string_value(segment, S3_OBJECT_KEY),
            );
            record.has_values().then_some(record)
        })
        .collect()
}

/// Text carrying `\"` is treated as a JSON string literal and unescaped once.
fn normalize(text: &str) -> Cow<'_, str> {
    if text.contains(ESCAPED_QUOTE) {
        Cow::Owned(text.replace(ESCAPED_QUOTE, "\""))
    } else {
        Cow::Borrowed(text)
    }
}

/// String value following `"key":` (or `\"key\":`), with minimal unescaping.
///
/// `null`, non-string values and unterminated strings all read as `None`.
pub fn json_string_value(text: &str, key: &str) -> Option<String> {
    let key_at = find_key(text, key)?;
    let colon = key_at + text[key_at..].find(':')?;
    let rest = text[colon + 1..].trim_start();
    if rest.starts_with("null") {
        return None;
    }
    let body = rest.strip_prefix('"')?;

    let mut value = String::new();
    let mut escaped = false;
    for ch in body.chars() {
        if escaped {
            value.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => return Some(value),
            other => value.push(other),
        }
    }
    None
}

fn find_key(text: &str, key: &str) -> Option<usize> {
    text.find(&quoted(key))
        .or_else(|| text.find(&format!("{ESCAPED_QUOTE}{key}{ESCAPED_QUOTE}")))
}

fn quoted(key: &str) -> String {
    format!("\"{key}\"")
}
