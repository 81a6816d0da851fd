//! Field extraction and coercion over loosely-structured payloads.
//!
//! Scraped records are only partially trusted: metric fields may be
//! missing, nulls, floats, or numeric strings depending on post type and
//! scraper version. Coercion never fails — anything unusable becomes zero.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Coerce a metric value to `i64` with zero fallback.
///
/// Accepts integers, floats (truncated), and numeric strings. Missing or
/// malformed values coerce to 0 so a bad metric never aborts ingestion.
#[must_use]
pub fn coerce_count(value: Option<&Value>) -> i64 {
    let Some(value) = value else { return 0 };
    if let Some(n) = value.as_i64() {
        return n;
    }
    #[allow(clippy::cast_possible_truncation)]
    if let Some(f) = value.as_f64() {
        return f as i64;
    }
    if let Some(s) = value.as_str() {
        if let Ok(n) = s.trim().parse::<i64>() {
            return n;
        }
    }
    0
}

/// Publication time from `posted_at.timestamp` (epoch milliseconds).
#[must_use]
pub fn extract_posted_at(record: &Value) -> Option<DateTime<Utc>> {
    let millis = coerce_count(record.get("posted_at").and_then(|p| p.get("timestamp")));
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

/// Author username from `author.username`.
#[must_use]
pub fn extract_author_username(record: &Value) -> Option<String> {
    record
        .get("author")
        .and_then(|a| a.get("username"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// A top-level string field, `None` when absent or empty.
#[must_use]
pub fn string_field(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// The record's `stats` object, or an empty object when absent.
#[must_use]
pub fn extract_raw_stats(record: &Value) -> Value {
    record
        .get("stats")
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

/// Collect media URLs referenced by a record, de-duplicated in order.
///
/// Observed shapes: `media.url` (single), `media.items[]` (strings or
/// `{url}` objects), and `images[]` (same two forms).
#[must_use]
pub fn extract_media_urls(record: &Value) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();

    let mut push = |candidate: Option<&str>| {
        if let Some(url) = candidate {
            if !url.is_empty() && !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
    };

    let url_of = |item: &Value| -> Option<String> {
        match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(_) => item
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    };

    if let Some(media) = record.get("media") {
        push(media.get("url").and_then(Value::as_str));
        if let Some(items) = media.get("items").and_then(Value::as_array) {
            for item in items {
                push(url_of(item).as_deref());
            }
        }
    }

    if let Some(images) = record.get("images").and_then(Value::as_array) {
        for item in images {
            push(url_of(item).as_deref());
        }
    }

    urls
}
