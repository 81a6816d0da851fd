//! Identity-key extraction.
//!
//! Scraped payloads expose the post identifier in several shapes: a
//! fully-qualified `full_urn` string, a bare `urn` string, or a `urn`
//! object nesting the value under a platform-specific sub-key. Extraction
//! is an explicit ordered list of strategies tried in sequence; the first
//! hit wins. `full_urn` outranks `urn` when both are present.

use serde_json::Value;

/// One way a payload may expose its identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// Top-level `full_urn` string field.
    FullUrn,
    /// Top-level `urn` string field.
    BareUrn,
    /// `urn` is an object; the key lives under the named sub-key.
    NestedUrn(&'static str),
}

/// Fixed precedence order for identity extraction.
pub const STRATEGY_ORDER: [IdentityStrategy; 4] = [
    IdentityStrategy::FullUrn,
    IdentityStrategy::BareUrn,
    IdentityStrategy::NestedUrn("activity_urn"),
    IdentityStrategy::NestedUrn("ugcPost_urn"),
];

impl IdentityStrategy {
    /// Try to extract an identity key from `record` using this strategy.
    /// Returns `None` when the field is absent, the wrong shape, or empty.
    #[must_use]
    pub fn extract<'a>(self, record: &'a Value) -> Option<&'a str> {
        let raw = match self {
            IdentityStrategy::FullUrn => record.get("full_urn")?.as_str()?,
            IdentityStrategy::BareUrn => record.get("urn")?.as_str()?,
            IdentityStrategy::NestedUrn(sub_key) => {
                record.get("urn")?.as_object()?.get(sub_key)?.as_str()?
            }
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

/// Extract the canonical identity key from a raw record, trying each
/// strategy in [`STRATEGY_ORDER`]. Returns the key and the strategy that
/// produced it.
#[must_use]
pub fn extract_identity(record: &Value) -> Option<(&str, IdentityStrategy)> {
    STRATEGY_ORDER
        .into_iter()
        .find_map(|strategy| strategy.extract(record).map(|key| (key, strategy)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn full_urn_wins_over_bare_urn() {
        let record = json!({
            "full_urn": "urn:li:activity:111",
            "urn": "urn:li:activity:222",
        });
        let (key, strategy) = extract_identity(&record).unwrap();
        assert_eq!(key, "urn:li:activity:111");
        assert_eq!(strategy, IdentityStrategy::FullUrn);
    }

    #[test]
    fn bare_urn_string_is_used_when_full_urn_absent() {
        let record = json!({ "urn": "urn:li:activity:333" });
        let (key, strategy) = extract_identity(&record).unwrap();
        assert_eq!(key, "urn:li:activity:333");
        assert_eq!(strategy, IdentityStrategy::BareUrn);
    }

    #[test]
    fn nested_activity_urn_is_found() {
        let record = json!({ "urn": { "activity_urn": "urn:li:activity:444" } });
        let (key, strategy) = extract_identity(&record).unwrap();
        assert_eq!(key, "urn:li:activity:444");
        assert_eq!(strategy, IdentityStrategy::NestedUrn("activity_urn"));
    }

    #[test]
    fn nested_ugc_post_urn_is_the_last_fallback() {
        let record = json!({ "urn": { "ugcPost_urn": "urn:li:ugcPost:555" } });
        let (key, strategy) = extract_identity(&record).unwrap();
        assert_eq!(key, "urn:li:ugcPost:555");
        assert_eq!(strategy, IdentityStrategy::NestedUrn("ugcPost_urn"));
    }

    #[test]
    fn activity_urn_outranks_ugc_post_urn() {
        let record = json!({
            "urn": {
                "ugcPost_urn": "urn:li:ugcPost:666",
                "activity_urn": "urn:li:activity:777",
            }
        });
        let (key, _) = extract_identity(&record).unwrap();
        assert_eq!(key, "urn:li:activity:777");
    }

    #[test]
    fn empty_and_whitespace_values_are_skipped() {
        let record = json!({
            "full_urn": "  ",
            "urn": "urn:li:activity:888",
        });
        let (key, strategy) = extract_identity(&record).unwrap();
        assert_eq!(key, "urn:li:activity:888");
        assert_eq!(strategy, IdentityStrategy::BareUrn);
    }

    #[test]
    fn record_without_any_key_yields_none() {
        let record = json!({ "text": "no identifiers here" });
        assert!(extract_identity(&record).is_none());
    }

    #[test]
    fn urn_object_without_known_sub_keys_yields_none() {
        let record = json!({ "urn": { "share_urn": "urn:li:share:999" } });
        assert!(extract_identity(&record).is_none());
    }

    #[test]
    fn extracted_key_is_trimmed() {
        let record = json!({ "full_urn": "  urn:li:activity:101  " });
        let (key, _) = extract_identity(&record).unwrap();
        assert_eq!(key, "urn:li:activity:101");
    }
}
