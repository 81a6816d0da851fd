//! Entity identifier generation.
//!
//! Identifiers are short opaque tokens of the form `{prefix}-{8 hex chars}`,
//! e.g. `post-1a2b3c4d`. They are assigned once at insert time and never
//! reused; uniqueness is enforced by the store, with the allocator retrying
//! on the (rare) collision.

use rand::Rng;

pub const PREFIX_POST: &str = "post";
pub const PREFIX_SNAPSHOT: &str = "snap";
pub const PREFIX_RUN: &str = "run";
pub const PREFIX_ASSET: &str = "media";

/// Number of hex characters in the random portion of an entity ID.
pub const ID_HEX_LEN: usize = 8;

/// Generate a new entity identifier with the given prefix.
#[must_use]
pub fn generate_entity_id(prefix: &str) -> String {
    let token: u32 = rand::rng().random();
    format!("{prefix}-{token:08x}")
}

/// Check whether `id` has the expected `{prefix}-{8 hex chars}` shape.
#[must_use]
pub fn is_valid_entity_id(prefix: &str, id: &str) -> bool {
    let Some(rest) = id.strip_prefix(prefix) else {
        return false;
    };
    let Some(token) = rest.strip_prefix('-') else {
        return false;
    };
    token.len() == ID_HEX_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_has_expected_shape() {
        let id = generate_entity_id(PREFIX_POST);
        assert!(
            is_valid_entity_id(PREFIX_POST, &id),
            "unexpected id shape: {id}"
        );
        assert_eq!(id.len(), PREFIX_POST.len() + 1 + ID_HEX_LEN);
    }

    #[test]
    fn prefixes_are_distinct() {
        let prefixes = [PREFIX_POST, PREFIX_SNAPSHOT, PREFIX_RUN, PREFIX_ASSET];
        for (i, a) in prefixes.iter().enumerate() {
            for b in &prefixes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn validation_rejects_wrong_prefix() {
        let id = generate_entity_id(PREFIX_SNAPSHOT);
        assert!(!is_valid_entity_id(PREFIX_POST, &id));
    }

    #[test]
    fn validation_rejects_short_token() {
        assert!(!is_valid_entity_id(PREFIX_POST, "post-1a2b"));
    }

    #[test]
    fn validation_rejects_non_hex_token() {
        assert!(!is_valid_entity_id(PREFIX_POST, "post-zzzzzzzz"));
    }

    #[test]
    fn validation_rejects_missing_separator() {
        assert!(!is_valid_entity_id(PREFIX_POST, "post1a2b3c4d"));
    }
}
