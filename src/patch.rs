//! Key/value status patch parsing.
//!
//! Status messages from the radio mix positional words with `key=value`
//! attributes:
//!
//! ```text
//! display pan 0x40000000 wnb=0 center=3.792057 bandwidth=0.885342
//! daxiq 1 pan=0x40000000 rate=48000
//! ```
//!
//! The leading object-kind words are skipped and the remaining bare word is
//! the object identifier. Attribute values are kept as raw strings; the
//! registries decide which ones they understand.

use std::collections::HashMap;

use crate::error::PatchError;

/// Marker for panadapter status messages.
pub const PANADAPTER_MARKER: &str = "display pan";

/// Marker for DAX IQ stream status messages.
pub const IQ_STREAM_MARKER: &str = "daxiq ";

/// Bare words to skip before the object identifier in status messages.
pub const OBJECT_SKIP_COUNT: usize = 1;

/// Raw attribute values keyed by attribute name.
pub type Attributes = HashMap<String, String>;

/// A parsed status message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPatch {
    pub object_id: String,
    pub attributes: Attributes,
}

/// Registry a status message applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTarget {
    Panadapter,
    IqStream,
}

/// Decide which registry, if any, a status message updates.
pub fn classify(message: &str) -> Option<PatchTarget> {
    if message.contains(PANADAPTER_MARKER) {
        Some(PatchTarget::Panadapter)
    } else if message.contains(IQ_STREAM_MARKER) {
        Some(PatchTarget::IqStream)
    } else {
        None
    }
}

/// Parse a status message into an object patch.
///
/// Tokens are separated by single spaces. A token with exactly one `=` is an
/// attribute (later duplicates win). A token without `=` is a bare word: the
/// first `skip_count` are discarded and every bare word after that replaces
/// the object identifier, so the last one wins. Tokens with more than one
/// `=` are ignored.
///
/// # Errors
///
/// Returns `PatchError::NoTokens` for an empty message and
/// `PatchError::NotKeyValue` when the message has no `=` at all.
pub fn parse(message: &str, skip_count: usize) -> Result<ObjectPatch, PatchError> {
    if message.is_empty() {
        return Err(PatchError::NoTokens);
    }
    if !message.contains('=') {
        return Err(PatchError::NotKeyValue);
    }

    let mut patch = ObjectPatch::default();
    let mut skipped = 0;

    for token in message.split(' ') {
        let mut parts = token.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                patch.attributes.insert(key.to_string(), value.to_string());
            }
            (Some(word), None, _) => {
                if skipped == skip_count {
                    patch.object_id = word.to_string();
                } else {
                    skipped += 1;
                }
            }
            _ => {}
        }
    }

    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_panadapter_status() {
        let patch = parse("display pan 0x40000000 wnb=0 center=3.792057", 1).unwrap();
        assert_eq!(patch.object_id, "0x40000000");
        assert_eq!(patch.attributes, attrs(&[("wnb", "0"), ("center", "3.792057")]));
    }

    #[test]
    fn test_parse_iq_stream_status() {
        let patch = parse("daxiq 1 pan=0x40000000 rate=48000", OBJECT_SKIP_COUNT).unwrap();
        assert_eq!(patch.object_id, "1");
        assert_eq!(
            patch.attributes,
            attrs(&[("pan", "0x40000000"), ("rate", "48000")])
        );
    }

    #[test]
    fn test_last_bare_word_wins() {
        let patch = parse("kind first second third x=1", 1).unwrap();
        assert_eq!(patch.object_id, "third");
    }

    #[test]
    fn test_bare_words_after_attributes_still_count() {
        let patch = parse("kind a=1 late", 1).unwrap();
        assert_eq!(patch.object_id, "late");
    }

    #[test]
    fn test_skip_count_zero_uses_first_word_onward() {
        let patch = parse("only x=1", 0).unwrap();
        assert_eq!(patch.object_id, "only");
    }

    #[test]
    fn test_no_identifier_when_everything_skipped() {
        let patch = parse("display center=1.0", 1).unwrap();
        assert_eq!(patch.object_id, "");
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let patch = parse("pan 1 center=1.0 center=2.0", 1).unwrap();
        assert_eq!(patch.attributes.get("center").map(String::as_str), Some("2.0"));
    }

    #[test]
    fn test_empty_value_kept() {
        let patch = parse("pan 1 xvtr= pre=", 1).unwrap();
        assert_eq!(patch.attributes, attrs(&[("xvtr", ""), ("pre", "")]));
    }

    #[test]
    fn test_multiple_equals_ignored() {
        let patch = parse("pan 1 a=b=c d=e", 1).unwrap();
        assert_eq!(patch.attributes, attrs(&[("d", "e")]));
        assert_eq!(patch.object_id, "1");
    }

    #[test]
    fn test_reject_empty() {
        assert_eq!(parse("", 1), Err(PatchError::NoTokens));
    }

    #[test]
    fn test_reject_without_equals() {
        assert_eq!(parse("display pan 0x40000000", 1), Err(PatchError::NotKeyValue));
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("display pan 0x40000000 center=1.0"),
            Some(PatchTarget::Panadapter)
        );
        assert_eq!(classify("daxiq 1 rate=24000"), Some(PatchTarget::IqStream));
        assert_eq!(classify("slice 0 RF_frequency=14.074"), None);
        assert_eq!(classify("daxiq_rate=0"), None);
    }
}
