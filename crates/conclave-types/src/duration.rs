//! Estimated-duration codec (section 6, bit-exact).
//!
//! Stored as the phrase `"{N} minutes"`; read back by extracting the first run of
//! decimal digits in the phrase. This asymmetry (structured write, loose read) is
//! intentional and carried over from the original source: it tolerates hand-edited
//! or legacy phrasing ("approximately 5 minutes") on read while always writing the
//! canonical form.

use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Encode a minute count as the canonical persisted phrase.
pub fn encode(minutes: u32) -> String {
    format!("{minutes} minutes")
}

/// Decode a persisted phrase back into a minute count.
///
/// Returns `None` for `None`/empty input or when no digit run is present. Parsing a
/// digit run that overflows `u32` also yields `None` rather than panicking.
pub fn decode(phrase: Option<&str>) -> Option<u32> {
    let phrase = phrase?;
    if phrase.trim().is_empty() {
        return None;
    }
    let matched = FIRST_DIGITS.find(phrase)?;
    matched.as_str().parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_canonical_form() {
        assert_eq!(encode(5), "5 minutes");
        assert_eq!(encode(0), "0 minutes");
    }

    #[test]
    fn decodes_canonical_and_loose_forms() {
        assert_eq!(decode(Some("5 minutes")), Some(5));
        assert_eq!(decode(Some("approximately 12 minutes or so")), Some(12));
        assert_eq!(decode(Some("")), None);
        assert_eq!(decode(None), None);
        assert_eq!(decode(Some("no number here")), None);
    }

    proptest! {
        #[test]
        fn round_trip_encode_then_decode(n in 0u32..1_000_000) {
            prop_assert_eq!(decode(Some(&encode(n))), Some(n));
        }

        #[test]
        fn round_trip_decode_then_encode_canonical_form(n in 0u32..1_000_000) {
            let canonical = format!("{n} minutes");
            let decoded = decode(Some(&canonical)).unwrap();
            prop_assert_eq!(encode(decoded), canonical);
        }
    }
}
