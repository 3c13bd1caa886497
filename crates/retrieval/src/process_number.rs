//! Structured process identifiers (`NNNNNNN-DD.YYYY.J.TT.OOOO`).

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Digit-group lengths and the separator that follows each group.
const GROUPS: [(usize, Option<u8>); 6] = [
    (7, Some(b'-')),
    (2, Some(b'.')),
    (4, Some(b'.')),
    (1, Some(b'.')),
    (2, Some(b'.')),
    (4, None),
];

/// A process identifier that matches the 7-2-4-1-2-4 digit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessNumber(String);

impl ProcessNumber {
    /// Parse a raw identifier, ignoring surrounding whitespace.
    ///
    /// The error names the offending input verbatim.
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        let candidate = raw.trim();
        if matches_pattern(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(JobError::InvalidProcessNumber(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn matches_pattern(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut pos = 0;

    for (len, separator) in GROUPS {
        let end = pos + len;
        if end > bytes.len() || !bytes[pos..end].iter().all(u8::is_ascii_digit) {
            return false;
        }
        pos = end;

        if let Some(sep) = separator {
            if bytes.get(pos) != Some(&sep) {
                return false;
            }
            pos += 1;
        }
    }

    pos == bytes.len()
}

impl core::fmt::Display for ProcessNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProcessNumber {
    type Error = JobError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProcessNumber> for String {
    fn from(value: ProcessNumber) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_well_formed_number() {
        let n = ProcessNumber::parse("1234567-12.2024.8.01.0001").unwrap();
        assert_eq!(n.as_str(), "1234567-12.2024.8.01.0001");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let n = ProcessNumber::parse("  1234567-12.2024.8.01.0001\n").unwrap();
        assert_eq!(n.as_str(), "1234567-12.2024.8.01.0001");
    }

    #[test]
    fn rejection_names_the_raw_input() {
        assert_eq!(
            ProcessNumber::parse("bad-number"),
            Err(JobError::InvalidProcessNumber("bad-number".to_string()))
        );
    }

    #[test]
    fn rejects_near_misses() {
        for raw in [
            "",
            "123456-12.2024.8.01.0001",
            "1234567-12.2024.8.01.00011",
            "1234567.12.2024.8.01.0001",
            "1234567-12-2024.8.01.0001",
            "1234567-12.2024.81.01.0001",
            "1234567-12.2024.8.01.000a",
            "12345678120248010001",
        ] {
            assert!(ProcessNumber::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn deserialization_validates() {
        let ok: ProcessNumber = serde_json::from_str("\"1234567-12.2024.8.01.0001\"").unwrap();
        assert_eq!(ok.as_str(), "1234567-12.2024.8.01.0001");
        assert!(serde_json::from_str::<ProcessNumber>("\"nope\"").is_err());
    }

    proptest! {
        #[test]
        fn every_pattern_instance_parses(
            raw in "[0-9]{7}-[0-9]{2}\\.[0-9]{4}\\.[0-9]\\.[0-9]{2}\\.[0-9]{4}"
        ) {
            let parsed = ProcessNumber::parse(&raw).unwrap();
            prop_assert_eq!(parsed.as_str(), raw.as_str());
        }

        #[test]
        fn strings_without_separators_never_parse(raw in "[0-9a-z]{0,30}") {
            prop_assert!(ProcessNumber::parse(&raw).is_err());
        }
    }
}
