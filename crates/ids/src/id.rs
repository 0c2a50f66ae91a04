//! Numeric record identities and their generator.

use crate::{IdError, IdResult};
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

/// Identity of a catalogue record.
///
/// Values are Unix timestamps in milliseconds at the time of allocation, so they sort in
/// upload order and stay compatible with documents written by earlier revisions of the
/// service, which used `Date.now()` as the identity.
///
/// # Construction
/// - [`FileIdGenerator::generate`] allocates a fresh identity.
/// - [`FileId::parse`] validates an externally supplied identifier (path segment, form field).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FileId(i64);

impl FileId {
    /// Wraps a raw value. Callers must have validated it; prefer [`FileId::parse`] for input.
    pub const fn from_raw(value: i64) -> Self {
        Self(value)
    }

    /// Parses a decimal identity.
    ///
    /// Surrounding whitespace is ignored. Signs, fractions and empty input are rejected, as
    /// is zero: no allocation ever produces it.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is not a positive decimal integer.
    pub fn parse(input: &str) -> IdResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::InvalidInput(format!(
                "file id must be a positive decimal integer, got: '{}'",
                input
            )));
        }

        match trimmed.parse::<i64>() {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(IdError::InvalidInput(format!(
                "file id out of range: '{}'",
                input
            ))),
        }
    }

    /// Returns the raw integer value.
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileId::parse(s)
    }
}

/// Allocates strictly increasing [`FileId`]s.
///
/// The generator remembers the last identity it issued. Each new identity is the current time
/// in milliseconds, bumped if necessary so that it is greater than both the last issued value
/// and a caller-supplied floor (normally the largest identity already persisted).
///
/// Call it **inside the metadata store's write lock**; the floor is only reliable there.
#[derive(Debug, Default)]
pub struct FileIdGenerator {
    last: Option<FileId>,
}

impl FileIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an identity for an upload happening now.
    pub fn next(&mut self, floor: Option<FileId>) -> FileId {
        self.next_at(Utc::now(), floor)
    }

    /// Allocates an identity for an upload happening at `now`.
    pub fn next_at(&mut self, now: DateTime<Utc>, floor: Option<FileId>) -> FileId {
        let id = Self::generate(now, self.last, floor);
        self.last = Some(id);
        id
    }

    /// Pure allocation rule.
    ///
    /// The result is `now` in milliseconds, or one more than the largest of `last` and
    /// `floor` when the clock has not moved past them.
    pub fn generate(now: DateTime<Utc>, last: Option<FileId>, floor: Option<FileId>) -> FileId {
        let candidate = now.timestamp_millis().max(1);
        let highest = last.max(floor).map(FileId::value).unwrap_or(0);

        if candidate > highest {
            FileId(candidate)
        } else {
            FileId(highest.saturating_add(1))
        }
    }

    /// Returns the identity issued most recently by this generator.
    pub fn last(&self) -> Option<FileId> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_parse_valid_id() {
        let id = FileId::parse("1718099200123").unwrap();
        assert_eq!(id.value(), 1_718_099_200_123);
        assert_eq!(id.to_string(), "1718099200123");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(FileId::parse(" 42 ").unwrap().value(), 42);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        for input in ["", "abc", "12a", "-5", "+5", "1.5", "NaN"] {
            let result = FileId::parse(input);
            assert!(result.is_err(), "expected '{}' to be rejected", input);
        }
    }

    #[test]
    fn test_parse_rejects_zero_and_overflow() {
        assert!(FileId::parse("0").is_err());
        assert!(FileId::parse("99999999999999999999999").is_err());
    }

    #[test]
    fn test_generate_uses_clock_when_ahead() {
        let id = FileIdGenerator::generate(at(5_000), Some(FileId(4_000)), Some(FileId(3_000)));
        assert_eq!(id.value(), 5_000);
    }

    #[test]
    fn test_generate_bumps_past_last_within_same_millisecond() {
        let id = FileIdGenerator::generate(at(5_000), Some(FileId(5_000)), None);
        assert_eq!(id.value(), 5_001);
    }

    #[test]
    fn test_generate_bumps_past_floor_when_clock_regresses() {
        let id = FileIdGenerator::generate(at(1_000), None, Some(FileId(9_000)));
        assert_eq!(id.value(), 9_001);
    }

    #[test]
    fn test_generator_is_strictly_monotonic() {
        let mut generator = FileIdGenerator::new();
        let now = at(10_000);

        let first = generator.next_at(now, None);
        let second = generator.next_at(now, None);
        let third = generator.next_at(now - Duration::milliseconds(50), None);

        assert!(first < second);
        assert!(second < third);
        assert_eq!(generator.last(), Some(third));
    }

    #[test]
    fn test_serde_is_transparent_integer() {
        let json = serde_json::to_string(&FileId(17)).unwrap();
        assert_eq!(json, "17");

        let back: FileId = serde_json::from_str("17").unwrap();
        assert_eq!(back, FileId(17));
    }
}
