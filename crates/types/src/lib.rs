//! Validated value types shared across the catalogue crates.

use std::fmt;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A rating between 0 and 5 inclusive.
///
/// Out-of-range input is clamped rather than rejected: `99` becomes 5 and `-3` becomes 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stars(u8);

impl Stars {
    pub const MAX: u8 = 5;

    /// Clamps any integer into the valid range.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, i64::from(Self::MAX)) as u8)
    }

    /// Reads the leading integer of `input`, the way form fields have always been read.
    ///
    /// Leading whitespace and one sign are accepted; parsing stops at the first non-digit.
    /// Returns `None` when no digit is found (for example `"abc"` or `""`).
    pub fn parse_leading_int(input: &str) -> Option<i64> {
        let s = input.trim_start();
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let end = digits
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(digits.len());
        if end == 0 {
            return None;
        }

        // Saturate rather than fail: anything this large clamps to MAX anyway.
        let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
        Some(if negative { -magnitude } else { magnitude })
    }

    /// Parses form input, returning `None` for non-numeric text.
    pub fn from_input(input: &str) -> Option<Self> {
        Self::parse_leading_int(input).map(Self::clamped)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Stars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Stars {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Stars {
    /// Accepts any JSON number or numeric string and clamps it; documents written by hand or
    /// by older revisions are not always in range.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct StarsVisitor;

        impl serde::de::Visitor<'_> for StarsVisitor {
            type Value = Stars;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a star rating")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Stars, E> {
                Ok(Stars::clamped(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Stars, E> {
                Ok(Stars::clamped(i64::try_from(v).unwrap_or(i64::MAX)))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Stars, E> {
                if v.is_nan() {
                    return Ok(Stars::default());
                }
                Ok(Stars::clamped(v.trunc() as i64))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Stars, E> {
                Ok(Stars::from_input(v).unwrap_or_default())
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Stars, E> {
                Ok(Stars::default())
            }
        }

        deserializer.deserialize_any(StarsVisitor)
    }
}

/// Normalises a tag list: trims each tag, drops empty ones and repeats, keeps first-seen order.
pub fn normalise_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_owned());
        }
    }
    out
}
