//! Session identifier type.

use std::fmt;
use std::str::FromStr;

use rand::distr::Alphanumeric;
use rand::Rng;

/// Required length of a session id.
pub const ID_LENGTH: usize = 40;

/// Unique identifier for a session.
///
/// A session id is exactly 40 alphanumeric characters. The type can only
/// hold a valid id: parsing rejects anything else, and [`SessionId::generate`]
/// draws fresh ids from a cryptographically seeded RNG. Ids are opaque to
/// every backend; they double as file names, table keys, cache keys, and
/// cookie names depending on the handler in use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random session id.
    pub fn generate() -> Self {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LENGTH)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Parse a candidate string, returning `None` unless it is exactly
    /// 40 alphanumeric characters.
    pub fn parse(candidate: &str) -> Option<Self> {
        if Self::is_valid(candidate) {
            Some(Self(candidate.to_string()))
        } else {
            None
        }
    }

    /// Check whether a candidate string is a well-formed session id.
    pub fn is_valid(candidate: &str) -> bool {
        candidate.len() == ID_LENGTH && candidate.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = InvalidSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(InvalidSessionId)
    }
}

/// Error returned when parsing a malformed session id.
///
/// Most callers never see this: [`Store::set_id`](crate::Store::set_id)
/// swaps malformed input for a fresh id instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSessionId;

impl fmt::Display for InvalidSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("session id must be exactly 40 alphanumeric characters")
    }
}

impl std::error::Error for InvalidSessionId {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..100 {
            let id = SessionId::generate();
            assert!(SessionId::is_valid(id.as_str()), "invalid id: {}", id);
        }
    }

    #[test]
    fn test_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = SessionId::generate();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {}", id);
        }
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_parse_valid() {
        let raw = "a".repeat(40);
        let id = SessionId::parse(&raw).unwrap();
        assert_eq!(id.as_str(), raw);

        let mixed = "aA1".repeat(13) + "z";
        assert!(SessionId::parse(&mixed).is_some());
    }

    #[test]
    fn test_parse_invalid() {
        // Too short
        assert!(SessionId::parse("short").is_none());

        // Too long
        assert!(SessionId::parse(&"a".repeat(41)).is_none());

        // Right length, bad characters
        assert!(SessionId::parse(&"-".repeat(40)).is_none());
        assert!(SessionId::parse(&("a".repeat(39) + "!")).is_none());

        // Empty
        assert!(SessionId::parse("").is_none());
    }

    #[test]
    fn test_non_ascii_rejected() {
        // 'é' is alphanumeric to char::is_alphanumeric but not a valid
        // session id byte.
        let candidate = "é".repeat(20);
        assert!(SessionId::parse(&candidate).is_none());
    }

    #[test]
    fn test_from_str_roundtrip() {
        let original = SessionId::generate();
        let parsed: SessionId = original.as_str().parse().unwrap();
        assert_eq!(original, parsed);

        assert!("not-an-id".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_display_matches_as_str() {
        let id = SessionId::generate();
        assert_eq!(id.to_string(), id.as_str());
    }
}
