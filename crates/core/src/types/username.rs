//! Public username type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// Shorter than the minimum length.
    #[error("username must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// Longer than the maximum length.
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Contains a character outside `[A-Za-z0-9_.-]`.
    #[error("username may only contain letters, digits, '_', '.' and '-'")]
    InvalidCharacter,
}

/// A public handle shown on listings and chat.
///
/// Case is preserved; uniqueness is not enforced (emails are the unique key).
///
/// ```
/// use wanderlance_core::Username;
///
/// assert!(Username::parse("globe_trotter").is_ok());
/// assert!(Username::parse("ab").is_err());
/// assert!(Username::parse("no spaces").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Minimum length in characters.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum length in characters.
    pub const MAX_LENGTH: usize = 30;

    /// Parse a `Username` from a string (surrounding whitespace is trimmed).
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is too short, too long, or
    /// contains characters outside `[A-Za-z0-9_.-]`.
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        let s = s.trim();
        let len = s.chars().count();

        if len < Self::MIN_LENGTH {
            return Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(UsernameError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Build a valid username from arbitrary text (an OAuth login or an
    /// email local part), replacing disallowed characters and padding or
    /// truncating to fit the length bounds.
    #[must_use]
    pub fn sanitize(raw: &str) -> Self {
        let mut cleaned: String = raw
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .take(Self::MAX_LENGTH)
            .collect();

        while cleaned.len() < Self::MIN_LENGTH {
            cleaned.push('_');
        }

        Self(cleaned)
    }

    /// Append a numeric suffix, truncating the base so the result stays valid.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        let suffix = n.to_string();
        let keep = Self::MAX_LENGTH.saturating_sub(suffix.len());
        let base: String = self.0.chars().take(keep).collect();
        Self(format!("{base}{suffix}"))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Username` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Username {
    type Err = UsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Username::parse("abc").is_ok());
        assert!(Username::parse("jane.doe-99").is_ok());
        assert_eq!(Username::parse("  Nomad_1 ").unwrap().as_str(), "Nomad_1");
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!(
            Username::parse("ab"),
            Err(UsernameError::TooShort { min: 3 })
        );
        assert_eq!(
            Username::parse(&"a".repeat(31)),
            Err(UsernameError::TooLong { max: 30 })
        );
    }

    #[test]
    fn test_parse_invalid_character() {
        assert_eq!(
            Username::parse("jane@doe"),
            Err(UsernameError::InvalidCharacter)
        );
    }

    #[test]
    fn test_sanitize_produces_valid_username() {
        let name = Username::sanitize("José Martín");
        assert!(Username::parse(name.as_str()).is_ok());
        assert_eq!(name.as_str(), "Jos__Mart_n");

        let short = Username::sanitize("x");
        assert_eq!(short.as_str(), "x__");
    }

    #[test]
    fn test_with_suffix_stays_within_bounds() {
        let long = Username::parse(&"a".repeat(30)).unwrap();
        let suffixed = long.with_suffix(12);
        assert_eq!(suffixed.as_str().len(), 30);
        assert!(suffixed.as_str().ends_with("12"));
        assert!(Username::parse(suffixed.as_str()).is_ok());
    }
}
