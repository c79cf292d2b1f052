//! BCP-47 locale identifiers.
//!
//! Catalog lookups and vocabulary cache keys must be case-insensitive, so
//! every locale is normalized on construction: lowercase language subtag,
//! uppercase region subtag (`en-us` → `en-US`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized BCP-47 locale identifier such as `en-US` or `de-DE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    /// Creates a locale, normalizing subtag casing.
    pub fn new(identifier: &str) -> Self {
        let normalized = identifier
            .split(['-', '_'])
            .enumerate()
            .map(|(i, part)| {
                if i == 0 {
                    part.to_lowercase()
                } else if part.len() == 2 {
                    part.to_uppercase()
                } else {
                    part.to_lowercase()
                }
            })
            .collect::<Vec<_>>()
            .join("-");
        Self(normalized)
    }

    /// The normalized identifier, e.g. `en-US`.
    pub fn identifier(&self) -> &str {
        &self.0
    }

    /// The language subtag, e.g. `en`.
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Locale {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

impl From<&str> for Locale {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
