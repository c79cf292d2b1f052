//! Custom vocabulary descriptors.
//!
//! A vocabulary biases the recognition engine toward domain phrases and
//! supplies pronunciations for terms the engine would otherwise mangle.
//! Compiling one into an engine artifact is expensive, so the descriptor
//! produces a stable content-derived cache key: identical content yields
//! the same key regardless of construction order, and any field change
//! yields a different key.

use crate::error::{Result, SessionError};
use crate::locale::Locale;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A phrase the engine should be biased toward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseCount {
    /// The phrase text.
    pub phrase: String,
    /// How often the phrase is expected, relative to ordinary speech.
    pub count: u32,
}

/// A written form paired with its phonetic rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pronunciation {
    /// The written form, e.g. `GQL`.
    pub written: String,
    /// The phonetic form, e.g. `gee kyoo ell`.
    pub phonetic: String,
}

/// Descriptor for a custom vocabulary to be compiled into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomVocabulary {
    /// Locale the vocabulary applies to.
    pub locale: Locale,
    /// Stable caller-chosen identifier.
    pub identifier: String,
    /// Caller-managed version, bumped on semantic changes.
    pub version: String,
    /// Bias weight in `0.0..=1.0`.
    pub weight: f32,
    /// Biased phrases with expected repetition counts.
    pub phrases: Vec<PhraseCount>,
    /// Written/phonetic pairs.
    pub pronunciations: Vec<Pronunciation>,
}

impl CustomVocabulary {
    /// Creates an empty vocabulary for a locale.
    pub fn new(locale: impl Into<Locale>, identifier: &str, version: &str, weight: f32) -> Self {
        Self {
            locale: locale.into(),
            identifier: identifier.to_string(),
            version: version.to_string(),
            weight,
            phrases: Vec::new(),
            pronunciations: Vec::new(),
        }
    }

    /// Adds a biased phrase.
    pub fn with_phrase(mut self, phrase: &str, count: u32) -> Self {
        self.phrases.push(PhraseCount {
            phrase: phrase.to_string(),
            count,
        });
        self
    }

    /// Adds a pronunciation pair.
    pub fn with_pronunciation(mut self, written: &str, phonetic: &str) -> Self {
        self.pronunciations.push(Pronunciation {
            written: written.to_string(),
            phonetic: phonetic.to_string(),
        });
        self
    }

    /// Validates the descriptor before it is handed to the engine.
    pub fn validate(&self) -> Result<()> {
        if self.identifier.is_empty() {
            return Err(SessionError::VocabularyInvalid {
                message: "identifier must not be empty".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.weight) {
            return Err(SessionError::VocabularyInvalid {
                message: format!("weight {} is outside 0.0..=1.0", self.weight),
            });
        }
        if self.phrases.iter().any(|p| p.phrase.is_empty()) {
            return Err(SessionError::VocabularyInvalid {
                message: "phrases must not be empty strings".to_string(),
            });
        }
        Ok(())
    }

    /// Stable content-derived cache key (hex SHA-256 over normalized fields).
    ///
    /// Phrase and pronunciation lists are sorted before hashing so two
    /// descriptors with the same content but different construction order
    /// produce the same key.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.locale.identifier().as_bytes());
        hasher.update([0]);
        hasher.update(self.identifier.as_bytes());
        hasher.update([0]);
        hasher.update(self.version.as_bytes());
        hasher.update([0]);
        hasher.update(self.weight.to_bits().to_le_bytes());

        let mut phrases: Vec<&PhraseCount> = self.phrases.iter().collect();
        phrases.sort_by(|a, b| a.phrase.cmp(&b.phrase).then(a.count.cmp(&b.count)));
        for p in phrases {
            hasher.update([1]);
            hasher.update(p.phrase.as_bytes());
            hasher.update([0]);
            hasher.update(p.count.to_le_bytes());
        }

        let mut prons: Vec<&Pronunciation> = self.pronunciations.iter().collect();
        prons.sort_by(|a, b| a.written.cmp(&b.written).then(a.phonetic.cmp(&b.phonetic)));
        for p in prons {
            hasher.update([2]);
            hasher.update(p.written.as_bytes());
            hasher.update([0]);
            hasher.update(p.phonetic.as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}
