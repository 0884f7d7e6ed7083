use crate::vocabulary::{ParameterId, VOCABULARY};
use ahash::AHashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// A raw parameter name with no entry in the canonical vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kinematic parameter '{raw}' has no canonical mapping")]
pub struct UnknownParameterError {
    pub raw: String,
}

/// Normalized spelling -> canonical id. Built once from the vocabulary table.
static LOOKUP: LazyLock<AHashMap<String, ParameterId>> = LazyLock::new(|| {
    let mut lookup = AHashMap::with_capacity(VOCABULARY.len() * 2);
    for entry in VOCABULARY.iter() {
        lookup.insert(normalize_name(entry.canonical), entry.id);
        for alias in entry.aliases {
            lookup.insert(normalize_name(alias), entry.id);
        }
    }
    lookup
});

/// Lowercases and keeps only ASCII alphanumerics, so `Mean Amplitude`,
/// `mean_amplitude` and `MEANAMPLITUDE` all collapse to `meanamplitude`.
pub fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Maps a raw parameter name onto its canonical [`ParameterId`].
pub fn standardize(raw: &str) -> Result<ParameterId, UnknownParameterError> {
    LOOKUP
        .get(&normalize_name(raw))
        .copied()
        .ok_or_else(|| UnknownParameterError {
            raw: raw.to_string(),
        })
}
