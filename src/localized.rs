use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// A single localized entry: either a scalar string (names, descriptions) or
/// a list of strings (step-by-step instructions).
///
/// Serialized untagged, so documents store a plain JSON string or array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedValue {
    Text(String),
    Lines(Vec<String>),
}

impl LocalizedValue {
    pub fn text(value: impl Into<String>) -> Self {
        LocalizedValue::Text(value.into())
    }

    pub fn lines<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LocalizedValue::Lines(values.into_iter().map(Into::into).collect())
    }

    /// An entry with no displayable content: an empty string, or a list with
    /// no non-empty elements.
    pub fn is_empty(&self) -> bool {
        match self {
            LocalizedValue::Text(text) => text.trim().is_empty(),
            LocalizedValue::Lines(lines) => lines.iter().all(|line| line.trim().is_empty()),
        }
    }
}

/// The stored shape of a multilingual field: language code -> value.
///
/// Keys are raw strings because they arrive from persisted documents;
/// [`is_valid`] is the gate that keeps them inside the supported set.
pub type LocalizedMap = BTreeMap<String, LocalizedValue>;

/// Document-level field validator. Returns `false` if the map carries any key
/// outside the supported-language set; the empty map is valid.
pub fn is_valid(map: &LocalizedMap) -> bool {
    map.keys().all(|code| Language::is_supported_code(code))
}

/// Produces a map with every supported language populated with `default`.
///
/// Used to initialize optional localized fields so later partial updates
/// never have to special-case absent keys.
pub fn build_default(default: &LocalizedValue) -> LocalizedMap {
    Language::ALL
        .iter()
        .map(|lang| (lang.code().to_string(), default.clone()))
        .collect()
}

/// Resolves the value to display for `viewer`.
///
/// Falls back viewer -> `original` -> `en` -> empty string, skipping entries
/// with no content. Translation is asynchronous, so a document read right
/// after creation must still render the authored text for every viewer.
pub fn resolve(map: &LocalizedMap, original: Language, viewer: Language) -> LocalizedValue {
    for lang in [viewer, original, Language::FALLBACK] {
        if let Some(value) = map.get(lang.code()) {
            if !value.is_empty() {
                return value.clone();
            }
        }
    }
    LocalizedValue::Text(String::new())
}
