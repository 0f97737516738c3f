//! Language handling for the seven ODS loading languages.
//!
//! The loading API represents per-language data as positional arrays in a
//! fixed order. That ordering is confined to the wire layer; everywhere else
//! languages are an explicit enum and per-language data lives in a
//! [`LanguageMap`] keyed by it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the seven languages a document can be loaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "AR")]
    Ar,
    #[serde(rename = "ZH")]
    Zh,
    #[serde(rename = "EN")]
    En,
    #[serde(rename = "FR")]
    Fr,
    #[serde(rename = "RU")]
    Ru,
    #[serde(rename = "ES")]
    Es,
    #[serde(rename = "DE")]
    De,
}

impl Language {
    /// All languages, in the loading API's wire order.
    pub const ALL: [Language; 7] = [
        Language::Ar,
        Language::Zh,
        Language::En,
        Language::Fr,
        Language::Ru,
        Language::Es,
        Language::De,
    ];

    /// Two-letter uppercase code used on the wire and in filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ar => "AR",
            Language::Zh => "ZH",
            Language::En => "EN",
            Language::Fr => "FR",
            Language::Ru => "RU",
            Language::Es => "ES",
            Language::De => "DE",
        }
    }

    /// Position of this language in the wire order.
    pub fn index(&self) -> usize {
        match self {
            Language::Ar => 0,
            Language::Zh => 1,
            Language::En => 2,
            Language::Fr => 3,
            Language::Ru => 4,
            Language::Es => 5,
            Language::De => 6,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AR" => Ok(Language::Ar),
            "ZH" => Ok(Language::Zh),
            "EN" => Ok(Language::En),
            "FR" => Ok(Language::Fr),
            "RU" => Ok(Language::Ru),
            "ES" => Ok(Language::Es),
            "DE" => Ok(Language::De),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized language code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language code: {0}")]
pub struct UnknownLanguage(pub String);

/// Fixed-size container with one slot per [`Language`].
///
/// Replaces the positional seven-element arrays of the loading API with
/// indexing that cannot silently misassign a language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageMap<T>([T; 7]);

impl<T> LanguageMap<T> {
    /// Build a map by calling `f` for each language in wire order.
    pub fn from_fn(mut f: impl FnMut(Language) -> T) -> Self {
        Self(Language::ALL.map(&mut f))
    }

    pub fn get(&self, language: Language) -> &T {
        &self.0[language.index()]
    }

    pub fn get_mut(&mut self, language: Language) -> &mut T {
        &mut self.0[language.index()]
    }

    pub fn set(&mut self, language: Language, value: T) {
        self.0[language.index()] = value;
    }

    /// Iterate `(language, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Language, &T)> {
        Language::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Language, &T) -> U) -> LanguageMap<U> {
        LanguageMap::from_fn(|lang| f(lang, self.get(lang)))
    }

    /// Consume a positional wire array, trusting the fixed wire order.
    pub fn from_wire(values: [T; 7]) -> Self {
        Self(values)
    }

    /// Render back to the positional wire order.
    pub fn into_wire(self) -> [T; 7] {
        self.0
    }
}

impl<T: Default> Default for LanguageMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}
