//! The language-keyed article catalog.
//!
//! A [`Catalog`] is built once from deserialised data, validated, and then
//! shared immutably by search, suggestions and the category filter.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::models::LanguageCatalog;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog defines no languages")]
    NoLanguages,

    #[error("default language '{0}' is not defined in the catalog")]
    UnknownDefault(String),

    #[error("[{language}] article #{index} has an empty {field}")]
    EmptyField {
        language: String,
        index: usize,
        field: &'static str,
    },

    #[error("[{language}] article url must be a site path starting with '/': {url}")]
    RelativeUrl { language: String, url: String },

    #[error("[{language}] duplicate article url: {url}")]
    DuplicateUrl { language: String, url: String },

    #[error("[{language}] category page for '{slug}' must start with '/': {path}")]
    RelativeCategoryPage {
        language: String,
        slug: String,
        path: String,
    },
}

/// Raw catalog file shape: `default_language` plus `[languages.<code>]` tables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogFile {
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageCatalog>,
}

fn default_language() -> String {
    "en".to_string()
}

/// A non-fatal inconsistency between language variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftNote {
    /// A language lists a different number of articles than the default one.
    ArticleCount {
        language: String,
        count: usize,
        default_count: usize,
    },
    /// The same title appears more than once within a language.
    DuplicateTitle { language: String, title: String },
}

impl std::fmt::Display for DriftNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftNote::ArticleCount {
                language,
                count,
                default_count,
            } => write!(
                f,
                "[{}] lists {} articles, default language lists {}",
                language, count, default_count
            ),
            DriftNote::DuplicateTitle { language, title } => {
                write!(f, "[{}] duplicate title: {}", language, title)
            }
        }
    }
}

/// Validated, immutable article catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    default_language: String,
    languages: BTreeMap<String, LanguageCatalog>,
}

impl Catalog {
    pub fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        Self::new(file.default_language, file.languages)
    }

    pub fn new(
        default_language: String,
        languages: BTreeMap<String, LanguageCatalog>,
    ) -> Result<Self, CatalogError> {
        if languages.is_empty() {
            return Err(CatalogError::NoLanguages);
        }
        if !languages.contains_key(&default_language) {
            return Err(CatalogError::UnknownDefault(default_language));
        }
        for (code, lang) in &languages {
            validate_language(code, lang)?;
        }
        Ok(Self {
            default_language,
            languages,
        })
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn language(&self, code: &str) -> Option<&LanguageCatalog> {
        self.languages.get(code)
    }

    /// The requested language, or the default one when `code` is `None`.
    pub fn resolve(&self, code: Option<&str>) -> Option<&LanguageCatalog> {
        self.language(code.unwrap_or(&self.default_language))
    }

    pub fn languages(&self) -> impl Iterator<Item = (&str, &LanguageCatalog)> {
        self.languages.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Report drift between language variants. Never fails.
    pub fn drift(&self) -> Vec<DriftNote> {
        let mut notes = Vec::new();
        let default_count = self.languages[&self.default_language].articles.len();
        for (code, lang) in &self.languages {
            if code != &self.default_language && lang.articles.len() != default_count {
                notes.push(DriftNote::ArticleCount {
                    language: code.clone(),
                    count: lang.articles.len(),
                    default_count,
                });
            }
            let mut seen = HashSet::new();
            for a in &lang.articles {
                if !seen.insert(a.title.as_str()) {
                    notes.push(DriftNote::DuplicateTitle {
                        language: code.clone(),
                        title: a.title.clone(),
                    });
                }
            }
        }
        notes
    }
}

fn validate_language(code: &str, lang: &LanguageCatalog) -> Result<(), CatalogError> {
    let mut urls = HashSet::new();
    for (index, a) in lang.articles.iter().enumerate() {
        for (field, value) in [
            ("title", &a.title),
            ("category", &a.category),
            ("url", &a.url),
        ] {
            if value.trim().is_empty() {
                return Err(CatalogError::EmptyField {
                    language: code.to_string(),
                    index,
                    field,
                });
            }
        }
        if !a.url.starts_with('/') {
            return Err(CatalogError::RelativeUrl {
                language: code.to_string(),
                url: a.url.clone(),
            });
        }
        if !urls.insert(a.url.as_str()) {
            return Err(CatalogError::DuplicateUrl {
                language: code.to_string(),
                url: a.url.clone(),
            });
        }
    }
    for (slug, path) in &lang.category_pages {
        if !path.starts_with('/') {
            return Err(CatalogError::RelativeCategoryPage {
                language: code.to_string(),
                slug: slug.clone(),
                path: path.clone(),
            });
        }
    }
    Ok(())
}
