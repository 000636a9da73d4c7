//! Core data models shared by the catalog, search and widget code.
//!
//! Records are authored by hand in the catalog file and never mutated after
//! loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One product-review article as listed in the site's search table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    /// Site path, e.g. `/articles/minimalist-daily-bag-2025/`.
    pub url: String,
    /// Site path or absolute URL of the card image.
    #[serde(default)]
    pub image: String,
    /// Display date, kept verbatim ("15 Enero 2025").
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArticleRecord {
    /// Lowercased title, description, category and tags joined by spaces.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(3 + self.tags.len());
        parts.push(self.title.to_lowercase());
        parts.push(self.description.to_lowercase());
        parts.push(self.category.to_lowercase());
        parts.extend(self.tags.iter().map(|t| t.to_lowercase()));
        parts.join(" ")
    }
}

/// User-facing strings for one language. Templates use `{query}`,
/// `{count}` and `{category}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub results: String,
    pub no_results: String,
    pub suggested_intro: String,
    pub articles_heading: String,
    pub terms_heading: String,
    pub no_category: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            results: "{count} results for \"{query}\"".to_string(),
            no_results: "No articles found for \"{query}\"".to_string(),
            suggested_intro: "You might like these related articles:".to_string(),
            articles_heading: "Articles".to_string(),
            terms_heading: "Popular searches".to_string(),
            no_category: "No articles available in the \"{category}\" category".to_string(),
        }
    }
}

impl Messages {
    /// Substitute `{name}` placeholders in a template.
    pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
        let mut out = template.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{}}}", name), value);
        }
        out
    }
}

/// Everything the site shows for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCatalog {
    #[serde(default)]
    pub articles: Vec<ArticleRecord>,
    #[serde(default)]
    pub popular_terms: Vec<String>,
    /// Category slug -> dedicated category page path.
    #[serde(default)]
    pub category_pages: BTreeMap<String, String>,
    #[serde(default)]
    pub messages: Messages,
}

/// Language-neutral URL classification used by inventory and audits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    En,
    Es,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Language::En => "EN",
            Language::Es => "ES",
        })
    }
}
