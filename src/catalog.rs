//! Catalog file loading, `catalog check` and `index export`.

use anyhow::{bail, Context, Result};
use bagsite_core::catalog::{Catalog, CatalogFile};
use bagsite_core::models::{ArticleRecord, LanguageCatalog};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;

/// Read, parse and validate the catalog named by `catalog.path`.
pub fn load_catalog(config: &Config) -> Result<Catalog> {
    let path = &config.catalog.path;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    parse_catalog(&content, config.catalog.default_language.as_deref())
        .with_context(|| format!("Invalid catalog: {}", path.display()))
}

pub fn parse_catalog(content: &str, default_override: Option<&str>) -> Result<Catalog> {
    let mut file: CatalogFile = toml::from_str(content).context("Failed to parse catalog TOML")?;
    if let Some(lang) = default_override {
        file.default_language = lang.to_string();
    }
    let catalog = Catalog::from_file(file)?;
    for note in catalog.drift() {
        tracing::warn!("catalog drift: {}", note);
    }
    Ok(catalog)
}

/// The requested language, or the default; unknown codes are an error.
pub fn language<'a>(catalog: &'a Catalog, code: Option<&str>) -> Result<&'a LanguageCatalog> {
    match catalog.resolve(code) {
        Some(lang) => Ok(lang),
        None => bail!(
            "Unknown language '{}'. Available: {}",
            code.unwrap_or(catalog.default_language()),
            catalog
                .languages()
                .map(|(c, _)| c)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

pub fn run_check(config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;
    println!("Catalog OK: {}", config.catalog.path.display());
    println!("  default language: {}", catalog.default_language());
    for (code, lang) in catalog.languages() {
        println!(
            "  [{}] {} articles, {} popular terms, {} category pages",
            code,
            lang.articles.len(),
            lang.popular_terms.len(),
            lang.category_pages.len()
        );
    }
    let drift = catalog.drift();
    if !drift.is_empty() {
        println!("\nWarnings:");
        for note in drift {
            println!("  - {}", note);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct LanguageIndex<'a> {
    language: &'a str,
    articles: &'a [ArticleRecord],
    popular_terms: &'a [String],
    category_pages: &'a BTreeMap<String, String>,
}

impl<'a> LanguageIndex<'a> {
    fn new(language: &'a str, lang: &'a LanguageCatalog) -> Self {
        Self {
            language,
            articles: &lang.articles,
            popular_terms: &lang.popular_terms,
            category_pages: &lang.category_pages,
        }
    }
}

#[derive(Serialize)]
struct FullIndex<'a> {
    default_language: &'a str,
    languages: Vec<LanguageIndex<'a>>,
}

/// JSON search index for one language, or every language when `code` is
/// `None`.
pub fn export_json(catalog: &Catalog, code: Option<&str>) -> Result<String> {
    let json = match code {
        Some(c) => {
            let lang = language(catalog, Some(c))?;
            serde_json::to_string_pretty(&LanguageIndex::new(c, lang))?
        }
        None => serde_json::to_string_pretty(&FullIndex {
            default_language: catalog.default_language(),
            languages: catalog
                .languages()
                .map(|(c, l)| LanguageIndex::new(c, l))
                .collect(),
        })?,
    };
    Ok(json)
}

/// Write the index to `output`, or stdout when `None`.
pub fn run_export(config: &Config, code: Option<&str>, output: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(config)?;
    let json = export_json(&catalog, code)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let count: usize = match code {
                Some(c) => language(&catalog, Some(c))?.articles.len(),
                None => catalog.languages().map(|(_, l)| l.articles.len()).sum(),
            };
            eprintln!("Exported {} articles to {}", count, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
