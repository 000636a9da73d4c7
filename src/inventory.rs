//! URL inventory: every published HTML file with its public URL and language.

use anyhow::Result;
use bagsite_core::models::Language;
use bagsite_core::urls::{language_of, public_url};
use serde::Serialize;

use crate::config::Config;
use crate::walk::{html_files, SiteFile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub file: String,
    pub url: String,
    pub language: Language,
}

/// Entries sorted by language, then URL.
pub fn build(files: &[SiteFile], origin: &str) -> Vec<InventoryEntry> {
    let mut entries: Vec<InventoryEntry> = files
        .iter()
        .map(|f| {
            let url = public_url(origin, &f.relative);
            InventoryEntry {
                file: f.relative.clone(),
                language: language_of(&url),
                url,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.language.cmp(&b.language).then_with(|| a.url.cmp(&b.url)));
    entries
}

pub fn run_inventory(config: &Config, json: bool) -> Result<()> {
    let files = html_files(config)?;
    let entries = build(&files, config.origin());

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for language in [Language::En, Language::Es] {
        let group: Vec<&InventoryEntry> =
            entries.iter().filter(|e| e.language == language).collect();
        println!("{} ({} pages)", language, group.len());
        for e in group {
            println!("  {}", e.url);
            println!("    file: {}", e.file);
        }
        println!();
    }
    println!("Total: {} pages", entries.len());
    Ok(())
}
