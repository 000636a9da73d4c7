//! `search`, `suggest` and `category` commands over the article catalog.

use anyhow::{Context, Result};
use bagsite_core::category::{filter_cards, route, scan_cards, CategoryRoute};
use bagsite_core::models::Messages;
use bagsite_core::search::SearchService;
use std::path::Path;

use crate::catalog::{language, load_catalog};
use crate::config::Config;
use crate::render::{HtmlView, TerminalView};

/// Run a submitted query. Queries under two characters print nothing.
pub fn run_search(config: &Config, query: &str, lang: Option<&str>, html: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    let lang = language(&catalog, lang)?;
    let service = SearchService::new(lang);

    if html {
        let mut view = HtmlView::new(&lang.messages);
        service.submit(query, &mut view);
        print!("{}", view.render());
    } else {
        let mut view = TerminalView::new(&lang.messages);
        service.submit(query, &mut view);
        print!("{}", view.into_output());
    }
    Ok(())
}

/// Type-ahead: suggestions plus results, as the search box shows them
/// while typing.
pub fn run_suggest(config: &Config, query: &str, lang: Option<&str>, html: bool) -> Result<()> {
    let catalog = load_catalog(config)?;
    let lang = language(&catalog, lang)?;
    let service = SearchService::new(lang);

    let output = if html {
        let mut view = HtmlView::new(&lang.messages);
        service.handle_input(query, &mut view);
        view.render()
    } else {
        let mut view = TerminalView::new(&lang.messages);
        service.handle_input(query, &mut view);
        view.into_output()
    };
    if output.is_empty() {
        tracing::debug!(query, "nothing to show");
    }
    print!("{}", output);
    Ok(())
}

/// Resolve a category filter click. With `page`, the filter is also applied
/// to the cards of that listing page.
pub fn run_category(
    config: &Config,
    category: &str,
    lang: Option<&str>,
    page: Option<&Path>,
) -> Result<()> {
    let catalog = load_catalog(config)?;
    let lang = language(&catalog, lang)?;

    match route(lang, category) {
        CategoryRoute::Navigate(path) => println!("Navigate: {}", path),
        CategoryRoute::FilterInPlace => println!("Filter in place: {}", category),
        CategoryRoute::Ignore => println!("Unknown category '{}': nothing to do", category),
    }

    let Some(page) = page else {
        return Ok(());
    };
    let html = std::fs::read_to_string(page)
        .with_context(|| format!("Failed to read {}", page.display()))?;
    let cards = scan_cards(&html);
    let outcome = filter_cards(&cards, category);

    println!(
        "{} of {} cards visible in {}",
        outcome.visible_count(),
        cards.len(),
        page.display()
    );
    for (card, visible) in cards.iter().zip(&outcome.visible) {
        println!(
            "  {} {}",
            if *visible { "show" } else { "hide" },
            card.category.as_deref().unwrap_or("-")
        );
    }
    if !outcome.any_visible {
        println!(
            "{}",
            Messages::render(&lang.messages.no_category, &[("category", category)])
        );
    }
    Ok(())
}
