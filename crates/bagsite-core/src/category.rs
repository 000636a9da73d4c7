//! Category filter for pre-rendered article cards.

use scraper::{Html, Selector};

use crate::models::LanguageCatalog;

/// Filter values that show every card instead of navigating away.
pub const SHOW_ALL: [&str; 2] = ["all", "todos"];

pub fn is_show_all(category: &str) -> bool {
    SHOW_ALL.iter().any(|c| c.eq_ignore_ascii_case(category))
}

/// An article card as found in a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Value of `data-category`, if the card carries one.
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Visibility per input card, same order.
    pub visible: Vec<bool>,
    /// False when a specific category hid every card; the page then shows
    /// its "no articles in this category" notice.
    pub any_visible: bool,
}

impl FilterOutcome {
    pub fn visible_count(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }
}

/// Show every card for a show-all filter, otherwise only cards whose
/// `data-category` equals `active`.
pub fn filter_cards(cards: &[Card], active: &str) -> FilterOutcome {
    let show_all = is_show_all(active);
    let visible: Vec<bool> = cards
        .iter()
        .map(|c| show_all || c.category.as_deref() == Some(active))
        .collect();
    let any_visible = show_all || visible.iter().any(|v| *v);
    FilterOutcome {
        visible,
        any_visible,
    }
}

/// What clicking a filter button does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRoute<'a> {
    /// Filter the cards already on the page.
    FilterInPlace,
    /// Go to the category's dedicated page.
    Navigate(&'a str),
    /// Unknown slug; the button does nothing.
    Ignore,
}

pub fn route<'a>(catalog: &'a LanguageCatalog, category: &str) -> CategoryRoute<'a> {
    if is_show_all(category) {
        return CategoryRoute::FilterInPlace;
    }
    match catalog.category_pages.get(category) {
        Some(page) => CategoryRoute::Navigate(page.as_str()),
        None => CategoryRoute::Ignore,
    }
}

/// Article cards (`class="… article-card …"`) in a listing page, in
/// document order.
pub fn scan_cards(html: &str) -> Vec<Card> {
    let doc = Html::parse_document(html);
    let cards = Selector::parse("article.article-card, div.article-card")
        .expect("card selector is valid");
    doc.select(&cards)
        .map(|el| Card {
            category: el.value().attr("data-category").map(str::to_string),
        })
        .collect()
}
