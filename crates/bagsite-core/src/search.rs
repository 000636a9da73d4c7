//! Article search over one language of the catalog.
//!
//! # Matching
//!
//! 1. The query is trimmed and lowercased.
//! 2. Primary pass: the whole query is a substring of the article's
//!    [searchable text](crate::models::ArticleRecord::searchable_text).
//! 3. Secondary pass: the query is split into words longer than
//!    [`MIN_WORD_CHARS`]; an article matches if any of them is a substring of
//!    any word of the searchable text. This catches plurals and partials.
//!
//! # Fallback ranking
//!
//! When nothing matches, every article is scored per query word:
//! +2 when the word is in the title, +1 when it is in the category, and +1
//! when it only appears elsewhere (description or tags). Articles are sorted
//! by score with a stable sort, so ties keep table order, and the top
//! [`SUGGESTED_LIMIT`] are returned. If every score is zero the first
//! [`SUGGESTED_LIMIT`] articles of the table are returned instead.

use crate::models::{ArticleRecord, LanguageCatalog};
use crate::suggest::{self, Suggestions};
use crate::view::SearchView;

/// Queries shorter than this (in characters) do not run a search.
pub const MIN_QUERY_CHARS: usize = 2;
/// Query words must be longer than this to take part in the word pass.
pub const MIN_WORD_CHARS: usize = 2;
/// Size of the "suggested articles" list shown when nothing matches.
pub const SUGGESTED_LIMIT: usize = 4;

/// An article with its fallback relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredArticle<'a> {
    pub article: &'a ArticleRecord,
    pub score: u32,
}

/// Result of running a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome<'a> {
    /// Query too short to search; nothing to render.
    TooShort,
    /// Articles that matched, in table order.
    Matches(Vec<&'a ArticleRecord>),
    /// Nothing matched; best-effort suggestions instead.
    Suggested(Vec<ScoredArticle<'a>>),
}

impl SearchOutcome<'_> {
    pub fn len(&self) -> usize {
        match self {
            SearchOutcome::TooShort => 0,
            SearchOutcome::Matches(m) => m.len(),
            SearchOutcome::Suggested(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Words of an already-normalised query that take part in word matching
/// and scoring.
pub fn query_words(query: &str) -> Vec<&str> {
    query
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_WORD_CHARS)
        .collect()
}

/// Whether `article` matches the normalised `query`.
pub fn matches(article: &ArticleRecord, query: &str) -> bool {
    let text = article.searchable_text();
    if text.contains(query) {
        return true;
    }
    let words = query_words(query);
    if words.is_empty() {
        return false;
    }
    text.split_whitespace()
        .any(|text_word| words.iter().any(|w| text_word.contains(w)))
}

/// Fallback relevance of `article` for the given query words.
pub fn relevance(article: &ArticleRecord, words: &[&str]) -> u32 {
    let title = article.title.to_lowercase();
    let category = article.category.to_lowercase();
    let text = article.searchable_text();

    words
        .iter()
        .map(|w| {
            let in_title = title.contains(w);
            let in_category = category.contains(w);
            let mut score = 0;
            if in_title {
                score += 2;
            }
            if in_category {
                score += 1;
            }
            if !in_title && !in_category && text.contains(w) {
                score += 1;
            }
            score
        })
        .sum()
}

/// Top [`SUGGESTED_LIMIT`] articles by relevance, or the head of the table
/// when nothing scores.
pub fn rank_fallback<'a>(articles: &'a [ArticleRecord], query: &str) -> Vec<ScoredArticle<'a>> {
    let words = query_words(query);
    let mut scored: Vec<ScoredArticle<'a>> = articles
        .iter()
        .map(|article| ScoredArticle {
            article,
            score: relevance(article, &words),
        })
        .collect();

    if scored.iter().all(|s| s.score == 0) {
        scored.truncate(SUGGESTED_LIMIT);
        return scored;
    }

    // `sort_by` is stable: equal scores keep table order.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(SUGGESTED_LIMIT);
    scored
}

/// Run a raw query against a list of articles.
pub fn search<'a>(articles: &'a [ArticleRecord], raw_query: &str) -> SearchOutcome<'a> {
    let query = normalize_query(raw_query);
    if query.chars().count() < MIN_QUERY_CHARS {
        return SearchOutcome::TooShort;
    }

    let found: Vec<&ArticleRecord> = articles.iter().filter(|a| matches(a, &query)).collect();
    if found.is_empty() {
        SearchOutcome::Suggested(rank_fallback(articles, &query))
    } else {
        SearchOutcome::Matches(found)
    }
}

/// Search and suggestions bound to one immutable language catalog.
#[derive(Debug, Clone, Copy)]
pub struct SearchService<'a> {
    catalog: &'a LanguageCatalog,
}

impl<'a> SearchService<'a> {
    pub fn new(catalog: &'a LanguageCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a LanguageCatalog {
        self.catalog
    }

    pub fn search(&self, raw_query: &str) -> SearchOutcome<'a> {
        search(&self.catalog.articles, raw_query)
    }

    pub fn suggest(&self, raw_query: &str) -> Suggestions<'a> {
        suggest::suggest(self.catalog, raw_query)
    }

    /// Handle one settled input value the way the search box does:
    /// an empty query clears, one character shows suggestions only, two or
    /// more also runs the search.
    pub fn handle_input(&self, raw_query: &str, view: &mut dyn SearchView) {
        let query = normalize_query(raw_query);
        if query.is_empty() {
            view.clear();
            return;
        }

        let suggestions = self.suggest(&query);
        if suggestions.is_empty() {
            view.hide_suggestions();
        } else {
            view.show_suggestions(&query, &suggestions);
        }

        match self.search(&query) {
            SearchOutcome::TooShort => {}
            SearchOutcome::Matches(found) => view.show_results(&query, &found),
            SearchOutcome::Suggested(suggested) => view.show_suggested(&query, &suggested),
        }
    }

    /// Handle an explicit submit (button or Enter): search only.
    pub fn submit(&self, raw_query: &str, view: &mut dyn SearchView) {
        let query = normalize_query(raw_query);
        match self.search(&query) {
            SearchOutcome::TooShort => {}
            SearchOutcome::Matches(found) => {
                view.show_results(&query, &found);
                view.hide_suggestions();
            }
            SearchOutcome::Suggested(suggested) => {
                view.show_suggested(&query, &suggested);
                view.hide_suggestions();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(title: &str, category: &str, description: &str, tags: &[&str]) -> ArticleRecord {
        ArticleRecord {
            title: title.into(),
            description: description.into(),
            category: category.into(),
            url: format!("/{}/", title.to_lowercase().replace(' ', "-")),
            image: String::new(),
            date: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn table() -> Vec<ArticleRecord> {
        vec![
            rec(
                "Los 10 Mejores Bolsos de Mano 2025",
                "Bolsos de Mano",
                "Descubre los bolsos más elegantes",
                &["bolsos", "mano", "lujo"],
            ),
            rec(
                "Mejores Mochilas para Trabajo 2025",
                "Mochilas",
                "Comodidad y estilo",
                &["mochilas", "trabajo"],
            ),
            rec(
                "Top 5 Carteras para Mujeres Profesionales 2025",
                "Carteras",
                "Elegancia y funcionalidad",
                &["carteras", "profesionales"],
            ),
            rec(
                "Carteras Organizadoras: Guía Completa 2025",
                "Carteras",
                "Pertenencias organizadas",
                &["carteras", "organizadoras"],
            ),
            rec(
                "Mochilas para Laptop: Protección y Estilo 2025",
                "Mochilas",
                "Tu portátil seguro",
                &["laptop"],
            ),
        ]
    }

    #[test]
    fn short_queries_do_not_search() {
        let t = table();
        assert_eq!(search(&t, "m"), SearchOutcome::TooShort);
        assert_eq!(search(&t, "   "), SearchOutcome::TooShort);
    }

    #[test]
    fn substring_match_is_case_insensitive_and_trimmed() {
        let t = table();
        match search(&t, "  CARTERAS ") {
            SearchOutcome::Matches(found) => {
                assert_eq!(found.len(), 2);
                assert!(found.iter().all(|a| a.category == "Carteras"));
            }
            other => panic!("expected matches, got {:?}", other),
        }
    }

    #[test]
    fn word_pass_catches_partial_words() {
        let t = table();
        // Whole query is not a substring, but "mochila" is part of "mochilas".
        match search(&t, "mochila roja") {
            SearchOutcome::Matches(found) => assert_eq!(found.len(), 2),
            other => panic!("expected matches, got {:?}", other),
        }
    }

    #[test]
    fn short_words_are_ignored_by_word_pass() {
        let a = rec("Tote", "Totes", "", &[]);
        assert!(!matches(&a, "zz to"));
    }

    #[test]
    fn every_match_satisfies_one_of_the_passes() {
        let t = table();
        for q in ["bolsos", "trabajo 2025", "elegancia", "org", "laptop bag"] {
            let query = normalize_query(q);
            if let SearchOutcome::Matches(found) = search(&t, q) {
                for a in found {
                    let text = a.searchable_text();
                    let word_hit = query_words(&query).iter().any(|w| text.contains(w));
                    assert!(text.contains(&query) || word_hit, "{} / {}", q, a.title);
                }
            }
        }
    }

    #[test]
    fn relevance_worked_example() {
        let a = rec(
            "Mochilas para Laptop: Protección y Estilo 2025",
            "Mochilas",
            "",
            &[],
        );
        let q = normalize_query("mochilas laptop");
        assert_eq!(relevance(&a, &query_words(&q)), 5);
    }

    #[test]
    fn relevance_counts_description_and_tags_once() {
        let a = rec("Wallets", "Wallets", "slim rfid design", &["travel"]);
        assert_eq!(relevance(&a, &["rfid", "travel", "nothing"]), 2);
    }

    #[test]
    fn no_match_returns_ranked_suggestions() {
        let t = table();
        // Nothing scores, so the head of the table comes back.
        match search(&t, "xyzzy qqq") {
            SearchOutcome::Suggested(s) => {
                assert_eq!(s.len(), 4);
                let titles: Vec<&str> = s.iter().map(|x| x.article.title.as_str()).collect();
                let head: Vec<&str> = t.iter().take(4).map(|a| a.title.as_str()).collect();
                assert_eq!(titles, head);
                assert!(s.iter().all(|x| x.score == 0));
            }
            other => panic!("expected suggestions, got {:?}", other),
        }
    }

    #[test]
    fn fallback_is_sorted_and_stable() {
        let t = table();
        let ranked = rank_fallback(&t, "carteras mochilas");
        assert!(ranked.len() <= SUGGESTED_LIMIT);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // Both carteras articles score 3 each ("carteras" in title and category);
        // both mochilas articles score 3 too. Ties keep table order.
        let titles: Vec<&str> = ranked.iter().map(|s| s.article.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Mejores Mochilas para Trabajo 2025",
                "Top 5 Carteras para Mujeres Profesionales 2025",
                "Carteras Organizadoras: Guía Completa 2025",
                "Mochilas para Laptop: Protección y Estilo 2025",
            ]
        );
    }

    #[test]
    fn fallback_on_small_table_returns_everything() {
        let t = vec![rec("Only", "One", "", &[])];
        assert_eq!(rank_fallback(&t, "nothing here").len(), 1);
    }
}
