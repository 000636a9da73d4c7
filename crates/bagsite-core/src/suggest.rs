//! Type-ahead suggestions and query highlighting.

use regex::RegexBuilder;

use crate::models::{ArticleRecord, LanguageCatalog};
use crate::search::normalize_query;

pub const ARTICLE_SUGGESTIONS: usize = 3;
pub const TERM_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleSuggestion<'a> {
    pub article: &'a ArticleRecord,
    /// Title with the query wrapped in `<mark>`.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermSuggestion<'a> {
    pub term: &'a str,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions<'a> {
    pub articles: Vec<ArticleSuggestion<'a>>,
    pub terms: Vec<TermSuggestion<'a>>,
}

impl Suggestions<'_> {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty() && self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.articles.len() + self.terms.len()
    }
}

/// Up to [`ARTICLE_SUGGESTIONS`] articles and [`TERM_SUGGESTIONS`] distinct
/// popular terms containing the query.
pub fn suggest<'a>(catalog: &'a LanguageCatalog, raw_query: &str) -> Suggestions<'a> {
    let query = normalize_query(raw_query);
    if query.is_empty() {
        return Suggestions::default();
    }

    let articles = catalog
        .articles
        .iter()
        .filter(|a| a.searchable_text().contains(&query))
        .take(ARTICLE_SUGGESTIONS)
        .map(|article| ArticleSuggestion {
            article,
            label: highlight(&article.title, &query),
        })
        .collect();

    let mut terms: Vec<TermSuggestion<'a>> = Vec::new();
    for term in &catalog.popular_terms {
        if terms.len() == TERM_SUGGESTIONS {
            break;
        }
        if term.to_lowercase().contains(&query) && !terms.iter().any(|t| t.term == term.as_str()) {
            terms.push(TermSuggestion {
                term: term.as_str(),
                label: highlight(term, &query),
            });
        }
    }

    Suggestions { articles, terms }
}

/// Wrap every case-insensitive occurrence of `query` in `<mark>…</mark>`.
///
/// The query is matched literally; regex metacharacters have no effect.
pub fn highlight(text: &str, query: &str) -> String {
    highlight_with(text, query, |s| s.to_string())
}

/// Like [`highlight`], but every piece of `text` (inside and outside the
/// marks) goes through `escape`. Matching runs on the raw text, so a query
/// never lands inside an entity the escape produced.
pub fn highlight_with<F>(text: &str, query: &str, escape: F) -> String
where
    F: Fn(&str) -> String,
{
    let re = match RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    {
        Ok(re) if !query.is_empty() => re,
        _ => return escape(text),
    };
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in re.find_iter(text) {
        out.push_str(&escape(&text[cursor..m.start()]));
        out.push_str("<mark>");
        out.push_str(&escape(m.as_str()));
        out.push_str("</mark>");
        cursor = m.end();
    }
    out.push_str(&escape(&text[cursor..]));
    out
}
