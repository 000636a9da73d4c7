//! Presentation port for search.
//!
//! [`SearchService`](crate::search::SearchService) never formats output
//! itself; it calls a [`SearchView`]. The application crate provides a
//! terminal view and an HTML-fragment view.

use crate::models::{ArticleRecord, Messages};
use crate::search::ScoredArticle;
use crate::suggest::Suggestions;

pub trait SearchView {
    /// Articles matched the query.
    fn show_results(&mut self, query: &str, results: &[&ArticleRecord]);
    /// Nothing matched; show the "no results" message and these instead.
    fn show_suggested(&mut self, query: &str, suggested: &[ScoredArticle<'_>]);
    /// Type-ahead list for the current input.
    fn show_suggestions(&mut self, query: &str, suggestions: &Suggestions<'_>);
    fn hide_suggestions(&mut self);
    /// Query emptied: hide results and go back to the latest-articles panel.
    fn clear(&mut self);
}

/// Text for the results live region.
pub fn live_status(messages: &Messages, query: &str, count: usize, matched: bool) -> String {
    if matched {
        Messages::render(
            &messages.results,
            &[("count", &count.to_string()), ("query", query)],
        )
    } else {
        format!(
            "{} {}",
            Messages::render(&messages.no_results, &[("query", query)]),
            messages.suggested_intro
        )
    }
}

/// Escape text for inclusion in HTML element content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_for_matches() {
        let m = Messages::default();
        assert_eq!(live_status(&m, "tote", 2, true), "2 results for \"tote\"");
    }

    #[test]
    fn status_for_fallback_mentions_suggestions() {
        let m = Messages::default();
        let s = live_status(&m, "zzz", 4, false);
        assert!(s.starts_with("No articles found for \"zzz\""));
        assert!(s.ends_with(&m.suggested_intro));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
