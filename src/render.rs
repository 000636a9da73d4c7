//! Search presentation: terminal text and HTML fragments.
//!
//! Both views implement [`SearchView`] and buffer their output; the caller
//! prints it once the search has been handled.

use bagsite_core::models::{ArticleRecord, Messages};
use bagsite_core::search::ScoredArticle;
use bagsite_core::suggest::{highlight_with, Suggestions};
use bagsite_core::view::{escape_html, live_status, SearchView};
use std::fmt::Write as _;

/// `<mark>` labels as `[term]` for terminals.
fn plain_label(label: &str) -> String {
    label.replace("<mark>", "[").replace("</mark>", "]")
}

pub struct TerminalView<'m> {
    messages: &'m Messages,
    out: String,
}

impl<'m> TerminalView<'m> {
    pub fn new(messages: &'m Messages) -> Self {
        Self {
            messages,
            out: String::new(),
        }
    }

    pub fn into_output(self) -> String {
        self.out
    }

    fn article(&mut self, i: usize, a: &ArticleRecord, score: Option<u32>) {
        let _ = match score {
            Some(s) => writeln!(self.out, "{}. [{}] {} / {}", i + 1, s, a.category, a.title),
            None => writeln!(self.out, "{}. {} / {}", i + 1, a.category, a.title),
        };
        if !a.date.is_empty() {
            let _ = writeln!(self.out, "    date: {}", a.date);
        }
        let _ = writeln!(self.out, "    url: {}", a.url);
        if !a.description.is_empty() {
            let _ = writeln!(self.out, "    {}", a.description);
        }
        let _ = writeln!(self.out);
    }
}

impl SearchView for TerminalView<'_> {
    fn show_results(&mut self, query: &str, results: &[&ArticleRecord]) {
        let _ = writeln!(self.out, "{}\n", live_status(self.messages, query, results.len(), true));
        for (i, a) in results.iter().enumerate() {
            self.article(i, a, None);
        }
    }

    fn show_suggested(&mut self, query: &str, suggested: &[ScoredArticle<'_>]) {
        let _ = writeln!(
            self.out,
            "{}\n",
            live_status(self.messages, query, suggested.len(), false)
        );
        for (i, s) in suggested.iter().enumerate() {
            self.article(i, s.article, Some(s.score));
        }
    }

    fn show_suggestions(&mut self, _query: &str, suggestions: &Suggestions<'_>) {
        if !suggestions.articles.is_empty() {
            let _ = writeln!(self.out, "{}:", self.messages.articles_heading);
            for s in &suggestions.articles {
                let _ = writeln!(self.out, "  {}  ({})", plain_label(&s.label), s.article.url);
            }
        }
        if !suggestions.terms.is_empty() {
            let _ = writeln!(self.out, "{}:", self.messages.terms_heading);
            for t in &suggestions.terms {
                let _ = writeln!(self.out, "  {}", plain_label(&t.label));
            }
        }
        let _ = writeln!(self.out);
    }

    fn hide_suggestions(&mut self) {}

    fn clear(&mut self) {
        self.out.clear();
    }
}

/// Renders the fragments the search page injects: the results grid, the
/// suggestion dropdown and the live-region status text.
pub struct HtmlView<'m> {
    messages: &'m Messages,
    pub status: Option<String>,
    pub results: Option<String>,
    pub suggestions: Option<String>,
}

impl<'m> HtmlView<'m> {
    pub fn new(messages: &'m Messages) -> Self {
        Self {
            messages,
            status: None,
            results: None,
            suggestions: None,
        }
    }

    /// All present fragments, status first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(status) = &self.status {
            let _ = writeln!(
                out,
                "<p class=\"search-status\" role=\"status\" aria-live=\"polite\">{}</p>",
                escape_html(status)
            );
        }
        for fragment in [&self.suggestions, &self.results].into_iter().flatten() {
            out.push_str(fragment);
        }
        out
    }
}

/// One result card, matching the markup of the static article grid.
pub fn article_card(a: &ArticleRecord, extra_class: Option<&str>) -> String {
    let class = match extra_class {
        Some(c) => format!("article-card {}", c),
        None => "article-card".to_string(),
    };
    let title = escape_html(&a.title);
    format!(
        "<article class=\"{class}\">\n  <div class=\"article-image\">\n    <img src=\"{img}\" alt=\"{title}\">\n  </div>\n  <div class=\"article-content\">\n    <h3><a href=\"{url}\">{title}</a></h3>\n    <p>{desc}</p>\n    <div class=\"article-meta\">\n      <span class=\"article-date\">{date}</span>\n      <span class=\"article-category\">{cat}</span>\n    </div>\n  </div>\n</article>\n",
        class = class,
        img = escape_html(&a.image),
        title = title,
        url = escape_html(&a.url),
        desc = escape_html(&a.description),
        date = escape_html(&a.date),
        cat = escape_html(&a.category),
    )
}

impl SearchView for HtmlView<'_> {
    fn show_results(&mut self, query: &str, results: &[&ArticleRecord]) {
        self.status = Some(live_status(self.messages, query, results.len(), true));
        let mut grid = String::from("<div class=\"search-results-grid\">\n");
        for a in results {
            grid.push_str(&article_card(a, None));
        }
        grid.push_str("</div>\n");
        self.results = Some(grid);
    }

    fn show_suggested(&mut self, query: &str, suggested: &[ScoredArticle<'_>]) {
        self.status = Some(live_status(self.messages, query, suggested.len(), false));
        let mut grid = String::from("<div class=\"no-results-with-suggestions\">\n");
        let _ = writeln!(
            grid,
            "<div class=\"no-results-message\">\n  <p>{}</p>\n  <p>{}</p>\n</div>",
            escape_html(&Messages::render(&self.messages.no_results, &[("query", query)])),
            escape_html(&self.messages.suggested_intro)
        );
        grid.push_str("<div class=\"alternative-articles\">\n");
        for s in suggested {
            grid.push_str(&article_card(s.article, Some("alternative-article")));
        }
        grid.push_str("</div>\n</div>\n");
        self.results = Some(grid);
    }

    fn show_suggestions(&mut self, query: &str, suggestions: &Suggestions<'_>) {
        let mut list = String::from("<div class=\"search-suggestions\">\n");
        if !suggestions.articles.is_empty() {
            let _ = writeln!(
                list,
                "<div class=\"suggestion-section\">\n<h4>{}</h4>",
                escape_html(&self.messages.articles_heading)
            );
            for s in &suggestions.articles {
                let _ = writeln!(
                    list,
                    "<a class=\"suggestion-item article-suggestion\" href=\"{}\"><h5>{}</h5><p>{}</p></a>",
                    escape_html(&s.article.url),
                    highlight_with(&s.article.title, query, escape_html),
                    escape_html(&s.article.category)
                );
            }
            list.push_str("</div>\n");
        }
        if !suggestions.terms.is_empty() {
            let _ = writeln!(
                list,
                "<div class=\"suggestion-section\">\n<h4>{}</h4>",
                escape_html(&self.messages.terms_heading)
            );
            for t in &suggestions.terms {
                let _ = writeln!(
                    list,
                    "<div class=\"suggestion-item term-suggestion\" data-term=\"{}\"><span>{}</span></div>",
                    escape_html(t.term),
                    highlight_with(t.term, query, escape_html)
                );
            }
            list.push_str("</div>\n");
        }
        list.push_str("</div>\n");
        self.suggestions = Some(list);
    }

    fn hide_suggestions(&mut self) {
        self.suggestions = None;
    }

    fn clear(&mut self) {
        self.status = None;
        self.results = None;
        self.suggestions = None;
    }
}
