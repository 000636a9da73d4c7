//! Internal link rewriting: `.html` hrefs to pretty URLs, and the EN/ES
//! language switcher.

use anyhow::{Context, Result};
use bagsite_core::html::{find_close, find_first, find_tags, set_attr, Tag};
use bagsite_core::view::escape_html;
use regex::Regex;
use scraper::{Html, Selector};

use crate::config::Config;
use crate::rewrite::{run_rewrite, FileEdit, RewriteOptions, RewriteReport};
use crate::walk::html_files;

/// Compiled patterns for link rewriting.
pub struct LinkRules {
    html_href: Regex,
}

impl LinkRules {
    pub fn new() -> Result<Self> {
        Ok(Self {
            html_href: Regex::new(
                r#"(^|\s)href=(["'])([^"'#?]*?)\.html((?:[?#][^"']*)?)(["'])"#,
            )
            .context("Invalid href pattern")?,
        })
    }

    /// Rewrite internal `href="x.html"` to `href="x/"` and
    /// `href="dir/index.html"` to `href="dir/"`. External, `mailto:` and
    /// `tel:` links are left alone.
    pub fn normalize_hrefs(&self, html: &str) -> String {
        self.html_href
            .replace_all(html, |c: &regex::Captures| {
                let (lead, open, path, suffix, close) = (&c[1], &c[2], &c[3], &c[4], &c[5]);
                if open != close || is_external(path) {
                    return c[0].to_string();
                }
                format!("{}href={}{}{}{}", lead, open, pretty_path(path), suffix, close)
            })
            .into_owned()
    }
}

fn is_external(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    ["http://", "https://", "//", "mailto:", "tel:"]
        .iter()
        .any(|p| lower.starts_with(p))
}

/// `path` with its `.html` already stripped, in pretty form.
fn pretty_path(path: &str) -> String {
    if path == "index" {
        "./".to_string()
    } else if let Some(dir) = path.strip_suffix("/index") {
        format!("{}/", dir)
    } else {
        format!("{}/", path)
    }
}

/// Trailing-slash form of an alternate URL (`/x/index.html` -> `/x/`,
/// `/x.html` -> `/x/`).
pub fn to_trailing_slash(url: &str) -> String {
    if let Some(base) = url.strip_suffix("/index.html") {
        format!("{}/", base)
    } else if let Some(base) = url.strip_suffix(".html") {
        format!("{}/", base)
    } else {
        url.to_string()
    }
}

pub fn run_normalize(config: &Config, opts: RewriteOptions) -> Result<RewriteReport> {
    let rules = LinkRules::new()?;
    let files = html_files(config)?;
    let report = run_rewrite(&files, opts, |_, html| {
        Ok(FileEdit::rewrite(rules.normalize_hrefs(html)))
    });
    report.print("Link normalization");
    Ok(report)
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("selector is valid")
}

/// Primary language subtag of `<html lang>`, lowercased.
pub fn page_language(doc: &Html) -> Option<String> {
    let lang = doc
        .select(&selector("html[lang]"))
        .next()?
        .value()
        .attr("lang")?
        .trim()
        .to_ascii_lowercase();
    let primary = lang.split('-').next().unwrap_or("").to_string();
    (!primary.is_empty()).then_some(primary)
}

/// `href` of `<link rel="alternate" hreflang="<lang>">`.
pub fn alternate(doc: &Html, lang: &str) -> Option<String> {
    doc.select(&selector(r#"link[rel~="alternate"][hreflang]"#))
        .find(|el| {
            el.value()
                .attr("hreflang")
                .map(|h| h.trim().eq_ignore_ascii_case(lang))
                .unwrap_or(false)
        })
        .and_then(|el| el.value().attr("href").map(|h| h.trim().to_string()))
}

/// The switcher element and the byte range of its content.
fn switcher_block(html: &str) -> Option<(usize, usize)> {
    for name in ["div", "nav"] {
        if let Some(tag) = find_tags(html, name)
            .into_iter()
            .find(|t| t.has_class("language-switcher"))
        {
            let close = find_close(&html[tag.end..], name)?;
            return Some((tag.end, tag.end + close));
        }
    }
    None
}

fn with_class(tag: &Tag<'_>, active: bool) -> String {
    let mut classes: Vec<&str> = tag
        .attr("class")
        .map(|c| c.split_whitespace().collect())
        .unwrap_or_default();
    classes.retain(|c| *c != "active");
    if active {
        classes.push("active");
    }
    if classes.is_empty() && tag.attr("class").is_none() {
        return tag.raw.to_string();
    }
    set_attr(tag.raw, "class", &classes.join(" "))
}

/// Point the EN/ES anchors of the `language-switcher` block at the page's
/// `hreflang` alternates and mark the current language `active`.
pub fn fix_switcher(html: &str, rules: &LinkRules) -> FileEdit {
    let Some((start, end)) = switcher_block(html) else {
        return FileEdit::Skip("no language switcher".to_string());
    };
    let doc = Html::parse_document(html);
    let current = page_language(&doc);
    let alternates = [("en", alternate(&doc, "en")), ("es", alternate(&doc, "es"))];
    if alternates.iter().all(|(_, a)| a.is_none()) {
        return FileEdit::Skip("no hreflang alternates".to_string());
    }

    let inner = &html[start..end];
    let mut rebuilt = String::with_capacity(inner.len());
    let mut cursor = 0;
    for anchor in find_tags(inner, "a") {
        let text_end = find_close(&inner[anchor.end..], "a").map(|i| anchor.end + i);
        let Some(text_end) = text_end else { continue };
        let label = inner[anchor.end..text_end].trim().to_ascii_lowercase();
        let Some((lang, alt)) = alternates.iter().find(|(l, _)| *l == label) else {
            continue;
        };

        let href = match (alt, anchor.attr("href")) {
            (Some(a), _) => to_trailing_slash(a),
            (None, Some(h)) => to_trailing_slash(h),
            (None, None) => continue,
        };
        let mut raw = set_attr(anchor.raw, "href", &escape_html(&href));
        if let Some(cur) = &current {
            let retagged = find_first(&raw, "a").map(|t| with_class(&t, cur == lang));
            if let Some(r) = retagged {
                raw = r;
            }
        }
        rebuilt.push_str(&inner[cursor..anchor.start]);
        rebuilt.push_str(&raw);
        cursor = anchor.end;
    }
    rebuilt.push_str(&inner[cursor..]);
    let rebuilt = rules.normalize_hrefs(&rebuilt);

    FileEdit::rewrite(format!("{}{}{}", &html[..start], rebuilt, &html[end..]))
}

pub fn run_lang_switcher(config: &Config, opts: RewriteOptions) -> Result<RewriteReport> {
    let rules = LinkRules::new()?;
    let files = html_files(config)?;
    let report = run_rewrite(&files, opts, |_, html| Ok(fix_switcher(html, &rules)));
    report.print("Language switcher fix");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewritten(edit: FileEdit) -> String {
        match edit {
            FileEdit::Rewrite { html, .. } => html,
            FileEdit::Skip(r) => panic!("unexpected skip: {}", r),
        }
    }

    #[test]
    fn normalizes_internal_links_only() {
        let rules = LinkRules::new().unwrap();
        let html = r#"<a href="articles/bag.html">a</a>
<a href="../index.html">b</a>
<a href="index.html#top">c</a>
<a href='/es/carteras.html?x=1'>d</a>
<a href="https://other.test/page.html">e</a>
<a href="mailto:hi@shop.test">f</a>
<a href="/already/">g</a>"#;
        let out = rules.normalize_hrefs(html);
        assert!(out.contains(r#"href="articles/bag/""#));
        assert!(out.contains(r#"href="../""#));
        assert!(out.contains(r#"href="./#top""#));
        assert!(out.contains(r#"href='/es/carteras/?x=1'"#));
        assert!(out.contains(r#"href="https://other.test/page.html""#));
        assert_eq!(rules.normalize_hrefs(&out), out);
    }

    #[test]
    fn leaves_data_href_attributes_alone() {
        let rules = LinkRules::new().unwrap();
        let html = r#"<a data-href="promo.html" href="promo.html">p</a>
<div data-href="articles/bag.html"></div>"#;
        let out = rules.normalize_hrefs(html);
        assert!(out.contains(r#"data-href="promo.html" href="promo/""#));
        assert!(out.contains(r#"<div data-href="articles/bag.html">"#));
    }

    #[test]
    fn trailing_slash_forms() {
        assert_eq!(to_trailing_slash("https://shop.test/es/index.html"), "https://shop.test/es/");
        assert_eq!(to_trailing_slash("https://shop.test/a.html"), "https://shop.test/a/");
        assert_eq!(to_trailing_slash("https://shop.test/a/"), "https://shop.test/a/");
    }

    const PAGE: &str = r#"<html lang="es">
<head>
<link rel="alternate" hreflang="en" href="https://shop.test/articles/bag.html">
<link rel="alternate" hreflang="es" href="https://shop.test/es/articulos/bolso/">
</head>
<body>
<!-- Language Switcher -->
<div class="language-switcher">
  <a class="lang-link active" href="/articles/bag.html">EN</a>
  <a class="lang-link" href="/es/articulos/bolso.html">ES</a>
</div>
<a href="/x.html">outside</a>
</body>
</html>"#;

    #[test]
    fn points_switcher_at_alternates_and_marks_current() {
        let rules = LinkRules::new().unwrap();
        let out = rewritten(fix_switcher(PAGE, &rules));
        assert!(out.contains(
            r#"<a class="lang-link" href="https://shop.test/articles/bag/">EN</a>"#
        ));
        assert!(out.contains(
            r#"<a class="lang-link active" href="https://shop.test/es/articulos/bolso/">ES</a>"#
        ));
        assert!(out.contains(r#"<a href="/x.html">outside</a>"#));
        assert_eq!(rewritten(fix_switcher(&out, &rules)), out);
    }

    #[test]
    fn reads_page_language() {
        let doc = |s: &str| Html::parse_document(s);
        assert_eq!(page_language(&doc(r#"<html lang="es-MX">"#)).as_deref(), Some("es"));
        assert_eq!(page_language(&doc("<html>")), None);
    }

    #[test]
    fn finds_alternates_by_hreflang() {
        let doc = Html::parse_document(PAGE);
        assert_eq!(
            alternate(&doc, "EN").as_deref(),
            Some("https://shop.test/articles/bag.html")
        );
        assert_eq!(alternate(&doc, "fr"), None);
    }

    #[test]
    fn skips_pages_without_switcher() {
        let rules = LinkRules::new().unwrap();
        assert_eq!(
            fix_switcher("<html><body></body></html>", &rules),
            FileEdit::Skip("no language switcher".into())
        );
    }
}
