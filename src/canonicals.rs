//! Self-referencing canonical and `og:url` repair.

use anyhow::Result;
use bagsite_core::html::{find_first, find_tags, insert_before_close, remove_spans};
use bagsite_core::urls::public_url;
use bagsite_core::view::escape_html;

use crate::config::Config;
use crate::rewrite::{run_rewrite, FileEdit, RewriteOptions, RewriteReport};
use crate::walk::html_files;

/// Spans of every `<link rel="canonical">` and `<meta property="og:url">`.
fn existing_tags(html: &str) -> Vec<(usize, usize)> {
    let links = find_tags(html, "link")
        .into_iter()
        .filter(|t| t.attr_has_token("rel", "canonical"));
    let metas = find_tags(html, "meta")
        .into_iter()
        .filter(|t| t.attr("property").map(|p| p.eq_ignore_ascii_case("og:url")) == Some(true));
    links.chain(metas).map(|t| (t.start, t.end)).collect()
}

/// Replace all canonical and `og:url` tags with exactly one of each pointing
/// at `canonical`, placed at the end of `<head>`. `None` without a head.
pub fn fix_canonical(html: &str, canonical: &str) -> Option<String> {
    find_first(html, "head")?;
    let href = escape_html(canonical);
    let link = format!("<link rel=\"canonical\" href=\"{}\">", href);
    let meta = format!("<meta property=\"og:url\" content=\"{}\">", href);

    let stripped = remove_spans(html, &existing_tags(html));
    insert_before_close(&stripped, "head", &[&link, &meta])
}

pub fn run_fix(config: &Config, opts: RewriteOptions) -> Result<RewriteReport> {
    let files = html_files(config)?;
    let origin = config.origin().to_string();
    let report = run_rewrite(&files, opts, |file, html| {
        let canonical = public_url(&origin, &file.relative);
        Ok(match fix_canonical(html, &canonical) {
            Some(out) => FileEdit::rewrite(out),
            None => FileEdit::Skip("no <head>".to_string()),
        })
    });
    report.print("Canonical fix");
    Ok(report)
}
