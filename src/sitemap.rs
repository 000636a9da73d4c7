//! `sitemap.xml` generation, linting and coverage audit.
//!
//! - `generate` lists the home page, the two index pages and every article
//!   file, with `lastmod` taken from git.
//! - `check` lints the `<loc>` entries of a local or live sitemap.
//! - `audit` diffs the sitemap against the HTML files actually published.

use anyhow::{Context, Result};
use bagsite_core::urls::{looks_like_file, normalize_url, public_url};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use url::Url;

use crate::config::Config;
use crate::fetch::Fetcher;
use crate::git;
use crate::walk::{html_files, SiteFile};

/// Issues printed by `check` before the list is cut short.
const MAX_PRINTED_ISSUES: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: String,
    pub changefreq: &'static str,
    pub priority: &'static str,
}

/// Entries in output order: fixed pages first, then articles by file name.
pub fn collect_entries<F>(config: &Config, mut lastmod: F) -> Result<Vec<SitemapEntry>>
where
    F: FnMut(&str) -> String,
{
    let origin = config.origin();
    let mut entries = vec![
        SitemapEntry {
            loc: format!("{}/", origin),
            lastmod: lastmod("index.html"),
            changefreq: "weekly",
            priority: "1.0",
        },
        SitemapEntry {
            loc: format!("{}/categories/", origin),
            lastmod: lastmod("categories/index.html"),
            changefreq: "weekly",
            priority: "0.8",
        },
        SitemapEntry {
            loc: format!("{}/articles/", origin),
            lastmod: lastmod("articles/index.html"),
            changefreq: "weekly",
            priority: "0.8",
        },
    ];

    let articles_dir = config.site_root().join("articles");
    if !articles_dir.is_dir() {
        tracing::warn!(dir = %articles_dir.display(), "no articles directory, sitemap has fixed pages only");
        return Ok(entries);
    }

    let mut names: Vec<String> = std::fs::read_dir(&articles_dir)
        .with_context(|| format!("Failed to read {}", articles_dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".html") && n != "index.html")
        .collect();
    names.sort();

    for name in names {
        let relative = format!("articles/{}", name);
        let loc = if config.sitemap.trailing_slash {
            public_url(origin, &relative)
        } else {
            format!("{}/{}", origin, relative)
        };
        entries.push(SitemapEntry {
            loc,
            lastmod: lastmod(&relative),
            changefreq: "monthly",
            priority: "0.8",
        });
    }
    Ok(entries)
}

pub fn render(entries: &[SitemapEntry]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for e in entries {
        out.push_str(&render_url(e));
    }
    out.push_str("</urlset>\n");
    out
}

/// One indented `<url>` block, newline-terminated.
pub fn render_url(e: &SitemapEntry) -> String {
    format!(
        "    <url>\n        <loc>{}</loc>\n        <lastmod>{}</lastmod>\n        <changefreq>{}</changefreq>\n        <priority>{}</priority>\n    </url>\n",
        quick_xml::escape::escape(e.loc.as_str()),
        e.lastmod,
        e.changefreq,
        e.priority
    )
}

pub fn run_generate(config: &Config, to_stdout: bool, dry_run: bool) -> Result<()> {
    let root = config.site_root().to_path_buf();
    let entries = collect_entries(config, |rel| git::lastmod(&root, rel))?;
    let xml = render(&entries);

    if to_stdout {
        print!("{}", xml);
        return Ok(());
    }

    let path = config.sitemap_path();
    if dry_run {
        println!("Dry run: would write {} URL(s) to {}", entries.len(), path.display());
    } else {
        std::fs::write(&path, &xml)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Sitemap written: {}", path.display());
    }
    println!("Total URLs: {}", entries.len());
    println!("Articles: {}", entries.len().saturating_sub(3));
    Ok(())
}

/// `<loc>` values of a sitemap, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSitemap {
    pub has_urlset: bool,
    pub locs: Vec<String>,
}

pub fn parse_sitemap(xml: &str) -> Result<ParsedSitemap> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedSitemap::default();
    let mut in_loc = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"urlset" => parsed.has_urlset = true,
                b"loc" => in_loc = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"urlset" => {
                parsed.has_urlset = true;
            }
            Ok(Event::Text(t)) if in_loc => {
                let text = t.unescape().context("Bad escape in <loc>")?;
                let text = text.trim();
                if !text.is_empty() {
                    parsed.locs.push(text.to_string());
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Malformed sitemap XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }
    Ok(parsed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapIssue {
    InvalidUrl(String),
    NotHttps(String),
    HasQuery(String),
    HasFragment(String),
    PointsToHtml(String),
    MissingTrailingSlash(String),
    Duplicate(String),
}

impl std::fmt::Display for SitemapIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SitemapIssue::InvalidUrl(u) => write!(f, "Invalid URL: {}", u),
            SitemapIssue::NotHttps(u) => write!(f, "Not HTTPS: {}", u),
            SitemapIssue::HasQuery(u) => write!(f, "Has querystring: {}", u),
            SitemapIssue::HasFragment(u) => write!(f, "Has fragment: {}", u),
            SitemapIssue::PointsToHtml(u) => write!(f, "Points to .html: {}", u),
            SitemapIssue::MissingTrailingSlash(u) => write!(f, "Missing trailing slash: {}", u),
            SitemapIssue::Duplicate(u) => write!(f, "Duplicate (normalized): {}", u),
        }
    }
}

pub fn check_locs(locs: &[String]) -> Vec<SitemapIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    for loc in locs {
        let Ok(parsed) = Url::parse(loc) else {
            issues.push(SitemapIssue::InvalidUrl(loc.clone()));
            continue;
        };
        if parsed.scheme() != "https" {
            issues.push(SitemapIssue::NotHttps(loc.clone()));
        }
        if parsed.query().is_some() {
            issues.push(SitemapIssue::HasQuery(loc.clone()));
        }
        if parsed.fragment().is_some() {
            issues.push(SitemapIssue::HasFragment(loc.clone()));
        }
        let path = parsed.path();
        if path.ends_with(".html") {
            issues.push(SitemapIssue::PointsToHtml(loc.clone()));
        }
        if !looks_like_file(path) && !path.ends_with('/') {
            issues.push(SitemapIssue::MissingTrailingSlash(loc.clone()));
        }
        if let Some(n) = normalize_url(loc, &parsed) {
            if !seen.insert(n) {
                issues.push(SitemapIssue::Duplicate(loc.clone()));
            }
        }
    }
    issues
}

/// Where `check` reads the sitemap from.
#[derive(Debug, Clone)]
pub enum SitemapSource {
    File(PathBuf),
    Live,
}

/// Lint a sitemap. Returns `false` when any issue was found.
pub async fn run_check(config: &Config, source: SitemapSource) -> Result<bool> {
    let xml = match &source {
        SitemapSource::File(path) => read_sitemap_file(path)?,
        SitemapSource::Live => {
            let url = format!("{}/sitemap.xml", config.origin());
            let mut fetcher = Fetcher::new(&config.crawl)?;
            match fetcher.get_text(&url).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(error = %e, "sitemap fetch failed");
                    String::new()
                }
            }
        }
    };

    let parsed = if xml.is_empty() {
        ParsedSitemap::default()
    } else {
        parse_sitemap(&xml)?
    };
    if !parsed.has_urlset {
        println!("sitemap.xml missing or unreadable");
        return Ok(false);
    }

    let issues = check_locs(&parsed.locs);
    if issues.is_empty() {
        println!("Sitemap looks good ({} URLs)", parsed.locs.len());
        return Ok(true);
    }
    println!("Sitemap issues found: {}", issues.len());
    for issue in issues.iter().take(MAX_PRINTED_ISSUES) {
        println!(" - {}", issue);
    }
    Ok(false)
}

fn read_sitemap_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Buckets for pages missing from the sitemap, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MissingGroup {
    EnglishArticles,
    SpanishArticles,
    EnglishCategories,
    SpanishCategories,
    MainPages,
    Other,
}

impl MissingGroup {
    pub fn label(&self) -> &'static str {
        match self {
            MissingGroup::EnglishArticles => "English Articles",
            MissingGroup::SpanishArticles => "Spanish Articles",
            MissingGroup::EnglishCategories => "English Categories",
            MissingGroup::SpanishCategories => "Spanish Categories",
            MissingGroup::MainPages => "Main Pages",
            MissingGroup::Other => "Other",
        }
    }

    pub fn classify(url: &str, origin: &str) -> Self {
        const MAIN: [&str; 7] = [
            "/about/",
            "/contact/",
            "/terms/",
            "/privacy-policy/",
            "/affiliate-disclosure/",
            "/quiz/",
            "/search/",
        ];
        let path = url.strip_prefix(origin.trim_end_matches('/')).unwrap_or(url);
        let spanish = url.contains("/es/");
        if url.contains("/articles/") && !spanish {
            MissingGroup::EnglishArticles
        } else if url.contains("/es/articulos/") {
            MissingGroup::SpanishArticles
        } else if url.contains("/categories/") && !spanish {
            MissingGroup::EnglishCategories
        } else if url.contains("/es/categorias/") {
            MissingGroup::SpanishCategories
        } else if path == "/" || path == "/es/" || MAIN.iter().any(|m| url.contains(m)) {
            MissingGroup::MainPages
        } else {
            MissingGroup::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPage {
    pub url: String,
    pub file: String,
}

#[derive(Debug, Clone, Default)]
pub struct SitemapAudit {
    pub html_files: usize,
    pub live_urls: usize,
    pub sitemap_urls: usize,
    pub missing: BTreeMap<MissingGroup, Vec<MissingPage>>,
    pub orphaned: Vec<String>,
}

impl SitemapAudit {
    pub fn missing_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }

    pub fn to_markdown(&self, generated: &str) -> String {
        let mut md = String::from("# Sitemap Audit Report\n\n");
        md.push_str(&format!("Generated: {}\n\n", generated));
        md.push_str("## Summary\n\n");
        md.push_str(&format!("- Total HTML files found: {}\n", self.html_files));
        md.push_str(&format!("- Live URLs generated: {}\n", self.live_urls));
        md.push_str(&format!("- URLs in sitemap: {}\n", self.sitemap_urls));
        md.push_str(&format!("- Missing from sitemap: {}\n", self.missing_count()));
        md.push_str(&format!("- Orphaned sitemap URLs: {}\n\n", self.orphaned.len()));

        if !self.missing.is_empty() {
            md.push_str("## Pages Missing from Sitemap\n\n");
            for (group, pages) in &self.missing {
                md.push_str(&format!("### {}\n\n", group.label()));
                for p in pages {
                    md.push_str(&format!("- {} (`{}`)\n", p.url, p.file));
                }
                md.push('\n');
            }
        }
        if !self.orphaned.is_empty() {
            md.push_str("## Orphaned Sitemap URLs\n\n");
            for u in &self.orphaned {
                md.push_str(&format!("- {}\n", u));
            }
        }
        md
    }
}

/// Compare published files against sitemap `<loc>`s.
pub fn audit(files: &[SiteFile], origin: &str, locs: &[String]) -> SitemapAudit {
    let mut live: BTreeMap<String, String> = BTreeMap::new();
    for f in files {
        live.entry(public_url(origin, &f.relative))
            .or_insert_with(|| f.relative.clone());
    }
    let in_sitemap: HashSet<&str> = locs.iter().map(String::as_str).collect();

    let mut report = SitemapAudit {
        html_files: files.len(),
        live_urls: live.len(),
        sitemap_urls: in_sitemap.len(),
        ..Default::default()
    };
    for (url, file) in &live {
        if !in_sitemap.contains(url.as_str()) {
            report
                .missing
                .entry(MissingGroup::classify(url, origin))
                .or_default()
                .push(MissingPage {
                    url: url.clone(),
                    file: file.clone(),
                });
        }
    }
    let mut seen = HashSet::new();
    for loc in locs {
        if !live.contains_key(loc) && seen.insert(loc.as_str()) {
            report.orphaned.push(loc.clone());
        }
    }
    report
}

/// Returns `false` when pages are missing or orphaned.
pub fn run_audit(config: &Config, report_path: Option<&Path>) -> Result<bool> {
    let files = html_files(config)?;
    let xml = read_sitemap_file(&config.sitemap_path())?;
    let parsed = parse_sitemap(&xml)?;
    let result = audit(&files, config.origin(), &parsed.locs);

    println!("Sitemap audit");
    println!("  HTML files found: {}", result.html_files);
    println!("  Live URLs: {}", result.live_urls);
    println!("  URLs in sitemap: {}", result.sitemap_urls);
    println!("  Missing from sitemap: {}", result.missing_count());
    println!("  Orphaned sitemap URLs: {}", result.orphaned.len());

    for (group, pages) in &result.missing {
        println!("\n{}:", group.label());
        for p in pages {
            println!("  - {}", p.url);
            println!("    File: {}", p.file);
        }
    }
    if result.missing.is_empty() {
        println!("\nAll live pages are in the sitemap.");
    }
    if !result.orphaned.is_empty() {
        println!("\nOrphaned sitemap URLs (no matching file):");
        for u in &result.orphaned {
            println!("  - {}", u);
        }
    }

    if let Some(path) = report_path {
        let generated = chrono::Utc::now().to_rfc3339();
        std::fs::write(path, result.to_markdown(&generated))
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("\nReport saved to {}", path.display());
    }

    Ok(result.missing.is_empty() && result.orphaned.is_empty())
}
