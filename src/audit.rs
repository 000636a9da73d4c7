//! Live audits against the published site.
//!
//! - `canonicals` crawls the site breadth-first from the origin and checks
//!   that every page declares exactly one valid canonical and one `og:url`,
//!   both pointing at the page itself. The crawled set is then diffed
//!   against the live sitemap.
//! - `redirects` checks that the no-slash and `.html` variants of every
//!   sitemap URL permanently redirect to the trailing-slash URL, and prints
//!   `netlify.toml` rules for the ones that do not.

use anyhow::Result;
use bagsite_core::urls::{is_non_page_href, looks_like_file, normalize_url, path_depth, same_normalized};
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use url::Url;

use crate::config::Config;
use crate::fetch::{Fetcher, RedirectHop};
use crate::sitemap::parse_sitemap;

/// Coverage entries printed per list before it is cut short.
const MAX_PRINTED_COVERAGE: usize = 200;

/// Result of auditing one crawled page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAudit {
    pub url: String,
    pub issues: Vec<String>,
    /// False when the page could not be fetched.
    pub fetched: bool,
}

impl PageAudit {
    pub fn ok(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub pages: Vec<PageAudit>,
    pub visited: usize,
    /// Normalised sitemap URLs, `None` when the live sitemap was unavailable.
    pub sitemap: Option<Vec<String>>,
}

/// Crawl-vs-sitemap diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coverage {
    /// Pages the crawler fetched that the sitemap does not list.
    pub missing_from_sitemap: Vec<String>,
    /// Sitemap URLs the crawler never reached.
    pub unreached: Vec<String>,
}

impl CrawlReport {
    pub fn failed(&self) -> impl Iterator<Item = &PageAudit> {
        self.pages.iter().filter(|p| !p.ok())
    }

    pub fn coverage(&self) -> Option<Coverage> {
        let sitemap = self.sitemap.as_ref()?;
        let listed: HashSet<&str> = sitemap.iter().map(String::as_str).collect();
        let crawled: HashSet<&str> = self.pages.iter().map(|p| p.url.as_str()).collect();
        Some(Coverage {
            missing_from_sitemap: self
                .pages
                .iter()
                .filter(|p| p.fetched && !listed.contains(p.url.as_str()))
                .map(|p| p.url.clone())
                .collect(),
            unreached: sitemap
                .iter()
                .filter(|u| !crawled.contains(u.as_str()))
                .cloned()
                .collect(),
        })
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("selector is valid")
}

/// Problems with the canonical URL itself, independent of the page.
fn canonical_validity(canon: &str, origin: &Url) -> Vec<String> {
    let Ok(u) = Url::parse(canon) else {
        return vec!["Canonical is not a valid absolute URL".to_string()];
    };
    let mut issues = Vec::new();
    if u.scheme() != origin.scheme() {
        issues.push(format!("Canonical must be {}", origin.scheme()));
    }
    if u.origin() != origin.origin() {
        issues.push(format!(
            "Canonical origin must be {}",
            origin.origin().ascii_serialization()
        ));
    }
    if u.query().is_some() {
        issues.push("Canonical must not include query".to_string());
    }
    if u.fragment().is_some() {
        issues.push("Canonical must not include fragment".to_string());
    }
    if !looks_like_file(u.path()) && !u.path().ends_with('/') {
        issues.push("Canonical should end with trailing slash".to_string());
    }
    issues
}

/// Canonical and `og:url` issues for a page fetched from `page`.
pub fn canonical_issues(html: &str, page: &Url, origin: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let canonicals: Vec<String> = doc
        .select(&selector(r#"link[rel~="canonical"]"#))
        .map(|el| el.value().attr("href").unwrap_or("").trim().to_string())
        .collect();
    let og = doc
        .select(&selector(r#"meta[property="og:url"]"#))
        .next()
        .and_then(|el| el.value().attr("content").map(|c| c.trim().to_string()))
        .unwrap_or_default();
    let canon = canonicals.first().cloned().unwrap_or_default();
    let expected = page.as_str();

    let mut issues = Vec::new();
    if canon.is_empty() {
        issues.push("Missing canonical".to_string());
    } else {
        issues.extend(canonical_validity(&canon, origin));
    }
    if og.is_empty() {
        issues.push("Missing og:url".to_string());
    }
    if !canon.is_empty() && !same_normalized(&canon, expected, page) {
        issues.push(format!("Canonical mismatch -> {}", canon));
    }
    if !og.is_empty() && !same_normalized(&og, expected, page) {
        issues.push(format!("og:url mismatch -> {}", og));
    }
    if !canon.is_empty() && !og.is_empty() && !same_normalized(&og, &canon, page) {
        issues.push("og:url does not match canonical".to_string());
    }
    if canonicals.len() > 1 {
        issues.push(format!("Multiple canonical tags ({})", canonicals.len()));
    }
    issues
}

/// Same-origin page links of `html`, normalised against `page`.
pub fn same_origin_links(html: &str, page: &Url, origin: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    doc.select(&selector("a[href]"))
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !is_non_page_href(href))
        .filter_map(|href| normalize_url(href, page))
        .filter(|u| u.origin() == origin.origin())
        .collect()
}

/// Normalised, deduplicated `<loc>`s of the live sitemap, or `None` when it
/// cannot be fetched or parsed.
async fn live_sitemap(config: &Config, fetcher: &mut Fetcher) -> Result<Option<Vec<Url>>> {
    let origin = config.origin_url()?;
    let sitemap_url = format!("{}/sitemap.xml", config.origin());

    let xml = match fetcher.get_text(&sitemap_url).await {
        Ok(xml) => xml,
        Err(e) => {
            tracing::warn!(url = %sitemap_url, error = %e, "sitemap fetch failed");
            return Ok(None);
        }
    };
    let parsed = match parse_sitemap(&xml) {
        Ok(parsed) if parsed.has_urlset => parsed,
        Ok(_) => {
            tracing::warn!(url = %sitemap_url, "no <urlset> in sitemap");
            return Ok(None);
        }
        Err(e) => {
            tracing::warn!(url = %sitemap_url, error = %e, "unparseable sitemap");
            return Ok(None);
        }
    };

    let mut seen = HashSet::new();
    let urls = parsed
        .locs
        .iter()
        .filter_map(|loc| normalize_url(loc, &origin))
        .filter(|u| seen.insert(u.to_string()))
        .collect();
    Ok(Some(urls))
}

/// Breadth-first crawl from the origin, bounded by `crawl.max_pages` and
/// `crawl.max_depth`, with the sitemap fetched first for the coverage diff.
pub async fn crawl_canonicals(config: &Config) -> Result<CrawlReport> {
    let origin = config.origin_url()?;
    let mut fetcher = Fetcher::new(&config.crawl)?;
    let max_pages = config.crawl.max_pages;
    let max_depth = config.crawl.max_depth;

    let mut report = CrawlReport {
        sitemap: live_sitemap(config, &mut fetcher)
            .await?
            .map(|urls| urls.iter().map(Url::to_string).collect()),
        ..Default::default()
    };

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(Url, usize)> = VecDeque::new();
    queue.push_back((origin.clone(), 0));

    while let Some((url, depth)) = queue.pop_front() {
        if visited.len() >= max_pages {
            break;
        }
        if !visited.insert(url.to_string()) {
            continue;
        }

        let html = match fetcher.get_text(url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "fetch failed");
                report.pages.push(PageAudit {
                    url: url.to_string(),
                    issues: vec![format!("Fetch failed: {}", e)],
                    fetched: false,
                });
                continue;
            }
        };

        if depth < max_depth {
            for link in same_origin_links(&html, &url, &origin) {
                if !visited.contains(link.as_str()) {
                    queue.push_back((link, depth + 1));
                }
            }
        }
        report.pages.push(PageAudit {
            url: url.to_string(),
            issues: canonical_issues(&html, &url, &origin),
            fetched: true,
        });
    }
    report.visited = visited.len();
    Ok(report)
}

fn print_limited(title: &str, urls: &[String]) {
    println!("\n{}", title);
    for u in urls.iter().take(MAX_PRINTED_COVERAGE) {
        println!("  - {}", u);
    }
    if urls.len() > MAX_PRINTED_COVERAGE {
        println!("  (+{} more)", urls.len() - MAX_PRINTED_COVERAGE);
    }
}

/// Returns `false` when any page failed. Coverage gaps are reported but do
/// not fail the audit.
pub async fn run_canonicals(config: &Config) -> Result<bool> {
    println!("Verifying canonical and og:url consistency across {}\n", config.origin());
    let report = crawl_canonicals(config).await?;

    let failed: Vec<&PageAudit> = report.failed().collect();
    println!("PASSED: {} pages", report.pages.len() - failed.len());
    println!("FAILED: {} pages\n", failed.len());
    if !failed.is_empty() {
        println!("Issues found:\n");
        for page in &failed {
            println!("{}", page.url);
            for issue in &page.issues {
                println!("   -> {}", issue);
            }
            println!();
        }
    }
    println!("Crawled {} unique URLs", report.visited);

    println!("\n--- Coverage ---");
    match (report.coverage(), &report.sitemap) {
        (Some(coverage), Some(sitemap)) => {
            println!("Sitemap URLs: {}", sitemap.len());
            if coverage.missing_from_sitemap.is_empty() {
                println!("All crawled pages appear in the sitemap");
            } else {
                print_limited("Live but not in sitemap:", &coverage.missing_from_sitemap);
            }
            if !coverage.unreached.is_empty() {
                print_limited("In sitemap but not reached by the crawl:", &coverage.unreached);
            }
        }
        _ => println!("Sitemap unavailable; coverage not checked"),
    }
    Ok(failed.is_empty())
}

/// A `netlify.toml` redirect rule, as site paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedirectRule {
    pub from: String,
    pub to: String,
}

/// Variants of `url` that should redirect to it: the path without its
/// trailing slash, and the `.html` file form. The home page has none.
pub fn variants(url: &Url) -> Vec<Url> {
    let path = url.path();
    if path == "/" {
        return Vec::new();
    }
    let trimmed = path.trim_end_matches('/');
    let mut out = Vec::new();
    if trimmed != path {
        let mut no_slash = url.clone();
        no_slash.set_path(trimmed);
        out.push(no_slash);
    }
    if !looks_like_file(path) {
        let mut html = url.clone();
        html.set_path(&format!("{}.html", trimmed));
        out.push(html);
    }
    out
}

/// Whether `hop` is a permanent redirect to `expected`.
pub fn redirects_to(hop: &RedirectHop, expected: &Url) -> bool {
    hop.is_permanent()
        && hop
            .location
            .as_deref()
            .map(|loc| normalize_url(loc, expected).as_ref() == Some(expected))
            .unwrap_or(false)
}

/// Sitemap URLs normalised and deduplicated, shortest paths first. Falls
/// back to the home page when the sitemap is unavailable.
async fn audit_targets(config: &Config, fetcher: &mut Fetcher) -> Result<Vec<Url>> {
    let mut urls = live_sitemap(config, fetcher).await?.unwrap_or_default();
    if urls.is_empty() {
        urls.push(config.origin_url()?);
    }
    urls.sort_by_key(path_depth);
    Ok(urls)
}

/// Request every variant of every sitemap URL and collect the missing
/// redirects, deduplicated and capped at `crawl.max_redirect_suggestions`.
pub async fn propose_redirects(config: &Config) -> Result<Vec<RedirectRule>> {
    let mut fetcher = Fetcher::new(&config.crawl)?;
    let limit = config.crawl.max_redirect_suggestions;
    let targets = audit_targets(config, &mut fetcher).await?;

    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    'targets: for expected in &targets {
        for variant in variants(expected) {
            if rules.len() >= limit {
                break 'targets;
            }
            let ok = match fetcher.get_no_follow(variant.as_str()).await {
                Ok(hop) => redirects_to(&hop, expected),
                Err(e) => {
                    tracing::warn!(url = %variant, error = %e, "redirect check failed");
                    false
                }
            };
            if ok {
                continue;
            }
            let rule = RedirectRule {
                from: variant.path().to_string(),
                to: expected.path().to_string(),
            };
            if seen.insert(rule.clone()) {
                rules.push(rule);
            }
        }
    }
    Ok(rules)
}

pub fn render_rules(rules: &[RedirectRule]) -> String {
    let mut out = String::new();
    for r in rules {
        out.push_str("[[redirects]]\n");
        out.push_str(&format!("  from = \"{}\"\n", r.from));
        out.push_str(&format!("  to = \"{}\"\n", r.to));
        out.push_str("  status = 301\n\n");
    }
    out
}

/// Advisory: prints suggestions and never fails on findings.
pub async fn run_redirects(config: &Config) -> Result<()> {
    let rules = propose_redirects(config).await?;
    if rules.is_empty() {
        println!("All checked sitemap URLs have working variant redirects");
        return Ok(());
    }
    println!("# Add only the rules you need to netlify.toml.\n");
    print!("{}", render_rules(&rules));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn origin() -> Url {
        url("https://shop.test/")
    }

    #[test]
    fn clean_page_has_no_issues() {
        let html = r#"<head><link rel="canonical" href="https://shop.test/about/">
<meta property="og:url" content="https://shop.test/about/"></head>"#;
        assert!(canonical_issues(html, &url("https://shop.test/about/"), &origin()).is_empty());
    }

    #[test]
    fn reports_missing_mismatched_and_multiple() {
        let page = url("https://shop.test/about/");
        assert_eq!(
            canonical_issues("<head></head>", &page, &origin()),
            vec!["Missing canonical", "Missing og:url"]
        );

        let html = r#"<link rel="canonical" href="https://shop.test/">
<link rel="canonical" href="https://shop.test/about/">
<meta property="og:url" content="https://shop.test/about">"#;
        let issues = canonical_issues(html, &page, &origin());
        assert_eq!(
            issues,
            vec![
                "Canonical mismatch -> https://shop.test/",
                "og:url does not match canonical",
                "Multiple canonical tags (2)"
            ]
        );
    }

    #[test]
    fn rejects_canonicals_off_site_insecure_or_with_query() {
        let page = url("https://shop.test/about/");
        let with = |canon: &str| {
            let html = format!(
                r#"<link rel="canonical" href="{c}"><meta property="og:url" content="{c}">"#,
                c = canon
            );
            canonical_issues(&html, &page, &origin())
        };

        let insecure = with("http://shop.test/about/");
        assert!(insecure.contains(&"Canonical must be https".to_string()));
        assert!(insecure.contains(&"Canonical origin must be https://shop.test".to_string()));

        let off_site = with("https://mirror.test/about/");
        assert!(off_site.contains(&"Canonical origin must be https://shop.test".to_string()));

        let query = with("https://shop.test/about/?ref=x");
        assert_eq!(query, vec!["Canonical must not include query"]);

        assert_eq!(with("/about/"), vec!["Canonical is not a valid absolute URL"]);
    }

    #[test]
    fn coverage_diffs_crawl_against_sitemap() {
        let page = |u: &str, fetched| PageAudit {
            url: u.to_string(),
            issues: Vec::new(),
            fetched,
        };
        let report = CrawlReport {
            pages: vec![
                page("https://shop.test/", true),
                page("https://shop.test/new/", true),
                page("https://shop.test/gone/", false),
            ],
            visited: 3,
            sitemap: Some(vec![
                "https://shop.test/".to_string(),
                "https://shop.test/unlinked/".to_string(),
            ]),
        };
        assert_eq!(
            report.coverage(),
            Some(Coverage {
                missing_from_sitemap: vec!["https://shop.test/new/".to_string()],
                unreached: vec!["https://shop.test/unlinked/".to_string()],
            })
        );
        let no_sitemap = CrawlReport {
            sitemap: None,
            ..report
        };
        assert_eq!(no_sitemap.coverage(), None);
    }

    #[test]
    fn collects_same_origin_links_only() {
        let page = url("https://shop.test/articles/");
        let html = r##"<a href="tote.html?x=1">a</a><a href="/es/#top">b</a>
<a href="https://other.test/">c</a><a href="#x">d</a><a href="mailto:a@b">e</a>"##;
        let links: Vec<String> = same_origin_links(html, &page, &url("https://shop.test/"))
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            links,
            vec!["https://shop.test/articles/tote.html", "https://shop.test/es/"]
        );
    }

    #[test]
    fn variants_cover_no_slash_and_html() {
        let v: Vec<String> = variants(&url("https://shop.test/articles/tote/"))
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            v,
            vec!["https://shop.test/articles/tote", "https://shop.test/articles/tote.html"]
        );
        assert!(variants(&url("https://shop.test/")).is_empty());
        assert!(variants(&url("https://shop.test/feed.xml")).is_empty());
    }

    #[test]
    fn accepts_only_permanent_redirects_to_expected() {
        let expected = url("https://shop.test/a/");
        let hop = |status, loc: &str| RedirectHop {
            status,
            location: Some(loc.to_string()),
        };
        assert!(redirects_to(&hop(301, "/a/"), &expected));
        assert!(redirects_to(&hop(308, "https://shop.test/a"), &expected));
        assert!(!redirects_to(&hop(302, "/a/"), &expected));
        assert!(!redirects_to(&hop(301, "/b/"), &expected));
        assert!(!redirects_to(&RedirectHop { status: 301, location: None }, &expected));
    }

    #[test]
    fn renders_netlify_rules() {
        let rules = vec![RedirectRule {
            from: "/a".into(),
            to: "/a/".into(),
        }];
        assert_eq!(
            render_rules(&rules),
            "[[redirects]]\n  from = \"/a\"\n  to = \"/a/\"\n  status = 301\n\n"
        );
    }
}
