//! Configuration loading.
//!
//! `bagsite` reads a single TOML file (default `./config/bagsite.toml`).
//! Only `[site]` is required; every other section falls back to defaults.
//! Relative paths are resolved against the working directory, except
//! `sitemap.output` which is relative to `site.root`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub sitemap: SitemapConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub walk: WalkConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
    #[serde(default)]
    pub pages: PagesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    /// Public origin, e.g. `https://affordable-handbags.com`.
    pub origin: String,
    /// Directory holding the published HTML tree.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Write `<file>.bak` before the first rewrite of a file.
    #[serde(default = "default_true")]
    pub backup: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    /// Overrides `default_language` from the catalog file.
    #[serde(default)]
    pub default_language: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            default_language: None,
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("data/catalog.toml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SitemapConfig {
    /// Publish `/articles/<name>/` instead of `/articles/<name>.html`.
    #[serde(default = "default_true")]
    pub trailing_slash: bool,
    #[serde(default = "default_sitemap_output")]
    pub output: PathBuf,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            trailing_slash: true,
            output: default_sitemap_output(),
        }
    }
}

fn default_sitemap_output() -> PathBuf {
    PathBuf::from("sitemap.xml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct TagsConfig {
    /// The one GTM container every page should load.
    #[serde(default)]
    pub gtm_id: Option<String>,
    /// Retired container ids whose loaders are removed outright.
    #[serde(default)]
    pub legacy_gtm_ids: Vec<String>,
    /// GA4 measurement id; now configured inside GTM, so stand-alone loaders
    /// and inline `gtag('config', ...)` calls for it are removed.
    #[serde(default)]
    pub ga4_id: Option<String>,
    /// AdSense publisher id (`ca-pub-...`).
    #[serde(default)]
    pub adsense_client: Option<String>,
    /// Exact `ads.txt` record to require; derived from `adsense_client`
    /// when unset.
    #[serde(default)]
    pub ads_txt_line: Option<String>,
    /// File names skipped by every job that walks the site.
    #[serde(default = "default_skip_files")]
    pub skip_files: Vec<String>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            gtm_id: None,
            legacy_gtm_ids: Vec::new(),
            ga4_id: None,
            adsense_client: None,
            ads_txt_line: None,
            skip_files: default_skip_files(),
        }
    }
}

fn default_skip_files() -> Vec<String> {
    vec![
        "test-flicker.html".to_string(),
        "test-filtering.html".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WalkConfig {
    /// Extra globs (relative to `site.root`) excluded from every job.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Minimum gap between requests.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_redirect_suggestions")]
    pub max_redirect_suggestions: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_redirect_suggestions: default_max_redirect_suggestions(),
        }
    }
}

fn default_max_pages() -> usize {
    200
}
fn default_max_depth() -> usize {
    2
}
fn default_delay_ms() -> u64 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("bagsite-audit/{}", env!("CARGO_PKG_VERSION"))
}
fn default_max_redirect_suggestions() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetConfig {
    /// JSON file holding saved slider values.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".bagsite/widget-state.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PagesConfig {
    /// Address shown on the scaffolded contact pages.
    #[serde(default)]
    pub contact_email: Option<String>,
    /// Redirect file, relative to `site.root`.
    #[serde(default = "default_netlify_toml")]
    pub netlify_toml: PathBuf,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            contact_email: None,
            netlify_toml: default_netlify_toml(),
        }
    }
}

fn default_netlify_toml() -> PathBuf {
    PathBuf::from("netlify.toml")
}

impl Config {
    /// Defaults for commands that only need the catalog or widget state.
    pub fn minimal() -> Self {
        Self {
            site: SiteConfig {
                origin: "https://localhost".to_string(),
                root: default_root(),
                backup: true,
            },
            catalog: CatalogConfig::default(),
            sitemap: SitemapConfig::default(),
            tags: TagsConfig::default(),
            walk: WalkConfig::default(),
            crawl: CrawlConfig::default(),
            widget: WidgetConfig::default(),
            pages: PagesConfig::default(),
        }
    }

    /// Origin without a trailing slash.
    pub fn origin(&self) -> &str {
        self.site.origin.trim_end_matches('/')
    }

    /// Origin as a URL with path `/`, used as the base for link resolution.
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&format!("{}/", self.origin()))
            .with_context(|| format!("Invalid site.origin: {}", self.site.origin))
    }

    pub fn site_root(&self) -> &Path {
        &self.site.root
    }

    pub fn sitemap_path(&self) -> PathBuf {
        self.site.root.join(&self.sitemap.output)
    }

    pub fn netlify_toml_path(&self) -> PathBuf {
        self.site.root.join(&self.pages.netlify_toml)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let origin = Url::parse(&config.site.origin)
        .with_context(|| format!("site.origin is not a valid URL: {}", config.site.origin))?;
    match origin.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!("site.origin must use http or https, got '{}'", other),
    }
    if origin.path() != "/" || origin.query().is_some() || origin.fragment().is_some() {
        anyhow::bail!(
            "site.origin must be a bare origin without path, query or fragment: {}",
            config.site.origin
        );
    }

    if config.crawl.max_pages == 0 {
        anyhow::bail!("crawl.max_pages must be >= 1");
    }
    if config.crawl.timeout_secs == 0 {
        anyhow::bail!("crawl.timeout_secs must be > 0");
    }

    if let Some(id) = &config.tags.gtm_id {
        if !is_container_id(id) {
            anyhow::bail!("tags.gtm_id must look like GTM-XXXXXXX, got '{}'", id);
        }
    }
    for id in &config.tags.legacy_gtm_ids {
        if !is_container_id(id) {
            anyhow::bail!("tags.legacy_gtm_ids entry must look like GTM-XXXXXXX or GT-XXXXXXX, got '{}'", id);
        }
        if config.tags.gtm_id.as_deref() == Some(id.as_str()) {
            anyhow::bail!("tags.legacy_gtm_ids must not contain tags.gtm_id ({})", id);
        }
    }
    if let Some(id) = &config.tags.ga4_id {
        if !id.starts_with("G-") {
            anyhow::bail!("tags.ga4_id must look like G-XXXXXXX, got '{}'", id);
        }
    }
    if let Some(client) = &config.tags.adsense_client {
        if !client.starts_with("ca-pub-") {
            anyhow::bail!("tags.adsense_client must start with 'ca-pub-', got '{}'", client);
        }
    }
    if let Some(email) = &config.pages.contact_email {
        if !email.contains('@') || email.chars().any(char::is_whitespace) {
            anyhow::bail!("pages.contact_email is not an email address: '{}'", email);
        }
    }

    Ok(())
}

fn is_container_id(id: &str) -> bool {
    let rest = id
        .strip_prefix("GTM-")
        .or_else(|| id.strip_prefix("GT-"));
    matches!(rest, Some(r) if !r.is_empty() && r.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn only_site_section_is_required() {
        let f = write_config("[site]\norigin = \"https://shop.test/\"\n");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.origin(), "https://shop.test");
        assert!(cfg.site.backup);
        assert!(cfg.sitemap.trailing_slash);
        assert_eq!(cfg.crawl.max_pages, 200);
        assert_eq!(cfg.crawl.max_depth, 2);
        assert_eq!(cfg.catalog.path, PathBuf::from("data/catalog.toml"));
        assert!(cfg.tags.skip_files.contains(&"test-flicker.html".to_string()));
    }

    #[test]
    fn rejects_origin_with_path() {
        let f = write_config("[site]\norigin = \"https://shop.test/blog/\"\n");
        let err = load_config(f.path()).unwrap_err().to_string();
        assert!(err.contains("bare origin"), "{}", err);
    }

    #[test]
    fn rejects_bad_gtm_id() {
        let f = write_config(
            "[site]\norigin = \"https://shop.test\"\n[tags]\ngtm_id = \"UA-1234\"\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn rejects_current_container_listed_as_legacy() {
        let f = write_config(
            "[site]\norigin = \"https://shop.test\"\n[tags]\ngtm_id = \"GTM-AAAA\"\nlegacy_gtm_ids = [\"GTM-AAAA\"]\n",
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_config(Path::new("/nonexistent/bagsite.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn sitemap_path_is_under_root() {
        let mut cfg = Config::minimal();
        cfg.site.root = PathBuf::from("/srv/site");
        assert_eq!(cfg.sitemap_path(), PathBuf::from("/srv/site/sitemap.xml"));
    }
}
