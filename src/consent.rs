//! Consent audits: `ads.txt` and a static Consent Mode / CMP scan.
//!
//! The consent scan reads page source only. Whether tags actually wait for
//! consent at runtime has to be checked in a browser.

use anyhow::{anyhow, Context, Result};
use regex::{Regex, RegexBuilder};
use std::path::Path;

use crate::config::Config;
use crate::fetch::Fetcher;

/// Google's certification authority id, the fourth `ads.txt` field.
pub const GOOGLE_CERT_ID: &str = "f08c47fec0942fa0";

/// Keys Consent Mode v2 expects in the `default` call.
pub const CONSENT_MODE_KEYS: [&str; 4] = [
    "ad_user_data",
    "ad_personalization",
    "ad_storage",
    "analytics_storage",
];

/// The `ads.txt` line authorising `client` (`ca-pub-...` or `pub-...`).
pub fn expected_ads_txt_line(client: &str) -> String {
    let publisher = client.trim().trim_start_matches("ca-");
    format!("google.com, {}, DIRECT, {}", publisher, GOOGLE_CERT_ID)
}

fn ads_txt_fields(line: &str) -> Vec<String> {
    line.split(',')
        .map(|f| f.trim().to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdsTxtCheck {
    pub ok: bool,
    /// First record in the file, shown when the expected one is missing.
    pub first_line: Option<String>,
    pub records: usize,
}

/// Look for `expected` among the records of an `ads.txt` body. Fields are
/// compared case-insensitively and comments are ignored.
pub fn check_ads_txt(body: &str, expected: &str) -> AdsTxtCheck {
    let want = ads_txt_fields(expected);
    let records: Vec<&str> = body
        .lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty())
        .collect();
    AdsTxtCheck {
        ok: records.iter().any(|r| ads_txt_fields(r) == want),
        first_line: records.first().map(|r| r.to_string()),
        records: records.len(),
    }
}

fn ads_txt_expectation(config: &Config) -> Result<String> {
    if let Some(line) = &config.tags.ads_txt_line {
        return Ok(line.clone());
    }
    config
        .tags
        .adsense_client
        .as_deref()
        .map(expected_ads_txt_line)
        .ok_or_else(|| anyhow!("tags.adsense_client or tags.ads_txt_line must be set for the ads.txt audit"))
}

/// Returns `false` when `ads.txt` is unreachable or lacks the publisher.
pub async fn run_ads_txt(config: &Config) -> Result<bool> {
    let expected = ads_txt_expectation(config)?;
    let url = format!("{}/ads.txt", config.origin());
    let mut fetcher = Fetcher::new(&config.crawl)?;

    let body = match fetcher.get_text(&url).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "ads.txt fetch failed");
            println!("ads.txt @ {}: FAILED ({:#})", url, e);
            println!("  Expected: {}", expected);
            return Ok(false);
        }
    };

    let check = check_ads_txt(&body, &expected);
    if check.ok {
        println!("ads.txt @ {}: OK ({} records)", url, check.records);
    } else {
        println!("ads.txt @ {}: Missing/invalid", url);
        println!("  Expected: {}", expected);
        println!(
            "  First line found: {}",
            check.first_line.as_deref().unwrap_or("(none)")
        );
    }
    Ok(check.ok)
}

fn ci(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Invalid pattern: {}", pattern))
}

/// Compiled patterns for the consent scan.
pub struct ConsentRules {
    cmp: Regex,
    gtm_loader: Regex,
    gtag_loader: Regex,
    adsense: Regex,
    consent_default: Regex,
    consent_update: Regex,
    object_key: Regex,
}

impl ConsentRules {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cmp: ci(concat!(
                r"__tcfapi|fundingchoicesmessages\.google\.com|otSDKStub\.js|",
                r"cookieconsent(?:\.min)?\.js|consent\.cookiebot\.com|",
                r"quantcast\.mp\.quantserve\.com|cdn\.privacy-mgmt\.com|",
                r"iubenda\.com/consent|didomi|onetrust|consentmanager"
            ))?,
            gtm_loader: ci(r"googletagmanager\.com/gtm\.js")?,
            gtag_loader: ci(r"googletagmanager\.com/gtag/js\?id=")?,
            adsense: ci(r"pagead2\.googlesyndication\.com/pagead/js")?,
            consent_default: ci(
                r#"gtag\(\s*['"]consent['"]\s*,\s*['"]default['"]\s*,\s*(\{[\s\S]*?\})\s*\)"#,
            )?,
            consent_update: ci(r#"gtag\(\s*['"]consent['"]\s*,\s*['"]update['"]"#)?,
            object_key: ci(r#"['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?\s*:"#)?,
        })
    }

    fn object_keys(&self, object: &str) -> Vec<String> {
        self.object_key
            .captures_iter(object)
            .map(|c| c[1].to_string())
            .collect()
    }

    pub fn scan(&self, html: &str) -> ConsentScan {
        let first = |re: &Regex| re.find(html).map(|m| m.start());

        let mut cmp_hints: Vec<String> = Vec::new();
        for m in self.cmp.find_iter(html) {
            let hint = m.as_str().to_ascii_lowercase();
            if !cmp_hints.contains(&hint) {
                cmp_hints.push(hint);
            }
        }

        let defaults: Vec<(usize, Vec<String>)> = self
            .consent_default
            .captures_iter(html)
            .filter_map(|c| Some((c.get(0)?.start(), self.object_keys(c.get(1)?.as_str()))))
            .collect();
        let missing_keys = if defaults.is_empty() {
            Vec::new()
        } else {
            defaults
                .iter()
                .map(|(_, keys)| {
                    CONSENT_MODE_KEYS
                        .iter()
                        .filter(|k| !keys.iter().any(|x| x == *k))
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                })
                .min_by_key(Vec::len)
                .unwrap_or_default()
        };

        ConsentScan {
            cmp_hints,
            cmp_at: first(&self.cmp),
            gtm_at: first(&self.gtm_loader),
            gtag_at: first(&self.gtag_loader),
            adsense_at: first(&self.adsense),
            default_at: defaults.first().map(|(at, _)| *at),
            missing_keys,
            has_update: self.consent_update.is_match(html),
        }
    }
}

/// Byte offsets of the first occurrence of each marker in a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentScan {
    pub cmp_hints: Vec<String>,
    pub cmp_at: Option<usize>,
    pub gtm_at: Option<usize>,
    pub gtag_at: Option<usize>,
    pub adsense_at: Option<usize>,
    /// First `gtag('consent', 'default', {...})` call.
    pub default_at: Option<usize>,
    /// Consent Mode v2 keys absent from the most complete default call.
    pub missing_keys: Vec<String>,
    pub has_update: bool,
}

fn before(a: Option<usize>, b: Option<usize>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}

impl ConsentScan {
    /// First Google tag loader, GTM or gtag.js.
    pub fn loader_at(&self) -> Option<usize> {
        match (self.gtm_at, self.gtag_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        match self.default_at {
            None => issues.push("No Consent Mode default call".to_string()),
            Some(at) => {
                if !self.missing_keys.is_empty() {
                    issues.push(format!(
                        "Consent default is missing keys: {}",
                        self.missing_keys.join(", ")
                    ));
                }
                if self.loader_at().map(|l| l < at).unwrap_or(false) {
                    issues.push("Consent default comes after the Google tag loader".to_string());
                }
            }
        }
        if self.cmp_at.is_none() {
            issues.push("No CMP script found".to_string());
        } else if before(self.gtm_at, self.cmp_at) {
            issues.push("GTM appears before the CMP".to_string());
        }
        if before(self.gtag_at, self.cmp_at) {
            issues.push("Hard-coded GA4 loader before the CMP".to_string());
        }
        if before(self.adsense_at, self.cmp_at) {
            issues.push("Hard-coded AdSense before the CMP".to_string());
        }
        issues
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "YES"
    } else {
        "NO"
    }
}

/// Scan the live home page, or `file` when given. Returns `false` on any
/// issue.
pub async fn run_consent(config: &Config, file: Option<&Path>) -> Result<bool> {
    let (source, html) = match file {
        Some(path) => (
            path.display().to_string(),
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => {
            let url = format!("{}/", config.origin());
            let mut fetcher = Fetcher::new(&config.crawl)?;
            let html = fetcher.get_text(&url).await?;
            (url, html)
        }
    };

    let scan = ConsentRules::new()?.scan(&html);
    println!("CMP / Consent Mode audit (static): {}", source);
    println!(
        " - CMP hints found: {} ({})",
        scan.cmp_hints.len(),
        if scan.cmp_hints.is_empty() {
            "none".to_string()
        } else {
            scan.cmp_hints.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
        }
    );
    println!(" - GTM snippet present: {}", yes_no(scan.gtm_at.is_some()));
    println!(" - Consent Mode default present: {}", yes_no(scan.default_at.is_some()));
    println!(
        " - Default includes CMv2 keys ({}): {}",
        CONSENT_MODE_KEYS.join(", "),
        yes_no(scan.default_at.is_some() && scan.missing_keys.is_empty())
    );
    println!(" - Consent Mode update present: {}", yes_no(scan.has_update));

    let issues = scan.issues();
    if issues.is_empty() {
        println!("\nNo consent ordering issues found");
    } else {
        println!("\nIssues:");
        for issue in &issues {
            println!("  -> {}", issue);
        }
    }
    Ok(issues.is_empty())
}
