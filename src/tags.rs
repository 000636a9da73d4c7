//! Google Tag Manager and AdSense tag maintenance.
//!
//! The GTM job keeps exactly one container on every page: loaders and
//! noscript iframes for any other container are removed, as are stand-alone
//! GA4 loaders, inline `gtag('config', ...)` statements and the legacy UA
//! `analytics.js`. The rest of an inline gtag block (the `dataLayer` setup,
//! Consent Mode defaults) stays. The configured container's snippets are
//! then inserted when missing, after the consent defaults if the page has
//! them.

use anyhow::{Context, Result};
use bagsite_core::html::{find_first, find_tags, insert_before_close, remove_spans};
use regex::{Regex, RegexBuilder};

use crate::config::Config;
use crate::rewrite::{run_rewrite, FileEdit, RewriteOptions, RewriteReport};
use crate::walk::html_files;

pub const NOTE_LEGACY_GTM: &str = "removed legacy GTM container";
pub const NOTE_WRONG_GTM: &str = "removed other GTM container";
pub const NOTE_GA4_LOADER: &str = "removed stand-alone GA4 loader";
pub const NOTE_GTAG_CONFIG: &str = "removed inline gtag config";
pub const NOTE_UA: &str = "removed UA analytics.js";
pub const NOTE_HEAD_SNIPPET: &str = "inserted GTM head snippet";
pub const NOTE_NOSCRIPT: &str = "inserted GTM noscript";

const ADSENSE_MARKER: &str = "pagead2.googlesyndication.com";

fn head_snippet(gtm_id: &str) -> String {
    format!(
        "<!-- Google Tag Manager -->
<script>(function(w,d,s,l,i){{w[l]=w[l]||[];w[l].push({{'gtm.start':
new Date().getTime(),event:'gtm.js'}});var f=d.getElementsByTagName(s)[0],
j=d.createElement(s),dl=l!='dataLayer'?'&l='+l:'';j.async=true;j.src=
'https://www.googletagmanager.com/gtm.js?id='+i+dl;f.parentNode.insertBefore(j,f);
}})(window,document,'script','dataLayer','{}');</script>
<!-- End Google Tag Manager -->",
        gtm_id
    )
}

fn noscript_snippet(gtm_id: &str) -> String {
    format!(
        "<!-- Google Tag Manager (noscript) -->
<noscript><iframe src=\"https://www.googletagmanager.com/ns.html?id={}\"
height=\"0\" width=\"0\" style=\"display:none;visibility:hidden\"></iframe></noscript>
<!-- End Google Tag Manager (noscript) -->",
        gtm_id
    )
}

fn adsense_snippet(client: &str) -> String {
    format!(
        "<script async src=\"https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js?client={}\" crossorigin=\"anonymous\"></script>",
        client
    )
}

fn ci(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Invalid pattern: {}", pattern))
}

/// Settings and compiled patterns for the GTM job.
pub struct GtmRules {
    gtm_id: String,
    legacy: Vec<String>,
    ga4_id: Option<String>,
    script_block: Regex,
    noscript_block: Regex,
    loader_id: Regex,
    quoted_id: Regex,
    ns_id: Regex,
    ga4_loader: Regex,
    gtag_config: Regex,
    consent_default: Regex,
    ua: Regex,
    empty_comments: Regex,
}

/// What one script block is, as far as the GTM job cares.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptKind {
    GtmLoader(String),
    Ga4Loader,
    Universal,
    Other,
}

impl GtmRules {
    pub fn new(gtm_id: &str, legacy: &[String], ga4_id: Option<&str>) -> Result<Self> {
        Ok(Self {
            gtm_id: gtm_id.to_string(),
            legacy: legacy.to_vec(),
            ga4_id: ga4_id.map(str::to_string),
            script_block: ci(r"<script\b[^>]*>[\s\S]*?</script\s*>")?,
            noscript_block: ci(r"<noscript\b[^>]*>[\s\S]*?</noscript\s*>")?,
            loader_id: ci(r"googletagmanager\.com/gtm\.js\?id=((?:GTM|GT)-[A-Z0-9_-]+)")?,
            quoted_id: ci(r#"['"]((?:GTM|GT)-[A-Z0-9_-]+)['"]"#)?,
            ns_id: ci(r"googletagmanager\.com/ns\.html\?id=((?:GTM|GT)-[A-Z0-9_-]+)")?,
            ga4_loader: ci(r"googletagmanager\.com/gtag/js\?id=G-[A-Z0-9_-]+")?,
            gtag_config: ci(
                r#"[ \t]*gtag\(\s*['"]config['"]\s*,\s*['"]G-[A-Z0-9_-]+['"]\s*(?:,\s*\{[^{}]*\}\s*)?\)\s*;?[ \t]*(?:\r?\n)?"#,
            )?,
            consent_default: ci(r#"gtag\(\s*['"]consent['"]\s*,\s*['"]default['"]"#)?,
            ua: ci(r"google-analytics\.com/analytics\.js")?,
            empty_comments: ci(
                r"<!--\s*Google Tag Manager(?: \(noscript\))?\s*-->\s*<!--\s*End Google Tag Manager(?: \(noscript\))?\s*-->",
            )?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let gtm_id = config
            .tags
            .gtm_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("tags.gtm_id must be set for the GTM job"))?;
        Self::new(gtm_id, &config.tags.legacy_gtm_ids, config.tags.ga4_id.as_deref())
    }

    fn classify(&self, block: &str) -> ScriptKind {
        let is_gtm = block.to_ascii_lowercase().contains("gtm.js");
        if is_gtm {
            if let Some(c) = self.loader_id.captures(block) {
                return ScriptKind::GtmLoader(c[1].to_string());
            }
            if let Some(c) = self.quoted_id.captures(block) {
                return ScriptKind::GtmLoader(c[1].to_string());
            }
        }
        if self.ga4_loader.is_match(block) {
            ScriptKind::Ga4Loader
        } else if self.ua.is_match(block) {
            ScriptKind::Universal
        } else {
            ScriptKind::Other
        }
    }

    fn is_legacy(&self, id: &str) -> bool {
        self.legacy.iter().any(|l| l.eq_ignore_ascii_case(id))
    }

    fn is_current(&self, id: &str) -> bool {
        id.eq_ignore_ascii_case(&self.gtm_id)
    }

    fn removal_note(&self, id: &str) -> &'static str {
        if self.is_legacy(id) {
            NOTE_LEGACY_GTM
        } else {
            NOTE_WRONG_GTM
        }
    }

    /// Cut `gtag('config', 'G-...')` statements out of inline scripts.
    /// Returns the new text and the offsets (in it) of blocks left empty.
    fn strip_gtag_config(&self, html: &str) -> (String, Vec<usize>) {
        let mut out = String::with_capacity(html.len());
        let mut emptied = Vec::new();
        let mut cursor = 0;
        for m in self.script_block.find_iter(html) {
            if !self.gtag_config.is_match(m.as_str()) {
                continue;
            }
            out.push_str(&html[cursor..m.start()]);
            let cleaned = self.gtag_config.replace_all(m.as_str(), "");
            if script_body(&cleaned).trim().is_empty() {
                emptied.push(out.len());
            }
            out.push_str(&cleaned);
            cursor = m.end();
        }
        out.push_str(&html[cursor..]);
        (out, emptied)
    }

    /// End of the first inline script in `<head>` that sets Consent Mode
    /// defaults.
    fn consent_defaults_end(&self, html: &str) -> Option<usize> {
        let head_end = bagsite_core::html::find_close(html, "head")?;
        self.script_block
            .find_iter(html)
            .take_while(|m| m.start() < head_end)
            .find(|m| self.consent_default.is_match(m.as_str()))
            .map(|m| m.end())
    }

    /// Clean conflicting tags and ensure the configured container's snippets.
    pub fn apply(&self, html: &str) -> FileEdit {
        let head = find_first(html, "head").is_some();
        let body = find_first(html, "body").is_some();
        if !head && !body {
            return FileEdit::Skip("no <head> or <body>".to_string());
        }

        let mut notes: Vec<String> = Vec::new();
        let mut note = |n: &str| {
            if !notes.iter().any(|x| x == n) {
                notes.push(n.to_string());
            }
        };

        let (stripped, emptied) = self.strip_gtag_config(html);
        if stripped != html {
            note(NOTE_GTAG_CONFIG);
        }
        let html = stripped.as_str();

        let mut spans = Vec::new();
        let mut has_head_snippet = false;
        for m in self.script_block.find_iter(html) {
            if emptied.contains(&m.start()) {
                spans.push((m.start(), m.end()));
                continue;
            }
            match self.classify(m.as_str()) {
                ScriptKind::GtmLoader(id) if self.is_current(&id) => has_head_snippet = true,
                ScriptKind::GtmLoader(id) => {
                    note(self.removal_note(&id));
                    spans.push((m.start(), m.end()));
                }
                ScriptKind::Ga4Loader => {
                    note(NOTE_GA4_LOADER);
                    spans.push((m.start(), m.end()));
                }
                ScriptKind::Universal => {
                    note(NOTE_UA);
                    spans.push((m.start(), m.end()));
                }
                ScriptKind::Other => {}
            }
        }

        let mut has_noscript = false;
        for m in self.noscript_block.find_iter(html) {
            if let Some(c) = self.ns_id.captures(m.as_str()) {
                if self.is_current(&c[1]) {
                    has_noscript = true;
                } else {
                    note(self.removal_note(&c[1]));
                    spans.push((m.start(), m.end()));
                }
            }
        }

        let mut out = remove_spans(html, &spans);
        if !spans.is_empty() {
            let leftovers: Vec<(usize, usize)> = self
                .empty_comments
                .find_iter(&out)
                .map(|m| (m.start(), m.end()))
                .collect();
            out = remove_spans(&out, &leftovers);
        }

        if head && !has_head_snippet {
            let mut snippet = head_snippet(&self.gtm_id);
            if let Some(ga4) = &self.ga4_id {
                snippet.push_str(&format!(
                    "\n<!-- GA4 is configured in GTM (container {}) with measurement id {} -->",
                    self.gtm_id, ga4
                ));
            }
            out = match self.consent_defaults_end(&out) {
                Some(at) => format!("{}\n{}{}", &out[..at], snippet, &out[at..]),
                None => insert_after_open(&out, "head", &snippet),
            };
            note(NOTE_HEAD_SNIPPET);
        }
        if body && !has_noscript {
            out = insert_after_open(&out, "body", &noscript_snippet(&self.gtm_id));
            note(NOTE_NOSCRIPT);
        }

        FileEdit::Rewrite { html: out, notes }
    }
}

/// Text between a script block's opening and closing tags.
fn script_body(block: &str) -> &str {
    let open_end = block.find('>').map(|i| i + 1).unwrap_or(0);
    let close = block.rfind("</").unwrap_or(block.len()).max(open_end);
    &block[open_end..close]
}

/// Insert `snippet` on a new line right after the first `<name ...>` tag.
fn insert_after_open(html: &str, name: &str, snippet: &str) -> String {
    match find_first(html, name) {
        Some(tag) => format!("{}\n{}{}", &html[..tag.end], snippet, &html[tag.end..]),
        None => html.to_string(),
    }
}

pub fn run_gtm(config: &Config, opts: RewriteOptions) -> Result<RewriteReport> {
    let rules = GtmRules::from_config(config)?;
    let files = html_files(config)?;
    let report = run_rewrite(&files, opts, |_, html| Ok(rules.apply(html)));
    report.print("GTM enforcement");
    Ok(report)
}

/// Add the AdSense loader before the first script in `<head>`, or at the end
/// of `<head>` when it has no scripts.
pub fn apply_adsense(html: &str, client: &str) -> FileEdit {
    if html.contains(ADSENSE_MARKER) {
        return FileEdit::Skip("already has AdSense".to_string());
    }
    let Some(head) = find_first(html, "head") else {
        return FileEdit::Skip("no <head>".to_string());
    };
    let snippet = adsense_snippet(client);
    let head_end = bagsite_core::html::find_close(html, "head").unwrap_or(html.len());

    let first_script = find_tags(html, "script")
        .into_iter()
        .find(|s| s.start > head.end && s.start < head_end);

    let out = match first_script {
        Some(script) => {
            let line_start = html[..script.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let indent = &html[line_start..script.start];
            if indent.trim().is_empty() {
                format!(
                    "{}{}{}\n{}",
                    &html[..line_start],
                    indent,
                    snippet,
                    &html[line_start..]
                )
            } else {
                format!("{}{}\n{}", &html[..script.start], snippet, &html[script.start..])
            }
        }
        None => match insert_before_close(html, "head", &[&snippet]) {
            Some(out) => out,
            None => return FileEdit::Skip("no </head>".to_string()),
        },
    };
    FileEdit::rewrite(out)
}

pub fn run_adsense(config: &Config, opts: RewriteOptions) -> Result<RewriteReport> {
    let client = config
        .tags
        .adsense_client
        .clone()
        .ok_or_else(|| anyhow::anyhow!("tags.adsense_client must be set for the AdSense job"))?;
    let files = html_files(config)?;
    let report = run_rewrite(&files, opts, |_, html| Ok(apply_adsense(html, &client)));
    report.print("AdSense injection");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> GtmRules {
        GtmRules::new("GTM-TCG7SMDD", &["GT-MR24WCXH".to_string()], None).unwrap()
    }

    fn rewritten(edit: FileEdit) -> (String, Vec<String>) {
        match edit {
            FileEdit::Rewrite { html, notes } => (html, notes),
            FileEdit::Skip(r) => panic!("unexpected skip: {}", r),
        }
    }

    const DIRTY: &str = r#"<html>
<head>
    <meta charset="utf-8">
    <!-- Google Tag Manager -->
    <script>(function(w,d,s,l,i){j.src='https://www.googletagmanager.com/gtm.js?id='+i+dl;})(window,document,'script','dataLayer','GT-MR24WCXH');</script>
    <!-- End Google Tag Manager -->
    <script async src="https://www.googletagmanager.com/gtag/js?id=G-H1Q1KL01RP"></script>
    <script>
      window.dataLayer = window.dataLayer || [];
      function gtag(){dataLayer.push(arguments);}
      gtag('js', new Date());
      gtag('config', 'G-H1Q1KL01RP');
    </script>
    <script src="/assets/script.js"></script>
</head>
<body>
    <noscript><iframe src="https://www.googletagmanager.com/ns.html?id=GTM-OTHER1"></iframe></noscript>
    <p>Hi</p>
</body>
</html>"#;

    #[test]
    fn removes_conflicts_and_inserts_snippets() {
        let (out, notes) = rewritten(rules().apply(DIRTY));
        assert!(!out.contains("GT-MR24WCXH"));
        assert!(!out.contains("GTM-OTHER1"));
        assert!(!out.contains("gtag/js"));
        assert!(!out.contains("gtag('config'"));
        assert!(out.contains("gtag('js', new Date());"));
        assert!(out.contains("/assets/script.js"));
        assert!(out.contains("'dataLayer','GTM-TCG7SMDD'"));
        assert!(out.contains("ns.html?id=GTM-TCG7SMDD"));
        assert_eq!(out.matches("<!-- Google Tag Manager -->").count(), 1);
        for n in [
            NOTE_LEGACY_GTM,
            NOTE_WRONG_GTM,
            NOTE_GA4_LOADER,
            NOTE_GTAG_CONFIG,
            NOTE_HEAD_SNIPPET,
            NOTE_NOSCRIPT,
        ] {
            assert!(notes.iter().any(|x| x == n), "missing note {}", n);
        }
    }

    #[test]
    fn never_duplicates_the_snippet() {
        let (once, _) = rewritten(rules().apply(DIRTY));
        let (twice, notes) = rewritten(rules().apply(&once));
        assert_eq!(once, twice);
        assert!(notes.is_empty());
        assert_eq!(twice.matches("'dataLayer','GTM-TCG7SMDD'").count(), 1);
    }

    #[test]
    fn gtag_config_removal_keeps_consent_defaults() {
        let html = "<html><head>\n<script>window.dataLayer=window.dataLayer||[];function gtag(){dataLayer.push(arguments);}gtag('consent','default',{ad_storage:'denied'});gtag('config','G-ABC123');</script>\n</head><body></body></html>";
        let (out, notes) = rewritten(GtmRules::new("GTM-TCG7SMDD", &[], None).unwrap().apply(html));
        assert!(out.contains("gtag('consent','default',{ad_storage:'denied'});</script>"));
        assert!(out.contains("function gtag(){dataLayer.push(arguments);}"));
        assert!(!out.contains("G-ABC123"));
        assert!(notes.iter().any(|n| n == NOTE_GTAG_CONFIG));

        let consent = out.find("gtag('consent','default'").unwrap();
        let loader = out.find("googletagmanager.com/gtm.js").unwrap();
        assert!(consent < loader, "GTM snippet must follow the consent defaults");

        let (again, notes) = rewritten(GtmRules::new("GTM-TCG7SMDD", &[], None).unwrap().apply(&out));
        assert_eq!(again, out);
        assert!(notes.is_empty());
    }

    #[test]
    fn config_only_block_is_removed_whole() {
        let html = "<head>\n  <script>\n    gtag('config', 'G-ABC123', { send_page_view: false });\n  </script>\n  <title>x</title>\n</head><body></body>";
        let (out, _) = rewritten(rules().apply(html));
        assert!(!out.contains("G-ABC123"));
        assert!(!out.contains("<script>\n  </script>"));
        assert!(out.contains("  <title>x</title>"));
    }

    #[test]
    fn removes_universal_analytics() {
        let html = "<head>\n<script src=\"https://www.google-analytics.com/analytics.js\"></script>\n</head><body></body>";
        let (out, notes) = rewritten(rules().apply(html));
        assert!(!out.contains("analytics.js"));
        assert!(notes.iter().any(|n| n == NOTE_UA));
    }

    #[test]
    fn skips_fragments() {
        assert_eq!(
            rules().apply("<div>partial</div>"),
            FileEdit::Skip("no <head> or <body>".into())
        );
    }

    const CLIENT: &str = "ca-pub-8379967738924229";

    #[test]
    fn adsense_goes_before_first_head_script() {
        let html = "<head>\n    <title>x</title>\n    <script src=\"/a.js\"></script>\n</head>";
        let (out, _) = rewritten(apply_adsense(html, CLIENT));
        let ads = out.find(ADSENSE_MARKER).unwrap();
        assert!(ads < out.find("/a.js").unwrap());
        assert!(out.contains("    <script async src=\"https://pagead2"));
        assert_eq!(apply_adsense(&out, CLIENT), FileEdit::Skip("already has AdSense".into()));
    }

    #[test]
    fn adsense_appends_to_head_without_scripts() {
        let html = "<head>\n    <title>x</title>\n</head>\n<body><script></script></body>";
        let (out, _) = rewritten(apply_adsense(html, CLIENT));
        assert!(out.find(ADSENSE_MARKER).unwrap() < out.find("</head>").unwrap());
    }

    #[test]
    fn adsense_skips_without_head() {
        assert_eq!(apply_adsense("<body></body>", CLIENT), FileEdit::Skip("no <head>".into()));
    }
}
