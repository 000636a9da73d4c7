//! `pages scaffold`: About, Contact and Terms pages in both languages.
//!
//! Each page reuses the home page's shell (everything up to and including
//! `<body>`, and everything from `</body>` on) with its own `lang`, title
//! and self-referencing canonical. Missing pages are also added to
//! `sitemap.xml`, and `netlify.toml` gets a `.html` to slash redirect for
//! each of them. Running it twice changes nothing.

use anyhow::{Context, Result};
use bagsite_core::html::{find_close, find_first, set_attr};
use bagsite_core::models::Language;
use bagsite_core::urls::{file_pathname, public_url};
use bagsite_core::view::escape_html;
use std::collections::HashSet;
use std::path::Path;

use crate::audit::{render_rules, RedirectRule};
use crate::canonicals::fix_canonical;
use crate::config::Config;
use crate::rewrite::write_with_backup;
use crate::sitemap::{parse_sitemap, render, render_url, SitemapEntry};

const FALLBACK_HEAD: &str = "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n    <title></title>\n</head>\n<body>";
const FALLBACK_FOOT: &str = "</body>\n</html>\n";

/// A page built by the scaffold job. `title` and `body` are HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicPage {
    pub relative: &'static str,
    pub language: Language,
    pub title: &'static str,
    pub body: String,
}

impl BasicPage {
    pub fn pathname(&self) -> String {
        file_pathname(self.relative)
    }
}

/// The six pages, English first.
pub fn basic_pages(contact_email: &str) -> Vec<BasicPage> {
    let email = escape_html(contact_email);
    let mailto = format!("<p><a href=\"mailto:{0}\">{0}</a></p>", email);
    vec![
        BasicPage {
            relative: "about/index.html",
            language: Language::En,
            title: "About Us",
            body: "<h1>About Us</h1>\n<p>We publish simple guides, reviews and recommendations to help you find stylish bags, backpacks and wallets at budget-friendly prices.</p>\n<p>The site is still growing. New articles and resources are added over time.</p>".to_string(),
        },
        BasicPage {
            relative: "contact/index.html",
            language: Language::En,
            title: "Contact Us",
            body: format!("<h1>Contact Us</h1>\n<p>Questions or suggestions? Reach us at:</p>\n{}\n<p>We usually respond within a few days.</p>", mailto),
        },
        BasicPage {
            relative: "terms/index.html",
            language: Language::En,
            title: "Terms &amp; Conditions",
            body: "<h1>Terms &amp; Conditions</h1>\n<p>By using this site you agree to these terms. Content is informational and may include affiliate links. We do not guarantee availability, pricing or inventory from third-party stores.</p>\n<p>Please do not reproduce content without permission. For legal questions, contact us by email.</p>".to_string(),
        },
        BasicPage {
            relative: "es/sobre-nosotros/index.html",
            language: Language::Es,
            title: "Sobre Nosotros",
            body: "<h1>Sobre Nosotros</h1>\n<p>Publicamos guías sencillas, reseñas y recomendaciones para ayudarte a encontrar bolsos, mochilas y carteras con estilo a precios accesibles.</p>\n<p>El sitio está en desarrollo y sumaremos artículos y recursos con el tiempo.</p>".to_string(),
        },
        BasicPage {
            relative: "es/contacto/index.html",
            language: Language::Es,
            title: "Contacto",
            body: format!("<h1>Contacto</h1>\n<p>¿Preguntas o sugerencias? Escríbenos:</p>\n{}\n<p>Normalmente respondemos en unos días.</p>", mailto),
        },
        BasicPage {
            relative: "es/terminos/index.html",
            language: Language::Es,
            title: "Términos y Condiciones",
            body: "<h1>Términos y Condiciones</h1>\n<p>Al usar este sitio aceptas estos términos. El contenido es informativo y puede incluir enlaces de afiliado. No garantizamos disponibilidad, precios ni inventario de tiendas de terceros.</p>\n<p>No reproduzcas contenido sin permiso. Para consultas legales, contáctanos por correo.</p>".to_string(),
        },
    ]
}

/// Page chrome taken from an existing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    head: String,
    foot: String,
}

impl Shell {
    /// Split `html` around its body. Falls back to a bare document when
    /// either `<body>` or `</body>` is missing.
    pub fn from_index(html: &str) -> Self {
        let open = find_first(html, "body").map(|t| t.end);
        let close = find_close(html, "body");
        match (open, close) {
            (Some(open), Some(close)) if close >= open => Shell {
                head: html[..open].to_string(),
                foot: html[close..].to_string(),
            },
            _ => Shell::fallback(),
        }
    }

    pub fn fallback() -> Self {
        Shell {
            head: FALLBACK_HEAD.to_string(),
            foot: FALLBACK_FOOT.to_string(),
        }
    }

    pub fn render(&self, page: &BasicPage, canonical: &str) -> String {
        let mut head = self.head.clone();
        let html_tag = find_first(&head, "html")
            .map(|t| (t.start..t.end, set_attr(t.raw, "lang", page.language.code())));
        if let Some((span, raw)) = html_tag {
            head.replace_range(span, &raw);
        }
        head = replace_title(&head, page.title);

        let doc = format!(
            "{}\n<main class=\"container\">\n{}\n</main>\n{}",
            head, page.body, self.foot
        );
        fix_canonical(&doc, canonical).unwrap_or(doc)
    }
}

fn replace_title(head: &str, title: &str) -> String {
    let open = find_first(head, "title");
    let close = find_close(head, "title");
    match (open, close) {
        (Some(open), Some(close)) if close >= open.end => {
            format!("{}{}{}", &head[..open.end], title, &head[close..])
        }
        _ => match find_close(head, "head") {
            Some(at) => format!("{}    <title>{}</title>\n{}", &head[..at], title, &head[at..]),
            None => head.to_string(),
        },
    }
}

/// `existing` with `<url>` blocks for every `loc` it lacks, or `None` when
/// nothing is missing. An empty sitemap is rendered from scratch.
pub fn add_sitemap_entries(existing: &str, entries: &[SitemapEntry]) -> Result<Option<String>> {
    if existing.trim().is_empty() {
        return Ok(if entries.is_empty() {
            None
        } else {
            Some(render(entries))
        });
    }

    let parsed = parse_sitemap(existing)?;
    let have: HashSet<&str> = parsed.locs.iter().map(String::as_str).collect();
    let missing: Vec<&SitemapEntry> = entries
        .iter()
        .filter(|e| !have.contains(e.loc.as_str()))
        .collect();
    if missing.is_empty() {
        return Ok(None);
    }

    let close = existing
        .rfind("</urlset>")
        .context("sitemap has no closing </urlset>")?;
    let line_start = existing[..close].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let at = if existing[line_start..close].trim().is_empty() {
        line_start
    } else {
        close
    };
    let mut out = existing[..at].to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    for e in missing {
        out.push_str(&render_url(e));
    }
    out.push_str(&existing[at..]);
    Ok(Some(out))
}

/// Rules from `wanted` that `netlify_toml` does not already declare.
pub fn missing_redirects(netlify_toml: &str, wanted: &[RedirectRule]) -> Result<Vec<RedirectRule>> {
    let value: toml::Value = toml::from_str(netlify_toml).context("Failed to parse netlify.toml")?;
    let declared: HashSet<RedirectRule> = value
        .get("redirects")
        .and_then(|r| r.as_array())
        .map(|rules| {
            rules
                .iter()
                .filter_map(|r| {
                    Some(RedirectRule {
                        from: r.get("from")?.as_str()?.to_string(),
                        to: r.get("to")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(wanted
        .iter()
        .filter(|r| !declared.contains(r))
        .cloned()
        .collect())
}

/// `/about/` -> `/about.html`.
fn html_variant(pathname: &str) -> String {
    format!("{}.html", pathname.trim_end_matches('/'))
}

#[derive(Debug, Clone, Default)]
pub struct ScaffoldReport {
    pub written: Vec<String>,
    pub unchanged: Vec<String>,
    pub sitemap_added: usize,
    pub redirects_added: usize,
    pub dry_run: bool,
}

impl ScaffoldReport {
    pub fn print(&self) {
        println!("Basic pages complete.");
        if self.dry_run {
            println!("(dry run: no files written)");
        }
        println!("Pages written: {}", self.written.len());
        for f in &self.written {
            println!("  + {}", f);
        }
        println!("Pages unchanged: {}", self.unchanged.len());
        println!("Sitemap entries added: {}", self.sitemap_added);
        println!("Redirects added: {}", self.redirects_added);
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, before: Option<&str>, after: &str, backup: bool) -> Result<()> {
    match before {
        Some(before) => write_with_backup(path, before, after, backup),
        None => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            std::fs::write(path, after).with_context(|| format!("Failed to write {}", path.display()))
        }
    }
}

pub fn run_scaffold(config: &Config, dry_run: bool) -> Result<ScaffoldReport> {
    let email = config
        .pages
        .contact_email
        .as_deref()
        .context("pages.contact_email must be set to scaffold the contact pages")?;
    let root = config.site_root();
    let origin = config.origin();
    let backup = config.site.backup;
    let pages = basic_pages(email);

    let shell = match read_optional(&root.join("index.html"))? {
        Some(index) => Shell::from_index(&index),
        None => {
            tracing::warn!(root = %root.display(), "no index.html, using a bare page shell");
            Shell::fallback()
        }
    };

    let mut report = ScaffoldReport {
        dry_run,
        ..Default::default()
    };
    for page in &pages {
        let path = root.join(page.relative);
        let html = shell.render(page, &public_url(origin, page.relative));
        let before = read_optional(&path)?;
        if before.as_deref() == Some(html.as_str()) {
            report.unchanged.push(page.relative.to_string());
            continue;
        }
        if !dry_run {
            write_file(&path, before.as_deref(), &html, backup)?;
        }
        report.written.push(page.relative.to_string());
    }

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let entries: Vec<SitemapEntry> = pages
        .iter()
        .map(|p| SitemapEntry {
            loc: public_url(origin, p.relative),
            lastmod: today.clone(),
            changefreq: "monthly",
            priority: "0.5",
        })
        .collect();
    let sitemap_path = config.sitemap_path();
    let sitemap_before = read_optional(&sitemap_path)?;
    let sitemap_have = match &sitemap_before {
        Some(xml) if !xml.trim().is_empty() => parse_sitemap(xml)?.locs.len(),
        _ => 0,
    };
    if let Some(xml) = add_sitemap_entries(sitemap_before.as_deref().unwrap_or(""), &entries)? {
        report.sitemap_added = parse_sitemap(&xml)?.locs.len() - sitemap_have;
        if !dry_run {
            write_file(&sitemap_path, sitemap_before.as_deref(), &xml, backup)?;
        }
    }

    let wanted: Vec<RedirectRule> = pages
        .iter()
        .map(|p| RedirectRule {
            from: html_variant(&p.pathname()),
            to: p.pathname(),
        })
        .collect();
    let netlify_path = config.netlify_toml_path();
    let netlify_before = read_optional(&netlify_path)?;
    let current = netlify_before.as_deref().unwrap_or("");
    let missing = missing_redirects(current, &wanted)?;
    if !missing.is_empty() {
        report.redirects_added = missing.len();
        let mut toml = current.to_string();
        if !toml.is_empty() && !toml.ends_with("\n\n") {
            toml.push_str(if toml.ends_with('\n') { "\n" } else { "\n\n" });
        }
        toml.push_str(&render_rules(&missing));
        if !dry_run {
            write_file(&netlify_path, netlify_before.as_deref(), &toml, backup)?;
        }
    }

    tracing::info!(
        written = report.written.len(),
        sitemap_added = report.sitemap_added,
        redirects_added = report.redirects_added,
        dry_run,
        "basic pages scaffolded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = "<!DOCTYPE html>
<html lang=\"en\">
<head>
    <meta charset=\"utf-8\">
    <title>Affordable Handbags</title>
    <link rel=\"canonical\" href=\"https://shop.test/\">
</head>
<body class=\"home\">
<h1>Home</h1>
</body>
</html>
";

    fn page(relative: &str) -> BasicPage {
        basic_pages("hello@shop.test")
            .into_iter()
            .find(|p| p.relative == relative)
            .unwrap()
    }

    #[test]
    fn six_pages_in_two_languages() {
        let pages = basic_pages("hello@shop.test");
        let paths: Vec<String> = pages.iter().map(|p| p.pathname()).collect();
        assert_eq!(
            paths,
            vec![
                "/about/",
                "/contact/",
                "/terms/",
                "/es/sobre-nosotros/",
                "/es/contacto/",
                "/es/terminos/"
            ]
        );
        assert!(pages[1].body.contains("mailto:hello@shop.test"));
        assert!(pages[4].body.contains("mailto:hello@shop.test"));
    }

    #[test]
    fn page_reuses_index_shell() {
        let shell = Shell::from_index(INDEX);
        let html = shell.render(&page("es/contacto/index.html"), "https://shop.test/es/contacto/");

        assert!(html.starts_with("<!DOCTYPE html>\n<html lang=\"es\">"));
        assert!(html.contains("<title>Contacto</title>"));
        assert!(!html.contains("Affordable Handbags"));
        assert!(html.contains("<body class=\"home\">\n<main class=\"container\">"));
        assert!(!html.contains("<h1>Home</h1>"));
        assert!(html.contains("<link rel=\"canonical\" href=\"https://shop.test/es/contacto/\">"));
        assert!(html.contains("<meta property=\"og:url\" content=\"https://shop.test/es/contacto/\">"));
        assert!(!html.contains("href=\"https://shop.test/\""));
        assert!(html.trim_end().ends_with("</body>\n</html>"));
    }

    #[test]
    fn shell_without_body_falls_back() {
        let shell = Shell::from_index("<p>not a page</p>");
        assert_eq!(shell, Shell::fallback());
        let html = shell.render(&page("about/index.html"), "https://shop.test/about/");
        assert!(html.contains("<html lang=\"en\">"));
        assert!(html.contains("<title>About Us</title>"));
        assert!(html.contains("rel=\"canonical\" href=\"https://shop.test/about/\""));
    }

    #[test]
    fn escapes_contact_email() {
        let pages = basic_pages("a<b>@shop.test");
        assert!(pages[1].body.contains("a&lt;b&gt;@shop.test"));
    }

    fn entry(loc: &str) -> SitemapEntry {
        SitemapEntry {
            loc: loc.to_string(),
            lastmod: "2026-10-01".to_string(),
            changefreq: "monthly",
            priority: "0.5",
        }
    }

    #[test]
    fn appends_only_missing_sitemap_entries() {
        let existing = render(&[entry("https://shop.test/"), entry("https://shop.test/about/")]);
        let out = add_sitemap_entries(
            &existing,
            &[entry("https://shop.test/about/"), entry("https://shop.test/terms/")],
        )
        .unwrap()
        .unwrap();

        let locs = parse_sitemap(&out).unwrap().locs;
        assert_eq!(
            locs,
            vec!["https://shop.test/", "https://shop.test/about/", "https://shop.test/terms/"]
        );
        assert!(out.ends_with("    </url>\n</urlset>\n"));
        assert_eq!(add_sitemap_entries(&out, &[entry("https://shop.test/terms/")]).unwrap(), None);
    }

    #[test]
    fn empty_sitemap_is_created() {
        let out = add_sitemap_entries("", &[entry("https://shop.test/about/")])
            .unwrap()
            .unwrap();
        assert_eq!(parse_sitemap(&out).unwrap().locs, vec!["https://shop.test/about/"]);
    }

    #[test]
    fn sitemap_without_urlset_close_is_an_error() {
        let broken = "<urlset><url><loc>https://shop.test/</loc></url>";
        assert!(add_sitemap_entries(broken, &[entry("https://shop.test/about/")]).is_err());
    }

    #[test]
    fn skips_declared_redirects() {
        let toml = "[build]\npublish = \".\"\n\n[[redirects]]\nfrom = \"/about.html\"\nto = \"/about/\"\nstatus = 301\n";
        let wanted = vec![
            RedirectRule {
                from: "/about.html".into(),
                to: "/about/".into(),
            },
            RedirectRule {
                from: "/terms.html".into(),
                to: "/terms/".into(),
            },
        ];
        let missing = missing_redirects(toml, &wanted).unwrap();
        assert_eq!(missing, vec![wanted[1].clone()]);
        assert_eq!(missing_redirects("", &wanted).unwrap(), wanted);
        assert!(missing_redirects("[[redirects", &wanted).is_err());
    }

    #[test]
    fn html_variant_of_nested_page() {
        assert_eq!(html_variant("/es/sobre-nosotros/"), "/es/sobre-nosotros.html");
    }
}
