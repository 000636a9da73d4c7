//! URL and site-path helpers shared by every maintenance job and audit.
//!
//! The site serves "pretty" URLs: `articles/foo.html` is published as
//! `/articles/foo/` and `about/index.html` as `/about/`. Paths whose last
//! segment contains a dot (`/robots.txt`, `/feed.xml`) are treated as files
//! and never get a trailing slash.

use url::Url;

use crate::models::Language;

/// Whether the last non-empty path segment looks like a file name.
pub fn looks_like_file(path: &str) -> bool {
    path.split('/')
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.contains('.'))
        .unwrap_or(false)
}

/// Append `/` to non-file paths that lack one.
pub fn ensure_trailing_slash(path: &str) -> String {
    if !looks_like_file(path) && !path.ends_with('/') {
        format!("{}/", path)
    } else {
        path.to_string()
    }
}

/// Public pathname for a file path relative to the site root.
///
/// `index.html` -> `/`, `about/index.html` -> `/about/`,
/// `articles/bag.html` -> `/articles/bag/`.
pub fn file_pathname(relative: &str) -> String {
    let mut rel = relative.replace('\\', "/");
    if let Some(stripped) = rel.strip_prefix("./") {
        rel = stripped.to_string();
    }
    if !rel.starts_with('/') {
        rel.insert(0, '/');
    }
    let lower = rel.to_ascii_lowercase();
    if lower.ends_with("/index.html") {
        rel.truncate(rel.len() - "index.html".len());
    } else if lower.ends_with(".html") {
        rel.truncate(rel.len() - ".html".len());
        rel.push('/');
    }
    ensure_trailing_slash(&rel)
}

/// `origin` + pathname, without doubling the slash.
pub fn join_origin(origin: &str, pathname: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), pathname)
}

/// Public URL for a file path relative to the site root.
pub fn public_url(origin: &str, relative: &str) -> String {
    join_origin(origin, &file_pathname(relative))
}

/// Resolve `raw` against `base`, drop query and fragment, and enforce the
/// trailing slash on non-file paths.
pub fn normalize_url(raw: &str, base: &Url) -> Option<Url> {
    let mut u = base.join(raw.trim()).ok()?;
    u.set_fragment(None);
    u.set_query(None);
    let path = ensure_trailing_slash(u.path());
    u.set_path(&path);
    Some(u)
}

/// Whether two URLs are equal after [`normalize_url`].
pub fn same_normalized(a: &str, b: &str, base: &Url) -> bool {
    match (normalize_url(a, base), normalize_url(b, base)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// `href` values that never point at another page of the site.
pub fn is_non_page_href(href: &str) -> bool {
    let h = href.trim();
    h.is_empty() || h.starts_with('#') || h.starts_with("mailto:") || h.starts_with("tel:")
}

/// Spanish pages live under `/es/`; everything else is English.
pub fn language_of(url_or_path: &str) -> Language {
    let path = Url::parse(url_or_path)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url_or_path.to_string());
    if path.contains("/es/") || path == "/es" {
        Language::Es
    } else {
        Language::En
    }
}

/// Number of non-empty path segments; shorter paths are audited first.
pub fn path_depth(u: &Url) -> usize {
    u.path().split('/').filter(|s| !s.is_empty()).count()
}

/// Characters `encodeURIComponent` leaves alone but `urlencoding` escapes.
const URI_COMPONENT_MARKS: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Percent-encode a URL component exactly as browsers' `encodeURIComponent`
/// does.
pub fn encode_component(s: &str) -> String {
    let mut out = urlencoding::encode(s).into_owned();
    for (escaped, mark) in URI_COMPONENT_MARKS {
        if out.contains(escaped) {
            out = out.replace(escaped, mark);
        }
    }
    out
}
