//! Minimal HTML tag scanner.
//!
//! Finds opening tags by name and parses their attributes. It does not build
//! a tree; callers work with byte spans and splice the source text, which
//! keeps every untouched byte of a page exactly as authored.

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

/// One opening (or self-closing) tag found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Byte offset of `<`.
    pub start: usize,
    /// Byte offset just past `>`.
    pub end: usize,
    pub raw: &'a str,
    attrs: Vec<(String, String)>,
}

impl<'a> Tag<'a> {
    /// Attribute value by case-insensitive name. Valueless attributes yield `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|x| x == class))
            .unwrap_or(false)
    }

    /// Whether `attr` holds `token` as one of its space-separated values
    /// (`rel="canonical"`, `rel="alternate nofollow"`), ignoring ASCII case.
    pub fn attr_has_token(&self, attr: &str, token: &str) -> bool {
        self.attr(attr)
            .map(|v| v.split_whitespace().any(|x| x.eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("attribute pattern is valid")
    })
}

fn tag_regex(name: &str) -> Option<Regex> {
    let pattern = format!(
        r#"<{}(?:\s(?:[^>"']|"[^"]*"|'[^']*')*)?/?>"#,
        regex::escape(name)
    );
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

fn parse_attrs(inner: &str) -> Vec<(String, String)> {
    attr_regex()
        .captures_iter(inner)
        .map(|c| {
            let key = c[1].to_ascii_lowercase();
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (key, value)
        })
        .collect()
}

/// All opening tags named `name`, in document order.
pub fn find_tags<'a>(html: &'a str, name: &str) -> Vec<Tag<'a>> {
    let Some(re) = tag_regex(name) else {
        return Vec::new();
    };
    re.find_iter(html)
        .map(|m| {
            let raw = m.as_str();
            let inner = raw[1 + name.len()..].trim_end_matches('>');
            Tag {
                start: m.start(),
                end: m.end(),
                raw,
                attrs: parse_attrs(inner),
            }
        })
        .collect()
}

/// First opening tag named `name`.
pub fn find_first<'a>(html: &'a str, name: &str) -> Option<Tag<'a>> {
    let re = tag_regex(name)?;
    re.find(html).map(|m| {
        let raw = m.as_str();
        let inner = raw[1 + name.len()..].trim_end_matches('>');
        Tag {
            start: m.start(),
            end: m.end(),
            raw,
            attrs: parse_attrs(inner),
        }
    })
}

/// Byte offset of the first `</name>` (case-insensitive).
pub fn find_close(html: &str, name: &str) -> Option<usize> {
    let re = RegexBuilder::new(&format!(r"</{}\s*>", regex::escape(name)))
        .case_insensitive(true)
        .build()
        .ok()?;
    re.find(html).map(|m| m.start())
}

/// Remove the given byte spans. A span that sits alone on its line takes the
/// whole line with it.
pub fn remove_spans(html: &str, spans: &[(usize, usize)]) -> String {
    let mut sorted = spans.to_vec();
    sorted.sort_unstable();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for (start, end) in sorted {
        if start < cursor {
            continue;
        }
        let rest = &html[end..];
        let (trailing, ends_line) = rest
            .char_indices()
            .find(|(_, c)| !(*c == ' ' || *c == '\t' || *c == '\r'))
            .map(|(i, c)| if c == '\n' { (i + 1, true) } else { (i, false) })
            .unwrap_or((rest.len(), true));

        let line_start = html[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let alone =
            ends_line && line_start >= cursor && html[line_start..start].trim().is_empty();
        let (start, next) = if alone {
            (line_start, end + trailing)
        } else {
            (start, end)
        };

        out.push_str(&html[cursor..start]);
        cursor = next;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Set attribute `name` of an opening tag's source text to `value` (already
/// escaped), adding the attribute when it is missing.
pub fn set_attr(raw: &str, name: &str, value: &str) -> String {
    let pattern = format!(
        r#"(\s){}\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+)"#,
        regex::escape(name)
    );
    let assignment = format!("{}=\"{}\"", name, value);
    let existing = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
        .and_then(|re| re.captures(raw).and_then(|c| Some((c.get(0)?, c.get(1)?))));

    if let Some((whole, space)) = existing {
        return format!(
            "{}{}{}{}",
            &raw[..whole.start()],
            space.as_str(),
            assignment,
            &raw[whole.end()..]
        );
    }
    let close = if raw.ends_with("/>") {
        raw.len() - 2
    } else {
        raw.len().saturating_sub(1)
    };
    let head = raw[..close].trim_end();
    format!("{} {}{}", head, assignment, &raw[close..])
}

/// Insert `lines` just before `</name>`, each on its own line indented by
/// four spaces. `None` when the closing tag is missing.
pub fn insert_before_close(html: &str, name: &str, lines: &[&str]) -> Option<String> {
    let close = find_close(html, name)?;
    let line_start = html[..close].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let own_line = html[line_start..close].trim().is_empty();

    let mut block = String::new();
    if !own_line {
        block.push('\n');
    }
    for line in lines {
        block.push_str("    ");
        block.push_str(line);
        block.push('\n');
    }
    let at = if own_line { line_start } else { close };
    Some(format!("{}{}{}", &html[..at], block, &html[at..]))
}
