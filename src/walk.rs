//! HTML file discovery under `site.root`.
//!
//! Dot entries and the `node_modules`, `dist` and `build` directories are
//! never entered. `walk.exclude_globs` are matched against the path relative
//! to the root, and files named in `tags.skip_files` are dropped.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;

const SKIPPED_DIRS: [&str; 3] = ["node_modules", "dist", "build"];

/// One HTML file of the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFile {
    pub path: PathBuf,
    /// Path relative to the site root with `/` separators.
    pub relative: String,
}

impl SiteFile {
    pub fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }
}

fn is_walkable(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }
    !(entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
}

/// Every `.html` file under the site root, sorted by relative path.
pub fn html_files(config: &Config) -> Result<Vec<SiteFile>> {
    let skip_files = &config.tags.skip_files;
    let root = config.site_root();
    if !root.is_dir() {
        bail!("Site root does not exist: {}", root.display());
    }

    let exclude_set = build_globset(&config.walk.exclude_globs)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_entry(is_walkable) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !has_html_extension(path) {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if exclude_set.is_match(&relative) {
            continue;
        }

        let file = SiteFile {
            path: path.to_path_buf(),
            relative,
        };
        if skip_files.iter().any(|s| s == file.file_name()) {
            tracing::debug!(file = %file.relative, "skip list");
            continue;
        }
        files.push(file);
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    tracing::debug!(count = files.len(), root = %root.display(), "html files found");
    Ok(files)
}

fn has_html_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("html"))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
