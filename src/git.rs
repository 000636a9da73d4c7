//! Last-commit dates for sitemap `lastmod`.

use chrono::{DateTime, Local, NaiveDate};
use std::path::Path;
use std::process::Command;

/// Date of the last commit touching `file`, or `None` when git is missing,
/// the directory is not a repository, or the file was never committed.
pub fn last_commit_date(repo_dir: &Path, file: &str) -> Option<NaiveDate> {
    let output = Command::new("git")
        .args(["log", "-1", "--format=%cI", "--"])
        .arg(file)
        .current_dir(repo_dir)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stamp = String::from_utf8_lossy(&output.stdout);
    DateTime::parse_from_rfc3339(stamp.trim())
        .ok()
        .map(|dt| dt.date_naive())
}

/// `YYYY-MM-DD` lastmod for `file`, falling back to today.
pub fn lastmod(repo_dir: &Path, file: &str) -> String {
    let date = last_commit_date(repo_dir, file).unwrap_or_else(|| {
        tracing::warn!(file, "no git date, using today");
        Local::now().date_naive()
    });
    date.format("%Y-%m-%d").to_string()
}
