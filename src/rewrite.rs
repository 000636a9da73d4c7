//! Batch runner shared by every job that rewrites HTML in place.
//!
//! Each file is read, passed through a pure transform and written back only
//! when the text changed. Failures are recorded per file and the batch keeps
//! going. With `dry_run` nothing is written; with `backup` a `<file>.bak`
//! copy is made before the first overwrite.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::walk::SiteFile;

#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteOptions {
    pub dry_run: bool,
    pub backup: bool,
}

/// What a transform decided for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEdit {
    /// New content plus labels describing what was done (for the report).
    Rewrite { html: String, notes: Vec<String> },
    /// Left alone for the given reason (e.g. "no <head>").
    Skip(String),
}

impl FileEdit {
    pub fn rewrite(html: String) -> Self {
        FileEdit::Rewrite {
            html,
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RewriteReport {
    pub changed: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped: Vec<(String, String)>,
    pub errors: Vec<(String, String)>,
    /// Note label -> files it applied to.
    pub notes: BTreeMap<String, Vec<String>>,
    pub dry_run: bool,
}

impl RewriteReport {
    pub fn scanned(&self) -> usize {
        self.changed.len() + self.unchanged.len() + self.skipped.len() + self.errors.len()
    }

    pub fn print(&self, title: &str) {
        println!("{} complete.", title);
        if self.dry_run {
            println!("(dry run: no files written)");
        }
        println!("Scanned: {} file(s)", self.scanned());
        println!("Changed: {} file(s)", self.changed.len());
        println!("Unchanged: {} file(s)", self.unchanged.len());
        if !self.skipped.is_empty() {
            println!("Skipped: {} file(s)", self.skipped.len());
        }
        for (label, files) in &self.notes {
            println!("  {}: {}", label, files.len());
        }
        for f in &self.changed {
            println!("  ~ {}", f);
        }
        for (f, reason) in &self.skipped {
            println!("  - {} ({})", f, reason);
        }
        if !self.errors.is_empty() {
            println!("Errors ({}):", self.errors.len());
            for (f, e) in &self.errors {
                println!("  ! {}: {}", f, e);
            }
        }
    }
}

/// Apply `transform` to every file and write back the ones that changed.
pub fn run_rewrite<F>(files: &[SiteFile], opts: RewriteOptions, mut transform: F) -> RewriteReport
where
    F: FnMut(&SiteFile, &str) -> Result<FileEdit>,
{
    let mut report = RewriteReport {
        dry_run: opts.dry_run,
        ..Default::default()
    };

    for file in files {
        match process_file(file, opts, &mut transform) {
            Ok(FileOutcome::Changed(notes)) => {
                for note in notes {
                    report
                        .notes
                        .entry(note)
                        .or_default()
                        .push(file.relative.clone());
                }
                report.changed.push(file.relative.clone());
            }
            Ok(FileOutcome::Unchanged) => report.unchanged.push(file.relative.clone()),
            Ok(FileOutcome::Skipped(reason)) => {
                tracing::debug!(file = %file.relative, reason = %reason, "skipped");
                report.skipped.push((file.relative.clone(), reason));
            }
            Err(e) => {
                tracing::warn!(file = %file.relative, error = %e, "rewrite failed");
                report.errors.push((file.relative.clone(), format!("{:#}", e)));
            }
        }
    }

    tracing::info!(
        changed = report.changed.len(),
        unchanged = report.unchanged.len(),
        errors = report.errors.len(),
        dry_run = opts.dry_run,
        "rewrite batch finished"
    );
    report
}

enum FileOutcome {
    Changed(Vec<String>),
    Unchanged,
    Skipped(String),
}

fn process_file<F>(file: &SiteFile, opts: RewriteOptions, transform: &mut F) -> Result<FileOutcome>
where
    F: FnMut(&SiteFile, &str) -> Result<FileEdit>,
{
    let before = std::fs::read_to_string(&file.path)
        .with_context(|| format!("Failed to read {}", file.path.display()))?;

    let (after, notes) = match transform(file, &before)? {
        FileEdit::Skip(reason) => return Ok(FileOutcome::Skipped(reason)),
        FileEdit::Rewrite { html, notes } => (html, notes),
    };
    if after == before {
        return Ok(FileOutcome::Unchanged);
    }

    if !opts.dry_run {
        write_with_backup(&file.path, &before, &after, opts.backup)?;
    }
    Ok(FileOutcome::Changed(notes))
}

/// Write `after` to `path`, first saving `before` to `<path>.bak` when
/// `backup` is set and no backup exists yet.
pub fn write_with_backup(path: &Path, before: &str, after: &str, backup: bool) -> Result<()> {
    if backup {
        let mut bak = path.as_os_str().to_owned();
        bak.push(".bak");
        let bak = std::path::PathBuf::from(bak);
        if !bak.exists() {
            std::fs::write(&bak, before)
                .with_context(|| format!("Failed to write backup {}", bak.display()))?;
        }
    }
    std::fs::write(path, after).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn files(dir: &Path, names: &[(&str, &str)]) -> Vec<SiteFile> {
        names
            .iter()
            .map(|(name, body)| {
                let path = dir.join(name);
                fs::write(&path, body).unwrap();
                SiteFile {
                    path,
                    relative: name.to_string(),
                }
            })
            .collect()
    }

    fn upper(_: &SiteFile, html: &str) -> Result<FileEdit> {
        if html.contains("skip") {
            return Ok(FileEdit::Skip("asked to".into()));
        }
        if html.contains("fail") {
            anyhow::bail!("bad input");
        }
        Ok(FileEdit::Rewrite {
            html: html.to_uppercase(),
            notes: vec!["uppercased".into()],
        })
    }

    #[test]
    fn rewrites_changed_files_and_backs_up_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs_ = files(tmp.path(), &[("a.html", "abc"), ("b.html", "DONE")]);
        let opts = RewriteOptions {
            dry_run: false,
            backup: true,
        };

        let report = run_rewrite(&fs_, opts, upper);
        assert_eq!(report.changed, vec!["a.html"]);
        assert_eq!(report.unchanged, vec!["b.html"]);
        assert_eq!(report.notes["uppercased"], vec!["a.html"]);
        assert_eq!(fs::read_to_string(tmp.path().join("a.html")).unwrap(), "ABC");
        assert_eq!(fs::read_to_string(tmp.path().join("a.html.bak")).unwrap(), "abc");
        assert!(!tmp.path().join("b.html.bak").exists());

        let again = run_rewrite(&fs_, opts, upper);
        assert!(again.changed.is_empty());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs_ = files(tmp.path(), &[("a.html", "abc")]);
        let report = run_rewrite(
            &fs_,
            RewriteOptions {
                dry_run: true,
                backup: true,
            },
            upper,
        );
        assert_eq!(report.changed, vec!["a.html"]);
        assert_eq!(fs::read_to_string(tmp.path().join("a.html")).unwrap(), "abc");
        assert!(!tmp.path().join("a.html.bak").exists());
    }

    #[test]
    fn errors_and_skips_do_not_stop_the_batch() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs_ = files(
            tmp.path(),
            &[("a.html", "fail"), ("b.html", "skip"), ("c.html", "ok")],
        );
        let report = run_rewrite(&fs_, RewriteOptions::default(), upper);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.skipped, vec![("b.html".to_string(), "asked to".to_string())]);
        assert_eq!(report.changed, vec!["c.html"]);
        assert_eq!(report.scanned(), 3);
    }
}
