//! Removal of orphaned output after a category has been processed.
//!
//! A page renamed or removed upstream leaves its old render (and images)
//! behind. Once all of a category's pages are done, anything in
//! `html.<category>/` that no live page of this run produced is deleted:
//!
//! - a page file survives if it is the target of a non-alias keyword;
//! - an image `<page>-<index>.<ext>` survives if `<page>` is a non-alias
//!   keyword of the category.
//!
//! Subdirectories are never touched.

use crate::naming;
use crate::types::Keyword;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files deleted by one [`collect_garbage`] pass, sorted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GcReport {
    pub pages: Vec<PathBuf>,
    pub images: Vec<PathBuf>,
}

impl GcReport {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty() && self.images.is_empty()
    }

    pub fn removed(&self) -> impl Iterator<Item = &PathBuf> {
        self.pages.iter().chain(self.images.iter())
    }
}

/// Regular files directly inside `dir`, sorted. A missing directory is empty.
fn files_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Delete stale pages from `out_dir` and orphaned images from `images_dir`.
///
/// `keywords` are the category's keywords from the current run; aliases are
/// ignored since their targets belong to other pages.
pub fn collect_garbage(
    out_dir: &Path,
    images_dir: &Path,
    keywords: &[Keyword],
) -> io::Result<GcReport> {
    let live: Vec<&Keyword> = keywords.iter().filter(|kw| !kw.is_alias).collect();
    let expected_files: HashSet<&str> = live.iter().map(|kw| kw.target_file_name()).collect();
    let live_pages: HashSet<&str> = live.iter().map(|kw| kw.name.as_str()).collect();

    let mut report = GcReport::default();

    for path in files_in(out_dir)? {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        if name.as_deref().is_some_and(|n| expected_files.contains(n)) {
            continue;
        }
        fs::remove_file(&path)?;
        report.pages.push(path);
    }

    for path in files_in(images_dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if naming::image_page(&name).is_some_and(|page| live_pages.contains(page)) {
            continue;
        }
        fs::remove_file(&path)?;
        report.images.push(path);
    }

    Ok(report)
}
