//! Resolution of `.so` alias directives.
//!
//! A man page source whose whole content is a single `.so` line defers to
//! another page instead of being rendered itself. Two spellings are common:
//!
//! ```text
//! .so man2/select.2      path-qualified
//! .so select.2           dotted
//! ```
//!
//! Both are expressed as rules of an [`AliasGrammar`] (configurable, see
//! [`crate::config::AliasConfig`]). Each rule yields a category and a file
//! stem; the alias target is the unique file in `man<category>/` named
//! `<stem>.<anything>`.
//!
//! [`resolve`] is a pure function of the directive, the grammar and a
//! [`DirectoryListing`], so tests can feed it fake directory contents.

use crate::config::AliasRule;
use crate::naming;
use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};

/// Compiled, ordered alias rules.
#[derive(Debug, Clone)]
pub struct AliasGrammar {
    rules: Vec<(String, Regex)>,
}

/// A directive parsed by one of the grammar rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDirective {
    /// Name of the rule that matched.
    pub rule: String,
    pub category: String,
    pub stem: String,
}

impl AliasGrammar {
    pub fn new(rules: &[AliasRule]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|rule| Ok((rule.name.clone(), Regex::new(&rule.pattern)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Parse a single directive line with the first rule that matches.
    pub fn parse(&self, line: &str) -> Option<AliasDirective> {
        self.rules.iter().find_map(|(name, regex)| {
            let caps = regex.captures(line)?;
            Some(AliasDirective {
                rule: name.clone(),
                category: caps.name("category")?.as_str().to_string(),
                stem: caps.name("stem")?.as_str().to_string(),
            })
        })
    }
}

impl Default for AliasGrammar {
    fn default() -> Self {
        Self::new(&crate::config::AliasConfig::default().rules)
            .expect("stock alias grammar must compile")
    }
}

/// Lists the regular files of a directory.
pub trait DirectoryListing: Sync {
    /// File names (not paths) in `dir`, symlinks to files included.
    /// A missing directory is an `ErrorKind::NotFound` error.
    fn file_names(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// [`DirectoryListing`] backed by the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsListing;

impl DirectoryListing for FsListing {
    fn file_names(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            // `Path::is_file` follows links; dangling ones are left out.
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// The page an alias resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    pub category: String,
    /// Source file of the target page.
    pub source: PathBuf,
    /// Canonical name of the target page.
    pub page: String,
}

impl AliasTarget {
    /// Rendered file of the target, relative to the cache root.
    pub fn output_target(&self) -> String {
        naming::output_target(&self.category, &self.page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasResolution {
    Resolved(AliasTarget),
    /// No grammar rule matched.
    Unrecognized,
    /// `pattern` is the candidate path without its extension.
    NoCandidate { pattern: PathBuf },
    Ambiguous { candidates: Vec<PathBuf> },
}

/// Resolve a single-line alias directive against the source tree.
pub fn resolve(
    line: &str,
    grammar: &AliasGrammar,
    source_root: &Path,
    listing: &impl DirectoryListing,
) -> io::Result<AliasResolution> {
    let Some(directive) = grammar.parse(line.trim()) else {
        return Ok(AliasResolution::Unrecognized);
    };

    let dir = source_root.join(naming::source_dir_name(&directive.category));
    let prefix = format!("{}.", directive.stem);
    // A target category that does not exist simply has no candidates.
    let names = match listing.file_names(&dir) {
        Ok(names) => names,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e),
    };
    let mut candidates: Vec<String> = names
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Ok(AliasResolution::NoCandidate {
            pattern: dir.join(&directive.stem),
        }),
        1 => {
            let file_name = candidates.remove(0);
            Ok(AliasResolution::Resolved(AliasTarget {
                category: directive.category,
                page: naming::page_name(&file_name),
                source: dir.join(file_name),
            }))
        }
        _ => Ok(AliasResolution::Ambiguous {
            candidates: candidates.into_iter().map(|name| dir.join(name)).collect(),
        }),
    }
}
