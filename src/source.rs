//! Source discovery and decoding for one category.
//!
//! Every file in `<source_root>/man<category>/` is a candidate page. Files are
//! decoded according to their extension:
//!
//! | Extension | Decoder |
//! |-----------|---------|
//! | `.gz` | in-process gzip (`flate2`) |
//! | `.bz2` | `bunzip2 -c <path>` |
//! | anything else | read as text |
//!
//! Decoding is lossy: invalid UTF-8 becomes U+FFFD instead of failing the page.
//! A decoded text that is a single `.so` line is an alias and goes through
//! [`crate::alias::resolve`] instead of being rendered.

use crate::alias::{self, AliasGrammar, AliasResolution, AliasTarget, DirectoryListing};
use crate::naming;
use crate::types::SkipReason;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;
use thiserror::Error;

/// Leading text of an alias directive.
pub const ALIAS_MARKER: &str = ".so ";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Source directory {} does not exist", .0.display())]
    MissingCategory(PathBuf),
}

/// Decoding strategy, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    None,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("bz2") => Compression::Bzip2,
            _ => Compression::None,
        }
    }
}

/// A decoded page ready for rendering.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub category: String,
    /// Canonical page name (`select` for `select.2.gz`).
    pub name: String,
    pub text: String,
    pub mtime: SystemTime,
}

/// What a source file turned out to be.
#[derive(Debug, Clone)]
pub enum Located {
    Page(SourceDocument),
    Alias { name: String, target: AliasTarget },
    Skipped { name: String, reason: SkipReason },
}

/// Enumerates and decodes the sources of a category.
pub struct SourceLocator<'a, L: DirectoryListing> {
    source_root: &'a Path,
    grammar: &'a AliasGrammar,
    listing: &'a L,
}

impl<'a, L: DirectoryListing> SourceLocator<'a, L> {
    pub fn new(source_root: &'a Path, grammar: &'a AliasGrammar, listing: &'a L) -> Self {
        Self {
            source_root,
            grammar,
            listing,
        }
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.source_root.join(naming::source_dir_name(category))
    }

    /// Source files of a category, sorted by name. A missing category
    /// directory is an error, not an empty category.
    pub fn list(&self, category: &str) -> Result<Vec<PathBuf>, SourceError> {
        let dir = self.category_dir(category);
        let mut names = match self.listing.file_names(&dir) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SourceError::MissingCategory(dir));
            }
            Err(e) => return Err(e.into()),
        };
        names.sort();
        Ok(names.into_iter().map(|name| dir.join(name)).collect())
    }

    /// Decode one source file and classify it.
    pub fn locate(&self, category: &str, path: &Path) -> Result<Located, SourceError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = naming::page_name(&file_name);

        let mtime = match std::fs::metadata(path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Located::Skipped {
                    name,
                    reason: SkipReason::MissingSource,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let text = match decode(path)? {
            Decoded::Text(text) => text,
            Decoded::Missing => {
                return Ok(Located::Skipped {
                    name,
                    reason: SkipReason::MissingSource,
                });
            }
            Decoded::Failed(message) => {
                return Ok(Located::Skipped {
                    name,
                    reason: SkipReason::Undecodable { message },
                });
            }
        };

        if !text.starts_with(ALIAS_MARKER) {
            return Ok(Located::Page(SourceDocument {
                path: path.to_path_buf(),
                category: category.to_string(),
                name,
                text,
                mtime,
            }));
        }

        let directive = text.trim();
        if directive.lines().count() != 1 {
            return Ok(Located::Skipped {
                name,
                reason: SkipReason::UnrecognizedAlias {
                    directive: directive.to_string(),
                },
            });
        }

        let located = match alias::resolve(directive, self.grammar, self.source_root, self.listing)? {
            AliasResolution::Resolved(target) => Located::Alias { name, target },
            AliasResolution::Unrecognized => Located::Skipped {
                name,
                reason: SkipReason::UnrecognizedAlias {
                    directive: directive.to_string(),
                },
            },
            AliasResolution::NoCandidate { pattern } => Located::Skipped {
                name,
                reason: SkipReason::NoAliasCandidate { pattern },
            },
            AliasResolution::Ambiguous { candidates } => Located::Skipped {
                name,
                reason: SkipReason::AmbiguousAlias {
                    directive: directive.to_string(),
                    candidates,
                },
            },
        };
        Ok(located)
    }
}

enum Decoded {
    Text(String),
    Missing,
    Failed(String),
}

/// Read and decompress a source file, replacing invalid UTF-8.
fn decode(path: &Path) -> io::Result<Decoded> {
    let bytes = match Compression::from_path(path) {
        Compression::None => match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Decoded::Missing),
            Err(e) => return Err(e),
        },
        Compression::Gzip => {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Decoded::Missing),
                Err(e) => return Err(e),
            };
            let mut bytes = Vec::new();
            if let Err(e) = GzDecoder::new(file).read_to_end(&mut bytes) {
                return Ok(Decoded::Failed(format!("gzip: {}", e)));
            }
            bytes
        }
        Compression::Bzip2 => {
            let output = match Command::new("bunzip2").arg("-c").arg(path).output() {
                Ok(output) => output,
                Err(e) => return Ok(Decoded::Failed(format!("bunzip2: {}", e))),
            };
            if !output.status.success() {
                if !path.exists() {
                    return Ok(Decoded::Missing);
                }
                return Ok(Decoded::Failed(format!(
                    "bunzip2: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            output.stdout
        }
    };
    Ok(Decoded::Text(String::from_utf8_lossy(&bytes).into_owned()))
}
