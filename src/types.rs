//! Shared types passed between the pipeline components.
//!
//! Everything here lives for a single run: keywords and cross references are
//! rebuilt from a directory scan every time, and the catalog is assembled from
//! the [`CategoryResult`]s once all categories are done.

use std::fmt;
use std::path::PathBuf;

/// One catalog entry: a page name and the rendered file it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    /// Page name, such as `select`.
    pub name: String,
    /// Output file relative to the cache root, such as `html.2/select.html`.
    pub target: String,
    /// True when `target` is another page's render (the source was a `.so` alias).
    pub is_alias: bool,
}

impl Keyword {
    pub fn page(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            is_alias: false,
        }
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            is_alias: true,
        }
    }

    /// File name component of the target (`select.html`).
    pub fn target_file_name(&self) -> &str {
        self.target.rsplit('/').next().unwrap_or(&self.target)
    }
}

/// A `(category, page)` pair recorded whenever a cross reference is linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    pub category: String,
    pub name: String,
}

impl CrossReference {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}

/// Why a source file produced no keyword.
///
/// These are the non-fatal conditions of a run. Only some of them mark the
/// category as having errors, see [`SkipReason::is_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file disappeared between listing and reading.
    MissingSource,
    /// Starts with `.so` but is multi-line or matches no alias rule.
    UnrecognizedAlias { directive: String },
    /// The alias pattern expanded to nothing.
    NoAliasCandidate { pattern: PathBuf },
    /// The alias pattern expanded to more than one file.
    AmbiguousAlias {
        directive: String,
        candidates: Vec<PathBuf>,
    },
    /// Decompression failed.
    Undecodable { message: String },
    /// The formatter exited with a non-zero status.
    ConverterFailure { status: Option<i32> },
    /// An earlier file in the listing has the same page name.
    DuplicatePage { first: PathBuf },
}

impl SkipReason {
    /// Whether this condition sets the category error flag.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SkipReason::Undecodable { .. } | SkipReason::ConverterFailure { .. }
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingSource => write!(f, "source does not exist"),
            SkipReason::UnrecognizedAlias { directive } => {
                write!(f, "alias not understood: {}", directive.trim())
            }
            SkipReason::NoAliasCandidate { pattern } => {
                write!(f, "no matching alias source: {}.*", pattern.display())
            }
            SkipReason::AmbiguousAlias {
                directive,
                candidates,
            } => write!(
                f,
                "too many alias candidates for {} ({} found)",
                directive.trim(),
                candidates.len()
            ),
            SkipReason::Undecodable { message } => write!(f, "cannot decode source: {}", message),
            SkipReason::ConverterFailure { status: Some(code) } => {
                write!(f, "formatter exited with status {}, output not written", code)
            }
            SkipReason::ConverterFailure { status: None } => {
                write!(f, "formatter was terminated by a signal, output not written")
            }
            SkipReason::DuplicatePage { first } => {
                write!(f, "same page name as {}, ignored", first.display())
            }
        }
    }
}

/// Outcome of one category's pass.
#[derive(Debug, Clone, Default)]
pub struct CategoryResult {
    /// Category identifier, such as `2` or `3p`.
    pub category: String,
    /// Keywords in source-listing order, aliases included.
    pub keywords: Vec<Keyword>,
    pub cross_references: Vec<CrossReference>,
    pub has_errors: bool,
}

impl CategoryResult {
    /// Names of the pages rendered by this category (aliases excluded).
    pub fn live_pages(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter().filter(|kw| !kw.is_alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_file_name_strips_directory() {
        let kw = Keyword::page("select", "html.2/select.html");
        assert_eq!(kw.target_file_name(), "select.html");
    }

    #[test]
    fn target_file_name_without_directory() {
        let kw = Keyword::page("select", "select.html");
        assert_eq!(kw.target_file_name(), "select.html");
    }

    #[test]
    fn only_conversion_problems_are_errors() {
        assert!(SkipReason::ConverterFailure { status: Some(1) }.is_error());
        assert!(
            SkipReason::Undecodable {
                message: "bad".into()
            }
            .is_error()
        );
        assert!(!SkipReason::MissingSource.is_error());
        assert!(
            !SkipReason::DuplicatePage {
                first: "/man3/open.3".into()
            }
            .is_error()
        );
        assert!(
            !SkipReason::NoAliasCandidate {
                pattern: "/x".into()
            }
            .is_error()
        );
        assert!(
            !SkipReason::AmbiguousAlias {
                directive: ".so a.2".into(),
                candidates: vec![]
            }
            .is_error()
        );
    }

    #[test]
    fn live_pages_excludes_aliases() {
        let result = CategoryResult {
            category: "2".into(),
            keywords: vec![
                Keyword::page("open", "html.2/open.html"),
                Keyword::alias("creat", "html.2/open.html"),
            ],
            ..Default::default()
        };
        let names: Vec<&str> = result.live_pages().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["open"]);
    }

    #[test]
    fn converter_failure_display() {
        let reason = SkipReason::ConverterFailure { status: Some(3) };
        assert_eq!(
            reason.to_string(),
            "formatter exited with status 3, output not written"
        );
    }
}
