//! Incremental conversion of man page categories.
//!
//! Drives the whole run. Categories are processed one at a time in the order
//! given; within a category every source file goes through:
//!
//! ```text
//! locate ─┬─ alias ────────────────────────────────→ alias keyword
//!         ├─ skipped ──────────────────────────────→ (nothing)
//!         └─ page ── staleness gate ─┬─ unchanged ─→ page keyword
//!                                    └─ stale ── render ── post-process
//!                                                 ── write ── stamp ─→ page keyword
//! ```
//!
//! Pages of a category are independent and run on the rayon pool. Collecting
//! their results is the barrier: only then does [`crate::gc`] sweep the
//! category's output directory, so nothing in flight is ever deleted.
//!
//! Once every category is done the catalog is written, errors or not.
//!
//! ## Output Structure
//!
//! ```text
//! <cache_root>/
//! ├── man.qhp
//! ├── html.2/
//! │   ├── select.html
//! │   ├── open.html
//! │   └── images/
//! │       └── select-1.png
//! └── html.3p/
//!     └── printf.html
//! ```

use crate::alias::{AliasGrammar, DirectoryListing, FsListing};
use crate::cache::{self, CacheStats, Freshness};
use crate::catalog::{Catalog, CatalogError};
use crate::config::ToolConfig;
use crate::convert::{ConvertError, Formatter, GroffFormatter, RenderRequest};
use crate::gc;
use crate::naming;
use crate::postprocess;
use crate::source::{Located, SourceDocument, SourceError, SourceLocator};
use crate::types::{CategoryResult, CrossReference, Keyword, SkipReason};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Conversion failed: {0}")]
    Convert(#[from] ConvertError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Invalid alias pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Run-wide switches that are not part of the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory holding `html.<N>/` and the catalog.
    pub cache_root: PathBuf,
    /// Categories in processing order.
    pub categories: Vec<String>,
    /// Re-render every page regardless of mtimes.
    pub force: bool,
}

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq)]
pub enum PageStatus {
    Rendered,
    Unchanged { delta: f64 },
    Alias { target: String },
    Skipped(SkipReason),
}

/// Progress events emitted during processing.
///
/// Sent from worker threads, so page events of one category arrive in
/// completion order.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    CategoryStarted {
        category: String,
        source_count: usize,
    },
    Page {
        category: String,
        name: String,
        status: PageStatus,
    },
    Removed {
        category: String,
        path: PathBuf,
    },
    CategoryFinished {
        category: String,
        stats: CacheStats,
        has_errors: bool,
    },
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub categories: Vec<CategoryResult>,
    pub stats: CacheStats,
    /// OR of every category's error flag.
    pub has_errors: bool,
    pub catalog_path: PathBuf,
}

impl RunReport {
    pub fn cross_references(&self) -> impl Iterator<Item = &CrossReference> {
        self.categories.iter().flat_map(|c| c.cross_references.iter())
    }
}

/// Run with the configured external formatter and the real filesystem.
pub fn run(
    config: &ToolConfig,
    options: &RunOptions,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<RunReport, ProcessError> {
    let formatter = GroffFormatter::from_config(&config.formatter);
    run_with_formatter(&formatter, &FsListing, config, options, progress)
}

/// Run with a specific formatter and directory listing (allows testing with mocks).
pub fn run_with_formatter(
    formatter: &impl Formatter,
    listing: &impl DirectoryListing,
    config: &ToolConfig,
    options: &RunOptions,
    progress: Option<Sender<ProcessEvent>>,
) -> Result<RunReport, ProcessError> {
    let grammar = AliasGrammar::new(&config.alias.rules)?;
    let pipeline = Pipeline {
        config,
        locator: SourceLocator::new(&config.source_root, &grammar, listing),
        formatter,
        cache_root: &options.cache_root,
        force: options.force,
        progress: progress.as_ref(),
    };

    fs::create_dir_all(&options.cache_root)?;

    let mut categories = Vec::with_capacity(options.categories.len());
    let mut stats = CacheStats::default();
    let mut has_errors = false;

    for category in &options.categories {
        let (result, category_stats) = pipeline.process_category(category)?;
        has_errors |= result.has_errors;
        stats.absorb(&category_stats);
        categories.push(result);
    }

    let catalog_path = options.cache_root.join(config.catalog_file_name());
    Catalog::new(config, &categories).write(&catalog_path)?;
    tracing::info!(path = %catalog_path.display(), "catalog written");

    Ok(RunReport {
        categories,
        stats,
        has_errors,
        catalog_path,
    })
}

/// A source whose page name was already taken by an earlier file.
struct Duplicate {
    name: String,
    path: PathBuf,
    reason: SkipReason,
}

/// Keep the first source of each page name in listing order. Two sources
/// with one name would render into the same output file concurrently.
fn split_duplicate_pages(sources: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<Duplicate>) {
    let mut first_by_name: HashMap<String, PathBuf> = HashMap::new();
    let mut kept = Vec::with_capacity(sources.len());
    let mut duplicates = Vec::new();
    for path in sources {
        let name = path
            .file_name()
            .map(|n| naming::page_name(&n.to_string_lossy()))
            .unwrap_or_default();
        match first_by_name.get(&name) {
            Some(first) => duplicates.push(Duplicate {
                reason: SkipReason::DuplicatePage {
                    first: first.clone(),
                },
                name,
                path,
            }),
            None => {
                first_by_name.insert(name, path.clone());
                kept.push(path);
            }
        }
    }
    (kept, duplicates)
}

/// Per-page result, collected in source order.
enum PageOutcome {
    Registered {
        keyword: Keyword,
        cross_references: Vec<CrossReference>,
        status: PageStatus,
    },
    Skipped(SkipReason),
}

struct Pipeline<'a, F: Formatter, L: DirectoryListing> {
    config: &'a ToolConfig,
    locator: SourceLocator<'a, L>,
    formatter: &'a F,
    cache_root: &'a Path,
    force: bool,
    progress: Option<&'a Sender<ProcessEvent>>,
}

impl<F: Formatter, L: DirectoryListing> Pipeline<'_, F, L> {
    fn emit(&self, event: ProcessEvent) {
        if let Some(tx) = self.progress {
            // A closed receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    fn process_category(&self, category: &str) -> Result<(CategoryResult, CacheStats), ProcessError> {
        // Listing first: a missing source directory aborts before anything
        // under the output directory is touched.
        let listed = self.locator.list(category)?;
        let source_count = listed.len();
        let (sources, duplicates) = split_duplicate_pages(listed);

        let out_dir = self.cache_root.join(naming::output_dir_name(category));
        let images_dir = out_dir.join(&self.config.formatter.images_dir);
        fs::create_dir_all(&images_dir)?;

        tracing::info!(category, sources = source_count, "processing category");
        self.emit(ProcessEvent::CategoryStarted {
            category: category.to_string(),
            source_count,
        });

        for duplicate in &duplicates {
            tracing::warn!(
                category,
                page = %duplicate.name,
                source = %duplicate.path.display(),
                "skipped: {}",
                duplicate.reason
            );
            self.emit(ProcessEvent::Page {
                category: category.to_string(),
                name: duplicate.name.clone(),
                status: PageStatus::Skipped(duplicate.reason.clone()),
            });
        }

        let outcomes: Vec<PageOutcome> = sources
            .par_iter()
            .map(|path| self.process_page(category, path, &out_dir))
            .collect::<Result<Vec<_>, ProcessError>>()?;

        let mut result = CategoryResult {
            category: category.to_string(),
            ..Default::default()
        };
        let mut stats = CacheStats {
            skipped: duplicates.len() as u32,
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome {
                PageOutcome::Registered {
                    keyword,
                    cross_references,
                    status,
                } => {
                    match status {
                        PageStatus::Rendered => stats.rendered += 1,
                        PageStatus::Unchanged { .. } => stats.unchanged += 1,
                        PageStatus::Alias { .. } => stats.aliases += 1,
                        PageStatus::Skipped(_) => {}
                    }
                    result.keywords.push(keyword);
                    result.cross_references.extend(cross_references);
                }
                PageOutcome::Skipped(reason) => {
                    if reason.is_error() {
                        stats.failed += 1;
                        result.has_errors = true;
                    } else {
                        stats.skipped += 1;
                    }
                }
            }
        }

        let report = gc::collect_garbage(&out_dir, &images_dir, &result.keywords)?;
        for path in report.removed() {
            tracing::debug!(category, path = %path.display(), "removed stale output");
            self.emit(ProcessEvent::Removed {
                category: category.to_string(),
                path: path.clone(),
            });
        }

        self.emit(ProcessEvent::CategoryFinished {
            category: category.to_string(),
            stats: stats.clone(),
            has_errors: result.has_errors,
        });
        Ok((result, stats))
    }

    fn process_page(
        &self,
        category: &str,
        path: &Path,
        out_dir: &Path,
    ) -> Result<PageOutcome, ProcessError> {
        let (name, outcome) = match self.locator.locate(category, path)? {
            Located::Page(doc) => {
                let name = doc.name.clone();
                (name, self.render_page(&doc, out_dir)?)
            }
            Located::Alias { name, target } => {
                let output = target.output_target();
                tracing::debug!(category, page = %name, target = %output, "alias");
                let outcome = PageOutcome::Registered {
                    keyword: Keyword::alias(name.clone(), output.clone()),
                    cross_references: Vec::new(),
                    status: PageStatus::Alias { target: output },
                };
                (name, outcome)
            }
            Located::Skipped { name, reason } => (name, PageOutcome::Skipped(reason)),
        };

        let status = match &outcome {
            PageOutcome::Registered { status, .. } => status.clone(),
            PageOutcome::Skipped(reason) => {
                tracing::warn!(
                    category,
                    page = %name,
                    source = %path.display(),
                    "skipped: {}",
                    reason
                );
                PageStatus::Skipped(reason.clone())
            }
        };
        self.emit(ProcessEvent::Page {
            category: category.to_string(),
            name,
            status,
        });
        Ok(outcome)
    }

    fn render_page(&self, doc: &SourceDocument, out_dir: &Path) -> Result<PageOutcome, ProcessError> {
        let output = out_dir.join(naming::output_file_name(&doc.name));
        let keyword = Keyword::page(
            doc.name.clone(),
            naming::output_target(&doc.category, &doc.name),
        );

        if let Freshness::Unchanged { delta } = cache::check(&output, doc.mtime, self.force)? {
            return Ok(PageOutcome::Registered {
                keyword,
                cross_references: Vec::new(),
                status: PageStatus::Unchanged { delta },
            });
        }

        let rendered = self.formatter.render(&RenderRequest {
            page: &doc.name,
            source_text: &doc.text,
            work_dir: out_dir,
            images_dir: &self.config.formatter.images_dir,
        })?;

        if !rendered.diagnostics.trim().is_empty() {
            tracing::warn!(
                category = %doc.category,
                page = %doc.name,
                "formatter: {}",
                rendered.diagnostics.trim()
            );
        }
        if !rendered.success() {
            return Ok(PageOutcome::Skipped(SkipReason::ConverterFailure {
                status: rendered.status,
            }));
        }

        let processed = postprocess::post_process(&rendered.html, &doc.category);
        if processed.multiple_titles {
            tracing::warn!(
                category = %doc.category,
                page = %doc.name,
                "more than one title element, only the first was rewritten"
            );
        }

        fs::write(&output, &processed.html)?;
        cache::stamp(&output, doc.mtime)?;

        Ok(PageOutcome::Registered {
            keyword,
            cross_references: processed.cross_references,
            status: PageStatus::Rendered,
        })
    }
}
