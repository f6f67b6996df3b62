//! # man2help
//!
//! Converts the system's man pages to HTML, incrementally, and writes a Qt
//! Help Project catalog (`man.qhp`) that `qhelpgenerator` packages into a
//! help file for Qt Assistant or Qt Creator.
//!
//! # Pipeline
//!
//! Categories (`1`, `2`, `3p`, ...) are processed one after another. Every
//! source file of a category goes through:
//!
//! ```text
//! man2/select.2.gz ── decode ── alias? ──────────────────────────→ keyword
//!                                  └── stale? ── groff ── rewrite ─→ html.2/select.html + keyword
//! ```
//!
//! after which stale output of the category is deleted. When every category
//! is done, all keywords go into the catalog.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | Orchestrates categories, pages and the catalog write |
//! | [`source`] | Lists and decodes (`.gz`, `.bz2`) the sources of a category |
//! | [`alias`] | Resolves `.so` alias directives to the page they point at |
//! | [`cache`] | Mtime-based staleness gate and run statistics |
//! | [`convert`] | `Formatter` trait and the `groff` implementation |
//! | [`postprocess`] | Title rewrite and cross-reference linking |
//! | [`gc`] | Deletes orphaned pages and images |
//! | [`catalog`] | Writes the `.qhp` document |
//! | [`config`] | `man2help.toml` loading, merging and validation |
//! | [`system`] | Checks the external tools are installed |
//! | [`naming`] | Page and output naming conventions |
//! | [`types`] | Keywords, cross references, skip reasons |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Output Directory Is the Cache
//!
//! Every written page carries its source's mtime. A later run compares the
//! two and skips the formatter when they agree (within a second). There is no
//! manifest to get out of sync, and deleting `html.<N>/` is a full rebuild.
//! See [`cache`].
//!
//! ## No Shared Working Directory
//!
//! grohtml writes images relative to its working directory. Instead of
//! changing the process directory, each formatter child gets its own
//! `current_dir`, which is what lets pages render in parallel.
//!
//! ## Deterministic Catalogs
//!
//! Sources are processed in parallel but results are collected in file-name
//! order, so an unchanged tree produces a byte-identical catalog.

pub mod alias;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod gc;
pub mod naming;
pub mod output;
pub mod postprocess;
pub mod process;
pub mod source;
pub mod system;
pub mod types;
