//! Naming conventions shared by every stage.
//!
//! Source files live in `man<category>/` and are named
//! `<page>.<category-suffix>[.gz|.bz2]`. Rendered pages are written to
//! `html.<category>/<page>.html`, and diagrams embedded in a page go to
//! `html.<category>/images/<page>-<index>.<ext>`.
//!
//! ```text
//! man2/select.2.gz      → page "select" → html.2/select.html
//! man3/printf.3p.bz2    → page "printf" → html.3p/printf.html   (when run for "3p")
//! man1/pic.1            → page "pic"    → html.1/images/pic-1.png
//! ```

use regex::Regex;
use std::sync::LazyLock;

/// Extensions stripped before the category suffix.
const COMPRESSION_EXTENSIONS: &[&str] = &["gz", "bz2"];

/// Split off the last `.ext` of a file name, ignoring leading dots.
fn split_extension(name: &str) -> Option<(&str, &str)> {
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => Some((base, ext)),
        _ => None,
    }
}

/// Canonical page name of a source file.
///
/// Strips a compression suffix if present, then exactly one more extension
/// (the category suffix, whatever it is):
/// - `"select.2.gz"` → `"select"`
/// - `"open.2"` → `"open"`
/// - `"python3.11.1"` → `"python3.11"`
/// - `"README"` → `"README"`
pub fn page_name(file_name: &str) -> String {
    let without_compression = match split_extension(file_name) {
        Some((base, ext)) if COMPRESSION_EXTENSIONS.contains(&ext) => base,
        _ => file_name,
    };
    match split_extension(without_compression) {
        Some((base, _)) => base.to_string(),
        None => without_compression.to_string(),
    }
}

/// Directory holding a category's sources, relative to the source root.
pub fn source_dir_name(category: &str) -> String {
    format!("man{}", category)
}

/// Directory holding a category's rendered pages, relative to the cache root.
pub fn output_dir_name(category: &str) -> String {
    format!("html.{}", category)
}

/// File name of a rendered page.
pub fn output_file_name(page: &str) -> String {
    format!("{}.html", page)
}

/// Rendered page path relative to the cache root, as used in catalog refs.
pub fn output_target(category: &str, page: &str) -> String {
    format!("{}/{}", output_dir_name(category), output_file_name(page))
}

/// Prefix handed to the formatter for a page's embedded images.
pub fn image_prefix(page: &str) -> String {
    format!("{}-", page)
}

/// `<page>-<index>.<ext>`, matched from the start only so trailing text after
/// the first extension (`pic-1.tar.gz`) still belongs to the page.
static IMAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)-\d+\.\w+").expect("image name pattern"));

/// Owning page of an image file named `<page>-<index>.<ext>`.
///
/// The shortest page name that fits wins, so `a-1-2.png` belongs to `a`.
/// Returns `None` when the name does not follow the convention.
pub fn image_page(file_name: &str) -> Option<&str> {
    IMAGE_NAME
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .map(|page| page.as_str())
}
