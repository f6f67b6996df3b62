//! Rewrites applied to the formatter's HTML before it is written.
//!
//! Two edits, nothing else is touched:
//!
//! 1. **Title**: grohtml copies the `.TH` name verbatim (`SELECT`). It becomes
//!    `select | man2`, which reads better in a help browser's index and tabs.
//! 2. **Cross references**: the man convention `<b>open</b>(2)` becomes a link
//!    to `../html.2/open.html`. Targets are not checked; a link to a page that
//!    was never converted simply dangles.
//!
//! The markup is scanned textually. Malformed HTML is tolerated: with several
//! `<title>` elements only the first one is rewritten.

use crate::naming;
use crate::types::CrossReference;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static TITLE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title(?:\s[^>]*)?>").expect("title pattern"));

static TITLE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</title\s*>").expect("title close pattern"));

/// Bold word directly followed by `(<section>)`, e.g. `<b>open</b>(2)` or `<b>printf</b>(3p)`.
static MAN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<b>(\w+)</b>\((\d+p?)\)").expect("man link pattern"));

/// Result of post-processing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessed {
    pub html: String,
    /// Original title text, if a title element was found.
    pub title: Option<String>,
    /// More than one `<title>` open tag was seen.
    pub multiple_titles: bool,
    pub cross_references: Vec<CrossReference>,
}

/// Apply the title rewrite and cross-reference linking.
pub fn post_process(html: &str, category: &str) -> PostProcessed {
    let titled = rewrite_title(html, category);
    let mut cross_references = Vec::new();
    let html = link_cross_references(&titled.html, &mut cross_references);
    PostProcessed {
        html,
        title: titled.title,
        multiple_titles: titled.multiple_titles,
        cross_references,
    }
}

/// Outcome of [`rewrite_title`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRewrite {
    pub html: String,
    pub title: Option<String>,
    pub multiple_titles: bool,
}

/// Replace the first title's text with `<lowercased text> | man<category>`.
///
/// A document without a (closed) title element is returned unchanged.
pub fn rewrite_title(html: &str, category: &str) -> TitleRewrite {
    let mut opens = TITLE_OPEN.find_iter(html);
    let Some(open) = opens.next() else {
        return TitleRewrite {
            html: html.to_string(),
            title: None,
            multiple_titles: false,
        };
    };
    let multiple_titles = opens.next().is_some();

    let text_start = open.end();
    let Some(close) = TITLE_CLOSE.find_at(html, text_start) else {
        return TitleRewrite {
            html: html.to_string(),
            title: None,
            multiple_titles,
        };
    };
    let text_end = close.start();

    let title = &html[text_start..text_end];
    let replacement = format!("{} | man{}", title.to_lowercase(), category);

    let mut out = String::with_capacity(html.len() + replacement.len());
    out.push_str(&html[..text_start]);
    out.push_str(&replacement);
    out.push_str(&html[text_end..]);

    TitleRewrite {
        html: out,
        title: Some(title.to_string()),
        multiple_titles,
    }
}

/// Wrap every `<b>name</b>(N)` in a link to the referenced page.
///
/// Each match is also recorded in `refs`, duplicates included.
pub fn link_cross_references(html: &str, refs: &mut Vec<CrossReference>) -> String {
    MAN_LINK
        .replace_all(html, |caps: &Captures| {
            let name = &caps[1];
            let category = &caps[2];
            refs.push(CrossReference::new(category, name));
            format!(
                "<a href=\"../{}\">{}</a>",
                naming::output_target(category, name),
                &caps[0]
            )
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Title rewrite
    // =========================================================================

    #[test]
    fn title_is_lowercased_and_suffixed() {
        let html = "<html><head><title>SELECT</title></head><body>SELECT</body></html>";
        let result = rewrite_title(html, "2");
        assert_eq!(
            result.html,
            "<html><head><title>select | man2</title></head><body>SELECT</body></html>"
        );
        assert_eq!(result.title.as_deref(), Some("SELECT"));
        assert!(!result.multiple_titles);
    }

    #[test]
    fn title_with_variant_category() {
        let result = rewrite_title("<title>PRINTF</title>", "3p");
        assert_eq!(result.html, "<title>printf | man3p</title>");
    }

    #[test]
    fn only_first_title_rewritten() {
        let html = "<title>ONE</title><title>TWO</title>";
        let result = rewrite_title(html, "1");
        assert_eq!(result.html, "<title>one | man1</title><title>TWO</title>");
        assert!(result.multiple_titles);
    }

    #[test]
    fn same_title_text_elsewhere_untouched() {
        let html = "<title>LS</title><p><title>LS</title></p>";
        let result = rewrite_title(html, "1");
        assert_eq!(result.html, "<title>ls | man1</title><p><title>LS</title></p>");
    }

    #[test]
    fn title_tag_case_insensitive() {
        let result = rewrite_title("<TITLE>CAT</TITLE>", "1");
        assert_eq!(result.html, "<TITLE>cat | man1</TITLE>");
    }

    #[test]
    fn missing_title_leaves_document_unchanged() {
        let html = "<html><body>nothing</body></html>";
        let result = rewrite_title(html, "1");
        assert_eq!(result.html, html);
        assert_eq!(result.title, None);
    }

    #[test]
    fn unclosed_title_leaves_document_unchanged() {
        let html = "<html><head><title>BROKEN";
        let result = rewrite_title(html, "1");
        assert_eq!(result.html, html);
        assert_eq!(result.title, None);
    }

    #[test]
    fn empty_title() {
        let result = rewrite_title("<title></title>", "5");
        assert_eq!(result.html, "<title> | man5</title>");
    }

    // =========================================================================
    // Cross references
    // =========================================================================

    #[test]
    fn cross_reference_wrapped_in_link() {
        let mut refs = Vec::new();
        let html = link_cross_references("see <b>open</b>(2) for details", &mut refs);
        assert_eq!(
            html,
            "see <a href=\"../html.2/open.html\"><b>open</b>(2)</a> for details"
        );
        assert_eq!(refs, vec![CrossReference::new("2", "open")]);
    }

    #[test]
    fn posix_variant_reference() {
        let mut refs = Vec::new();
        let html = link_cross_references("<b>printf</b>(3p)", &mut refs);
        assert_eq!(html, "<a href=\"../html.3p/printf.html\"><b>printf</b>(3p)</a>");
        assert_eq!(refs, vec![CrossReference::new("3p", "printf")]);
    }

    #[test]
    fn duplicate_references_all_recorded() {
        let mut refs = Vec::new();
        link_cross_references("<b>read</b>(2), <b>read</b>(2), <b>write</b>(2)", &mut refs);
        assert_eq!(
            refs,
            vec![
                CrossReference::new("2", "read"),
                CrossReference::new("2", "read"),
                CrossReference::new("2", "write"),
            ]
        );
    }

    #[test]
    fn bold_without_section_untouched() {
        let mut refs = Vec::new();
        let html = link_cross_references("<b>NAME</b> and <b>open</b> (2)", &mut refs);
        assert_eq!(html, "<b>NAME</b> and <b>open</b> (2)");
        assert!(refs.is_empty());
    }

    #[test]
    fn post_process_applies_both_rewrites() {
        let html = "<title>SELECT</title><p>see <b>poll</b>(2)</p>";
        let result = post_process(html, "2");
        assert_eq!(
            result.html,
            "<title>select | man2</title><p>see <a href=\"../html.2/poll.html\"><b>poll</b>(2)</a></p>"
        );
        assert_eq!(result.cross_references, vec![CrossReference::new("2", "poll")]);
    }
}
