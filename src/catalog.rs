//! Qt Help Project catalog.
//!
//! The catalog (`man.qhp` by default) lists every keyword of the run and the
//! file globs of each category, one `filterSection` per category:
//!
//! ```xml
//! <filterSection>
//!     <filterAttribute>man</filterAttribute>
//!     <filterAttribute>man2</filterAttribute>
//!     <keywords>
//!         <keyword name="select" ref="html.2/select.html" />
//!         <keyword name="pselect" ref="html.2/select.html" />
//!     </keywords>
//!     <files>
//!         <file>html.2/*.html</file>
//!         <file>html.2/images/*</file>
//!     </files>
//! </filterSection>
//! ```
//!
//! `qhelpgenerator` resolves refs relative to the catalog, so it must be
//! written into the cache root next to the `html.<N>` directories.

use crate::config::ToolConfig;
use crate::naming;
use crate::types::CategoryResult;
use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to write catalog {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Everything written to the catalog.
#[derive(Debug, Clone)]
pub struct Catalog<'a> {
    pub namespace: &'a str,
    pub virtual_folder: &'a str,
    pub filter_name: &'a str,
    /// Category results in run order.
    pub categories: &'a [CategoryResult],
}

impl<'a> Catalog<'a> {
    pub fn new(config: &'a ToolConfig, categories: &'a [CategoryResult]) -> Self {
        Self {
            namespace: &config.namespace,
            virtual_folder: &config.catalog.virtual_folder,
            filter_name: &config.catalog.filter_name,
            categories,
        }
    }

    /// Render the catalog document.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(out, r#"<QtHelpProject version="1.0">"#)?;
        writeln!(out, "<namespace>{}</namespace>", escape(self.namespace))?;
        writeln!(
            out,
            "<virtualFolder>{}</virtualFolder>",
            escape(self.virtual_folder)
        )?;
        writeln!(out, r#"<customFilter name="{}">"#, escape(self.filter_name))?;
        writeln!(out, "    <filterAttribute>man</filterAttribute>")?;
        writeln!(out, "</customFilter>")?;

        for category in self.categories {
            let dir = naming::output_dir_name(&category.category);
            writeln!(out, "<filterSection>")?;
            writeln!(out, "    <filterAttribute>man</filterAttribute>")?;
            writeln!(
                out,
                "    <filterAttribute>man{}</filterAttribute>",
                escape(category.category.as_str())
            )?;
            writeln!(out, "    <keywords>")?;
            for kw in &category.keywords {
                writeln!(
                    out,
                    r#"        <keyword name="{}" ref="{}" />"#,
                    escape(kw.name.as_str()),
                    escape(kw.target.as_str())
                )?;
            }
            writeln!(out, "    </keywords>")?;
            writeln!(out, "    <files>")?;
            writeln!(out, "        <file>{}/*.html</file>", escape(dir.as_str()))?;
            writeln!(out, "        <file>{}/images/*</file>", escape(dir.as_str()))?;
            writeln!(out, "    </files>")?;
            writeln!(out, "</filterSection>")?;
        }

        writeln!(out, "</QtHelpProject>")
    }

    /// Write the catalog to `path`, replacing any previous one.
    pub fn write(&self, path: &Path) -> Result<(), CatalogError> {
        fs::write(path, self.render()).map_err(|source| CatalogError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Keyword;
    use tempfile::TempDir;

    fn category(id: &str, keywords: Vec<Keyword>) -> CategoryResult {
        CategoryResult {
            category: id.to_string(),
            keywords,
            ..Default::default()
        }
    }

    #[test]
    fn header_uses_config_values() {
        let config = ToolConfig {
            namespace: "org.example.man".to_string(),
            ..Default::default()
        };
        let xml = Catalog::new(&config, &[]).render();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(xml.contains("<namespace>org.example.man</namespace>"));
        assert!(xml.contains("<virtualFolder>man-pages</virtualFolder>"));
        assert!(xml.contains("<customFilter name=\"Linux Man 1.0\">"));
        assert!(xml.trim_end().ends_with("</QtHelpProject>"));
    }

    #[test]
    fn one_section_per_category_in_order() {
        let config = ToolConfig::default();
        let categories = vec![
            category("2", vec![Keyword::page("open", "html.2/open.html")]),
            category("1", vec![Keyword::page("ls", "html.1/ls.html")]),
        ];
        let xml = Catalog::new(&config, &categories).render();

        assert_eq!(xml.matches("<filterSection>").count(), 2);
        let man2 = xml.find("<filterAttribute>man2</filterAttribute>").unwrap();
        let man1 = xml.find("<filterAttribute>man1</filterAttribute>").unwrap();
        assert!(man2 < man1);
        assert!(xml.contains("        <file>html.2/*.html</file>\n"));
        assert!(xml.contains("        <file>html.1/images/*</file>\n"));
    }

    #[test]
    fn aliases_listed_with_pages() {
        let config = ToolConfig::default();
        let categories = vec![category(
            "2",
            vec![
                Keyword::page("select", "html.2/select.html"),
                Keyword::alias("pselect", "html.2/select.html"),
            ],
        )];
        let xml = Catalog::new(&config, &categories).render();
        assert!(xml.contains(r#"        <keyword name="select" ref="html.2/select.html" />"#));
        assert!(xml.contains(r#"        <keyword name="pselect" ref="html.2/select.html" />"#));
    }

    #[test]
    fn empty_category_still_has_section() {
        let config = ToolConfig::default();
        let categories = vec![category("8", vec![])];
        let xml = Catalog::new(&config, &categories).render();
        assert!(xml.contains("<filterAttribute>man8</filterAttribute>"));
        assert!(xml.contains("    <keywords>\n    </keywords>\n"));
    }

    #[test]
    fn values_are_escaped() {
        let config = ToolConfig {
            namespace: "a&b".to_string(),
            ..Default::default()
        };
        let categories = vec![category("1", vec![Keyword::page("x<y", "html.1/x<y.html")])];
        let xml = Catalog::new(&config, &categories).render();
        assert!(xml.contains("<namespace>a&amp;b</namespace>"));
        assert!(xml.contains(r#"name="x&lt;y""#));
    }

    #[test]
    fn write_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("man.qhp");
        fs::write(&path, "old").unwrap();
        let config = ToolConfig::default();
        Catalog::new(&config, &[]).write(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("<QtHelpProject"));
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing/man.qhp");
        let config = ToolConfig::default();
        assert!(matches!(
            Catalog::new(&config, &[]).write(&path),
            Err(CatalogError::Write { .. })
        ));
    }
}
