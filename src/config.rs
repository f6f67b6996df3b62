//! Tool configuration.
//!
//! Handles loading, validating, and merging the `man2help.toml` file. Stock
//! defaults are overridden by the config file, and command-line flags override
//! both (see `main.rs`).
//!
//! ## Config File Location
//!
//! `man2help` looks for `man2help.toml` in the cache directory. A different
//! file can be named with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! namespace = "man.linux.org.1.0"   # Qt Help namespace
//! output = "man.qhp"                 # Catalog file name (inside the cache dir)
//! source_root = "/usr/share/man"     # Parent of the man<N> directories
//!
//! [formatter]
//! program = "groff"
//! args = ["-t", "-m", "mandoc", "-mwww", "-Thtml"]
//! images_dir = "images"              # Relative to html.<N>/
//!
//! [[alias.rules]]                    # Tried in order, first match wins
//! name = "path"
//! pattern = '^\.so\s+(?:.*?/)?man(?P<category>\d+)/(?P<stem>[\w-]+)'
//!
//! [[alias.rules]]
//! name = "dotted"
//! pattern = '^\.so\s+(?P<stem>[\w-]+\.(?P<category>\d))'
//!
//! [catalog]
//! virtual_folder = "man-pages"
//! filter_name = "Linux Man 1.0"
//!
//! [processing]
//! max_processes = 4                  # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the cache directory.
pub const CONFIG_FILENAME: &str = "man2help.toml";

pub const DEFAULT_NAMESPACE: &str = "man.linux.org.1.0";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid alias pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `man2help.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Qt Help namespace written to the catalog header.
    pub namespace: String,
    /// Catalog file name. Only the file name component is used.
    pub output: String,
    /// Directory containing `man1/`, `man2/`, ...
    pub source_root: PathBuf,
    pub formatter: FormatterConfig,
    pub alias: AliasConfig,
    pub catalog: CatalogConfig,
    pub processing: ProcessingConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            output: "man.qhp".to_string(),
            source_root: PathBuf::from("/usr/share/man"),
            formatter: FormatterConfig::default(),
            alias: AliasConfig::default(),
            catalog: CatalogConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl ToolConfig {
    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Validation("namespace must not be empty".into()));
        }
        if self.catalog_file_name().is_empty() {
            return Err(ConfigError::Validation(
                "output must name a file".into(),
            ));
        }
        if self.formatter.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "formatter.program must not be empty".into(),
            ));
        }
        if self.formatter.images_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "formatter.images_dir must not be empty".into(),
            ));
        }
        for rule in &self.alias.rules {
            rule.validate()?;
        }
        Ok(())
    }

    /// File name component of `output`; the catalog always lives in the cache root.
    pub fn catalog_file_name(&self) -> String {
        Path::new(&self.output)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// External formatter invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatterConfig {
    /// Program name or path.
    pub program: String,
    /// Arguments placed before the image options.
    pub args: Vec<String>,
    /// Image directory, relative to the category output directory.
    pub images_dir: String,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            program: "groff".to_string(),
            args: ["-t", "-m", "mandoc", "-mwww", "-Thtml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            images_dir: "images".to_string(),
        }
    }
}

/// Grammar for `.so` alias directives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AliasConfig {
    /// Ordered rules; the first one that matches decides.
    pub rules: Vec<AliasRule>,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                AliasRule {
                    name: "path".to_string(),
                    pattern: r"^\.so\s+(?:.*?/)?man(?P<category>\d+)/(?P<stem>[\w-]+)".to_string(),
                },
                AliasRule {
                    name: "dotted".to_string(),
                    pattern: r"^\.so\s+(?P<stem>[\w-]+\.(?P<category>\d))".to_string(),
                },
            ],
        }
    }
}

/// One alias syntax: a regex capturing `category` and `stem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasRule {
    pub name: String,
    pub pattern: String,
}

impl AliasRule {
    fn validate(&self) -> Result<(), ConfigError> {
        let regex = Regex::new(&self.pattern)?;
        let names: Vec<&str> = regex.capture_names().flatten().collect();
        for required in ["category", "stem"] {
            if !names.contains(&required) {
                return Err(ConfigError::Validation(format!(
                    "alias rule '{}' must capture a '{}' group",
                    self.name, required
                )));
            }
        }
        Ok(())
    }
}

/// Catalog header values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub virtual_folder: String,
    pub filter_name: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            virtual_folder: "man-pages".to_string(),
            filter_name: "Linux Man 1.0".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel formatter processes.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ToolConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so an
///   `[[alias.rules]]` list in a config file replaces the whole stock grammar.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ToolConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the tool config.
///
/// An explicit path must exist. Without one, `man2help.toml` in `cache_dir`
/// is used when present, else the stock defaults.
pub fn load_config(explicit: Option<&Path>, cache_dir: &Path) -> Result<ToolConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => Some(load_raw_config(path)?),
        None => {
            let implicit = cache_dir.join(CONFIG_FILENAME);
            if implicit.is_file() {
                Some(load_raw_config(&implicit)?)
            } else {
                None
            }
        }
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `man2help.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# man2help configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags take precedence.
# Unknown keys will cause an error.

# Qt Help namespace written to the catalog.
namespace = "man.linux.org.1.0"

# Catalog file name. It is always written inside the cache directory,
# next to the html.<N> directories it references.
output = "man.qhp"

# Directory containing man1/, man2/, ... source directories.
source_root = "/usr/share/man"

# ---------------------------------------------------------------------------
# External formatter
# ---------------------------------------------------------------------------
[formatter]
# Receives the page source on stdin and writes HTML to stdout.
program = "groff"
args = ["-t", "-m", "mandoc", "-mwww", "-Thtml"]

# Where embedded diagrams go, relative to html.<N>/.
images_dir = "images"

# ---------------------------------------------------------------------------
# Alias (.so) directive grammar
# ---------------------------------------------------------------------------
# Rules are tried in order; the first match wins. Every pattern must capture
# a `category` and a `stem` group. The alias target is looked up as
# <source_root>/man<category>/<stem>.* and must match exactly one file.
# Listing rules here replaces the whole stock grammar.

[[alias.rules]]
name = "path"
pattern = '^\.so\s+(?:.*?/)?man(?P<category>\d+)/(?P<stem>[\w-]+)'

[[alias.rules]]
name = "dotted"
pattern = '^\.so\s+(?P<stem>[\w-]+\.(?P<category>\d))'

# ---------------------------------------------------------------------------
# Catalog
# ---------------------------------------------------------------------------
[catalog]
virtual_folder = "man-pages"
filter_name = "Linux Man 1.0"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel formatter processes.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ToolConfig::default();
        assert_eq!(config.namespace, "man.linux.org.1.0");
        assert_eq!(config.output, "man.qhp");
        assert_eq!(config.source_root, PathBuf::from("/usr/share/man"));
        assert_eq!(config.formatter.program, "groff");
        assert_eq!(config.formatter.images_dir, "images");
        assert_eq!(config.alias.rules.len(), 2);
        assert_eq!(config.alias.rules[0].name, "path");
    }

    #[test]
    fn default_config_is_valid() {
        ToolConfig::default().validate().unwrap();
    }

    #[test]
    fn stock_config_toml_matches_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value(), Some(value)).unwrap();
        let defaults = ToolConfig::default();
        assert_eq!(config.namespace, defaults.namespace);
        assert_eq!(config.formatter.args, defaults.formatter.args);
        assert_eq!(config.alias.rules.len(), defaults.alias.rules.len());
        for (a, b) in config.alias.rules.iter().zip(&defaults.alias.rules) {
            assert_eq!(a.pattern, b.pattern);
        }
    }

    #[test]
    fn parse_partial_config() {
        let overlay: toml::Value = toml::from_str(
            r#"
namespace = "org.example.man"

[formatter]
program = "/opt/groff/bin/groff"
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.namespace, "org.example.man");
        assert_eq!(config.formatter.program, "/opt/groff/bin/groff");
        // Untouched defaults preserved
        assert_eq!(config.formatter.images_dir, "images");
        assert_eq!(config.output, "man.qhp");
    }

    #[test]
    fn alias_rules_replace_stock_grammar() {
        let overlay: toml::Value = toml::from_str(
            r#"
[[alias.rules]]
name = "only"
pattern = '^\.so\s+(?P<stem>[\w.-]+\.(?P<category>\dp?))'
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.alias.rules.len(), 1);
        assert_eq!(config.alias.rules[0].name, "only");
    }

    #[test]
    fn unknown_key_rejected() {
        let overlay: toml::Value = toml::from_str("namespaec = \"typo\"").unwrap();
        assert!(matches!(
            resolve_config(stock_defaults_value(), Some(overlay)),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn alias_rule_without_stem_group_rejected() {
        let overlay: toml::Value = toml::from_str(
            r#"
[[alias.rules]]
name = "broken"
pattern = '^\.so\s+man(?P<category>\d+)/'
"#,
        )
        .unwrap();
        let err = resolve_config(stock_defaults_value(), Some(overlay)).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(msg) if msg.contains("stem")));
    }

    #[test]
    fn alias_rule_with_bad_regex_rejected() {
        let overlay: toml::Value = toml::from_str(
            r#"
[[alias.rules]]
name = "broken"
pattern = '(?P<stem>'
"#,
        )
        .unwrap();
        assert!(matches!(
            resolve_config(stock_defaults_value(), Some(overlay)),
            Err(ConfigError::Pattern(_))
        ));
    }

    #[test]
    fn empty_namespace_rejected() {
        let overlay: toml::Value = toml::from_str("namespace = \"  \"").unwrap();
        assert!(matches!(
            resolve_config(stock_defaults_value(), Some(overlay)),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn catalog_file_name_drops_directories() {
        let config = ToolConfig {
            output: "some/where/custom.qhp".to_string(),
            ..Default::default()
        };
        assert_eq!(config.catalog_file_name(), "custom.qhp");
    }

    #[test]
    fn effective_threads_clamps_to_at_least_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_never_exceeds_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(cores + 100),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn load_config_reads_file_from_cache_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "output = \"linux.qhp\"\n",
        )
        .unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config.output, "linux.qhp");
    }

    #[test]
    fn load_config_explicit_path_must_exist() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(matches!(
            load_config(Some(&missing), tmp.path()),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn load_config_explicit_path_wins_over_cache_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "output = \"a.qhp\"\n").unwrap();
        let explicit = tmp.path().join("other.toml");
        fs::write(&explicit, "output = \"b.qhp\"\n").unwrap();
        let config = load_config(Some(&explicit), tmp.path()).unwrap();
        assert_eq!(config.output, "b.qhp");
    }
}
