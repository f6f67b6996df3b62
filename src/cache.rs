//! Staleness gate for incremental builds.
//!
//! Running the formatter is the bottleneck of a run, so a page is only
//! re-rendered when its source changed since the last run.
//!
//! # Design
//!
//! The cache key is the output file's **modification time**. After a page is
//! written, its mtime is set to the source's mtime ([`stamp`]); on the next run
//! the page is considered unchanged when both mtimes agree. No manifest file is
//! needed: the output directory is its own cache.
//!
//! Filesystems store timestamps at different resolutions (FAT keeps two
//! seconds, some network filesystems whole seconds), so the comparison allows
//! a difference strictly below [`MTIME_TOLERANCE`]. The tolerance is never
//! zero.
//!
//! ## Bypassing the cache
//!
//! Pass `--force` to re-render every page. Output files are overwritten
//! naturally.

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Maximum mtime difference (exclusive) for an output to count as unchanged.
pub const MTIME_TOLERANCE: Duration = Duration::from_secs(1);

/// Decision for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Freshness {
    /// Output exists and matches the source. `delta` is output minus source, in seconds.
    Unchanged { delta: f64 },
    /// Output is missing, out of date, or rebuilding was forced.
    Stale,
}

/// Signed difference `a - b` in seconds.
fn signed_delta(a: SystemTime, b: SystemTime) -> f64 {
    match a.duration_since(b) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Decide whether the page rendered to `output` must be regenerated.
pub fn check(output: &Path, source_mtime: SystemTime, force: bool) -> io::Result<Freshness> {
    if force {
        return Ok(Freshness::Stale);
    }
    let output_mtime = match fs::metadata(output) {
        Ok(meta) if meta.is_file() => meta.modified()?,
        Ok(_) => return Ok(Freshness::Stale),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Freshness::Stale),
        Err(e) => return Err(e),
    };
    let delta = signed_delta(output_mtime, source_mtime);
    if delta.abs() < MTIME_TOLERANCE.as_secs_f64() {
        Ok(Freshness::Unchanged { delta })
    } else {
        Ok(Freshness::Stale)
    }
}

/// Set the output's mtime to its source's, making it the cache key for the next run.
pub fn stamp(output: &Path, source_mtime: SystemTime) -> io::Result<()> {
    let file = File::options().write(true).open(output)?;
    file.set_modified(source_mtime)
}

/// Summary of page outcomes for a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub unchanged: u32,
    pub rendered: u32,
    pub aliases: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.unchanged + self.rendered + self.aliases + self.skipped + self.failed
    }

    /// Fold another category's stats into this one.
    pub fn absorb(&mut self, other: &CacheStats) {
        self.unchanged += other.unchanged;
        self.rendered += other.rendered;
        self.aliases += other.aliases;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unchanged, {} rendered, {} aliases",
            self.unchanged, self.rendered, self.aliases
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, " ({} total)", self.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_time() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000)
    }

    fn output_at(tmp: &TempDir, mtime: SystemTime) -> std::path::PathBuf {
        let path = tmp.path().join("page.html");
        fs::write(&path, "<html></html>").unwrap();
        stamp(&path, mtime).unwrap();
        path
    }

    // =========================================================================
    // Staleness boundary
    // =========================================================================

    #[test]
    fn missing_output_is_stale() {
        let tmp = TempDir::new().unwrap();
        let result = check(&tmp.path().join("none.html"), source_time(), false).unwrap();
        assert_eq!(result, Freshness::Stale);
    }

    #[test]
    fn identical_mtime_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time());
        let result = check(&out, source_time(), false).unwrap();
        assert!(matches!(result, Freshness::Unchanged { delta } if delta == 0.0));
    }

    #[test]
    fn half_second_later_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time() + Duration::from_millis(500));
        assert!(matches!(
            check(&out, source_time(), false).unwrap(),
            Freshness::Unchanged { .. }
        ));
    }

    #[test]
    fn half_second_earlier_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time() - Duration::from_millis(500));
        assert!(matches!(
            check(&out, source_time(), false).unwrap(),
            Freshness::Unchanged { delta } if delta < 0.0
        ));
    }

    #[test]
    fn one_and_a_half_seconds_later_is_stale() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time() + Duration::from_millis(1500));
        assert_eq!(check(&out, source_time(), false).unwrap(), Freshness::Stale);
    }

    #[test]
    fn one_and_a_half_seconds_earlier_is_stale() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time() - Duration::from_millis(1500));
        assert_eq!(check(&out, source_time(), false).unwrap(), Freshness::Stale);
    }

    #[test]
    fn exactly_one_second_is_stale() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time() + Duration::from_secs(1));
        assert_eq!(check(&out, source_time(), false).unwrap(), Freshness::Stale);
    }

    #[test]
    fn force_always_stale() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time());
        assert_eq!(check(&out, source_time(), true).unwrap(), Freshness::Stale);
    }

    #[test]
    fn directory_in_place_of_output_is_stale() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("page.html");
        fs::create_dir(&dir).unwrap();
        assert_eq!(check(&dir, source_time(), false).unwrap(), Freshness::Stale);
    }

    #[test]
    fn stamp_sets_mtime() {
        let tmp = TempDir::new().unwrap();
        let out = output_at(&tmp, source_time());
        let mtime = fs::metadata(&out).unwrap().modified().unwrap();
        assert_eq!(mtime, source_time());
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_clean() {
        let s = CacheStats {
            unchanged: 5,
            rendered: 2,
            aliases: 1,
            ..Default::default()
        };
        assert_eq!(format!("{}", s), "5 unchanged, 2 rendered, 1 aliases (8 total)");
    }

    #[test]
    fn cache_stats_display_with_problems() {
        let s = CacheStats {
            unchanged: 1,
            rendered: 1,
            aliases: 0,
            skipped: 2,
            failed: 1,
        };
        assert_eq!(
            format!("{}", s),
            "1 unchanged, 1 rendered, 0 aliases, 2 skipped, 1 failed (5 total)"
        );
    }

    #[test]
    fn cache_stats_absorb() {
        let mut a = CacheStats {
            rendered: 1,
            ..Default::default()
        };
        a.absorb(&CacheStats {
            rendered: 2,
            failed: 1,
            ..Default::default()
        });
        assert_eq!(a.rendered, 3);
        assert_eq!(a.failed, 1);
    }
}
