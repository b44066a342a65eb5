//! Filesystem location helpers: where to read the key list from and where
//! result files may be written without clobbering earlier runs.

use std::path::{Path, PathBuf};

/// Directory the tool treats as "the user's desktop".
///
/// Resolution order:
/// 1. `~/Desktop` when it exists.
/// 2. The process working directory.
/// 3. `.` as a last resort (cwd unavailable, e.g. deleted underneath us).
///
/// Always returns a usable directory; this never errors.
pub fn desktop_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        let desktop = home.join("Desktop");
        if desktop.is_dir() {
            return desktop;
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// First non-existing output path for `stem.ext` inside `dir`.
///
/// The canonical name (`stem.ext`) wins when free; otherwise the lowest
/// unused `stem_N.ext` with `N` counting up from 1. Existing files are
/// never touched, so a prior run's results can't be overwritten.
pub fn unique_output_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let canonical = dir.join(format!("{stem}.{ext}"));
    if !canonical.exists() {
        return canonical;
    }
    let mut counter = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn canonical_name_when_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = unique_output_path(dir.path(), "sent_controlled", "csv");
        assert_eq!(out, dir.path().join("sent_controlled.csv"));
    }

    #[test]
    fn picks_lowest_unused_suffix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sent_controlled.csv"), "old").unwrap();
        let out = unique_output_path(dir.path(), "sent_controlled", "csv");
        assert_eq!(out, dir.path().join("sent_controlled_1.csv"));

        fs::write(&out, "old too").unwrap();
        let out2 = unique_output_path(dir.path(), "sent_controlled", "csv");
        assert_eq!(out2, dir.path().join("sent_controlled_2.csv"));

        // The pre-existing files are untouched.
        assert_eq!(
            fs::read_to_string(dir.path().join("sent_controlled.csv")).unwrap(),
            "old"
        );
    }

    #[test]
    fn suffix_gap_does_not_matter_when_canonical_is_free() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sent_controlled_1.csv"), "stray").unwrap();
        let out = unique_output_path(dir.path(), "sent_controlled", "csv");
        assert_eq!(out, dir.path().join("sent_controlled.csv"));
    }

    #[test]
    fn desktop_dir_always_exists() {
        assert!(desktop_dir().is_dir() || desktop_dir() == PathBuf::from("."));
    }
}
