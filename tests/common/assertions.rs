//! Filesystem assertions for the PDF mirror

use std::path::Path;
use walkdir::WalkDir;

/// Sorted file names directly inside `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", dir.display()))
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Panic if any staging file is left anywhere below `root`
pub fn assert_no_staging_files(root: &Path) {
    let leftovers: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
        .map(|entry| entry.path().to_path_buf())
        .collect();
    assert!(leftovers.is_empty(), "staging files left behind: {leftovers:?}");
}

/// Panic unless `path` holds exactly `expected`
pub fn assert_file_contents(path: &Path, expected: &[u8]) {
    let actual =
        std::fs::read(path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    assert_eq!(actual, expected, "unexpected contents in {}", path.display());
}
