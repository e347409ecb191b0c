//! core::listing
//!
//! Directory listings derived from a recursive tree.
//!
//! The hosting API has no "list one directory" call that works across
//! arbitrary depths, so listings are computed from a flattened recursive
//! tree: blobs are filtered by their parent directory and re-rooted to a
//! bare file name.
//!
//! # Example
//!
//! ```
//! use hubcommit::core::listing::is_root_path;
//!
//! assert!(is_root_path("/"));
//! assert!(is_root_path("./"));
//! assert!(!is_root_path("docs"));
//! ```

use super::types::Tree;

/// Spellings that denote the repository root.
const ROOT_PATHS: [&str; 3] = ["/", ".", "./"];

/// Check whether `path` denotes the repository root.
pub fn is_root_path(path: &str) -> bool {
    ROOT_PATHS.contains(&path)
}

/// Strip leading separators (and a trailing one) from a directory path.
pub fn normalize_dir(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    path.strip_suffix('/').unwrap_or(path)
}

/// List the names of files directly inside `path`.
///
/// For the root, returns top-level blobs. Otherwise returns the base name
/// of every blob whose parent directory is exactly `path`; files in deeper
/// subdirectories are excluded. Matching is case-sensitive. Tree order is
/// preserved and no match yields an empty list.
pub fn file_names_under(tree: &Tree, path: &str) -> Vec<String> {
    let blobs = tree.entries.iter().filter(|entry| entry.is_blob());

    if is_root_path(path) {
        return blobs
            .filter(|entry| !entry.path.contains('/'))
            .map(|entry| entry.path.clone())
            .collect();
    }

    let dir = normalize_dir(path);
    blobs
        .filter_map(|entry| {
            let (parent, name) = entry.path.rsplit_once('/')?;
            (parent == dir).then(|| name.to_string())
        })
        .collect()
}
