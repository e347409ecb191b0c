//! forge::tree
//!
//! Building tree submissions from a base tree and a set of file changes.
//!
//! # Modes
//!
//! - **Incremental**: no change deletes a path. The request names the base
//!   tree and lists only the changed entries; the API composes the rest.
//! - **Reconstructed**: at least one deletion. The base must be a recursive
//!   listing. Every base blob whose path is not being changed is copied by
//!   sha, subtree entries are dropped (the API rebuilds directories from full
//!   paths), and present changes are appended. Deleted paths contribute
//!   nothing.
//!
//! Written changes are always submitted as regular files (`100644`), also
//! when they replace an executable or a symlink. Untouched entries copied in
//! reconstructed mode keep their mode.
//!
//! Path comparison is exact and case-sensitive.

use std::collections::{HashMap, HashSet};

use super::traits::GatewayError;
use crate::core::types::{
    EntryKind, EntryMode, EntrySource, FileChange, NewTreeEntry, Tree, TreeEntry, TreeRequest,
};

/// A change whose content has been resolved to a tree entry source.
///
/// `source` is `None` for a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedChange {
    pub path: String,
    pub source: Option<EntrySource>,
}

impl PreparedChange {
    pub fn is_deletion(&self) -> bool {
        self.source.is_none()
    }
}

/// Collapse repeated paths: the last occurrence's content wins and keeps the
/// position of the first occurrence.
pub fn dedupe_changes(changes: &[FileChange]) -> Vec<FileChange> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(changes.len());
    let mut result: Vec<FileChange> = Vec::with_capacity(changes.len());

    for change in changes {
        match index.get(change.path.as_str()) {
            Some(&at) => result[at].content = change.content.clone(),
            None => {
                index.insert(change.path.as_str(), result.len());
                result.push(change.clone());
            }
        }
    }
    result
}

/// Whether any change removes a path, which forces a reconstructed tree.
pub fn has_deletions(changes: &[FileChange]) -> bool {
    changes.iter().any(FileChange::is_deletion)
}

/// Build the tree submission for `changes` over `base`.
///
/// # Errors
///
/// - `TruncatedTree` if reconstruction is needed and `base` is a truncated listing
pub fn build_tree_request(
    base: &Tree,
    changes: &[PreparedChange],
) -> Result<TreeRequest, GatewayError> {
    let additions = changes.iter().filter_map(|change| {
        let source = change.source.clone()?;
        Some(NewTreeEntry {
            path: change.path.clone(),
            mode: EntryMode::File,
            kind: EntryKind::Blob,
            source,
        })
    });

    if !changes.iter().any(PreparedChange::is_deletion) {
        return Ok(TreeRequest {
            base_tree: Some(base.sha.clone()),
            tree: additions.collect(),
        });
    }

    if base.truncated {
        return Err(GatewayError::TruncatedTree(base.sha.clone()));
    }

    let changed: HashSet<&str> = changes.iter().map(|change| change.path.as_str()).collect();
    let mut tree: Vec<NewTreeEntry> = base
        .entries
        .iter()
        .filter(|entry| entry.kind != EntryKind::Tree && !changed.contains(entry.path.as_str()))
        .map(copy_entry)
        .collect();
    tree.extend(additions);

    Ok(TreeRequest {
        base_tree: None,
        tree,
    })
}

fn copy_entry(entry: &TreeEntry) -> NewTreeEntry {
    NewTreeEntry {
        path: entry.path.clone(),
        mode: entry.mode,
        kind: entry.kind,
        source: EntrySource::Sha(entry.sha.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Sha;

    fn sha(c: char) -> Sha {
        Sha::new(c.to_string().repeat(40)).unwrap()
    }

    fn entry(path: &str, mode: EntryMode, sha_char: char) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            mode,
            kind: mode.kind(),
            sha: sha(sha_char),
            size: None,
        }
    }

    fn write(path: &str, content: &str) -> PreparedChange {
        PreparedChange {
            path: path.to_string(),
            source: Some(EntrySource::Content(content.to_string())),
        }
    }

    fn delete(path: &str) -> PreparedChange {
        PreparedChange {
            path: path.to_string(),
            source: None,
        }
    }

    fn base() -> Tree {
        Tree {
            sha: sha('0'),
            entries: vec![
                entry("a", EntryMode::File, 'a'),
                entry("b", EntryMode::File, 'b'),
                entry("c", EntryMode::File, 'c'),
                entry("dir", EntryMode::Subtree, 'd'),
                entry("dir/x.sh", EntryMode::Executable, 'e'),
            ],
            truncated: false,
        }
    }

    fn paths(request: &TreeRequest) -> Vec<&str> {
        request.tree.iter().map(|e| e.path.as_str()).collect()
    }

    mod incremental {
        use super::*;

        #[test]
        fn references_base_and_lists_only_changes() {
            let request = build_tree_request(&base(), &[write("new.txt", "hi")]).unwrap();
            assert_eq!(request.base_tree, Some(sha('0')));
            assert_eq!(paths(&request), vec!["new.txt"]);
            assert_eq!(
                request.tree[0].source,
                EntrySource::Content("hi".to_string())
            );
        }

        #[test]
        fn empty_content_is_a_zero_byte_file() {
            let request = build_tree_request(&base(), &[write("empty", "")]).unwrap();
            assert_eq!(request.tree[0].source, EntrySource::Content(String::new()));
        }

        #[test]
        fn no_changes_yields_empty_delta() {
            let request = build_tree_request(&base(), &[]).unwrap();
            assert_eq!(request.base_tree, Some(sha('0')));
            assert!(request.tree.is_empty());
        }

        #[test]
        fn rewritten_executable_becomes_a_regular_file() {
            let request = build_tree_request(&base(), &[write("dir/x.sh", "#!/bin/sh")]).unwrap();
            assert_eq!(request.tree[0].mode, EntryMode::File);
        }

        #[test]
        fn truncated_base_is_fine_without_deletions() {
            let mut tree = base();
            tree.truncated = true;
            assert!(build_tree_request(&tree, &[write("a", "X")]).is_ok());
        }
    }

    mod reconstructed {
        use super::*;

        #[test]
        fn deletes_and_modifies() {
            let request =
                build_tree_request(&base(), &[delete("b"), write("a", "X")]).unwrap();

            assert_eq!(request.base_tree, None);
            assert_eq!(paths(&request), vec!["c", "dir/x.sh", "a"]);
            assert_eq!(request.tree[0].source, EntrySource::Sha(sha('c')));
            assert_eq!(request.tree[2].source, EntrySource::Content("X".into()));
        }

        #[test]
        fn never_copies_subtrees() {
            let request = build_tree_request(&base(), &[delete("a")]).unwrap();
            assert!(request.tree.iter().all(|e| e.kind != EntryKind::Tree));
        }

        #[test]
        fn deleting_a_missing_path_is_harmless() {
            let request = build_tree_request(&base(), &[delete("nope")]).unwrap();
            assert_eq!(paths(&request), vec!["a", "b", "c", "dir/x.sh"]);
        }

        #[test]
        fn truncated_base_is_refused() {
            let mut tree = base();
            tree.truncated = true;
            let err = build_tree_request(&tree, &[delete("a")]).unwrap_err();
            assert!(matches!(err, GatewayError::TruncatedTree(_)));
        }

        #[test]
        fn copied_entries_keep_their_mode_and_rewrites_do_not() {
            let request = build_tree_request(&base(), &[delete("a")]).unwrap();
            let copied = request.tree.iter().find(|e| e.path == "dir/x.sh").unwrap();
            assert_eq!(copied.mode, EntryMode::Executable);

            let request =
                build_tree_request(&base(), &[delete("a"), write("dir/x.sh", "#!/bin/sh")])
                    .unwrap();
            let rewritten = request.tree.iter().find(|e| e.path == "dir/x.sh").unwrap();
            assert_eq!(rewritten.mode, EntryMode::File);
        }

        #[test]
        fn path_matching_is_case_sensitive() {
            let request = build_tree_request(&base(), &[delete("A")]).unwrap();
            assert!(paths(&request).contains(&"a"));
        }
    }

    mod dedupe {
        use super::*;
        use crate::core::types::FileContent;

        #[test]
        fn last_occurrence_wins_at_first_position() {
            let changes = vec![
                FileChange::write("a", "1"),
                FileChange::write("b", "2"),
                FileChange::delete("a"),
            ];
            let deduped = dedupe_changes(&changes);
            assert_eq!(deduped.len(), 2);
            assert_eq!(deduped[0].path, "a");
            assert_eq!(deduped[0].content, FileContent::Deleted);
            assert_eq!(deduped[1].path, "b");
        }

        #[test]
        fn has_deletions_detects_marker() {
            assert!(!has_deletions(&[FileChange::write("a", "")]));
            assert!(has_deletions(&[FileChange::write("a", ""), FileChange::delete("b")]));
        }
    }
}
