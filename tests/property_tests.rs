//! Property-based tests for tree building, listings, and core types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use hubcommit::core::listing::{file_names_under, is_root_path};
use hubcommit::core::types::{
    BranchName, EntryKind, EntryMode, EntrySource, FileChange, FileContent, RefName, Sha, Tree,
    TreeEntry,
};
use hubcommit::forge::tree::{build_tree_request, dedupe_changes, PreparedChange};

/// Strategy for short slash-separated paths over a tiny alphabet, so that
/// generated change sets collide with base paths often.
fn repo_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-c]{1,2}", 1..4).prop_map(|parts| parts.join("/"))
}

fn object_id(seed: usize) -> Sha {
    Sha::new(format!("{:040x}", seed + 1)).unwrap()
}

/// Strategy for a recursive tree listing: blobs plus a `Tree` entry for
/// every directory prefix.
fn recursive_tree() -> impl Strategy<Value = Tree> {
    prop::collection::btree_set(repo_path(), 0..12).prop_map(|files| {
        let mut dirs = BTreeSet::new();
        for path in &files {
            for (index, _) in path.match_indices('/') {
                dirs.insert(path[..index].to_string());
            }
        }

        let mut entries: Vec<TreeEntry> = dirs
            .into_iter()
            .enumerate()
            .map(|(i, path)| TreeEntry {
                path,
                mode: EntryMode::Subtree,
                kind: EntryKind::Tree,
                sha: object_id(1000 + i),
                size: None,
            })
            .collect();
        entries.extend(files.into_iter().enumerate().map(|(i, path)| TreeEntry {
            path,
            mode: EntryMode::File,
            kind: EntryKind::Blob,
            sha: object_id(i),
            size: Some(1),
        }));
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        Tree {
            sha: object_id(9999),
            entries,
            truncated: false,
        }
    })
}

/// Strategy for a change: `None` content is a deletion.
fn change() -> impl Strategy<Value = FileChange> {
    (repo_path(), prop::option::of("[a-z]{0,3}")).prop_map(|(path, content)| match content {
        Some(text) => FileChange::write(path, text),
        None => FileChange::delete(path),
    })
}

fn prepare(changes: &[FileChange]) -> Vec<PreparedChange> {
    changes
        .iter()
        .map(|change| PreparedChange {
            path: change.path.clone(),
            source: match &change.content {
                FileContent::Present(bytes) => Some(EntrySource::Content(
                    String::from_utf8(bytes.clone()).unwrap(),
                )),
                FileContent::Deleted => None,
            },
        })
        .collect()
}

proptest! {
    #[test]
    fn reconstructed_tree_drops_deletions_and_subtrees(
        base in recursive_tree(),
        mut changes in prop::collection::vec(change(), 0..8),
        forced in repo_path(),
    ) {
        changes.push(FileChange::delete(forced));
        let changes = dedupe_changes(&changes);
        let request = build_tree_request(&base, &prepare(&changes)).unwrap();

        prop_assert!(request.base_tree.is_none());
        prop_assert!(request.tree.iter().all(|e| e.kind != EntryKind::Tree));

        let final_content: HashMap<&str, &FileContent> =
            changes.iter().map(|c| (c.path.as_str(), &c.content)).collect();
        let submitted: HashMap<&str, &EntrySource> =
            request.tree.iter().map(|e| (e.path.as_str(), &e.source)).collect();
        prop_assert_eq!(submitted.len(), request.tree.len(), "paths are unique");

        for (path, content) in &final_content {
            match content {
                FileContent::Deleted => prop_assert!(!submitted.contains_key(path)),
                FileContent::Present(_) => prop_assert!(submitted.contains_key(path)),
            }
        }
        for entry in base.entries.iter().filter(|e| e.is_blob()) {
            if !final_content.contains_key(entry.path.as_str()) {
                prop_assert_eq!(
                    submitted.get(entry.path.as_str()),
                    Some(&&EntrySource::Sha(entry.sha.clone()))
                );
            }
        }
    }

    #[test]
    fn incremental_tree_lists_only_changes(
        base in recursive_tree(),
        writes in prop::collection::vec((repo_path(), "[a-z]{0,3}"), 0..8),
    ) {
        let changes: Vec<FileChange> = writes
            .into_iter()
            .map(|(path, text)| FileChange::write(path, text))
            .collect();
        let changes = dedupe_changes(&changes);
        let request = build_tree_request(&base, &prepare(&changes)).unwrap();

        prop_assert_eq!(request.base_tree, Some(base.sha.clone()));
        prop_assert_eq!(request.tree.len(), changes.len());
        for (entry, change) in request.tree.iter().zip(&changes) {
            prop_assert_eq!(&entry.path, &change.path);
            prop_assert_eq!(entry.kind, EntryKind::Blob);
        }
    }

    #[test]
    fn dedupe_keeps_first_position_and_last_content(
        changes in prop::collection::vec(change(), 0..12),
    ) {
        let deduped = dedupe_changes(&changes);

        let unique: BTreeSet<&str> = deduped.iter().map(|c| c.path.as_str()).collect();
        prop_assert_eq!(unique.len(), deduped.len());

        let mut first_seen = Vec::new();
        for change in &changes {
            if !first_seen.contains(&change.path) {
                first_seen.push(change.path.clone());
            }
        }
        let order: Vec<String> = deduped.iter().map(|c| c.path.clone()).collect();
        prop_assert_eq!(order, first_seen);

        for change in &deduped {
            let last = changes.iter().rev().find(|c| c.path == change.path).unwrap();
            prop_assert_eq!(&change.content, &last.content);
        }
    }

    #[test]
    fn listings_return_bare_names_of_direct_children(
        tree in recursive_tree(),
        dir in prop_oneof![Just("/".to_string()), Just(".".to_string()), repo_path()],
    ) {
        let names = file_names_under(&tree, &dir);

        for name in &names {
            prop_assert!(!name.contains('/'));
            let full = if is_root_path(&dir) {
                name.clone()
            } else {
                format!("{}/{}", dir, name)
            };
            prop_assert!(tree.entries.iter().any(|e| e.is_blob() && e.path == full));
        }

        let leading = file_names_under(&tree, &format!("/{}", dir.trim_start_matches('/')));
        if !is_root_path(&dir) {
            prop_assert_eq!(leading, names);
        }
    }

    #[test]
    fn branch_refs_round_trip(name in "[a-z][a-z0-9_-]{0,10}(/[a-z][a-z0-9_-]{0,10}){0,2}") {
        let branch = BranchName::new(name.clone()).unwrap();
        let reference = RefName::for_branch(&branch);
        prop_assert_eq!(reference.as_str(), format!("refs/heads/{}", name));
        prop_assert_eq!(reference.branch(), Some(name.as_str()));
    }
}
