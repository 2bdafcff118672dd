//! Ordered list of documents selected for merging
//!
//! The list is the single source of truth for which files get merged and in
//! what order. It holds no presentation state: a front end renders it after
//! every mutation and refers to rows by [`EntryId`] rather than by a captured
//! position.

use std::path::{Path, PathBuf};
use crate::error::{Error, Result};

/// Stable identity of a list entry, assigned when the entry is added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

/// A selected file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    id: EntryId,
    path: PathBuf,
    name: String,
}

impl DocumentEntry {
    fn new(id: EntryId, path: PathBuf) -> Self {
        let name = display_name(&path);
        Self { id, path, name }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the path, for display
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Base name of a path, falling back to the whole path when it has none
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Files to merge, in merge order
///
/// Duplicates are allowed and the list never reorders itself.
#[derive(Debug, Default, Clone)]
pub struct OrderedDocumentList {
    entries: Vec<DocumentEntry>,
    next_id: u64,
}

impl OrderedDocumentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append paths to the end of the list, keeping their order
    ///
    /// Nothing is checked here; missing or invalid files are reported when
    /// the merge runs. Returns the number of entries added.
    pub fn add<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let before = self.entries.len();
        for path in paths {
            let id = EntryId(self.next_id);
            self.next_id += 1;
            self.entries.push(DocumentEntry::new(id, path.into()));
        }
        self.entries.len() - before
    }

    /// Remove the entry at `index`, shifting later entries down
    pub fn remove(&mut self, index: usize) -> Result<DocumentEntry> {
        self.check_index(index)?;
        Ok(self.entries.remove(index))
    }

    /// Swap the entry at `index` with the one above it
    ///
    /// Moving the first entry up does nothing. Returns whether the list changed.
    pub fn move_up(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        if index == 0 {
            return Ok(false);
        }
        self.entries.swap(index - 1, index);
        Ok(true)
    }

    /// Swap the entry at `index` with the one below it
    ///
    /// Moving the last entry down does nothing. Returns whether the list changed.
    pub fn move_down(&mut self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        if index + 1 == self.entries.len() {
            return Ok(false);
        }
        self.entries.swap(index, index + 1);
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copy of the current paths, in order
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }

    /// Current index of the entry with the given id
    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    pub fn get(&self, index: usize) -> Option<&DocumentEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether there are enough files to merge
    pub fn can_merge(&self) -> bool {
        self.entries.len() >= 2
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(Error::Selection {
                index: Some(index),
                len: self.entries.len(),
            })
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Add(Vec<u8>),
        Remove(usize),
        MoveUp(usize),
        MoveDown(usize),
        Clear,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => prop::collection::vec(0u8..6, 0..4).prop_map(Op::Add),
            2 => (0usize..8).prop_map(Op::Remove),
            3 => (0usize..8).prop_map(Op::MoveUp),
            3 => (0usize..8).prop_map(Op::MoveDown),
            1 => Just(Op::Clear),
        ]
    }

    fn name(n: u8) -> PathBuf {
        PathBuf::from(format!("{n}.pdf"))
    }

    proptest! {
        #[test]
        fn prop_matches_vec_model(ops in prop::collection::vec(arb_op(), 0..40)) {
            let mut list = OrderedDocumentList::new();
            let mut model: Vec<PathBuf> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(names) => {
                        let added: Vec<PathBuf> = names.into_iter().map(name).collect();
                        model.extend(added.iter().cloned());
                        list.add(added);
                    }
                    Op::Remove(i) => {
                        let result = list.remove(i);
                        if i < model.len() {
                            let removed = result.unwrap();
                            let expected = model.remove(i);
                            prop_assert_eq!(removed.path(), expected.as_path());
                        } else {
                            prop_assert!(result.is_err());
                        }
                    }
                    Op::MoveUp(i) => {
                        let result = list.move_up(i);
                        if i < model.len() {
                            prop_assert_eq!(result.unwrap(), i > 0);
                            if i > 0 {
                                model.swap(i - 1, i);
                            }
                        } else {
                            prop_assert!(result.is_err());
                        }
                    }
                    Op::MoveDown(i) => {
                        let result = list.move_down(i);
                        if i < model.len() {
                            prop_assert_eq!(result.unwrap(), i + 1 < model.len());
                            if i + 1 < model.len() {
                                model.swap(i, i + 1);
                            }
                        } else {
                            prop_assert!(result.is_err());
                        }
                    }
                    Op::Clear => {
                        list.clear();
                        model.clear();
                    }
                }
                prop_assert_eq!(list.snapshot(), model.clone());
                prop_assert_eq!(list.len(), model.len());
            }
        }
    }
}
