//! PDF merging functionality using lopdf
//!
//! The merge is split into the calls a long-running caller needs: create a
//! merger, `append` each input in order, then `write` the result once. Inputs
//! are fully loaded on append so a bad file is reported before anything is
//! written.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tempfile::NamedTempFile;
use tracing::debug;
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in malformed files
const MAX_TREE_DEPTH: usize = 64;

/// One merge in progress
pub trait DocumentMerger {
    /// Add a document to the end of the output
    fn append(&mut self, path: &Path) -> Result<()>;

    /// Write everything appended so far to `destination`
    fn write(&mut self, destination: &Path) -> Result<()>;

    /// Release any resources held by the merger
    fn close(&mut self) {}
}

/// Source of mergers; shared with the worker thread
pub trait MergeBackend: Send + Sync {
    fn create_merger(&self) -> Box<dyn DocumentMerger>;
}

/// Merge backend backed by lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl MergeBackend for LopdfBackend {
    fn create_merger(&self) -> Box<dyn DocumentMerger> {
        Box::new(LopdfMerger::new())
    }
}

/// Accumulates loaded documents and writes them out as one PDF
///
/// Based on the lopdf merge example:
/// https://github.com/J-F-Liu/lopdf/blob/main/examples/merge.rs
#[derive(Debug, Default)]
pub struct LopdfMerger {
    documents: Vec<(PathBuf, Document)>,
}

impl LopdfMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents appended so far
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn assemble(&mut self) -> Result<Document> {
        if self.documents.is_empty() {
            return Err(Error::General("No input files provided".to_string()));
        }

        let mut max_id = 1;
        let mut page_ids: Vec<ObjectId> = Vec::new();
        let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

        for (path, mut doc) in self.documents.drain(..) {
            // Renumber objects in this document to avoid conflicts
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            let pages = doc.get_pages();
            debug!(path = %path.display(), pages = pages.len(), "collecting pages");
            page_ids.extend(pages.into_values());
            objects.extend(doc.objects);
        }

        let mut merged = Document::with_version("1.5");
        merged.objects.extend(objects);

        // new_object_id() must hand out ids above everything just inserted
        merged.max_id = max_id - 1;

        let pages_id = merged.new_object_id();
        let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(page_ids.len() as i64));
        pages.set("Kids", Object::Array(kids));

        let catalog_id = merged.new_object_id();
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));

        merged.objects.insert(catalog_id, Object::Dictionary(catalog));
        merged.objects.insert(pages_id, Object::Dictionary(pages));
        merged.trailer.set("Root", Object::Reference(catalog_id));

        for &page_id in &page_ids {
            if let Ok(Object::Dictionary(page)) = merged.get_object_mut(page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }

        merged.compress();
        Ok(merged)
    }
}

impl DocumentMerger for LopdfMerger {
    fn append(&mut self, path: &Path) -> Result<()> {
        let fail = |reason: String| Error::Append {
            path: path.to_path_buf(),
            reason,
        };

        if !path.exists() {
            return Err(fail("file not found".to_string()));
        }

        let mut doc = Document::load(path).map_err(|e| fail(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(fail("PDF is encrypted".to_string()));
        }
        if doc.get_pages().is_empty() {
            return Err(fail("PDF has no pages".to_string()));
        }

        // Pages are re-parented on write, so pull down what they inherit
        inherit_page_attributes(&mut doc);

        debug!(path = %path.display(), "appended");
        self.documents.push((path.to_path_buf(), doc));
        Ok(())
    }

    fn write(&mut self, destination: &Path) -> Result<()> {
        let fail = |reason: String| Error::Write {
            path: destination.to_path_buf(),
            reason,
        };

        let mut merged = self.assemble()?;

        // Save next to the destination and rename into place, so a failed
        // write never leaves a truncated output behind
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
        merged
            .save_to(&mut temp)
            .map_err(|e| fail(e.to_string()))?;
        temp.flush().map_err(|e| fail(e.to_string()))?;
        temp.persist(destination)
            .map_err(|e| fail(e.error.to_string()))?;

        Ok(())
    }

    fn close(&mut self) {
        self.documents.clear();
    }
}

/// Copy inheritable attributes from ancestor page tree nodes onto each page
fn inherit_page_attributes(doc: &mut Document) {
    for page_id in doc.get_pages().into_values() {
        let mut inherited: Vec<(Vec<u8>, Object)> = Vec::new();
        {
            let Ok(page) = doc.get_dictionary(page_id) else {
                continue;
            };
            let missing: Vec<&[u8]> = INHERITABLE
                .iter()
                .copied()
                .filter(|key| !page.has(key))
                .collect();
            if missing.is_empty() {
                continue;
            }

            let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
            let mut depth = 0;
            while let Some(parent_id) = parent {
                let Ok(node) = doc.get_dictionary(parent_id) else {
                    break;
                };
                for key in &missing {
                    let already = inherited.iter().any(|(k, _)| k.as_slice() == *key);
                    if !already {
                        if let Ok(value) = node.get(key) {
                            inherited.push((key.to_vec(), value.clone()));
                        }
                    }
                }
                depth += 1;
                if depth >= MAX_TREE_DEPTH {
                    break;
                }
                parent = node.get(b"Parent").and_then(Object::as_reference).ok();
            }
        }

        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}
