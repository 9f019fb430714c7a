//! Append-only in-memory document index with substring search.
//!
//! Owned explicitly and shared through `Arc`; there is no process-global
//! instance. Concurrent readers see every document added before their read
//! lock was taken. Documents are never removed.

use std::fmt;
use std::sync::RwLock;

/// Maximum characters returned per search snippet.
pub const SNIPPET_CHARS: usize = 500;

/// Identifier assigned to an added document (`doc_0`, `doc_1`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One search result: the matching document's name and its snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub name: String,
    pub snippet: String,
}

#[derive(Debug)]
struct Document {
    name: String,
    text: String,
    /// Lower-cased `text`, kept for case-insensitive matching.
    folded: String,
}

/// Keyword-search index over ingested documents.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    documents: RwLock<Vec<Document>>,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document and return its id.
    pub fn add(&self, name: impl Into<String>, text: impl Into<String>) -> DocumentId {
        let text = text.into();
        let folded = text.to_lowercase();
        let mut docs = self
            .documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = DocumentId(format!("doc_{}", docs.len()));
        docs.push(Document {
            name: name.into(),
            text,
            folded,
        });
        id
    }

    /// Up to `k` snippets from documents containing `query`, case-insensitively,
    /// in insertion order. Each snippet is the first [`SNIPPET_CHARS`]
    /// characters of the matching document.
    pub fn search(&self, query: &str, k: usize) -> Vec<String> {
        self.search_hits(query, k)
            .into_iter()
            .map(|hit| hit.snippet)
            .collect()
    }

    /// Like [`search`](Self::search), keeping the name each snippet came from.
    pub fn search_hits(&self, query: &str, k: usize) -> Vec<SearchHit> {
        let needle = query.to_lowercase();
        let docs = self
            .documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        docs.iter()
            .filter(|d| d.folded.contains(&needle))
            .take(k)
            .map(|d| SearchHit {
                name: d.name.clone(),
                snippet: d.text.chars().take(SNIPPET_CHARS).collect(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ids_are_sequential() {
        let index = DocumentIndex::new();
        assert_eq!(index.add("a.pdf", "alpha").as_str(), "doc_0");
        assert_eq!(index.add("b.pdf", "beta").as_str(), "doc_1");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn hits_carry_document_names() {
        let index = DocumentIndex::new();
        index.add("spec.pdf", "Pour concrete footings");
        index.add("addendum.pdf", "Install steel");
        index.add("drawings.pdf", "concrete slab");
        let hits = index.search_hits("concrete", 5);
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    name: "spec.pdf".to_string(),
                    snippet: "Pour concrete footings".to_string(),
                },
                SearchHit {
                    name: "drawings.pdf".to_string(),
                    snippet: "concrete slab".to_string(),
                },
            ]
        );
    }

    #[test]
    fn search_is_case_insensitive_and_ordered() {
        let index = DocumentIndex::new();
        index.add("one", "Pour CONCRETE footings");
        index.add("two", "Install steel");
        index.add("three", "concrete slab on grade");
        let hits = index.search("Concrete", 5);
        assert_eq!(hits, vec!["Pour CONCRETE footings", "concrete slab on grade"]);
    }

    #[test]
    fn search_respects_k() {
        let index = DocumentIndex::new();
        for i in 0..4 {
            index.add(format!("d{i}"), format!("steel order {i}"));
        }
        assert_eq!(index.search("steel", 2).len(), 2);
        assert!(index.search("steel", 0).is_empty());
    }

    #[test]
    fn snippets_are_truncated_on_char_boundaries() {
        let index = DocumentIndex::new();
        let text = "é".repeat(SNIPPET_CHARS + 50);
        index.add("long", text);
        let hits = index.search("é", 1);
        assert_eq!(hits[0].chars().count(), SNIPPET_CHARS);
    }

    #[test]
    fn no_match_returns_empty() {
        let index = DocumentIndex::new();
        index.add("x", "framing");
        assert!(index.search("hvac", 5).is_empty());
        assert!(DocumentIndex::new().is_empty());
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let index = Arc::new(DocumentIndex::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    index.add(format!("doc{i}"), format!("shared keyword {i}"));
                    index.search("keyword", 100).len()
                })
            })
            .collect();
        for h in handles {
            let seen = h.join().unwrap();
            assert!((1..=8).contains(&seen));
        }
        assert_eq!(index.search("KEYWORD", 100).len(), 8);
    }
}
