//! Read-only view of an index, as needed to expand queries.

mod memory;

pub use memory::MemoryIndex;

/// A read-only snapshot of an index.
///
/// Compilation only needs the term dictionary; postings stay with the
/// searcher that executes the plan.
pub trait IndexReader: Send + Sync {
    fn doc_count(&self) -> u64;

    /// Terms of `field` in ascending order. Unknown fields have no terms.
    fn terms<'a>(&'a self, field: &str) -> Box<dyn Iterator<Item = &'a str> + 'a>;
}
