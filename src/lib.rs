//! # FXQ - Query Model for Full-Text Search
//!
//! FXQ is the front end of a search engine: it turns untagged JSON query
//! trees into typed queries, rewrites query-string leaves into structured
//! subtrees, and compiles the result into search plans for an executor.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`query`] - Query variants, shape-inferring decoder, expander and the
//!   query-string grammar
//! - [`search`] - Compilation of query trees into [`search::SearchPlan`]s
//! - [`presearch`] - Pre-search payloads such as KNN candidates
//! - [`mapping`] / [`analysis`] / [`index`] - Collaborators consulted while
//!   compiling (field types, analyzers, term dictionaries)
//! - [`error`] - Error types
//!
//! ## Quick Start
//!
//! ```
//! use fxq::index::MemoryIndex;
//! use fxq::mapping::StaticMapping;
//! use fxq::query::{decode_query, expand_query};
//! use fxq::search::{SearchContext, Searchable, SearcherOptions};
//!
//! let query = decode_query(r#"{"conjuncts": [{"query": "+rust -java"}, {"prefix": "asy"}]}"#)?;
//! let query = expand_query(query)?;
//! query.validate()?;
//!
//! let index = MemoryIndex::new().with_terms("_all", ["async", "rust"]);
//! let plan = query.compile(
//!     &SearchContext::new(),
//!     &index,
//!     &StaticMapping::new(),
//!     &SearcherOptions::default(),
//! )?;
//! assert!(plan.size() > 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`] facade. The library never installs a
//! logger, so nothing is printed unless the application sets one up.

pub mod analysis;
pub mod error;
pub mod index;
pub mod mapping;
pub mod presearch;
pub mod query;
pub mod search;

pub use error::{
    CompileError, DecodeError, DumpError, ExpandError, GrammarParseError, PreSearchDecodeError,
    ValidationError,
};
pub use presearch::{PreSearchData, decode_pre_search};
pub use query::{Query, QueryKind, decode_query, dump_query, expand_query};
