//! tutorrag-hybrid
//!
//! Hybrid retrieval over a chunked corpus: BM25 (tantivy) and embedding
//! similarity (LanceDB or brute force) are fused with weight `alpha`, filtered,
//! optionally reranked by a cross-encoder and assembled into a cited context.
//!
//! ```no_run
//! use tutorrag_core::config::Config;
//! use tutorrag_hybrid::RagSystem;
//!
//! let settings = Config::load()?.settings()?;
//! let system = RagSystem::open(settings)?;
//! let ctx = system.retrieve("what is photosynthesis?", &system.default_options())?;
//! println!("{}\n{:?}", ctx.context, ctx.citations);
//! # Ok::<(), anyhow::Error>(())
//! ```
pub mod citation;
pub mod engine;
pub mod filter;
pub mod fusion;
pub mod persist;
pub mod rerank;
pub mod sparse;
pub mod stats;
pub mod system;

pub use citation::RetrievedContext;
pub use engine::{CorpusSnapshot, HybridRetriever, RetrieveOptions, RetrieverOptions};
pub use filter::RetrievalFilters;
pub use sparse::SparseIndex;
pub use stats::CorpusStatistics;
pub use system::RagSystem;
