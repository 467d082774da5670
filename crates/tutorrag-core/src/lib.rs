#![deny(unused_variables)]
#![deny(unused_imports)]

//! tutorrag-core
//!
//! Domain types, model capability traits, errors, configuration and the
//! document chunker shared by every other crate in the workspace.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ModelStage, Result};
pub use types::{Document, RetrievalResult, SearchHit, SourceKind};
