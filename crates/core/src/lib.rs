//! Core library: document loading, topic classification, archiving and the
//! text/image vector index behind the `shelf` commands.

pub mod archiver;
pub mod chunker;
pub mod classifier;
pub mod config;
pub mod crossmodal;
pub mod error;
pub mod extractor;
pub mod index;
pub mod library;
pub mod models;
pub mod pipeline;
pub mod scanner;
pub mod search;
pub mod vectorstore;

pub use error::{Error, Result};
pub use library::Library;
