//! semdex — an embedded semantic index for long-form document libraries.
//!
//! The crate turns documents owned by a host application into searchable
//! chunk-level vector indexes stored in SQLite. A host plugs in by
//! implementing [`library::DocumentLibrary`]; everything else is provided:
//!
//! | Module | Responsibility |
//! |---|---|
//! | [`config`] | TOML configuration with validation |
//! | [`error`] | Error taxonomy shared across the core |
//! | [`models`] | Documents, indexes, chunks, statuses, results |
//! | [`vector`] | Packed f32 vector codec and cosine similarity |
//! | [`db`] / [`migrate`] | SQLite pool setup and schema |
//! | [`chunker`] | Fixed, paragraph, and argument-aware chunking |
//! | [`embedding`] | Providers, fallback chain, cache, truncation |
//! | [`store`] | Vector store with accelerated and linear search |
//! | [`repository`] | Index lifecycle and cross-index search |
//! | [`library`] | Host document access, plus a filesystem library |
//! | [`pipeline`] | Batch indexing with progress and cancellation |

pub mod chunker;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod library;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod status_cmd;
pub mod store;
pub mod vector;

pub use error::{Error, Result};
