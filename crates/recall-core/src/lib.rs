//! # Recall Core
//!
//! Shared logic for Recall: data models, passage segmentation, the
//! embedding and vector-engine traits, the content store, the query
//! cache/optimizer, and the semantic search algorithm.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-specific dependencies. Concrete engines (SQLite), the memory
//! probe, and the service facade live in the `recall` app crate.

pub mod cache;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod models;
pub mod search;
pub mod segment;
pub mod store;
