//! Integration metadata persistence

pub mod document_links;
pub mod kv;

pub use document_links::DocumentLinkStore;
pub use kv::{KeyValueStore, MemoryKeyValueStore};
