//! Shared utilities for the Workbridge integration crates.
//!
//! Deliberately small: the clock abstraction and the shared cache seam that
//! `workbridge-graph` builds on. Anything backend-specific (Redis, the host
//! framework's store) lives behind the [`cache::SharedCache`] trait in the
//! deployment, not here.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod time;

// Re-export commonly used types and traits for convenience
pub use cache::{MemoryCache, SharedCache};
pub use time::{Clock, MockClock, SystemClock};
