//! # Workbridge Graph
//!
//! Microsoft Graph integration for the Workbridge project tracker.
//!
//! This crate contains:
//! - Client-credentials token lifecycle over a process-shared cache
//! - An authenticated Graph HTTP client with a bounded 401 retry
//! - SharePoint share-link resolution into stable document identifiers
//! - Outlook calendar event creation and deletion
//! - Persistence of resolved document references behind a key-value seam
//!
//! ## Architecture
//! - Network failures never escape as errors: they are folded into the
//!   response envelope or absorbed into `Option`/`bool` results and logged
//! - The shared cache and the host's key-value store are injected traits;
//!   this crate carries no durable state of its own

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod http;
pub mod sharepoint;
pub mod storage;

// Re-export commonly used items
pub use auth::TokenManager;
pub use calendar::{
    Attendee, AttendeeType, CalendarEvent, CreateEventRequest, EventMoment, EventService,
};
pub use config::{EnvSettings, GraphSettings, SettingsProvider};
pub use error::{GraphError, Result};
pub use http::{GraphClient, GraphResponse, GraphStatus, TokenSource};
pub use sharepoint::{DocumentRef, FileKind, LinkConverter};
pub use storage::{DocumentLinkStore, KeyValueStore, MemoryKeyValueStore};
