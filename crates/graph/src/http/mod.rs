//! Authenticated HTTP access to the Graph API
//!
//! Every call goes through [`GraphClient`], which attaches bearer
//! credentials, folds transport failures into the response envelope, and
//! retries exactly once after a 401 when a token manager is attached.

pub mod client;

pub use client::{GraphClient, GraphResponse, GraphStatus, TokenSource};
