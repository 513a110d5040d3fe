//! Credential lifecycle for the client-credentials grant
//!
//! One [`TokenManager`] per (tenant, client) pair; state lives in the shared
//! cache so every host process sees the same token.

pub mod token_manager;

pub use token_manager::TokenManager;
