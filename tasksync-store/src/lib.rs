//! `tasksync-store` library.
//!
//! An in-memory Task Store speaking the tasksync HTTP API. Used for local
//! development and embedded by the client's integration tests.

pub mod config;
pub mod server;
pub mod store;
