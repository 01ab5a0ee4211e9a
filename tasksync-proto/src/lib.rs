//! Shared wire types for the `tasksync` Task Store HTTP/JSON contract.

pub mod api;
pub mod message;
pub mod task;
pub mod timestamp;
