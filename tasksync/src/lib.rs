//! `tasksync`: optimistic-edit and reconciliation client for a shared
//! task and chat store.

pub mod app;
pub mod config;
pub mod debounce;
pub mod edit;
pub mod engine;
pub mod gateway;
pub mod identity;
pub mod pending;
pub mod prefs;
pub mod sync;
pub mod ui;
pub mod view;
