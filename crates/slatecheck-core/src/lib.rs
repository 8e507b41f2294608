// Library root: re-exports all modules so the CLI and integration tests can
// reach the crate's public API.

pub mod classify;
pub mod config;
pub mod contest;
pub mod discover;
pub mod ingest;
pub mod model;
pub mod reconcile;
pub mod recompute;
pub mod report;
pub mod session;
pub mod sidecar;
pub mod slots;
pub mod store;
