//! MCP tool implementations.
//!
//! This module contains all tools exposed by the precache server.

pub mod lookup;
pub mod retire;
pub mod status;
pub mod sync;

pub use lookup::{LookupParams, lookup_impl};
pub use retire::{RetireParams, retire_impl};
pub use status::{StatusParams, status_impl};
pub use sync::{SyncParams, sync_impl};
