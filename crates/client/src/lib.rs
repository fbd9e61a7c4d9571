//! Client side of precache.
//!
//! This crate provides the network layer, request coalescing, the
//! fetch-and-store executor and the synchronizer that drives a pass.

pub mod coalesce;
pub mod executor;
pub mod fetch;
pub mod sync;

pub use coalesce::RequestCoalescer;
pub use executor::{Committed, FetchAndStore};
pub use fetch::{FetchConfig, HttpNetwork, Network, NetworkResponse, Scope, UrlError};
pub use sync::{PrecacheOptions, Precacher, SyncFailure, SyncPhase, SyncResult};
