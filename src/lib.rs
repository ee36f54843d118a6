//! Client-side data synchronization for the livestock procurement backend.
//!
//! The layer is built bottom-up:
//! - [`debounce`] settles rapidly changing input (search boxes) after a quiet period
//! - [`query`] is a keyed query cache with request dedup, staleness, invalidation
//!   and mutations, inspired by TanStack Query
//! - [`resource`] binds REST entities (items, payment types, suppliers) to the cache
//!
//! [`api`] carries the HTTP transport, [`persist`] the optional on-disk snapshot
//! used to serve stale data when the backend is unreachable.

pub mod api;
pub mod config;
pub mod debounce;
pub mod logging;
pub mod persist;
pub mod query;
pub mod resource;
