//! Cache-aside storage for the serialized roster.
//!
//! ## Backends
//!
//! - **Local (DashMap)**: in-process, used when Redis is disabled
//! - **Redis**: shared across instances, plain `GET`/`SET` without expiry
//!
//! ## Graceful Degradation
//!
//! The cache is an optimization layer. Every failure surfaces as a
//! [`CacheError`] which the roster service logs and then ignores: a failed
//! lookup falls through to a source load and a failed write is skipped.

pub mod backend;

pub use backend::{CacheBackend, CacheError, CacheStore};
