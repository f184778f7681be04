//! Repository-side descriptors consumed by query resolution.
//!
//! # Responsibility
//! - Describe repositories and their data-access methods as plain metadata.
//! - Hold statically declared (named) queries per repository method.
//!
//! # Invariants
//! - Descriptors are immutable after wiring; resolution never mutates them.
//! - A method is "dynamic" exactly when its descriptor carries a dynamic
//!   query source.

pub mod metadata;
pub mod named;
