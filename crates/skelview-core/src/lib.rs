//! skelview core
//!
//! Shared utilities for the skelview crates: hashed collections, a
//! generational sparse set, logging setup and profiling scopes.

pub mod alloc;
pub mod logging;
pub mod profiling;
