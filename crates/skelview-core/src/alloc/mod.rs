//! Collection types shared across skelview crates.
//!
//! - AHash-backed `HashMap`/`HashSet` re-exports
//! - [`sparse_set::SparseSet`] keyed by generational [`sparse_set::IndexSlot`]s

pub mod sparse_set;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
