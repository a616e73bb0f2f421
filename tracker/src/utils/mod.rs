//! Shared utilities.
//!
//! - [`debounce`]: Per-key coalescing of rapid change notifications

pub mod debounce;

pub use debounce::{Debouncer, DebouncerError, DEFAULT_DEBOUNCE_MS};
