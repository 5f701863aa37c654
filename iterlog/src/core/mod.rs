//! Deterministic, pure logic for iteration logs.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests; the clock is
//! injected wherever time matters.

pub mod filename;
pub mod filter;
pub mod metadata;
pub mod retention;
pub mod types;
