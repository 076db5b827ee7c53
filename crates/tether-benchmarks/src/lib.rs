//! Tether benchmarking suite
//!
//! Benchmarks for solving against generated fixture universes and for
//! reading and writing the persisted manifest and lock.

pub mod common;

pub use common::*;
