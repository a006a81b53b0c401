//! Benchmark support crate for segmerge.
//!
//! Provides a seeded synthetic image generator and parameter types used by
//! the Criterion benchmarks for segmentator construction, the merge loop and
//! the edge heap.

pub mod error;
pub mod params;
pub mod source;
