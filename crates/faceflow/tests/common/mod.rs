//! Shared test utilities for faceflow integration tests.
//!
//! This module provides:
//! - `TestHarness` for an isolated broker, record store and object store
//! - Builder patterns for descriptors and submissions
//! - Deterministic stand-ins for the ML collaborators

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{MarkingSwapper, OneFaceAnalyzer, TestHarness, SWAP_MARKER};
