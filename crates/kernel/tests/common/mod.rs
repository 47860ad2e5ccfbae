//! # Shared Test Infrastructure
//!
//! Utilities shared across the kernel test suite: the in-process harness
//! and the spawned-kernel protocol helpers.

/// The `TestContext` harness: circuit, core, and registry in one place.
pub mod harness;

/// Spawned-kernel helpers for protocol-level tests.
pub mod kernel;
