//! Discrete-event digital logic simulation kernel.
//!
//! This crate implements an event-driven logic simulator with the following:
//! 1. **Core:** Monotonic simulated clock and the deterministic event scheduler.
//! 2. **Elements:** Logic gates, interconnects, and hierarchical compound components.
//! 3. **Circuit:** The owned component tree, connection management, and event delivery.
//! 4. **Library:** The component type registry keyed by GUID, with factory-based instantiation.
//! 5. **Controller:** The JSON command/reply protocol, pacing, and tree serialization.

/// Circuit: the component tree and event delivery.
pub mod circuit;
/// Common types (ids, simulated time, errors).
pub mod common;
/// Kernel configuration (rate, scheduling interval, channel capacity).
pub mod config;
/// Controller (protocol, dispatch, serialization).
pub mod controller;
/// Event scheduler (clock, queue, processing windows).
pub mod core;
/// Element model (trait, gates, interconnects, banks, compounds).
pub mod element;
/// Simulation events and queue ordering.
pub mod event;
/// Component type registry and built-in types.
pub mod library;
/// Kernel runtime statistics.
pub mod stats;

/// The owned component tree; elements live here, events are delivered through it.
pub use crate::circuit::Circuit;
/// Recoverable kernel failure; reported to the client as an `error` reply.
pub use crate::common::KernelError;
/// Kernel configuration; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Protocol endpoint and sole tree mutator; construct with `Controller::new`.
pub use crate::controller::Controller;
/// Event scheduler; drives a [`Controller`] via `Core::run`.
pub use crate::core::Core;
/// Component type registry; `ComponentLibrary::with_builtins` seeds the standard set.
pub use crate::library::ComponentLibrary;
