//! Shared utilities for the wheelhouse resolution engine.
//!
//! This crate provides the cross-cutting concerns used by the other
//! wheelhouse crates: the unified error type and result alias.

pub mod errors;
