//! The wheelhouse resolution engine: interprets an already-solved lock
//! file against a target environment, composes override layers into one
//! self-consistent package universe, and produces the installable set a
//! build executor materializes.
//!
//! Resolution is a pure, single-threaded computation over immutable input
//! snapshots: no I/O, no network, no shared state between runs.

pub mod assemble;
pub mod closure;
pub mod marker;
pub mod overlay;
pub mod partition;
pub mod resolve;
pub mod version;
