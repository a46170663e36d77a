//! Shared plumbing for the Mitos server crates.
//!
//! Small, dependency-light building blocks that every other crate pulls in:
//! lock aliases, the in-process pub/sub hub, and id helpers.

pub mod ids;
pub mod locks;
pub mod pubsub;
