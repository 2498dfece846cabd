//! MMP mining client.
//!
//! A client for the Mining Management Protocol: it maintains a
//! persistent connection to a coordinating server, fetches work units for
//! an attached compute engine, verifies the engine's candidate solutions
//! locally, and submits qualifying results for credit.

pub mod config;
pub mod daemon;
pub mod hasher;
pub mod mmp;
pub mod session;
pub mod tracing;
pub mod work;
