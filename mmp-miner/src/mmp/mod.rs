//! MMP (Mining Management Protocol) client.
//!
//! MMP is a small line-oriented protocol over TCP used by distributed
//! proof-of-work workers. Lines are CRLF-delimited and tokenized IRC-style:
//! space-separated arguments, with an optional final free-text argument
//! introduced by `" :"`.
//!
//! # Protocol Overview
//!
//! - **Client commands**: LOGIN (credentials), META (metadata variables),
//!   MORE (request work), RESULT (submit a candidate solution)
//! - **Server commands**: MSG (operator text), TARGET (difficulty),
//!   WORK (new assignment), BLOCK (height notice), ACCEPTED / REJECTED
//!   (verdicts on submitted results)
//!
//! # Architecture
//!
//! The client is an active async task that owns the TCP connection,
//! reconnects with exponential backoff, and pushes events to a consumer
//! via channels. Commands flow the other way through an [`MmpHandle`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use mmp::{MmpClient, ClientConfig, ClientEvent};
//!
//! let (event_tx, mut event_rx) = mpsc::channel(100);
//! let config = ClientConfig {
//!     addr: "pool.example.com:8332".to_string(),
//!     username: "worker".to_string(),
//!     password: "x".to_string(),
//! };
//!
//! let (client, handle) = MmpClient::new(config, event_tx, shutdown_token);
//! tokio::spawn(client.run());
//!
//! while let Some(event) = event_rx.recv().await {
//!     match event {
//!         ClientEvent::Work(work) => { /* hand to the engine */ }
//!         ClientEvent::Block(height) => { /* informational */ }
//!         // ...
//!     }
//! }
//! ```

mod client;
mod codec;
mod connection;
mod dispatch;
mod error;
mod registry;

pub use client::{ClientCommand, ClientConfig, ClientEvent, MmpClient, MmpHandle};
pub use error::{MmpError, MmpResult};

#[cfg(test)]
pub(crate) use client::test_handle;
