//! Wire types for the Chrome DevTools Protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with a browser
//! over its remote-debugging WebSocket. Only the subset of CDP that the
//! export workflow drives is modelled here.
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and small accessors
//! * 1:1 with protocol: Field names match the CDP JSON schema
//!
//! Higher-level page operations are built on top of these types in `orderpull-runtime`.

pub mod message;
pub mod runtime;
pub mod target;

pub use message::*;
pub use runtime::*;
pub use target::*;
