//! Transport - named payload delivery between offloading peers
//!
//! A session hands every outbound payload to a [`Transport`] and consumes
//! inbound payloads delivered by the embedding service. The wire format
//! itself lives behind the seam; this crate defines the seam and ships an
//! in-memory loopback pair for tests and single-process setups.

pub mod loopback;
pub mod transfer;

pub use loopback::LoopbackEndpoint;
pub use transfer::{Inbound, Transport, TransferKind};
