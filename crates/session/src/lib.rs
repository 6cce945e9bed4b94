//! Session - offloading session orchestration
//!
//! Drives one offloading exchange end to end: compile the transfer plan,
//! ship or await the training inputs, rewrite path templates, run the
//! pipeline and hand the trained model back at teardown.

pub mod monitor;
pub mod nodes;
pub mod session;

pub use nodes::{NodeInfo, NodeKind, NodeRegistry};
pub use session::{InboundHandle, Phase, Session};
