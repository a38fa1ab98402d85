//! I/O infrastructure.
//!
//! - `proto`: Protobuf messages for the source and roadmap clients
//! - `wire`: length-prefixed framing
//! - `source`: TCP sensor receiver
//! - `streaming`: roadmap sinks

pub mod proto;
pub mod source;
pub mod streaming;
pub mod wire;
