//! Multiplayer plumbing for the orbital simulation: per-client diffed
//! replication of the orbit and trajectory registries, and the compressed
//! wire framing it travels in.

pub mod compression;
pub mod error;
pub mod replication;

pub use compression::{CompressionConfig, CompressionError};
pub use error::ReplicationError;
pub use replication::{ReplicationClient, ReplicationMessages, ReplicationServer, StateUpdate};
