//! Errors raised while replicating the orbital registries.

use orbis_orbital::OrbitalError;

use crate::compression::CompressionError;

/// Replication failures.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// Serializing a state or batch failed.
    #[error("failed to encode replication data: {0}")]
    Encode(#[source] postcard::Error),

    /// A state or batch could not be deserialized.
    #[error("failed to decode replication data: {0}")]
    Decode(#[source] postcard::Error),

    /// The frame around a batch is corrupt.
    #[error("replication frame: {0}")]
    Compression(#[from] CompressionError),

    /// Only the authoritative simulation may be replicated from.
    #[error("replication source is not the authoritative simulation")]
    NotAuthority,

    /// The target simulation rejected the update.
    #[error("replicated state rejected: {0}")]
    Simulation(#[from] OrbitalError),
}
