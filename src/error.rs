//! Error types for the telemetry aggregation engine.

use thiserror::Error;

/// A specialized [Result](std::result::Result) type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while consuming telemetry or writing results.
#[derive(Debug, Error)]
pub enum Error {
    /// A timestep arrived with a time earlier than one already consumed.
    #[error("stream ordering violated: timestep {time} < {last_time}")]
    StreamOrdering { time: f64, last_time: f64 },

    /// A timestep's time was NaN or infinite.
    #[error("timestep time {0} is not finite")]
    NonFiniteTime(f64),

    /// The engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A telemetry element was missing an attribute or held an unparsable value.
    #[error("malformed record at byte {position}: {reason}")]
    MalformedRecord { position: usize, reason: String },

    /// Grid averages were requested over an empty or negative time span.
    #[error("cannot normalize grid by non-positive duration {0}")]
    NonPositiveDuration(f64),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("decompression error: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),
}

impl Error {
    /// Creates an invalid configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Creates a malformed record error.
    pub fn malformed(position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            position,
            reason: reason.into(),
        }
    }
}
