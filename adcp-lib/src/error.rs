#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Not enough bytes")]
    NotEnoughData { actual: usize, minimum: usize },

    /// A data set header or block inside an otherwise valid frame could not be decoded.
    #[error("malformed record at offset {offset}: {reason}")]
    MalformedRecord { offset: usize, reason: String },

    /// The decoder has been disposed and no longer accepts input.
    #[error("decoder disposed")]
    Disposed,

    #[error("failed to spawn decoder worker")]
    Spawn(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
