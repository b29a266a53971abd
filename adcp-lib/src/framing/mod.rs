//! Frame accumulation, synchronization and validation.
//!
//! Every wire format is described by a [FrameFormat]. The [Synchronizer] uses it to find
//! sync patterns in an [Accumulator]'s bytes, validate candidate headers and verify
//! checksums, without knowing anything about the format itself.
mod accumulator;
mod checksum;
pub mod header;
mod synchronizer;

use std::fmt::Display;
use std::str::FromStr;

pub use accumulator::*;
pub use checksum::*;
pub use synchronizer::*;

use crate::ensemble::{pd0::Pd0Format, prti::PrtiFormat, rtb::RtbFormat, Ensemble};
use crate::prelude::*;

/// Largest payload a native header may declare before it is rejected as spurious.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Wire formats understood by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    /// Native binary ensembles.
    Rtb,
    /// TRDI PD0 binary ensembles.
    Pd0,
    /// `$PRTI01`/`$PRTI02` DVL sentences.
    Prti,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Rtb, Format::Pd0, Format::Prti];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Format::Rtb => "rtb",
            Format::Pd0 => "pd0",
            Format::Prti => "prti",
        }
    }

    /// Construct the [FrameFormat] implementation for this format.
    ///
    /// `max_payload` only applies to formats whose header declares an arbitrary payload size.
    #[must_use]
    pub fn codec(&self, max_payload: usize) -> Box<dyn FrameFormat> {
        match self {
            Format::Rtb => Box::new(RtbFormat::new(max_payload)),
            Format::Pd0 => Box::new(Pd0Format),
            Format::Prti => Box::new(PrtiFormat),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rtb" => Ok(Format::Rtb),
            "pd0" => Ok(Format::Pd0),
            "prti" => Ok(Format::Prti),
            _ => Err(format!("unknown format {s:?}; expected one of rtb, pd0, prti")),
        }
    }
}

/// A header that passed its format's self-checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateHeader {
    /// Sequence number carried by the header, if the format has one.
    pub sequence_number: Option<u32>,
    /// Number of payload bytes declared by the header.
    pub payload_size: usize,
    /// Total length of the frame starting at the sync position, checksum included.
    pub frame_len: usize,
}

/// Why a candidate sync position was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Invalid {
    #[error("sync pattern mismatch")]
    SyncMismatch,
    #[error("header complement check failed")]
    HeaderSelfCheck,
    #[error("invalid payload size {0}")]
    PayloadSize(i64),
    #[error("inconsistent header: {0}")]
    Layout(&'static str),
}

/// Result of validating a header window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(CandidateHeader),
    Invalid(Invalid),
    /// Not enough bytes yet to decide.
    Incomplete,
}

/// A structurally valid frame that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BadFrame {
    #[error("checksum mismatch: frame carries {expected:#x}, computed {actual:#x}")]
    Checksum { expected: u32, actual: u32 },
    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl From<Error> for BadFrame {
    fn from(err: Error) -> Self {
        BadFrame::Malformed(err.to_string())
    }
}

/// Everything the format-agnostic pipeline needs to know about one wire format.
pub trait FrameFormat: Send + Sync {
    fn format(&self) -> Format;

    /// Bytes every frame starts with.
    fn sync_pattern(&self) -> &[u8];

    /// Fewest bytes that could hold a complete frame. No synchronization is attempted on
    /// fewer buffered bytes than this.
    fn min_frame_len(&self) -> usize;

    /// Validate the header at the start of `window`, which begins with the sync pattern.
    fn validate(&self, window: &[u8]) -> Validation;

    /// Verify the integrity of a complete frame.
    ///
    /// # Errors
    /// [BadFrame] if the frame's checksum does not match.
    fn verify(&self, frame: &[u8]) -> std::result::Result<(), BadFrame>;

    /// Parse a verified frame into an [Ensemble].
    ///
    /// # Errors
    /// [Error::MalformedRecord] if any record in the frame cannot be decoded.
    fn parse(&self, frame: &[u8]) -> Result<Ensemble>;

    /// Re-encode `frame` so it carries `nmea` as its side channel text. Formats that cannot
    /// carry text return `None`.
    fn with_nmea(&self, _frame: &[u8], _nmea: &str) -> Option<Vec<u8>> {
        None
    }
}
