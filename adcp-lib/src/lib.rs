#![doc = include_str!("../README.md")]

mod error;

pub mod arbitrator;
pub mod decoder;
pub mod ensemble;
pub mod framing;
pub mod nmea;
pub mod sidechannel;

pub use arbitrator::{Arbitrator, ArbitratorConfig};
pub use decoder::{
    ChannelListener, DecodeEvent, DecodeListener, DecoderConfig, DecoderHandle, DecoderStats,
    FormatDecoder, NoopListener,
};
pub use ensemble::Ensemble;
pub use error::{Error, Result};
pub use framing::{BadFrame, BufferPolicy, Format};

pub(crate) mod prelude {
    pub use crate::error::{Error, Result};
}
