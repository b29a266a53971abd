use std::collections::BTreeSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Duration;

use adcp::{
    Arbitrator, ArbitratorConfig, ChannelListener, DecodeEvent, DecoderConfig, DecoderStats,
    Format, FormatDecoder,
};
use anyhow::{bail, Context, Result};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use tracing::{debug, trace};

/// How long every decoder gets to work through a single chunk.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Which decoders to run over the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Auto,
    Rtb,
    Pd0,
    Prti,
}

impl Selection {
    fn format(self) -> Option<Format> {
        match self {
            Self::Auto => None,
            Self::Rtb => Some(Format::Rtb),
            Self::Pd0 => Some(Format::Pd0),
            Self::Prti => Some(Format::Prti),
        }
    }
}

impl clap::ValueEnum for Selection {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Auto, Self::Rtb, Self::Pd0, Self::Prti]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Auto => Some(clap::builder::PossibleValue::new("auto")),
            Self::Rtb => Some(clap::builder::PossibleValue::new("rtb")),
            Self::Pd0 => Some(clap::builder::PossibleValue::new("pd0")),
            Self::Prti => Some(clap::builder::PossibleValue::new("prti")),
        }
    }
}

enum Decoders {
    Arbitrated(Arbitrator),
    Single(FormatDecoder),
}

impl Decoders {
    fn start(selection: Selection, listener: ChannelListener) -> Result<Self> {
        let decoders = match selection.format() {
            None => Decoders::Arbitrated(
                Arbitrator::start(ArbitratorConfig::default(), listener)
                    .context("starting decoders")?,
            ),
            Some(format) => Decoders::Single(
                FormatDecoder::start(DecoderConfig::new(format), listener)
                    .with_context(|| format!("starting {format} decoder"))?,
            ),
        };
        Ok(decoders)
    }

    fn formats(&self) -> Vec<Format> {
        match self {
            Decoders::Arbitrated(arb) => arb.decoders().map(FormatDecoder::format).collect(),
            Decoders::Single(decoder) => vec![decoder.format()],
        }
    }

    fn ingest(&self, dat: &[u8]) -> adcp::Result<()> {
        match self {
            Decoders::Arbitrated(arb) => arb.ingest(dat),
            Decoders::Single(decoder) => decoder.ingest(dat),
        }
    }

    fn ingest_side_channel(&self, text: &str) -> adcp::Result<()> {
        match self {
            Decoders::Arbitrated(arb) => arb.ingest_side_channel(text),
            Decoders::Single(decoder) => decoder.ingest_side_channel(text).map(|_| ()),
        }
    }

    fn stats(&self) -> Vec<(Format, DecoderStats)> {
        match self {
            Decoders::Arbitrated(arb) => arb.decoders().map(|d| (d.format(), d.stats())).collect(),
            Decoders::Single(decoder) => vec![(decoder.format(), decoder.stats())],
        }
    }

    fn dominant(&self) -> Option<Format> {
        match self {
            Decoders::Arbitrated(arb) => arb.dominant(),
            Decoders::Single(decoder) => Some(decoder.format()),
        }
    }
}

/// Final state of a streamed input.
#[derive(Debug, Clone)]
pub struct Finished {
    pub bytes: u64,
    pub stats: Vec<(Format, DecoderStats)>,
    pub dominant: Option<Format>,
}

/// Stream `input` through the selected decoders `chunk_size` bytes at a time, handing
/// every event except batch completions to `handler`.
///
/// Chunks are fed in lockstep: the next chunk is not ingested until every decoder has
/// drained the previous one, so no more than one chunk is buffered per decoder.
///
/// Side channel text from `nmea` is queued before any stream bytes.
pub fn stream<F>(
    input: &Path,
    selection: Selection,
    chunk_size: usize,
    nmea: Option<&Path>,
    mut handler: F,
) -> Result<Finished>
where
    F: FnMut(DecodeEvent) -> Result<()>,
{
    if chunk_size == 0 {
        bail!("chunk size must be greater than 0");
    }
    let mut src = File::open(input).with_context(|| format!("opening input {input:?}"))?;

    let (listener, rx) = ChannelListener::new();
    let decoders = Decoders::start(selection, listener)?;
    let formats = decoders.formats();
    debug!("decoding {input:?} with {formats:?}");

    if let Some(path) = nmea {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading side channel {path:?}"))?;
        decoders
            .ingest_side_channel(&text)
            .context("queueing side channel")?;
    }

    let mut buf = vec![0u8; chunk_size];
    let mut bytes = 0u64;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err).context("reading input"),
        };
        bytes += n as u64;
        decoders.ingest(&buf[..n]).context("ingesting chunk")?;
        await_drained(&rx, &formats, &mut handler)?;
    }

    let finished = Finished {
        bytes,
        stats: decoders.stats(),
        dominant: decoders.dominant(),
    };
    drop(decoders);
    for event in rx.try_iter() {
        if !matches!(event, DecodeEvent::BatchDrained { .. }) {
            handler(event)?;
        }
    }
    Ok(finished)
}

fn await_drained<F>(rx: &Receiver<DecodeEvent>, formats: &[Format], handler: &mut F) -> Result<()>
where
    F: FnMut(DecodeEvent) -> Result<()>,
{
    let mut waiting: BTreeSet<Format> = formats.iter().copied().collect();
    while !waiting.is_empty() {
        let event = match rx.recv_timeout(DRAIN_TIMEOUT) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => bail!("timed out waiting for {waiting:?} to decode"),
            Err(RecvTimeoutError::Disconnected) => bail!("decoders exited unexpectedly"),
        };
        if let DecodeEvent::BatchDrained { format } = event {
            trace!(%format, "chunk drained");
            waiting.remove(&format);
            continue;
        }
        handler(event)?;
    }
    Ok(())
}
