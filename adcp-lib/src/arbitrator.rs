//! Running several format decoders over the same stream and settling on one.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::decoder::{DecodeListener, DecoderConfig, DecoderHandle, FormatDecoder};
use crate::ensemble::Ensemble;
use crate::framing::{BadFrame, Format};
use crate::prelude::*;

/// Successful decodes after which a format is considered to own the stream.
pub const DEFAULT_DOMINANCE_THRESHOLD: u32 = 20;

fn all_formats() -> Vec<DecoderConfig> {
    Format::ALL.into_iter().map(DecoderConfig::new).collect()
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct ArbitratorConfig {
    /// One decoder is started per entry. Formats should not repeat.
    #[builder(default = all_formats())]
    pub decoders: Vec<DecoderConfig>,
    /// When a format's success counter exceeds this, every other decoder is cleared.
    #[builder(default = DEFAULT_DOMINANCE_THRESHOLD)]
    pub dominance_threshold: u32,
}

impl Default for ArbitratorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Default)]
struct Tally {
    counters: BTreeMap<Format, u32>,
    dominant: Option<Format>,
}

/// Success counters for every decoder. The only place counters change.
struct Dominance {
    threshold: u32,
    tally: Mutex<Tally>,
    handles: Vec<DecoderHandle>,
}

impl Dominance {
    fn lock(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_success(&self, format: Format) {
        let mut tally = self.lock();
        let count = tally.counters.entry(format).or_default();
        *count += 1;
        if *count <= self.threshold {
            return;
        }

        for handle in self.handles.iter().filter(|h| h.format() != format) {
            handle.clear();
            tally.counters.insert(handle.format(), 0);
        }
        tally.counters.insert(format, 1);
        if tally.dominant != Some(format) {
            info!(%format, "format dominates the stream, clearing other decoders");
            tally.dominant = Some(format);
        }
    }
}

/// Wraps the caller's listener to count successes before forwarding.
struct ArbiterListener<L> {
    inner: Arc<L>,
    dominance: Arc<Dominance>,
}

impl<L> DecodeListener for ArbiterListener<L>
where
    L: DecodeListener + Sync,
{
    fn on_ensemble(&self, format: Format, raw: Vec<u8>, ensemble: Ensemble) {
        self.dominance.record_success(format);
        self.inner.on_ensemble(format, raw, ensemble);
    }

    fn on_good_frame(&self, format: Format) {
        self.inner.on_good_frame(format);
    }

    fn on_bad_frame(&self, format: Format, reason: &BadFrame) {
        self.inner.on_bad_frame(format, reason);
    }

    fn on_batch_drained(&self, format: Format) {
        self.inner.on_batch_drained(format);
    }
}

/// Feeds the same bytes to one decoder per configured format.
///
/// Each decoder counts its successful decodes. Once one count exceeds
/// [ArbitratorConfig::dominance_threshold] the other decoders are cleared and their counts
/// reset, so a stream that is clearly one format stops paying for false syncs in the others.
/// The winner's count restarts at 1.
///
/// Listener callbacks from different decoders arrive on different threads in no particular
/// order relative to each other.
pub struct Arbitrator {
    decoders: Vec<FormatDecoder>,
    dominance: Arc<Dominance>,
}

impl Arbitrator {
    /// Start every configured decoder.
    ///
    /// # Errors
    /// [Error::Spawn] if any worker thread cannot be created. Decoders already started are
    /// disposed.
    pub fn start<L>(config: ArbitratorConfig, listener: L) -> Result<Self>
    where
        L: DecodeListener + Sync + 'static,
    {
        let handles: Vec<DecoderHandle> = config
            .decoders
            .into_iter()
            .map(DecoderHandle::new)
            .collect();
        let dominance = Arc::new(Dominance {
            threshold: config.dominance_threshold,
            tally: Mutex::new(Tally {
                counters: handles.iter().map(|h| (h.format(), 0)).collect(),
                dominant: None,
            }),
            handles: handles.clone(),
        });

        let listener = Arc::new(listener);
        let mut decoders = Vec::with_capacity(handles.len());
        for handle in handles {
            let wrapped = ArbiterListener {
                inner: listener.clone(),
                dominance: dominance.clone(),
            };
            // on error the decoders started so far are disposed when dropped
            decoders.push(FormatDecoder::spawn(handle, wrapped)?);
        }

        Ok(Arbitrator {
            decoders,
            dominance,
        })
    }

    /// Hand `dat` to every decoder.
    ///
    /// # Errors
    /// [Error::Disposed] after [Self::dispose].
    pub fn ingest(&self, dat: &[u8]) -> Result<()> {
        for decoder in &self.decoders {
            decoder.ingest(dat)?;
        }
        Ok(())
    }

    /// Hand side channel text to every decoder.
    ///
    /// # Errors
    /// [Error::Disposed] after [Self::dispose].
    pub fn ingest_side_channel(&self, text: &str) -> Result<()> {
        for decoder in &self.decoders {
            decoder.ingest_side_channel(text)?;
        }
        Ok(())
    }

    /// The format that most recently exceeded the dominance threshold.
    #[must_use]
    pub fn dominant(&self) -> Option<Format> {
        self.dominance.lock().dominant
    }

    /// Current success counter per format.
    #[must_use]
    pub fn counters(&self) -> BTreeMap<Format, u32> {
        self.dominance.lock().counters.clone()
    }

    /// Buffered bytes of the decoder for `format`, if there is one.
    #[must_use]
    pub fn pending(&self, format: Format) -> Option<usize> {
        self.decoder(format).map(FormatDecoder::pending)
    }

    #[must_use]
    pub fn decoder(&self, format: Format) -> Option<&FormatDecoder> {
        self.decoders.iter().find(|d| d.format() == format)
    }

    pub fn decoders(&self) -> impl Iterator<Item = &FormatDecoder> {
        self.decoders.iter()
    }

    /// Clear every decoder's buffer and reset all counters.
    pub fn clear(&self) {
        let mut tally = self.dominance.lock();
        for decoder in &self.decoders {
            decoder.clear();
            tally.counters.insert(decoder.format(), 0);
        }
        tally.dominant = None;
    }

    /// Dispose every decoder. Safe to call more than once.
    pub fn dispose(&self) {
        for decoder in &self.decoders {
            decoder.dispose();
        }
        if self.decoders.iter().any(|d| !d.is_disposed()) {
            warn!("not every decoder was disposed");
        }
    }
}

impl Drop for Arbitrator {
    fn drop(&mut self) {
        self.dispose();
    }
}
