//! Per-format decoding on a dedicated worker thread.
//!
//! A [FormatDecoder] owns an [Accumulator] that producers feed through
//! [ingest](FormatDecoder::ingest) and a worker thread that synchronizes, verifies and
//! parses frames from it. Results are delivered to a [DecodeListener] from the worker
//! thread, in stream order.
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, span, trace, warn, Level};
use typed_builder::TypedBuilder;

use crate::ensemble::Ensemble;
use crate::framing::{
    Accumulator, BadFrame, BufferPolicy, Format, Outcome, Synchronizer, DEFAULT_MAX_PAYLOAD,
};
use crate::prelude::*;
use crate::sidechannel::{self, SideChannel};

/// Ingested batches without a good frame before the buffer is considered stale.
pub const DEFAULT_STALE_BATCHES: usize = 50;

/// Receives decode results.
///
/// All methods are called from the decoder's worker thread and must not block for long.
/// For a single frame `on_good_frame` is called before `on_ensemble`.
pub trait DecodeListener: Send {
    /// A frame passed verification and parsed. `raw` is the frame as received, or as
    /// re-encoded with side channel text if the decoder is configured to enrich frames.
    fn on_ensemble(&self, _format: Format, _raw: Vec<u8>, _ensemble: Ensemble) {}

    fn on_good_frame(&self, _format: Format) {}

    /// A complete frame failed its checksum or could not be parsed.
    fn on_bad_frame(&self, _format: Format, _reason: &BadFrame) {}

    /// The worker extracted everything it could from the buffered bytes.
    fn on_batch_drained(&self, _format: Format) {}
}

impl<T> DecodeListener for Arc<T>
where
    T: DecodeListener + Sync + ?Sized,
{
    fn on_ensemble(&self, format: Format, raw: Vec<u8>, ensemble: Ensemble) {
        (**self).on_ensemble(format, raw, ensemble);
    }

    fn on_good_frame(&self, format: Format) {
        (**self).on_good_frame(format);
    }

    fn on_bad_frame(&self, format: Format, reason: &BadFrame) {
        (**self).on_bad_frame(format, reason);
    }

    fn on_batch_drained(&self, format: Format) {
        (**self).on_batch_drained(format);
    }
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl DecodeListener for NoopListener {}

/// A listener callback as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    Ensemble {
        format: Format,
        raw: Vec<u8>,
        ensemble: Box<Ensemble>,
    },
    GoodFrame {
        format: Format,
    },
    BadFrame {
        format: Format,
        reason: BadFrame,
    },
    BatchDrained {
        format: Format,
    },
}

impl DecodeEvent {
    #[must_use]
    pub fn format(&self) -> Format {
        match self {
            DecodeEvent::Ensemble { format, .. }
            | DecodeEvent::GoodFrame { format }
            | DecodeEvent::BadFrame { format, .. }
            | DecodeEvent::BatchDrained { format } => *format,
        }
    }
}

/// Forwards every callback as a [DecodeEvent] on an unbounded channel.
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<DecodeEvent>,
}

impl ChannelListener {
    #[must_use]
    pub fn new() -> (Self, Receiver<DecodeEvent>) {
        let (tx, rx) = unbounded();
        (ChannelListener { tx }, rx)
    }

    fn send(&self, event: DecodeEvent) {
        let _ = self.tx.send(event);
    }
}

impl DecodeListener for ChannelListener {
    fn on_ensemble(&self, format: Format, raw: Vec<u8>, ensemble: Ensemble) {
        self.send(DecodeEvent::Ensemble {
            format,
            raw,
            ensemble: Box::new(ensemble),
        });
    }

    fn on_good_frame(&self, format: Format) {
        self.send(DecodeEvent::GoodFrame { format });
    }

    fn on_bad_frame(&self, format: Format, reason: &BadFrame) {
        self.send(DecodeEvent::BadFrame {
            format,
            reason: reason.clone(),
        });
    }

    fn on_batch_drained(&self, format: Format) {
        self.send(DecodeEvent::BatchDrained { format });
    }
}

/// Decoder configuration.
#[derive(Debug, Clone, TypedBuilder)]
pub struct DecoderConfig {
    pub format: Format,
    /// What to do with leftover bytes after a drain.
    #[builder(default)]
    pub buffer_policy: BufferPolicy,
    /// Clear the buffer once more than this many batches were ingested without a good
    /// frame.
    #[builder(default = DEFAULT_STALE_BATCHES)]
    pub stale_batches: usize,
    /// How long the worker waits for input before re-checking whether it should exit.
    #[builder(default = Duration::from_secs(1))]
    pub wake_timeout: Duration,
    /// How long [FormatDecoder::dispose] waits for the worker to exit.
    #[builder(default = Duration::from_secs(2))]
    pub join_timeout: Duration,
    #[builder(default = sidechannel::DEFAULT_CAPACITY)]
    pub side_channel_capacity: usize,
    /// Re-encode raw frames so they carry merged side channel text. Only formats that can
    /// carry text are affected.
    #[builder(default)]
    pub enrich_raw: bool,
    /// Abandon a frame whose header validated but whose bytes have not all arrived within
    /// this long.
    #[builder(default, setter(strip_option))]
    pub partial_frame_timeout: Option<Duration>,
    #[builder(default = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

impl DecoderConfig {
    /// Default configuration for `format`.
    #[must_use]
    pub fn new(format: Format) -> Self {
        Self::builder().format(format).build()
    }
}

/// Snapshot of a decoder's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderStats {
    pub bytes_ingested: u64,
    pub good_frames: u64,
    pub bad_frames: u64,
    pub ensembles: u64,
    /// Times the buffer was cleared because no good frame arrived in time.
    pub stale_clears: u64,
}

#[derive(Default)]
struct Counters {
    bytes_ingested: AtomicU64,
    good_frames: AtomicU64,
    bad_frames: AtomicU64,
    ensembles: AtomicU64,
    stale_clears: AtomicU64,
}

impl Counters {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DecoderStats {
        DecoderStats {
            bytes_ingested: self.bytes_ingested.load(Ordering::Relaxed),
            good_frames: self.good_frames.load(Ordering::Relaxed),
            bad_frames: self.bad_frames.load(Ordering::Relaxed),
            ensembles: self.ensembles.load(Ordering::Relaxed),
            stale_clears: self.stale_clears.load(Ordering::Relaxed),
        }
    }
}

/// State shared by a decoder, its worker and any [DecoderHandle]s.
pub(crate) struct Shared {
    config: DecoderConfig,
    accumulator: Accumulator,
    side_channel: SideChannel,
    running: AtomicBool,
    disposed: AtomicBool,
    batches_since_good: AtomicUsize,
    counters: Counters,
}

impl Shared {
    fn new(config: DecoderConfig) -> Self {
        Shared {
            side_channel: SideChannel::new(config.side_channel_capacity),
            config,
            accumulator: Accumulator::new(),
            running: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            batches_since_good: AtomicUsize::new(0),
            counters: Counters::default(),
        }
    }

    fn clear(&self) {
        self.accumulator.clear();
        self.batches_since_good.store(0, Ordering::Release);
    }
}

/// Cheap, cloneable access to a running decoder's buffer and counters.
#[derive(Clone)]
pub struct DecoderHandle {
    shared: Arc<Shared>,
}

impl DecoderHandle {
    pub(crate) fn new(config: DecoderConfig) -> Self {
        DecoderHandle {
            shared: Arc::new(Shared::new(config)),
        }
    }

    #[must_use]
    pub fn format(&self) -> Format {
        self.shared.config.format
    }

    /// Discard all buffered bytes. Any partially received frame is forgotten.
    pub fn clear(&self) {
        debug!(format = %self.format(), "clearing decoder buffer");
        self.shared.clear();
    }

    /// Number of buffered bytes not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.accumulator.len()
    }

    #[must_use]
    pub fn stats(&self) -> DecoderStats {
        self.shared.counters.snapshot()
    }
}

struct Worker {
    handle: JoinHandle<()>,
    exit_rx: Receiver<()>,
}

/// Decodes one format from a byte stream on its own thread.
///
/// Dropping the decoder disposes it.
pub struct FormatDecoder {
    handle: DecoderHandle,
    worker: Mutex<Option<Worker>>,
}

impl FormatDecoder {
    /// Start a decoder and its worker thread.
    ///
    /// # Errors
    /// [Error::Spawn] if the worker thread cannot be created.
    pub fn start<L>(config: DecoderConfig, listener: L) -> Result<Self>
    where
        L: DecodeListener + 'static,
    {
        Self::spawn(DecoderHandle::new(config), listener)
    }

    pub(crate) fn spawn<L>(handle: DecoderHandle, listener: L) -> Result<Self>
    where
        L: DecodeListener + 'static,
    {
        let (exit_tx, exit_rx) = bounded(1);
        let shared = handle.shared.clone();
        let worker = thread::Builder::new()
            .name(format!("adcp::decoder::{}", handle.format()))
            .spawn(move || {
                run(&shared, &listener);
                let _ = exit_tx.send(());
            })
            .map_err(Error::Spawn)?;

        Ok(FormatDecoder {
            handle,
            worker: Mutex::new(Some(Worker {
                handle: worker,
                exit_rx,
            })),
        })
    }

    #[must_use]
    pub fn format(&self) -> Format {
        self.handle.format()
    }

    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.handle.shared.config
    }

    #[must_use]
    pub fn handle(&self) -> DecoderHandle {
        self.handle.clone()
    }

    /// Queue bytes for decoding. Never decodes on the calling thread.
    ///
    /// Each call counts as one batch. Once the worker has scanned more than
    /// [DecoderConfig::stale_batches] batches without a good frame or a header awaiting the
    /// rest of its frame, it discards the whole buffer.
    ///
    /// # Errors
    /// [Error::Disposed] if the decoder has been disposed.
    pub fn ingest(&self, dat: &[u8]) -> Result<()> {
        let shared = &self.handle.shared;
        if shared.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        if dat.is_empty() {
            return Ok(());
        }
        shared
            .counters
            .bytes_ingested
            .fetch_add(dat.len() as u64, Ordering::Relaxed);
        shared.accumulator.append(dat);
        shared.batches_since_good.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Queue side channel text to attach to the next ensemble. Only sentences with a valid
    /// checksum are kept. Returns the number of sentences queued.
    ///
    /// # Errors
    /// [Error::Disposed] if the decoder has been disposed.
    pub fn ingest_side_channel(&self, text: &str) -> Result<usize> {
        if self.handle.shared.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        Ok(self.handle.shared.side_channel.extend_from_text(text))
    }

    pub fn clear(&self) {
        self.handle.clear();
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.handle.pending()
    }

    #[must_use]
    pub fn stats(&self) -> DecoderStats {
        self.handle.stats()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.handle.shared.disposed.load(Ordering::Acquire)
    }

    /// Stop the worker and wait up to [DecoderConfig::join_timeout] for it to exit. A
    /// worker that does not exit in time is detached. Calling this more than once is a
    /// no-op.
    pub fn dispose(&self) {
        let shared = &self.handle.shared;
        if shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        shared.running.store(false, Ordering::Release);
        shared.accumulator.wake();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };
        match worker.exit_rx.recv_timeout(shared.config.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    warn!(format = %self.format(), "decoder worker panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    format = %self.format(),
                    timeout = ?shared.config.join_timeout,
                    "decoder worker did not exit in time, detaching"
                );
            }
        }
        debug!(format = %self.format(), "decoder disposed");
    }
}

impl Drop for FormatDecoder {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn run<L: DecodeListener>(shared: &Shared, listener: &L) {
    let format = shared.config.format;
    let span = span!(Level::DEBUG, "decoder", format = %format);
    let _guard = span.enter();

    let mut sync = Synchronizer::new(format.codec(shared.config.max_payload))
        .with_partial_frame_timeout(shared.config.partial_frame_timeout);
    debug!("worker started");

    while shared.running.load(Ordering::Acquire) {
        let woken = shared.accumulator.wait(shared.config.wake_timeout);
        if !shared.running.load(Ordering::Acquire) {
            break;
        }
        // Idle timeouts still drain while a partial frame may be expiring
        let expiring = shared.config.partial_frame_timeout.is_some() && sync.has_pending();
        if !woken && !expiring {
            continue;
        }
        drain(shared, &mut sync, listener);
        listener.on_batch_drained(format);
    }
    debug!("worker exiting");
}

/// Extract frames until the buffer cannot yield another one.
fn drain<L: DecodeListener>(shared: &Shared, sync: &mut Synchronizer, listener: &L) {
    let format = shared.config.format;
    let min_len = sync.format().min_frame_len();
    // Batches counted here are already buffered and get scanned below
    let batches = shared.batches_since_good.load(Ordering::Acquire);
    let mut extracted = false;
    let mut decoded = false;

    while shared.running.load(Ordering::Acquire) && shared.accumulator.len() >= min_len {
        let outcome = shared.accumulator.consume(|buf, generation| {
            let pass = sync.pass(buf, generation);
            (pass.consumed, pass.outcome)
        });
        match outcome {
            Outcome::Frame(frame) => {
                extracted = true;
                decoded |= handle_frame(shared, sync, listener, frame);
            }
            Outcome::BadFrame(reason) => {
                extracted = true;
                debug!(%reason, "bad frame");
                Counters::incr(&shared.counters.bad_frames);
                listener.on_bad_frame(format, &reason);
            }
            Outcome::NeedMore { needed } => {
                trace!(needed, "waiting for rest of frame");
                break;
            }
            Outcome::Exhausted => break,
        }
    }

    if sync.has_pending() {
        shared.batches_since_good.store(0, Ordering::Release);
    } else if !decoded && batches > shared.config.stale_batches {
        debug!(batches, "no good frame recently, clearing buffer");
        shared.clear();
        Counters::incr(&shared.counters.stale_clears);
        return;
    }

    if extracted && shared.config.buffer_policy == BufferPolicy::ClearAfterPass {
        shared.accumulator.clear();
        sync.reset();
    }
}

fn handle_frame<L: DecodeListener>(
    shared: &Shared,
    sync: &Synchronizer,
    listener: &L,
    frame: Vec<u8>,
) -> bool {
    let format = shared.config.format;
    let mut ensemble = match sync.format().parse(&frame) {
        Ok(ensemble) => ensemble,
        Err(err) => {
            let reason = BadFrame::from(err);
            debug!(%reason, "frame failed to parse");
            Counters::incr(&shared.counters.bad_frames);
            listener.on_bad_frame(format, &reason);
            return false;
        }
    };
    shared.batches_since_good.store(0, Ordering::Release);
    Counters::incr(&shared.counters.good_frames);
    debug!(number = ?ensemble.number(), len = frame.len(), "good frame");
    listener.on_good_frame(format);

    let mut raw = frame;
    let lines = shared.side_channel.drain();
    if sidechannel::merge(&mut ensemble, &lines) && shared.config.enrich_raw {
        let text = ensemble.nmea.as_ref().map(|n| n.text.as_str()).unwrap_or_default();
        if let Some(enriched) = sync.format().with_nmea(&raw, text) {
            raw = enriched;
        }
    }

    Counters::incr(&shared.counters.ensembles);
    listener.on_ensemble(format, raw, ensemble);
    true
}
