use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};

/// Storage strategy for an [Accumulator].
///
/// Implementations trade append cost against the cost of presenting the buffered bytes as
/// one contiguous slice.
pub trait ByteStore: Default + Send {
    fn push_slice(&mut self, dat: &[u8]);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Remove `n` bytes from the head, or everything if fewer are buffered.
    fn discard(&mut self, n: usize);
    fn clear(&mut self);
    /// All buffered bytes as a single slice.
    fn contiguous(&mut self) -> &[u8];
}

/// Ring buffer storage; appends never move existing bytes.
impl ByteStore for VecDeque<u8> {
    fn push_slice(&mut self, dat: &[u8]) {
        self.extend(dat);
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn discard(&mut self, n: usize) {
        let n = n.min(VecDeque::len(self));
        self.drain(..n);
    }

    fn clear(&mut self) {
        VecDeque::clear(self);
    }

    fn contiguous(&mut self) -> &[u8] {
        self.make_contiguous()
    }
}

/// Contiguous storage; discarding from the head shifts the remaining bytes down.
impl ByteStore for Vec<u8> {
    fn push_slice(&mut self, dat: &[u8]) {
        self.extend_from_slice(dat);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn discard(&mut self, n: usize) {
        let n = n.min(Vec::len(self));
        self.drain(..n);
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn contiguous(&mut self) -> &[u8] {
        self.as_slice()
    }
}

struct Inner<S> {
    store: S,
    /// Incremented on every clear so readers can tell their view of the buffer is stale.
    generation: u64,
}

/// Thread-safe byte accumulator shared by a producer and a decode worker.
///
/// Producers [append](Self::append) at the tail while the worker consumes from the head.
/// Every read-and-remove sequence runs under a single lock so a concurrent
/// [clear](Self::clear) can never interleave with an extraction.
///
/// Each append leaves at most one pending wake token, so a worker blocked in
/// [wait](Self::wait) is woken once per batch no matter how many bytes or appends the batch
/// contained.
pub struct Accumulator<S = VecDeque<u8>>
where
    S: ByteStore,
{
    inner: Mutex<Inner<S>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl<S> Default for Accumulator<S>
where
    S: ByteStore,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Accumulator<S>
where
    S: ByteStore,
{
    #[must_use]
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Accumulator {
            inner: Mutex::new(Inner {
                store: S::default(),
                generation: 0,
            }),
            wake_tx,
            wake_rx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        // Buffer state is always consistent between calls, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `dat` and wake the consumer.
    pub fn append(&self, dat: &[u8]) {
        if dat.is_empty() {
            return;
        }
        self.lock().store.push_slice(dat);
        self.wake();
    }

    /// Leave a wake token for the consumer if one is not already pending.
    pub fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Block until woken or `timeout` elapses. Returns `true` if woken.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.wake_rx.recv_timeout(timeout).is_ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Remove and return up to `n` bytes from the head.
    pub fn take(&self, n: usize) -> Vec<u8> {
        let mut inner = self.lock();
        let n = n.min(inner.store.len());
        let dat = inner.store.contiguous()[..n].to_vec();
        inner.store.discard(n);
        dat
    }

    /// Remove up to `n` bytes from the head.
    pub fn discard(&self, n: usize) {
        self.lock().store.discard(n);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.store.clear();
        inner.generation += 1;
    }

    /// Run `f` over the buffered bytes and discard however many bytes it reports consumed.
    ///
    /// `f` receives the buffer and its current generation and returns the number of head
    /// bytes to remove along with its result. The lock is held for the duration, so `f`
    /// must not call back into this accumulator.
    pub fn consume<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&[u8], u64) -> (usize, T),
    {
        let mut inner = self.lock();
        let generation = inner.generation;
        let (consumed, zult) = f(inner.store.contiguous(), generation);
        inner.store.discard(consumed);
        zult
    }
}
