//! Text that arrives outside the binary stream, e.g., GPS sentences from a second serial
//! port, and is attached to the next decoded ensemble.
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::ensemble::{Ensemble, Nmea};
use crate::nmea;

/// Default number of sentences held before the oldest are evicted.
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded FIFO of side channel sentences.
#[derive(Debug)]
pub struct SideChannel {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for SideChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SideChannel {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        SideChannel {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queue a line, evicting the oldest if full.
    pub fn push(&self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.into());
    }

    /// Queue every sentence in `text` with a valid checksum. Returns how many were queued.
    pub fn extend_from_text(&self, text: &str) -> usize {
        let mut count = 0;
        for sentence in nmea::locate(text) {
            if nmea::is_valid(sentence) {
                self.push(sentence);
                count += 1;
            } else {
                trace!(sentence, "dropping side channel sentence with bad checksum");
            }
        }
        count
    }

    /// Remove and return everything queued.
    pub fn drain(&self) -> Vec<String> {
        self.lock().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Attach `lines` to `ens`, appending to any NMEA text it already carries.
///
/// Returns `false` if there was nothing to merge.
pub fn merge(ens: &mut Ensemble, lines: &[String]) -> bool {
    if lines.is_empty() {
        return false;
    }
    let nmea = ens.nmea.get_or_insert_with(Nmea::default);
    for line in lines {
        nmea.append(line);
    }
    true
}
