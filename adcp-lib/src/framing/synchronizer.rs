use std::time::{Duration, Instant};

use tracing::trace;

use super::{BadFrame, CandidateHeader, FrameFormat, Validation};

/// What happens to bytes left in the buffer after the worker has extracted every frame it
/// can.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Keep unconsumed bytes; the next pass resumes at the first byte after the last frame.
    #[default]
    ResumeAfterFrame,
    /// Discard everything left once a drain produced at least one frame, including any
    /// partially received next frame.
    ClearAfterPass,
}

/// Outcome of a single synchronizer pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A complete frame whose checksum verified.
    Frame(Vec<u8>),
    /// A complete frame that failed verification. It is dropped, not rescanned.
    BadFrame(BadFrame),
    /// A valid header was found but its frame is not fully buffered.
    NeedMore { needed: usize },
    /// No frame can start in the scanned bytes. Any unconsumed tail may still hold the
    /// beginning of a sync pattern or header.
    Exhausted,
}

/// A pass result: how many head bytes of the buffer are consumed and what was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub consumed: usize,
    pub outcome: Outcome,
}

/// A validated header waiting for the rest of its frame. It is always at the head of the
/// buffer because everything before it was consumed by the pass that found it.
#[derive(Debug, Clone, Copy)]
struct Pending {
    header: CandidateHeader,
    since: Instant,
    generation: u64,
}

#[derive(Debug)]
enum State {
    Searching { from: usize },
    HeaderFound { at: usize, header: CandidateHeader },
    FrameComplete { at: usize, header: CandidateHeader },
}

/// Locates frames in accumulated bytes.
///
/// Each [pass](Self::pass) runs a small state machine over the buffer:
///
/// * `Searching`: scan for the format's sync pattern. Positions that do not start the
///   pattern, or whose header fails validation, are skipped one byte at a time. A valid
///   sync may begin inside a run of sync bytes, so a rejected candidate never skips the
///   whole pattern.
/// * `HeaderFound`: a header validated. If the declared frame is fully buffered move on,
///   otherwise stop and report [Outcome::NeedMore], remembering the header for the next
///   pass.
/// * `FrameComplete`: verify the frame's checksum. Good or bad, the frame's bytes are
///   consumed and the next pass starts searching right after them.
pub struct Synchronizer {
    format: Box<dyn FrameFormat>,
    pending: Option<Pending>,
    partial_frame_timeout: Option<Duration>,
}

impl Synchronizer {
    #[must_use]
    pub fn new(format: Box<dyn FrameFormat>) -> Self {
        Synchronizer {
            format,
            pending: None,
            partial_frame_timeout: None,
        }
    }

    /// Abandon a validated header whose frame has not completed within `timeout` and
    /// rescan from the byte after its sync position.
    #[must_use]
    pub fn with_partial_frame_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.partial_frame_timeout = timeout;
        self
    }

    #[must_use]
    pub fn format(&self) -> &dyn FrameFormat {
        self.format.as_ref()
    }

    /// True if a validated header is waiting for the rest of its frame.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget any pending header.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    fn expired(&self, pending: &Pending) -> bool {
        self.partial_frame_timeout
            .is_some_and(|timeout| pending.since.elapsed() >= timeout)
    }

    /// Run one pass over `buf`, the accumulator's bytes at `generation`.
    ///
    /// A pending header from a previous pass is only honored if the buffer has not been
    /// cleared since.
    pub fn pass(&mut self, buf: &[u8], generation: u64) -> Pass {
        let pattern = self.format.sync_pattern();
        let mut state = match self.pending.take() {
            Some(p) if p.generation == generation => {
                if self.expired(&p) {
                    trace!(format = %self.format.format(), "abandoning partial frame");
                    State::Searching { from: 1 }
                } else {
                    self.pending = Some(p);
                    State::HeaderFound {
                        at: 0,
                        header: p.header,
                    }
                }
            }
            _ => State::Searching { from: 0 },
        };

        loop {
            state = match state {
                State::Searching { from } => {
                    let Some(at) = buf
                        .get(from..)
                        .and_then(|rest| rest.iter().position(|b| *b == pattern[0]))
                        .map(|idx| from + idx)
                    else {
                        return Pass {
                            consumed: buf.len(),
                            outcome: Outcome::Exhausted,
                        };
                    };

                    let window = &buf[at..];
                    let n = window.len().min(pattern.len());
                    if window[..n] != pattern[..n] {
                        trace!(at, "sync mismatch");
                        State::Searching { from: at + 1 }
                    } else if n < pattern.len() {
                        // Partial sync pattern at the end of the buffer
                        return Pass {
                            consumed: at,
                            outcome: Outcome::Exhausted,
                        };
                    } else {
                        match self.format.validate(window) {
                            Validation::Valid(header) => State::HeaderFound { at, header },
                            Validation::Invalid(reason) => {
                                trace!(at, %reason, "rejected candidate header");
                                State::Searching { from: at + 1 }
                            }
                            Validation::Incomplete => {
                                return Pass {
                                    consumed: at,
                                    outcome: Outcome::Exhausted,
                                };
                            }
                        }
                    }
                }
                State::HeaderFound { at, header } => {
                    let have = buf.len() - at;
                    if have >= header.frame_len {
                        State::FrameComplete { at, header }
                    } else {
                        if self.pending.is_none() {
                            self.pending = Some(Pending {
                                header,
                                since: Instant::now(),
                                generation,
                            });
                        }
                        return Pass {
                            consumed: at,
                            outcome: Outcome::NeedMore {
                                needed: header.frame_len - have,
                            },
                        };
                    }
                }
                State::FrameComplete { at, header } => {
                    self.pending = None;
                    let frame = &buf[at..at + header.frame_len];
                    let outcome = match self.format.verify(frame) {
                        Ok(()) => Outcome::Frame(frame.to_vec()),
                        Err(err) => Outcome::BadFrame(err),
                    };
                    return Pass {
                        consumed: at + header.frame_len,
                        outcome,
                    };
                }
            };
        }
    }
}
