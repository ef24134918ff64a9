// Sequential playback queue
// Payloads play strictly back-to-back through a single output sink; the
// transition to the next item is driven by the sink's completion callback

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::output::{Completion, OutputSink, SpeakerSink};
use crate::payload::AudioPayload;

/// FIFO scheduler for audio payloads.
///
/// Owns the pending queue, the playing flag and the one-shot abort flag.
/// Exactly one clip renders at a time; `enqueue` never blocks and `stop`
/// discards everything queued so far. Failures on individual payloads are
/// absorbed and counted, never surfaced to the enqueuer.
pub struct PlaybackQueue {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    queue: VecDeque<AudioPayload>,
    playing: bool,
    force_stop: bool,
    skipped: u64,
    // None when no output device exists; the whole queue is then inert.
    sink: Option<Box<dyn OutputSink>>,
}

impl PlaybackQueue {
    /// Open the default speaker output.
    ///
    /// When no output device is available the queue still constructs, logs a
    /// single warning and ignores every subsequent command.
    pub fn new() -> Self {
        match SpeakerSink::try_new() {
            Ok(sink) => Self::with_sink(Box::new(sink)),
            Err(e) => {
                warn!("audio output unavailable, playback disabled: {e}");
                Self::disabled()
            }
        }
    }

    /// Build a queue around a caller-supplied output sink.
    pub fn with_sink(sink: Box<dyn OutputSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                queue: VecDeque::new(),
                playing: false,
                force_stop: false,
                skipped: 0,
                sink: Some(sink),
            })),
        }
    }

    fn disabled() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                queue: VecDeque::new(),
                playing: false,
                force_stop: false,
                skipped: 0,
                sink: None,
            })),
        }
    }

    /// Append a payload; starts playback immediately when idle.
    ///
    /// Payloads with a zero sample rate or frame count are logged and
    /// dropped, leaving the queue unchanged.
    pub fn enqueue(&self, payload: AudioPayload) {
        let mut inner = self.inner.lock();
        if inner.sink.is_none() {
            return;
        }
        if payload.sample_rate == 0 || payload.frame_count == 0 {
            warn!(
                sample_rate = payload.sample_rate,
                frame_count = payload.frame_count,
                "rejecting audio payload with zero metadata"
            );
            return;
        }

        inner.queue.push_back(payload);
        if !inner.playing {
            Self::advance(&mut inner, &self.inner);
        }
    }

    /// Parse a serialized transport record and enqueue it.
    ///
    /// Malformed input is logged and dropped; nothing propagates to the
    /// caller.
    pub fn enqueue_json(&self, raw: &str) {
        match serde_json::from_str::<AudioPayload>(raw) {
            Ok(payload) => self.enqueue(payload),
            Err(e) => error!("invalid audio payload received: {e}"),
        }
    }

    /// Discard every queued payload and halt the in-flight clip.
    ///
    /// Synchronous for the queue and the abort flag; the device halt is
    /// best-effort and may race harmlessly with a completion already in
    /// flight. Idempotent from idle.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.queue.clear();
        if inner.playing {
            inner.force_stop = true;
        }
        if let Some(sink) = inner.sink.as_mut() {
            sink.halt();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    /// Payloads waiting behind the one currently rendering.
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Payloads dropped because they failed to decode or to start rendering.
    pub fn skipped(&self) -> u64 {
        self.inner.lock().skipped
    }

    // Core transition, run under the state lock. Invoked after an enqueue
    // when idle and from every completion callback. A set abort flag ends
    // the cycle without touching the queue; otherwise bad items are skipped
    // until one starts rendering or the queue runs dry.
    fn advance(inner: &mut Inner, handle: &Arc<Mutex<Inner>>) {
        if inner.force_stop {
            inner.force_stop = false;
            inner.playing = false;
            return;
        }

        loop {
            let Some(payload) = inner.queue.pop_front() else {
                inner.playing = false;
                return;
            };

            let clip = match payload.decode() {
                Ok(clip) => clip,
                Err(e) => {
                    warn!("skipping undecodable audio payload: {e}");
                    inner.skipped += 1;
                    continue;
                }
            };

            debug!(
                frames = clip.samples.len(),
                sample_rate = clip.sample_rate,
                duration_ms = clip.duration_ms(),
                "starting clip"
            );

            let done = Self::completion(handle);
            let Some(sink) = inner.sink.as_mut() else {
                inner.playing = false;
                return;
            };
            match sink.begin(clip, done) {
                Ok(()) => {
                    inner.playing = true;
                    return;
                }
                Err(e) => {
                    warn!("output rejected clip, skipping: {e}");
                    inner.skipped += 1;
                }
            }
        }
    }

    // The callback handed to the sink for each clip. Holds only a weak
    // reference so an abandoned queue never outlives its owner.
    fn completion(handle: &Arc<Mutex<Inner>>) -> Completion {
        let weak = Arc::downgrade(handle);
        Box::new(move || {
            if let Some(handle) = weak.upgrade() {
                let mut inner = handle.lock();
                Self::advance(&mut inner, &handle);
            }
        })
    }
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}
