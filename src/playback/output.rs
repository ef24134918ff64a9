// Audio output sink
// Real output goes through rodio; the trait is the seam the queue tests use

use std::sync::Arc;

use parking_lot::Mutex;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

use crate::payload::AudioClip;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("no audio output device available: {0}")]
    Device(#[from] rodio::StreamError),
    #[error("failed to open output sink: {0}")]
    Sink(#[from] rodio::PlayError),
    #[error("failed to spawn playback watcher: {0}")]
    Watcher(#[from] std::io::Error),
}

/// Invoked exactly once when the clip finishes rendering or is halted.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// One-clip-at-a-time output device.
///
/// `begin` must return before `done` can fire, and `done` fires exactly once
/// per successful `begin` (natural end or halt). `halt` is a no-op when
/// nothing is rendering.
pub trait OutputSink: Send {
    fn begin(&mut self, clip: AudioClip, done: Completion) -> Result<(), OutputError>;
    fn halt(&mut self);
}

/// Speaker output through the default rodio device.
///
/// Each clip gets its own `Sink` fed by a mono `SamplesBuffer` at the clip's
/// native sample rate; rodio resamples to the device rate. A watcher thread
/// blocks until the sink drains (or is stopped) and then reports completion.
pub struct SpeakerSink {
    handle: OutputStreamHandle,
    current: Arc<Mutex<Option<Arc<Sink>>>>,
}

impl SpeakerSink {
    pub fn try_new() -> Result<Self, OutputError> {
        let (stream, handle) = OutputStream::try_default()?;
        // The stream must outlive every sink attached to the handle; it is
        // leaked once here and lives for the rest of the process.
        std::mem::forget(stream);

        Ok(Self {
            handle,
            current: Arc::new(Mutex::new(None)),
        })
    }
}

impl OutputSink for SpeakerSink {
    fn begin(&mut self, clip: AudioClip, done: Completion) -> Result<(), OutputError> {
        let sink = Arc::new(Sink::try_new(&self.handle)?);
        sink.append(SamplesBuffer::new(1, clip.sample_rate, clip.samples));

        *self.current.lock() = Some(Arc::clone(&sink));

        let current = Arc::clone(&self.current);
        let watcher_sink = Arc::clone(&sink);
        let spawned = std::thread::Builder::new()
            .name("talkback-playback-watch".into())
            .spawn(move || {
                watcher_sink.sleep_until_end();
                let mut slot = current.lock();
                if slot
                    .as_ref()
                    .map(|active| Arc::ptr_eq(active, &watcher_sink))
                    .unwrap_or(false)
                {
                    *slot = None;
                }
                drop(slot);
                done();
            });

        if let Err(e) = spawned {
            // Without a watcher there is no completion; do not leave the
            // clip rendering.
            sink.stop();
            *self.current.lock() = None;
            return Err(e.into());
        }

        Ok(())
    }

    fn halt(&mut self) {
        // Stopping wakes the watcher, which then reports completion.
        if let Some(sink) = self.current.lock().take() {
            sink.stop();
        }
    }
}
