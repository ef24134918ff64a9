// Sequential playback module
// A FIFO queue of audio payloads rendered one at a time through a single
// shared output

pub mod output;
pub mod queue;

pub use output::{Completion, OutputError, OutputSink, SpeakerSink};
pub use queue::PlaybackQueue;
