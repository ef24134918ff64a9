// Talkback - playback and persistence core for voice-agent front-ends
// Module declarations
pub mod db;
pub mod payload;
pub mod playback;

pub use db::{DatabaseConnection, UserOps};
pub use payload::{encode_payload, AudioClip, AudioPayload, PayloadError};
pub use playback::{OutputSink, PlaybackQueue, SpeakerSink};
