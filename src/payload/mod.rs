// Audio payload transport module
// Encodes and decodes the base64 f32 records sent to the playback side

pub mod codec;

pub use codec::{encode_payload, AudioClip, AudioPayload, PayloadError};
