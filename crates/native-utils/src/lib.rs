//! Microphone plumbing for the assistant: device selection, phrase capture
//! and the sample conversions needed before audio leaves the process.

pub mod audio;
pub mod device;
pub mod recorder;
