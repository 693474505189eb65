//! voxnote: owns the lifecycle of a microphone recording session — start,
//! stop (manual or cap-triggered), chunk buffering — and hands the finished
//! recording to a transcription backend.

pub mod capture;
pub mod config;
pub mod session;
pub mod transcribe;
