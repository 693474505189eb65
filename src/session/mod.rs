pub mod controller;
pub mod phase;

pub use controller::{
    SessionController, SessionPolicy, ERROR_MIC_UNAVAILABLE, ERROR_NO_AUDIO,
    ERROR_PERMISSION_DENIED, ERROR_RECORDER, ERROR_TOO_SHORT, ERROR_TRANSCRIPTION,
    ERROR_UNSUPPORTED,
};
pub use phase::{SessionPhase, SessionStatus};
