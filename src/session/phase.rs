//! Session phase types and status snapshot.

use serde::{Deserialize, Serialize};

/// Phase of a recording session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recording,
    Transcribing,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
        }
    }
}

impl Default for SessionPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Point-in-time view of the session, for UI callers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// Whole seconds elapsed; meaningful only while recording.
    pub duration_seconds: u64,
    pub transcript: Option<String>,
    pub error: Option<String>,
    pub is_supported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::Recording.as_str(), "recording");
        assert_eq!(SessionPhase::Transcribing.as_str(), "transcribing");
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&SessionPhase::Recording).unwrap();
        assert_eq!(json, "\"recording\"");

        let parsed: SessionPhase = serde_json::from_str("\"transcribing\"").unwrap();
        assert_eq!(parsed, SessionPhase::Transcribing);
    }

    #[test]
    fn test_phase_default_is_idle() {
        assert_eq!(SessionPhase::default(), SessionPhase::Idle);
    }

    #[test]
    fn test_status_serialization() {
        let status = SessionStatus {
            phase: SessionPhase::Idle,
            duration_seconds: 0,
            transcript: Some("hello".to_string()),
            error: None,
            is_supported: true,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"phase\":\"idle\""));
        assert!(json.contains("\"transcript\":\"hello\""));
    }
}
