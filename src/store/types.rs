use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level interaction/progress state of the voice UI. Exactly one holds
/// at any time; legal transitions are enforced by the controller, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbState {
    #[default]
    Idle,
    Listening,
    Processing,
    Thinking,
}

/// Which kind of conversational output a thinking block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingPhase {
    UserMessage,
    Analysis,
    Gaps,
    Insights,
    Questions,
    WhitepaperUpdate,
    NewRules,
}

/// One displayed unit of conversation or model reasoning output. Immutable
/// once appended; the log is only ever truncated (retry) or wholesale
/// replaced (history reload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingBlock {
    pub id: Uuid,
    pub phase: ThinkingPhase,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ThinkingBlock {
    /// A fresh block stamped now, for live streaming.
    pub fn new(phase: ThinkingPhase, content: impl Into<String>) -> Self {
        Self::at(phase, content, Utc::now())
    }

    /// A block with an explicit timestamp, for history reconstruction.
    pub fn at(phase: ThinkingPhase, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase,
            content: content.into(),
            timestamp,
        }
    }
}

/// Server-assigned phase progress. Wholesale-replaced, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub current_phase: u32,
    pub phase_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_milestone: Option<String>,
}

/// Display name for a phase number, used when restoring a session whose
/// record carries only the number.
pub fn phase_name_for(phase: u32) -> &'static str {
    match phase {
        1 => "Introduction",
        2 => "Foundation",
        3 => "Structure",
        4 => "Details",
        5 => "Design & Tech",
        6 => "Finalization",
        _ => "Unknown",
    }
}

/// The most recently sent user input, retained solely so the UI can offer a
/// retry after a stream error. Overwritten on every send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub text: String,
    pub is_voice: bool,
    pub raw_transcript: Option<String>,
}

/// Role-tagged entry in the lower-fidelity conversation log, kept parallel
/// to the thinking blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thinking_phase_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&ThinkingPhase::UserMessage).unwrap(),
            "\"user_message\""
        );
        assert_eq!(
            serde_json::to_string(&ThinkingPhase::WhitepaperUpdate).unwrap(),
            "\"whitepaper_update\""
        );
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(phase_name_for(1), "Introduction");
        assert_eq!(phase_name_for(6), "Finalization");
        assert_eq!(phase_name_for(0), "Unknown");
        assert_eq!(phase_name_for(7), "Unknown");
    }

    #[test]
    fn test_blocks_get_distinct_ids() {
        let a = ThinkingBlock::new(ThinkingPhase::Analysis, "x");
        let b = ThinkingBlock::new(ThinkingPhase::Analysis, "x");
        assert_ne!(a.id, b.id);
    }
}
