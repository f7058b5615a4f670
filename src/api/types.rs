use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name the server assigns to sessions created without one, and the marker
/// the auto-naming flow checks for after the first message.
pub const DEFAULT_SESSION_NAME: &str = "Untitled Project";

/// The fixed set of whitepaper section keys the server populates.
pub const WHITEPAPER_SECTIONS: [&str; 13] = [
    "project_overview",
    "philosophy_vision",
    "target_audience",
    "pain_points",
    "core_features",
    "pages_navigation",
    "user_flows",
    "data_model",
    "admin_cms",
    "security",
    "design_direction",
    "technical_considerations",
    "open_questions",
];

/// Human-readable label for a whitepaper section key.
pub fn section_label(key: &str) -> Option<&'static str> {
    match key {
        "project_overview" => Some("Project Overview"),
        "philosophy_vision" => Some("Philosophy & Vision"),
        "target_audience" => Some("Target Audience"),
        "pain_points" => Some("Pain Points Addressed"),
        "core_features" => Some("Core Features"),
        "pages_navigation" => Some("Pages & Navigation"),
        "user_flows" => Some("User Flows"),
        "data_model" => Some("Data Model"),
        "admin_cms" => Some("Admin & Content Management"),
        "security" => Some("Security Requirements"),
        "design_direction" => Some("Design Direction"),
        "technical_considerations" => Some("Technical Considerations"),
        "open_questions" => Some("Open Questions"),
        _ => None,
    }
}

/// A brainstorming project as the server reports it. The client holds a
/// cached copy; the server owns the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub completion_pct: f32,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<u32>,
}

/// Partial update merged into the matching session by id. `None` fields are
/// left untouched; unmatched ids are no-ops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub id: String,
    pub name: Option<String>,
    pub completion_pct: Option<f32>,
    pub status: Option<String>,
    pub niche_type: Option<String>,
    pub current_phase: Option<u32>,
}

impl SessionPatch {
    pub fn rename(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn niche(id: impl Into<String>, niche_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            niche_type: Some(niche_type.into()),
            ..Self::default()
        }
    }

    /// Apply this patch to a session in place.
    pub fn apply_to(&self, session: &mut Session) {
        if let Some(name) = &self.name {
            session.name = name.clone();
        }
        if let Some(pct) = self.completion_pct {
            session.completion_pct = pct;
        }
        if let Some(status) = &self.status {
            session.status = status.clone();
        }
        if let Some(niche) = &self.niche_type {
            session.niche_type = Some(niche.clone());
        }
        if let Some(phase) = self.current_phase {
            session.current_phase = Some(phase);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionList {
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub name: String,
}

/// One stored conversation turn, as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub session_id: String,
    pub role: TurnRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitepaper_updates: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub session_id: String,
    pub turns: Vec<ConversationTurn>,
}

/// Current whitepaper state for a session. Keys not yet populated are
/// absent, not empty-string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitepaperData {
    #[serde(default)]
    pub session_id: String,
    pub sections: HashMap<String, String>,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateWhitepaperResponse {
    #[serde(default)]
    pub session_id: String,
    pub whitepaper_markdown: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub text: String,
    pub is_voice: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_transcript: Option<String>,
}
