use log::debug;
use serde::Deserialize;
use std::collections::HashMap;

use super::stream::RawEvent;
use crate::store::types::PhaseInfo;

/// Everything the brainstorm stream can carry, as a closed enum so dispatch
/// is exhaustive. Event types the client does not know yet land in
/// `Unknown` instead of breaking the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BrainstormEvent {
    /// One incremental token of in-flight model output
    Token { text: String },
    /// A finished analysis block; supersedes the token accumulator
    Analysis { content: String },
    Gaps { content: String },
    Insights { content: String },
    Questions { content: String },
    /// Section key to new content, one or more sections per event
    WhitepaperUpdate(HashMap<String, String>),
    NewRules { count: u32, rules: Vec<String> },
    /// Overall completion percentage for the session
    Completion { pct: f32 },
    Phase(PhaseInfo),
    NicheClassified { niche: String },
    /// Voice transcript cleanup result; display-only
    Transcript { raw: String, cleaned: String },
    /// In-band error report from the generation pipeline
    StreamError { message: String },
    /// Pipeline progress marker; reserved, no state mutation
    Status { status: String },
    Unknown { event_type: String },
}

#[derive(Deserialize)]
struct TokenPayload {
    text: String,
}

#[derive(Deserialize)]
struct ContentPayload {
    content: String,
}

#[derive(Deserialize)]
struct NewRulesPayload {
    count: u32,
    #[serde(default)]
    rules: Vec<String>,
}

#[derive(Deserialize)]
struct CompletionPayload {
    pct: f32,
}

#[derive(Deserialize)]
struct NichePayload {
    niche: String,
}

#[derive(Deserialize)]
struct TranscriptPayload {
    raw: String,
    cleaned: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Deserialize)]
struct StatusPayload {
    status: String,
}

impl BrainstormEvent {
    /// Parse a framed event into its typed form. Returns `None` when the
    /// payload is not the JSON the event type requires; the caller drops
    /// such events without aborting the stream.
    pub fn parse(raw: &RawEvent) -> Option<Self> {
        let event = match raw.event_type.as_str() {
            "token" => {
                let p: TokenPayload = Self::payload(raw)?;
                BrainstormEvent::Token { text: p.text }
            }
            "analysis" => {
                let p: ContentPayload = Self::payload(raw)?;
                BrainstormEvent::Analysis { content: p.content }
            }
            "gaps" => {
                let p: ContentPayload = Self::payload(raw)?;
                BrainstormEvent::Gaps { content: p.content }
            }
            "insights" => {
                let p: ContentPayload = Self::payload(raw)?;
                BrainstormEvent::Insights { content: p.content }
            }
            "questions" => {
                let p: ContentPayload = Self::payload(raw)?;
                BrainstormEvent::Questions { content: p.content }
            }
            "whitepaper_update" => {
                let sections: HashMap<String, String> = Self::payload(raw)?;
                BrainstormEvent::WhitepaperUpdate(sections)
            }
            "new_rules" => {
                let p: NewRulesPayload = Self::payload(raw)?;
                BrainstormEvent::NewRules {
                    count: p.count,
                    rules: p.rules,
                }
            }
            "completion" => {
                let p: CompletionPayload = Self::payload(raw)?;
                BrainstormEvent::Completion { pct: p.pct }
            }
            "phase_info" => {
                let info: PhaseInfo = Self::payload(raw)?;
                BrainstormEvent::Phase(info)
            }
            "niche_classified" => {
                let p: NichePayload = Self::payload(raw)?;
                BrainstormEvent::NicheClassified { niche: p.niche }
            }
            "transcript" => {
                let p: TranscriptPayload = Self::payload(raw)?;
                BrainstormEvent::Transcript {
                    raw: p.raw,
                    cleaned: p.cleaned,
                }
            }
            "error" => {
                let p: ErrorPayload = Self::payload(raw)?;
                BrainstormEvent::StreamError { message: p.message }
            }
            "status" => {
                let p: StatusPayload = Self::payload(raw)?;
                BrainstormEvent::Status { status: p.status }
            }
            other => BrainstormEvent::Unknown {
                event_type: other.to_string(),
            },
        };
        Some(event)
    }

    fn payload<'a, T: Deserialize<'a>>(raw: &'a RawEvent) -> Option<T> {
        match serde_json::from_str(&raw.data) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(
                    "dropping {} event with unparseable payload: {err}",
                    raw.event_type
                );
                None
            }
        }
    }
}
