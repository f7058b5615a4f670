//! Orchestration between the API client and the session store: the orb
//! state machine, send/retry, event-to-mutation dispatch, session
//! lifecycle, and history reconstruction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::api::client::ApiClient;
use crate::api::events::BrainstormEvent;
use crate::api::stream::{spawn_event_reader, StreamItem};
use crate::api::types::{ConversationTurn, Session, SessionPatch, TurnRole, DEFAULT_SESSION_NAME};
use crate::store::types::{phase_name_for, LastMessage, OrbState, PhaseInfo, ThinkingPhase};
use crate::store::SessionStore;
use crate::utils::errors::MindForgeError;

/// Maximum number of notices to buffer for slow subscribers
const MAX_NOTICES: usize = 64;

/// User-visible notifications — the toast surface of the UI layer.
#[derive(Debug, Clone)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// Drives the store in response to user actions and stream events. One
/// instance per composition root; at most one brainstorm stream is open at
/// a time, guaranteed by the orb-state send guard.
pub struct ForgeController {
    api: ApiClient,
    store: Arc<SessionStore>,
    notice_sender: broadcast::Sender<Notice>,
    active_stream: Mutex<Option<CancellationToken>>,
}

impl ForgeController {
    pub fn new(api: ApiClient, store: Arc<SessionStore>) -> Self {
        let (notice_sender, _) = broadcast::channel(MAX_NOTICES);
        Self {
            api,
            store,
            notice_sender,
            active_stream: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Subscribe to user-visible notifications.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_sender.subscribe()
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notice_sender.send(notice);
    }

    // --- Session lifecycle ---

    /// Create a session with the server's placeholder name, make it active,
    /// and reset all per-session state.
    pub async fn new_session(&self) -> Result<Session, MindForgeError> {
        let session = self.api.create_session(None).await?;
        info!("created session {}", session.id);

        self.store.set_current_session(Some(session.clone())).await;
        let mut sessions = self.store.sessions().await;
        sessions.insert(0, session.clone());
        self.store.set_sessions(sessions).await;
        self.reset_session_state().await;
        Ok(session)
    }

    /// Reload the session list from the server.
    pub async fn refresh_sessions(&self) -> Result<(), MindForgeError> {
        let sessions = self.api.list_sessions().await?;
        self.store.set_sessions(sessions).await;
        Ok(())
    }

    /// Switch to a session: restore completion and phase from its record,
    /// then fetch its whitepaper and conversation history. Both fetches are
    /// discarded if the user switches again before they land.
    pub async fn select_session(&self, session: Session) -> Result<(), MindForgeError> {
        let session_id = session.id.clone();
        debug!("selecting session {session_id}");

        self.store.set_completion_pct(session.completion_pct).await;
        let phase_info = session.current_phase.map(|phase| PhaseInfo {
            current_phase: phase,
            phase_name: phase_name_for(phase).to_string(),
            next_milestone: None,
        });
        self.store.set_phase_info(phase_info).await;
        self.store.set_current_session(Some(session)).await;
        self.store.clear_streaming_text().await;
        self.store.set_last_message(None).await;
        self.store.set_last_error(None).await;

        self.load_whitepaper(&session_id).await;
        self.load_session_history(&session_id).await;
        Ok(())
    }

    /// Delete a session on the server and drop it locally. When it was the
    /// active session, all per-session state is cleared too.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), MindForgeError> {
        match self.api.delete_session(session_id).await {
            Ok(()) => {
                let sessions = self
                    .store
                    .sessions()
                    .await
                    .into_iter()
                    .filter(|s| s.id != session_id)
                    .collect();
                self.store.set_sessions(sessions).await;

                if self.store.current_session_id().await.as_deref() == Some(session_id) {
                    self.store.set_current_session(None).await;
                    self.reset_session_state().await;
                }
                self.notify(Notice::Info("Project deleted".to_string()));
                Ok(())
            }
            Err(err) => {
                warn!("failed to delete session {session_id}: {err}");
                self.notify(Notice::Error("Failed to delete project".to_string()));
                Err(err)
            }
        }
    }

    async fn reset_session_state(&self) {
        self.store.clear_thinking_blocks().await;
        self.store.clear_streaming_text().await;
        self.store.clear_conversation().await;
        self.store.set_whitepaper_sections(HashMap::new()).await;
        self.store.set_completion_pct(0.0).await;
        self.store.set_phase_info(None).await;
        self.store.set_last_message(None).await;
        self.store.set_last_error(None).await;
    }

    async fn load_whitepaper(&self, session_id: &str) {
        let result = self.api.get_whitepaper(session_id).await;
        // Stale-response guard: the user may have switched sessions while
        // the request was in flight.
        if self.store.current_session_id().await.as_deref() != Some(session_id) {
            debug!("discarding whitepaper response for inactive session {session_id}");
            return;
        }
        match result {
            Ok(data) => self.store.set_whitepaper_sections(data.sections).await,
            // No whitepaper yet is empty state, not an error.
            Err(err) => {
                debug!("no whitepaper for session {session_id}: {err}");
                self.store.set_whitepaper_sections(HashMap::new()).await;
            }
        }
    }

    async fn load_session_history(&self, session_id: &str) {
        let result = self.api.get_history(session_id).await;
        if self.store.current_session_id().await.as_deref() != Some(session_id) {
            debug!("discarding history response for inactive session {session_id}");
            return;
        }
        match result {
            Ok(turns) => {
                let blocks = reconstruct_thinking_blocks(&turns);
                self.store.set_thinking_blocks(blocks).await;
            }
            Err(err) => {
                warn!("failed to load history for session {session_id}: {err}");
                self.store.clear_thinking_blocks().await;
            }
        }
    }

    // --- Orb state machine (voice flow) ---

    /// idle -> listening when voice capture starts. Returns false when the
    /// transition is illegal (e.g. a stream is already in flight).
    pub async fn begin_listening(&self) -> bool {
        if self.store.orb_state().await != OrbState::Idle {
            return false;
        }
        self.store.set_orb_state(OrbState::Listening).await;
        true
    }

    /// listening -> processing -> thinking: capture stopped, send the
    /// transcript as a voice message. A blank transcript returns to idle.
    pub async fn finish_listening(&self, transcript: &str) -> Result<(), MindForgeError> {
        if self.store.orb_state().await != OrbState::Listening {
            return Ok(());
        }
        if transcript.trim().is_empty() {
            self.store.set_orb_state(OrbState::Idle).await;
            return Ok(());
        }
        self.store.set_orb_state(OrbState::Processing).await;
        self.dispatch_send(transcript, true, Some(transcript.to_string()))
            .await
    }

    // --- Sending ---

    /// Send a typed message: idle -> thinking directly. A send while any
    /// stream is in flight (orb != idle) is a rejected no-op.
    pub async fn send_message(
        &self,
        text: &str,
        is_voice: bool,
        raw_transcript: Option<String>,
    ) -> Result<(), MindForgeError> {
        if self.store.orb_state().await != OrbState::Idle {
            debug!("send rejected: a message is already in flight");
            return Ok(());
        }
        self.dispatch_send(text, is_voice, raw_transcript).await
    }

    /// The send path proper. Reached from idle (text) or processing (voice);
    /// the double-submit guard has already run.
    async fn dispatch_send(
        &self,
        text: &str,
        is_voice: bool,
        raw_transcript: Option<String>,
    ) -> Result<(), MindForgeError> {
        let text = text.trim().to_string();
        let Some(session_id) = self.store.current_session_id().await else {
            debug!("send rejected: no active session");
            self.store.set_orb_state(OrbState::Idle).await;
            return Ok(());
        };
        if text.is_empty() {
            self.store.set_orb_state(OrbState::Idle).await;
            return Ok(());
        }

        self.store.set_orb_state(OrbState::Thinking).await;
        self.store.clear_streaming_text().await;
        self.store.add_conversation_entry("user", text.as_str()).await;
        self.store
            .add_thinking_block(ThinkingPhase::UserMessage, text.as_str())
            .await;
        self.store
            .set_last_message(Some(LastMessage {
                text: text.clone(),
                is_voice,
                raw_transcript: raw_transcript.clone(),
            }))
            .await;
        self.store.set_last_error(None).await;

        // Captured before the stream runs so assistant blocks added during
        // it do not change the answer.
        let is_first_message = self
            .store
            .count_blocks(ThinkingPhase::UserMessage)
            .await
            <= 1;

        let response = match self
            .api
            .send_message(&session_id, &text, is_voice, raw_transcript.as_deref())
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.handle_stream_error(err).await;
                return Ok(());
            }
        };

        let cancel = CancellationToken::new();
        *self.active_stream.lock().await = Some(cancel.clone());
        let mut events = spawn_event_reader(response, cancel);

        let mut completed = false;
        let mut failure: Option<MindForgeError> = None;

        while let Some(item) = events.next().await {
            match item {
                Ok(StreamItem::Event(raw)) => match BrainstormEvent::parse(&raw) {
                    Some(event) => self.apply_event(&session_id, event).await,
                    // Malformed payloads are dropped; framing already
                    // guaranteed this was a whole event.
                    None => {}
                },
                Ok(StreamItem::Done) => {
                    completed = true;
                    break;
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        *self.active_stream.lock().await = None;

        if let Some(err) = failure {
            self.handle_stream_error(err).await;
        } else if completed {
            self.handle_stream_done(&session_id, &text, is_first_message)
                .await;
        }
        // Neither: the stream was cancelled. Silent by contract; whoever
        // cancelled owns the state cleanup.
        Ok(())
    }

    /// Cancel the in-flight stream, if any, and return the orb to idle.
    /// Cancellation never surfaces as an error or a notice.
    pub async fn cancel_stream(&self) {
        let token = self.active_stream.lock().await.take();
        if let Some(token) = token {
            debug!("cancelling in-flight brainstorm stream");
            token.cancel();
            self.store.set_orb_state(OrbState::Idle).await;
            self.store.clear_streaming_text().await;
        }
    }

    /// Re-send the last message after a stream error: drop the duplicate
    /// user_message block, clear the error, and go through the normal path.
    pub async fn retry(&self) -> Result<(), MindForgeError> {
        let Some(last) = self.store.last_message().await else {
            return Ok(());
        };

        let blocks = self.store.thinking_blocks().await;
        if let Some(idx) = blocks
            .iter()
            .rposition(|b| b.phase == ThinkingPhase::UserMessage)
        {
            self.store.set_thinking_blocks(blocks[..idx].to_vec()).await;
        }
        self.store.set_last_error(None).await;

        self.send_message(&last.text, last.is_voice, last.raw_transcript)
            .await
    }

    async fn handle_stream_error(&self, err: MindForgeError) {
        warn!("brainstorm stream failed: {err}");
        self.store.set_orb_state(OrbState::Idle).await;
        self.store.clear_streaming_text().await;
        self.store.set_last_error(Some(err.to_string())).await;
        self.notify(Notice::Error(
            "Something went wrong. Use the retry button to try again.".to_string(),
        ));
    }

    async fn handle_stream_done(&self, session_id: &str, text: &str, is_first_message: bool) {
        self.store.set_orb_state(OrbState::Idle).await;
        self.store.clear_streaming_text().await;

        if !is_first_message {
            return;
        }
        // First-message auto-naming, only while the placeholder name is
        // still in place. Cosmetic: failures are swallowed.
        if self.store.session_name(session_id).await.as_deref() != Some(DEFAULT_SESSION_NAME) {
            return;
        }
        let auto_name = derive_session_name(text);
        match self.api.rename_session(session_id, &auto_name).await {
            Ok(updated) => {
                self.store
                    .update_session(SessionPatch::rename(session_id, updated.name))
                    .await;
            }
            Err(err) => debug!("auto-naming failed: {err}"),
        }
    }

    // --- Event dispatch ---

    async fn apply_event(&self, session_id: &str, event: BrainstormEvent) {
        match event {
            BrainstormEvent::Token { text } => {
                self.store.append_stream_token(&text).await;
            }
            BrainstormEvent::Analysis { content } => {
                self.store
                    .add_thinking_block(ThinkingPhase::Analysis, content)
                    .await;
                // The discrete analysis block supersedes the token buffer.
                self.store.clear_streaming_text().await;
            }
            BrainstormEvent::Gaps { content } => {
                self.store
                    .add_thinking_block(ThinkingPhase::Gaps, content)
                    .await;
            }
            BrainstormEvent::Insights { content } => {
                self.store
                    .add_thinking_block(ThinkingPhase::Insights, content)
                    .await;
            }
            BrainstormEvent::Questions { content } => {
                self.store
                    .add_thinking_block(ThinkingPhase::Questions, content)
                    .await;
            }
            BrainstormEvent::WhitepaperUpdate(sections) => {
                for (key, content) in sections {
                    self.store.update_whitepaper_section(key, content).await;
                }
                self.store
                    .add_thinking_block(ThinkingPhase::WhitepaperUpdate, "Spec updated")
                    .await;
            }
            BrainstormEvent::NewRules { count, .. } => {
                if count > 0 {
                    self.store
                        .add_thinking_block(
                            ThinkingPhase::NewRules,
                            format!("Learned {count} new rule(s) from this conversation"),
                        )
                        .await;
                }
            }
            BrainstormEvent::Completion { pct } => {
                self.store.set_completion_pct(pct).await;
            }
            BrainstormEvent::Phase(info) => {
                self.store.set_phase_info(Some(info)).await;
            }
            BrainstormEvent::NicheClassified { niche } => {
                if self.store.current_session_id().await.as_deref() == Some(session_id) {
                    self.store
                        .update_session(SessionPatch::niche(session_id, niche.clone()))
                        .await;
                }
                self.notify(Notice::Info(format!("Business type identified: {niche}")));
            }
            // Display-only or reserved; no state mutation.
            BrainstormEvent::Transcript { .. }
            | BrainstormEvent::StreamError { .. }
            | BrainstormEvent::Status { .. } => {}
            BrainstormEvent::Unknown { event_type } => {
                debug!("ignoring unknown stream event type: {event_type}");
            }
        }
    }

    // --- Whitepaper ---

    /// Generate the final whitepaper markdown for the active session.
    pub async fn generate_whitepaper(&self) -> Result<String, MindForgeError> {
        let Some(session_id) = self.store.current_session_id().await else {
            return Err(MindForgeError::Unknown("no active session".to_string()));
        };
        self.api.generate_whitepaper(&session_id).await
    }
}

/// Rebuild the thinking-block log from stored conversation turns so a
/// reloaded session renders exactly like a freshly streamed one: one
/// user_message block per user turn with cleaned text, then up to four
/// blocks per assistant turn in analysis/gaps/insights/questions order.
pub fn reconstruct_thinking_blocks(
    turns: &[ConversationTurn],
) -> Vec<crate::store::types::ThinkingBlock> {
    use crate::store::types::ThinkingBlock;

    let mut blocks = Vec::new();
    for turn in turns {
        let timestamp = parse_turn_timestamp(&turn.created_at);
        match turn.role {
            TurnRole::User => {
                if let Some(text) = non_empty(turn.cleaned_text.as_deref()) {
                    blocks.push(ThinkingBlock::at(
                        ThinkingPhase::UserMessage,
                        text,
                        timestamp,
                    ));
                }
            }
            TurnRole::Assistant => {
                let fields = [
                    (ThinkingPhase::Analysis, turn.analysis.as_deref()),
                    (ThinkingPhase::Gaps, turn.gaps.as_deref()),
                    (ThinkingPhase::Insights, turn.insights.as_deref()),
                    (ThinkingPhase::Questions, turn.questions.as_deref()),
                ];
                for (phase, field) in fields {
                    if let Some(text) = non_empty(field) {
                        blocks.push(ThinkingBlock::at(phase, text, timestamp));
                    }
                }
            }
        }
    }
    blocks
}

fn non_empty(field: Option<&str>) -> Option<&str> {
    field.filter(|text| !text.trim().is_empty())
}

/// Server timestamps arrive either as RFC 3339 or as SQLite's
/// `YYYY-MM-DD HH:MM:SS`. Unparseable values fall back to now rather than
/// dropping the turn.
fn parse_turn_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }
    Utc::now()
}

/// Derive a session name from the first message: at most eight words,
/// truncated to at most fifty characters on a word boundary.
pub fn derive_session_name(text: &str) -> String {
    let joined = text
        .split_whitespace()
        .take(8)
        .collect::<Vec<_>>()
        .join(" ");
    if joined.chars().count() <= 50 {
        return joined;
    }

    let mut cut = 0;
    for (count, (byte_idx, ch)) in joined.char_indices().enumerate() {
        if count > 50 {
            break;
        }
        if ch == ' ' {
            cut = byte_idx;
        }
    }
    if cut == 0 {
        joined.chars().take(50).collect()
    } else {
        joined[..cut].to_string()
    }
}
