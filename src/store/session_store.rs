use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use tokio::sync::{broadcast, RwLock};

use crate::api::types::{Session, SessionPatch};
use crate::store::types::{
    ConversationEntry, LastMessage, OrbState, PhaseInfo, ThinkingBlock, ThinkingPhase,
};

/// Maximum number of store change events to buffer
const MAX_EVENTS: usize = 256;

/// Change notifications for reactive consumers (the UI layer). Token-level
/// events carry the delta, not the whole accumulator.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    CurrentSessionChanged(Option<String>),
    SessionsChanged,
    SessionUpdated(String),
    OrbStateChanged { from: OrbState, to: OrbState },
    StreamTokenAppended(String),
    StreamingTextCleared,
    ThinkingBlockAdded(ThinkingBlock),
    ThinkingBlocksReplaced,
    WhitepaperSectionUpdated(String),
    WhitepaperSectionsReplaced,
    CompletionChanged(f32),
    PhaseInfoChanged(Option<PhaseInfo>),
    ConversationChanged,
    ErrorChanged(Option<String>),
}

/// Everything the store holds, snapshot-able in one clone.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub current_session: Option<Session>,
    pub sessions: Vec<Session>,
    pub orb_state: OrbState,
    pub streaming_text: String,
    pub thinking_blocks: Vec<ThinkingBlock>,
    pub whitepaper_sections: HashMap<String, String>,
    pub completion_pct: f32,
    pub phase_info: Option<PhaseInfo>,
    pub conversation_history: Vec<ConversationEntry>,
    pub last_message: Option<LastMessage>,
    pub last_error: Option<String>,
}

/// The session/thinking state container. Constructed by the composition
/// root and shared by reference; there is no global instance.
///
/// Every mutation takes the write lock once, so each named operation is
/// atomic. No clamping or transition checking happens here — callers own
/// those rules.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<RwLock<StoreState>>,
    event_sender: broadcast::Sender<StoreEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (event_sender, _) = broadcast::channel(MAX_EVENTS);
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            event_sender,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_sender.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine; state is still authoritative.
        let _ = self.event_sender.send(event);
    }

    // --- Snapshots and getters ---

    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.state.read().await.current_session.clone()
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.state
            .read()
            .await
            .current_session
            .as_ref()
            .map(|s| s.id.clone())
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.state.read().await.sessions.clone()
    }

    /// Name of a session as currently cached in the sessions list.
    pub async fn session_name(&self, session_id: &str) -> Option<String> {
        self.state
            .read()
            .await
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.name.clone())
    }

    pub async fn orb_state(&self) -> OrbState {
        self.state.read().await.orb_state
    }

    pub async fn streaming_text(&self) -> String {
        self.state.read().await.streaming_text.clone()
    }

    pub async fn thinking_blocks(&self) -> Vec<ThinkingBlock> {
        self.state.read().await.thinking_blocks.clone()
    }

    pub async fn count_blocks(&self, phase: ThinkingPhase) -> usize {
        self.state
            .read()
            .await
            .thinking_blocks
            .iter()
            .filter(|b| b.phase == phase)
            .count()
    }

    pub async fn whitepaper_sections(&self) -> HashMap<String, String> {
        self.state.read().await.whitepaper_sections.clone()
    }

    pub async fn completion_pct(&self) -> f32 {
        self.state.read().await.completion_pct
    }

    pub async fn phase_info(&self) -> Option<PhaseInfo> {
        self.state.read().await.phase_info.clone()
    }

    pub async fn conversation_history(&self) -> Vec<ConversationEntry> {
        self.state.read().await.conversation_history.clone()
    }

    pub async fn last_message(&self) -> Option<LastMessage> {
        self.state.read().await.last_message.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    // --- Session operations ---

    /// Replace the active session reference. Does not touch the list.
    pub async fn set_current_session(&self, session: Option<Session>) {
        let id = session.as_ref().map(|s| s.id.clone());
        {
            let mut state = self.state.write().await;
            state.current_session = session;
        }
        debug!("current session set to {id:?}");
        self.emit(StoreEvent::CurrentSessionChanged(id));
    }

    /// Replace the full session list.
    pub async fn set_sessions(&self, sessions: Vec<Session>) {
        {
            let mut state = self.state.write().await;
            state.sessions = sessions;
        }
        self.emit(StoreEvent::SessionsChanged);
    }

    /// Merge a partial update into the matching list entry and, when the id
    /// matches, the active session. Unmatched ids are no-ops and emit
    /// nothing.
    pub async fn update_session(&self, patch: SessionPatch) {
        let matched = {
            let mut state = self.state.write().await;
            let mut matched = false;
            for session in state.sessions.iter_mut() {
                if session.id == patch.id {
                    patch.apply_to(session);
                    matched = true;
                }
            }
            if let Some(current) = state.current_session.as_mut() {
                if current.id == patch.id {
                    patch.apply_to(current);
                    matched = true;
                }
            }
            matched
        };
        if matched {
            self.emit(StoreEvent::SessionUpdated(patch.id));
        }
    }

    // --- Orb state ---

    /// Replace the orb state. Transition legality is the caller's problem.
    pub async fn set_orb_state(&self, orb_state: OrbState) {
        let from = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut state.orb_state, orb_state)
        };
        if from != orb_state {
            debug!("orb state {from:?} -> {orb_state:?}");
            self.emit(StoreEvent::OrbStateChanged {
                from,
                to: orb_state,
            });
        }
    }

    // --- Streaming accumulator ---

    pub async fn append_stream_token(&self, text: &str) {
        {
            let mut state = self.state.write().await;
            state.streaming_text.push_str(text);
        }
        self.emit(StoreEvent::StreamTokenAppended(text.to_string()));
    }

    pub async fn clear_streaming_text(&self) {
        {
            let mut state = self.state.write().await;
            state.streaming_text.clear();
        }
        self.emit(StoreEvent::StreamingTextCleared);
    }

    // --- Thinking blocks ---

    /// Append a block with a fresh id and the current timestamp, returning
    /// the block as stored.
    pub async fn add_thinking_block(
        &self,
        phase: ThinkingPhase,
        content: impl Into<String>,
    ) -> ThinkingBlock {
        let block = ThinkingBlock::new(phase, content);
        {
            let mut state = self.state.write().await;
            state.thinking_blocks.push(block.clone());
        }
        self.emit(StoreEvent::ThinkingBlockAdded(block.clone()));
        block
    }

    /// Wholesale replace the block log (history reload, retry truncation).
    pub async fn set_thinking_blocks(&self, blocks: Vec<ThinkingBlock>) {
        {
            let mut state = self.state.write().await;
            state.thinking_blocks = blocks;
        }
        self.emit(StoreEvent::ThinkingBlocksReplaced);
    }

    pub async fn clear_thinking_blocks(&self) {
        self.set_thinking_blocks(Vec::new()).await;
    }

    // --- Whitepaper sections ---

    /// Set a single key's content, leaving other keys untouched.
    /// Last-write-wins per key.
    pub async fn update_whitepaper_section(&self, key: impl Into<String>, content: impl Into<String>) {
        let key = key.into();
        {
            let mut state = self.state.write().await;
            state.whitepaper_sections.insert(key.clone(), content.into());
        }
        self.emit(StoreEvent::WhitepaperSectionUpdated(key));
    }

    /// Wholesale replace the section map (session load).
    pub async fn set_whitepaper_sections(&self, sections: HashMap<String, String>) {
        {
            let mut state = self.state.write().await;
            state.whitepaper_sections = sections;
        }
        self.emit(StoreEvent::WhitepaperSectionsReplaced);
    }

    // --- Completion and phase ---

    /// Replace the completion percentage. Values outside [0,100] are the
    /// caller's responsibility; nothing is clamped here.
    pub async fn set_completion_pct(&self, pct: f32) {
        {
            let mut state = self.state.write().await;
            state.completion_pct = pct;
        }
        self.emit(StoreEvent::CompletionChanged(pct));
    }

    pub async fn set_phase_info(&self, phase_info: Option<PhaseInfo>) {
        {
            let mut state = self.state.write().await;
            state.phase_info = phase_info.clone();
        }
        self.emit(StoreEvent::PhaseInfoChanged(phase_info));
    }

    // --- Conversation log ---

    pub async fn add_conversation_entry(&self, role: impl Into<String>, text: impl Into<String>) {
        let entry = ConversationEntry {
            role: role.into(),
            text: text.into(),
            timestamp: chrono::Utc::now(),
        };
        {
            let mut state = self.state.write().await;
            state.conversation_history.push(entry);
        }
        self.emit(StoreEvent::ConversationChanged);
    }

    pub async fn clear_conversation(&self) {
        {
            let mut state = self.state.write().await;
            state.conversation_history.clear();
        }
        self.emit(StoreEvent::ConversationChanged);
    }

    // --- Retry support ---

    pub async fn set_last_message(&self, message: Option<LastMessage>) {
        let mut state = self.state.write().await;
        state.last_message = message;
    }

    pub async fn set_last_error(&self, error: Option<String>) {
        {
            let mut state = self.state.write().await;
            state.last_error = error.clone();
        }
        self.emit(StoreEvent::ErrorChanged(error));
    }
}
