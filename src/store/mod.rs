//! Observable client state: the session list, thinking-block log, streaming
//! accumulator, whitepaper sections, and orb state.

pub mod session_store;
pub mod types;

pub use session_store::{SessionStore, StoreEvent};
pub use types::{
    ConversationEntry, LastMessage, OrbState, PhaseInfo, ThinkingBlock, ThinkingPhase,
};
