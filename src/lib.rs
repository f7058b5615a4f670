//! MindForge client core
//!
//! This crate is the headless core of the MindForge brainstorming UI: an HTTP
//! client for the session/whitepaper/brainstorm API, an incremental decoder
//! for the brainstorm event stream, and an observable session state container
//! that the UI layer renders from. The UI itself (orb rendering, thinking
//! stream display, voice capture) lives outside this crate and drives it
//! through [`ForgeController`].

/// HTTP API client, stream decoder, and typed events
pub mod api;

/// Configuration management
pub mod config;

/// Send/retry/session-lifecycle orchestration
pub mod controller;

/// Observable session state
pub mod store;

/// Utilities
pub mod utils;

// Re-export commonly used types
pub use api::client::ApiClient;
pub use config::MindForgeConfig;
pub use controller::{ForgeController, Notice};
pub use store::SessionStore;
pub use utils::init_logger;
