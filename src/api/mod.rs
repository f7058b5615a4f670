//! Remote brainstorm API: wire types, HTTP client, and the event-stream
//! decoder that turns a chunked response body into typed events.

pub mod client;
pub mod events;
pub mod stream;
pub mod types;

pub use client::ApiClient;
pub use events::BrainstormEvent;
pub use stream::{spawn_event_reader, EventStreamDecoder, RawEvent, StreamItem};
