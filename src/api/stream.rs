use futures_util::StreamExt;
use log::{debug, trace, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::utils::errors::MindForgeError;

/// One framed event off the wire: the `event:` name and the raw `data:`
/// payload, before any JSON parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: String,
    pub data: String,
}

/// What the reader task delivers to its consumer. The channel closing
/// without a `Done` means the stream was cancelled.
#[derive(Debug)]
pub enum StreamItem {
    Event(RawEvent),
    Done,
}

/// Items from the spawned reader task, consumable as a `Stream`.
pub type EventReceiver = UnboundedReceiverStream<Result<StreamItem, MindForgeError>>;

/// Cap on bytes buffered while waiting for a newline. A stream that stops
/// terminating lines is stuck and gets failed instead of buffered forever.
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Incremental decoder for the brainstorm event stream.
///
/// The wire format is line-oriented: `event: <name>` sets the pending event
/// type, and the next `data: <payload>` line emits one frame. This is not
/// standard SSE — each event carries exactly one data line, and a second
/// `data:` line without a fresh `event:` line is dropped rather than merged.
///
/// Bytes are buffered until a newline arrives, so chunk boundaries falling
/// inside a line, a prefix, or a multi-byte character never split or
/// duplicate a frame. `\n` is ASCII, so slicing the buffer at the last
/// newline is always a character boundary.
#[derive(Debug)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    pending_event: Option<String>,
    max_buffer_size: usize,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::with_buffer_size(MAX_BUFFER_SIZE)
    }
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A decoder with a custom buffer cap.
    pub fn with_buffer_size(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            pending_event: None,
            max_buffer_size,
        }
    }

    /// Feed one chunk of bytes, returning every frame it completes, in wire
    /// order. Lines matching neither prefix are ignored. Fails only when the
    /// buffered unterminated remainder exceeds the cap.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<RawEvent>, MindForgeError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        if let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') {
            let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
            let text = String::from_utf8_lossy(&complete);

            for line in text.split('\n') {
                if let Some(name) = line.strip_prefix("event: ") {
                    self.pending_event = Some(name.trim().to_string());
                } else if let Some(payload) = line.strip_prefix("data: ") {
                    // Only meaningful once an event type is pending; a stray
                    // data line has nothing to attach to and is dropped.
                    if let Some(event_type) = self.pending_event.take() {
                        events.push(RawEvent {
                            event_type,
                            data: payload.to_string(),
                        });
                    }
                }
            }
        }

        // Complete lines were drained above, so only an over-long
        // unterminated line can trip this.
        if self.buffer.len() > self.max_buffer_size {
            return Err(MindForgeError::EventError(format!(
                "event stream buffered {} bytes without a newline (cap {})",
                self.buffer.len(),
                self.max_buffer_size
            )));
        }
        Ok(events)
    }

    /// End of stream. Any unterminated trailing partial line is discarded,
    /// never emitted.
    pub fn finish(self) {
        if !self.buffer.is_empty() {
            debug!(
                "discarding {} bytes of unterminated trailing data at end of stream",
                self.buffer.len()
            );
        }
    }
}

/// Drive a streaming response body through the decoder on a spawned task.
///
/// Frames arrive on the returned receiver in wire order, followed by exactly
/// one `Done` on normal end-of-stream or exactly one error on transport
/// failure. Cancelling the token stops the read loop promptly and closes the
/// channel with neither — cancellation is silent by contract.
pub fn spawn_event_reader(response: reqwest::Response, cancel: CancellationToken) -> EventReceiver {
    let (sender, receiver) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut decoder = EventStreamDecoder::new();

        loop {
            tokio::select! {
                // Cancellation wins over a ready chunk so it takes effect
                // promptly even on a fast stream.
                biased;
                _ = cancel.cancelled() => {
                    debug!("event stream cancelled by caller");
                    return;
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        let events = match decoder.feed(&bytes) {
                            Ok(events) => events,
                            Err(err) => {
                                warn!("event stream decode failure: {err}");
                                let _ = sender.send(Err(err));
                                return;
                            }
                        };
                        for event in events {
                            trace!("stream event: {}", event.event_type);
                            if sender.send(Ok(StreamItem::Event(event))).is_err() {
                                // Receiver dropped; nobody is listening.
                                return;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        warn!("event stream transport failure: {err}");
                        let _ = sender.send(Err(MindForgeError::NetworkError(err.to_string())));
                        return;
                    }
                    None => {
                        decoder.finish();
                        let _ = sender.send(Ok(StreamItem::Done));
                        return;
                    }
                }
            }
        }
    });

    UnboundedReceiverStream::new(receiver)
}
