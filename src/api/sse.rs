//! Server-sent events decoding for streamed chat completions.

use super::types::ChatChunk;
use crate::error::{AgError, Result};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Splits a byte stream into `data:` payloads. Bytes are held until a full
/// line is available, so multi-byte characters may straddle chunks.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>> {
        self.pending.extend_from_slice(bytes);
        let Some(end) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete: Vec<u8> = self.pending.drain(..=end).collect();
        decode_lines(complete)
    }

    /// Flushes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Result<Vec<SseEvent>> {
        let rest = std::mem::take(&mut self.pending);
        decode_lines(rest)
    }
}

fn decode_lines(bytes: Vec<u8>) -> Result<Vec<SseEvent>> {
    let text = String::from_utf8(bytes)
        .map_err(|e| AgError::Stream(format!("Invalid UTF-8 in stream: {}", e)))?;
    Ok(text.lines().filter_map(parse_line).collect())
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.trim_end_matches('\r').strip_prefix("data:")?.trim_start();
    if data.trim() == "[DONE]" {
        Some(SseEvent::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

struct DeltaState<S> {
    bytes: S,
    decoder: SseDecoder,
    ready: VecDeque<Result<String>>,
    finished: bool,
}

impl<S> DeltaState<S> {
    fn enqueue(&mut self, events: Result<Vec<SseEvent>>) {
        let events = match events {
            Ok(events) => events,
            Err(e) => {
                self.fail(e);
                return;
            }
        };

        for event in events {
            match event {
                SseEvent::Done => {
                    self.finished = true;
                    return;
                }
                SseEvent::Data(data) => match serde_json::from_str::<ChatChunk>(&data) {
                    Ok(chunk) => {
                        if let Some(message) = chunk.error_message() {
                            tracing::warn!(error = %message, "Provider reported an error");
                            self.fail(AgError::Stream(format!("Provider error: {}", message)));
                            return;
                        }
                        if let Some(content) = chunk.into_content() {
                            self.ready.push_back(Ok(content));
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, chunk = %data, "Malformed stream chunk");
                        self.fail(AgError::Stream(format!("Malformed chunk: {}", e)));
                        return;
                    }
                },
            }
        }
    }

    fn fail(&mut self, error: AgError) {
        self.finished = true;
        self.ready.push_back(Err(error));
    }
}

/// Turns a raw SSE byte stream into the sequence of content deltas.
///
/// Ends at `data: [DONE]` or when the body closes. The first transport error
/// or malformed chunk is yielded as an `Err` and ends the sequence.
pub fn decode_deltas<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DeltaState {
        bytes,
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(chunk.as_ref());
                    state.enqueue(events);
                }
                Some(Err(e)) => {
                    state.fail(AgError::Stream(format!("Error in HTTP stream: {}", e)));
                }
                None => {
                    let events = state.decoder.finish();
                    state.enqueue(events);
                    state.finished = true;
                }
            }
        }
    })
}
