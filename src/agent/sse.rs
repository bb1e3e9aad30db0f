// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use futures::{Stream, StreamExt};
use std::pin::Pin;

use super::event::Event;
use super::EventStream;
use crate::error::{ApiError, BridgeError};

/// Raw body chunks; transport errors are pre-rendered to strings
pub(crate) type ByteChunks =
    Pin<Box<dyn Stream<Item = std::result::Result<Vec<u8>, String>> + Send>>;

/// Turn a raw byte stream into validated feed events.
///
/// Frames are separated by a blank line; only `data:` lines carry payload.
/// Frames that are not JSON or have no `type` are skipped.
pub(crate) fn event_stream(chunks: ByteChunks) -> EventStream {
    let stream = async_stream::try_stream! {
        let mut chunks = chunks;
        let mut buffer = String::new();
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| BridgeError::Api(ApiError::StreamError(e)))?;
            pending.extend_from_slice(&chunk);
            decode_available(&mut pending, &mut buffer);
            if buffer.contains('\r') {
                buffer = buffer.replace("\r\n", "\n");
            }

            while let Some(pos) = buffer.find("\n\n") {
                let frame = buffer[..pos].to_string();
                buffer.drain(..pos + 2);

                if let Some(event) = parse_sse_frame(&frame) {
                    yield event;
                }
            }
        }

        buffer.push_str(&String::from_utf8_lossy(&pending));
        if let Some(event) = parse_sse_frame(&buffer) {
            yield event;
        }
    };
    Box::pin(stream)
}

/// Move the decodable prefix of `pending` into `buffer`. A multi-byte
/// character cut at a chunk boundary stays pending until its tail arrives.
fn decode_available(pending: &mut Vec<u8>, buffer: &mut String) {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            buffer.push_str(text);
            pending.clear();
        }
        Err(err) if err.error_len().is_none() => {
            let valid = err.valid_up_to();
            buffer.push_str(&String::from_utf8_lossy(&pending[..valid]));
            pending.drain(..valid);
        }
        Err(_) => {
            buffer.push_str(&String::from_utf8_lossy(pending));
            pending.clear();
        }
    }
}

/// Adapt a reqwest body into the chunk stream `event_stream` expects.
pub(crate) fn from_response(response: reqwest::Response) -> EventStream {
    let chunks = response
        .bytes_stream()
        .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| e.to_string()));
    event_stream(Box::pin(chunks))
}

/// Parse one server-sent event frame.
pub(crate) fn parse_sse_frame(frame: &str) -> Option<Event> {
    let data = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect::<Vec<_>>()
        .join("\n");

    if data.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(&data) {
        Ok(value) => Event::from_value(value),
        Err(err) => {
            tracing::debug!(error = %err, "skipping non-JSON event frame");
            None
        }
    }
}
