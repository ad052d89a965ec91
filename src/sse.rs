//! Server-sent event framing for [`StreamEvent`]s.
//!
//! A frame is `data: <json>\n\n`. JSON string escaping keeps newlines in
//! token text out of the frame, so one event is always one `data:` line.

use crate::protocol::StreamEvent;
use bytes::Bytes;

const DATA_PREFIX: &str = "data: ";
const FRAME_END: &str = "\n\n";

#[derive(Debug, thiserror::Error)]
#[error("failed to serialize {kind} event: {source}")]
pub struct FrameError {
    kind: &'static str,
    #[source]
    source: serde_json::Error,
}

pub fn encode_frame(event: &StreamEvent) -> Result<Bytes, FrameError> {
    let json = serde_json::to_string(event).map_err(|source| FrameError {
        kind: event_kind(event),
        source,
    })?;

    let mut frame = String::with_capacity(DATA_PREFIX.len() + json.len() + FRAME_END.len());
    frame.push_str(DATA_PREFIX);
    frame.push_str(&json);
    frame.push_str(FRAME_END);
    Ok(Bytes::from(frame))
}

fn event_kind(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::Start { .. } => "start",
        StreamEvent::ToolCall { .. } => "tool-call",
        StreamEvent::ToolResult { .. } => "tool-result",
        StreamEvent::Token { .. } => "token",
        StreamEvent::Done { .. } => "done",
        StreamEvent::Error { .. } => "error",
    }
}

/// Incremental decoder for an event stream arriving in arbitrary chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    ///
    /// Comment-only messages and payloads that are not a known event are
    /// skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let chunk = String::from_utf8_lossy(chunk);
        if chunk.contains('\r') {
            self.buffer.push_str(&chunk.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(&chunk);
        }

        let mut events = Vec::new();
        while let Some(idx) = self.buffer.find(FRAME_END) {
            let raw_event: String = self.buffer.drain(..idx + FRAME_END.len()).collect();

            if let Some(data) = extract_data(&raw_event[..idx]) {
                if let Ok(event) = serde_json::from_str::<StreamEvent>(&data) {
                    events.push(event);
                }
            }
        }
        events
    }
}

fn extract_data(raw: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in raw.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            data_lines.push(data.strip_prefix(' ').unwrap_or(data));
        }
    }

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token {
            text: text.to_string(),
        }
    }

    #[test]
    fn frame_is_single_data_line_with_blank_line_terminator() {
        let frame = encode_frame(&StreamEvent::Start {
            prompt: "hello".to_string(),
        })
        .unwrap();

        assert_eq!(
            &frame[..],
            b"data: {\"type\":\"start\",\"prompt\":\"hello\"}\n\n"
        );
    }

    #[test]
    fn newlines_in_text_are_escaped() {
        let frame = encode_frame(&token("line1\nline2")).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();

        let body = text.strip_suffix("\n\n").unwrap();
        assert!(!body.contains('\n'));
        assert!(!body.contains('\r'));

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(&frame), vec![token("line1\nline2")]);
    }

    #[test]
    fn error_messages_with_crlf_stay_in_one_frame() {
        let event = StreamEvent::Error {
            message: "upstream said:\r\n\r\nno".to_string(),
        };
        let frame = encode_frame(&event).unwrap();

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(&frame), vec![event]);
    }

    #[test]
    fn decoder_reassembles_split_chunks() {
        let mut bytes = encode_frame(&token("Hi")).unwrap().to_vec();
        bytes.extend_from_slice(&encode_frame(&token(" there")).unwrap());

        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for chunk in bytes.chunks(5) {
            events.extend(decoder.push(chunk));
        }

        assert_eq!(events, vec![token("Hi"), token(" there")]);
    }

    #[test]
    fn decoder_skips_comments_and_unknown_payloads() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(
            b": keep-alive\n\ndata: [DONE]\n\ndata:{\"type\":\"token\",\"content\":\"x\"}\r\n\r\n",
        );

        assert_eq!(events, vec![token("x")]);
    }
}
