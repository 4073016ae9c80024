//! Server-sent events decoding for streaming chat completions.
//!
//! Turns the raw response body into the text deltas it carries. Lines may arrive split across
//! network chunks, including in the middle of a multi-byte character.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::api::{ApiError, ErrorBody};

const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine {
    Text(String),
    Done,
    Failed(String),
    Skip,
}

/// Converts a response body into a stream of text chunks.
///
/// The stream ends at the `[DONE]` marker, at the end of the body, or right after yielding the
/// first error.
pub fn sse_to_text_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, ApiError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut byte_stream = std::pin::pin!(byte_stream);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(ApiError::Stream(err.to_string()));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&raw);
                match parse_sse_line(line.trim()) {
                    SseLine::Text(text) => yield Ok(text),
                    SseLine::Done => return,
                    SseLine::Failed(message) => {
                        yield Err(ApiError::from_message(&message));
                        return;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        // A final event without a trailing newline.
        let rest = String::from_utf8_lossy(&buffer).trim().to_owned();
        if let SseLine::Text(text) = parse_sse_line(&rest) {
            yield Ok(text);
        }
    }
}

/// Classifies one trimmed SSE line.
pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let payload = payload.trim_start();
    if payload == DONE_MARKER {
        return SseLine::Done;
    }

    if let Ok(response) = serde_json::from_str::<StreamResponse>(payload) {
        let content: String = response
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .collect();
        if !content.is_empty() {
            return SseLine::Text(content);
        }
    }

    match serde_json::from_str::<ErrorBody>(payload) {
        Ok(body) => SseLine::Failed(body.error.describe()),
        Err(_) => SseLine::Skip,
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn text(s: &str) -> SseLine {
        SseLine::Text(s.to_owned())
    }

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_sse_line(line), text("Hello"));
    }

    #[test]
    fn accepts_data_prefix_without_space() {
        let line = r#"data:{"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(parse_sse_line(line), text("Hi"));
    }

    #[test]
    fn empty_or_missing_content_is_skipped() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#),
            SseLine::Skip
        );
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseLine::Skip
        );
        assert_eq!(parse_sse_line(r#"data: {"choices":[]}"#), SseLine::Skip);
    }

    #[test]
    fn multiple_choices_are_concatenated() {
        let line =
            r#"data: {"choices":[{"delta":{"content":"Hello"}},{"delta":{"content":" World"}}]}"#;
        assert_eq!(parse_sse_line(line), text("Hello World"));
    }

    #[test]
    fn choice_without_delta_keeps_sibling_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"kept"}},{"index":1,"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line), text("kept"));
    }

    #[test]
    fn done_marker_comments_and_garbage() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("event: message"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: not json"), SseLine::Skip);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
    }

    #[test]
    fn error_event_is_reported() {
        let line = r#"data: {"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
        assert!(matches!(parse_sse_line(line), SseLine::Failed(_)));
    }

    #[tokio::test]
    async fn reassembles_lines_and_characters_split_across_chunks() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"こん\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"にちは\"}}]}\n\n\
                    data: [DONE]\n\n";
        let bytes = body.as_bytes();
        // Split inside the first multi-byte character.
        let split = body.find("こ").expect("marker") + 1;
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ];

        let collected: Vec<String> = sse_to_text_stream(stream::iter(chunks))
            .map(|item| item.expect("chunk"))
            .collect()
            .await;
        assert_eq!(collected, ["こん", "にちは"]);
    }

    #[tokio::test]
    async fn stops_at_done_marker() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\
                    data: [DONE]\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n";
        let chunks = vec![Ok::<_, std::io::Error>(Bytes::from(body))];
        let collected: Vec<_> = sse_to_text_stream(stream::iter(chunks)).collect().await;
        assert_eq!(collected.len(), 1);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let chunks = vec![
            Ok(Bytes::from("data: {\"choices\":[{\"delta\":{\"content\":\"part\"}}]}\n")),
            Err(std::io::Error::other("connection reset")),
            Ok(Bytes::from("data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n")),
        ];
        let collected: Vec<_> = sse_to_text_stream(stream::iter(chunks)).collect().await;
        assert_eq!(collected.len(), 2);
        assert!(matches!(collected[0], Ok(ref t) if t == "part"));
        assert!(matches!(collected[1], Err(ApiError::Stream(_))));
    }
}
