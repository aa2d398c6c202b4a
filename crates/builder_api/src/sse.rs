use crate::events::ChatStreamEvent;

/// Incremental line-oriented parser for the chat event stream.
///
/// Bytes are buffered until a full line arrives, so frames and multi-byte
/// UTF-8 sequences split across network reads are reassembled before
/// decoding.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=split).collect();
            if let Some(event) = parse_line(&line[..split]) {
                events.push(event);
            }
        }

        events
    }

    /// Parse whatever is left in the buffer as a final line.
    pub fn finish(&mut self) -> Vec<ChatStreamEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line).into_iter().collect()
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ChatStreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn parse_line(line: &[u8]) -> Option<ChatStreamEvent> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim_end_matches('\r').strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<ChatStreamEvent>(payload) {
        Ok(event) => Some(event),
        Err(error) => {
            tracing::debug!(%error, "skipping unrecognized chat frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SseStreamParser;
    use crate::events::ChatStreamEvent;

    #[test]
    fn parse_sse_frames_incrementally() {
        let mut parser = SseStreamParser::default();
        let mut events = Vec::new();

        events.extend(parser.feed(b"data: {\"type\":\"token\",\"content\":\"Hello\"}\n\n"));
        assert_eq!(events.len(), 1);

        events.extend(parser.feed(b"data: {\"type\":\"done\"}\n\n"));
        assert_eq!(events.last(), Some(&ChatStreamEvent::Done));
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn finish_flushes_unterminated_last_line() {
        let mut parser = SseStreamParser::default();
        assert!(parser.feed(b"data: {\"type\":\"done\"}").is_empty());
        assert_eq!(parser.finish(), vec![ChatStreamEvent::Done]);
        assert!(parser.is_empty_buffer());
    }
}
