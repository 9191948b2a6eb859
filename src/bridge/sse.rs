/// Incremental decoder for a `text/event-stream` body
///
/// Bytes are pushed as they arrive from the network. Each complete line is
/// inspected: `data:` lines yield their payload, comments (`: keep-alive`)
/// and other SSE fields are skipped. A line that grows past `limit` bytes
/// without a newline is discarded.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    limit: usize,
    discarding: bool,
}

impl SseDecoder {
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit: limit.max(1),
            discarding: false,
        }
    }

    /// Feed a network chunk, returning every payload it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut payloads = Vec::new();
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();

            if self.discarding {
                // Tail of an oversized line
                self.discarding = false;
                continue;
            }

            if let Some(payload) = Self::decode_line(&line) {
                payloads.push(payload);
            }
        }

        if self.buffer.len() > self.limit {
            log::warn!(
                "SSE line exceeded {} bytes without a newline, discarding",
                self.limit
            );
            self.buffer.clear();
            self.discarding = true;
        }

        payloads
    }

    /// Bytes currently waiting for a line terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn decode_line(line: &[u8]) -> Option<String> {
        let line = match std::str::from_utf8(line) {
            Ok(s) => s.trim(),
            Err(e) => {
                log::warn!("Skipping non UTF-8 SSE line: {}", e);
                return None;
            }
        };

        if line.is_empty() || line.starts_with(':') {
            return None;
        }

        if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim_start();
            return if data.is_empty() || data == "keep-alive" {
                None
            } else {
                Some(data.to_string())
            };
        }

        if ["event:", "id:", "retry:"].iter().any(|field| line.starts_with(field)) {
            return None;
        }

        // Some producers push bare JSON lines without the `data:` field
        Some(line.to_string())
    }
}
