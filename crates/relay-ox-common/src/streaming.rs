/// Line buffer for upstream `data:` framing.
///
/// Network reads do not respect line boundaries, so bytes are accumulated
/// until a `\n` arrives. Splitting on raw bytes keeps multi-byte UTF-8
/// sequences intact when a read ends in the middle of one.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read and return the data payloads of every line it
    /// completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = self.process_line(&line) {
                payloads.push(payload);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        payloads
    }

    /// Flush whatever is left once the upstream closes, even without a
    /// trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.process_line(&line)
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn process_line(&mut self, line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let trimmed = line.trim_end_matches(['\n', '\r']).trim_end();

        if trimmed.is_empty() || trimmed.starts_with(':') {
            return None;
        }

        // event:, id: and retry: carry nothing the chat framing needs
        let data = trimmed.strip_prefix("data:")?.trim_start();
        if data == "[DONE]" {
            self.done = true;
            return None;
        }
        if data.is_empty() {
            return None;
        }
        Some(data.to_string())
    }
}
