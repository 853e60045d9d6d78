//! Incremental server-sent-event decoding.
//!
//! Bytes arrive in arbitrary slices; multi-byte UTF-8 sequences and lines may
//! straddle slice boundaries. Each `data:` line is surfaced as one payload as
//! soon as its line terminator arrives; other fields and comments are ignored.

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending_bytes: Vec<u8>,
    line: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning the payloads of completed `data:` lines.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending_bytes) {
            Ok(text) => text.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            // Invalid sequence: decode lossily rather than stall the stream.
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending_bytes).into_owned();
                self.pending_bytes.clear();
                return self.push_text(&text);
            }
        };
        let tail = self.pending_bytes.split_off(valid);
        let head = std::mem::replace(&mut self.pending_bytes, tail);
        let text = String::from_utf8_lossy(&head).into_owned();
        self.push_text(&text)
    }

    /// Flush whatever remains once the body has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.pending_bytes.is_empty() {
            let text = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            out.extend(self.push_text(&text));
        }
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            handle_line(&line, &mut out);
        }
        out
    }

    fn push_text(&mut self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line);
                handle_line(line.strip_suffix('\r').unwrap_or(&line), &mut out);
            } else {
                self.line.push(ch);
            }
        }
        out
    }
}

fn handle_line(line: &str, out: &mut Vec<String>) {
    if let Some(value) = line.strip_prefix("data:") {
        let value = value.strip_prefix(' ').unwrap_or(value);
        if !value.trim().is_empty() {
            out.push(value.to_string());
        }
    }
}
