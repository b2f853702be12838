//! Incremental Server-Sent Events framing for upstream provider streams.

/// Reassembles SSE frames from arbitrarily split network reads.
///
/// Bytes are buffered raw so a multi-byte character split across two reads is
/// decoded intact. Carriage returns are dropped, making `\r\n\r\n` and `\n\n`
/// equivalent frame terminators.
#[derive(Debug, Default)]
pub struct SseFrameBuffer {
    buffer: Vec<u8>,
}

impl SseFrameBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(8192),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer
            .extend(bytes.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Data payload of the next complete frame, skipping comment and
    /// event-only frames. Multi-line `data:` fields are joined with `\n`.
    pub fn next_data(&mut self) -> Option<String> {
        loop {
            let pos = self.buffer.windows(2).position(|w| w == b"\n\n")?;
            let frame: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            if let Some(data) = frame_data(&frame[..pos]) {
                return Some(data);
            }
        }
    }

    /// Data payload of whatever is left once the upstream closed without a
    /// trailing blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        frame_data(&rest)
    }
}

fn frame_data(frame: &[u8]) -> Option<String> {
    let frame = String::from_utf8_lossy(frame);
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
