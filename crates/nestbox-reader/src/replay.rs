//! Scripted frame playback.
//!
//! A replay script is JSON lines, one frame per line: the millisecond
//! offset at which it becomes due and its raw bytes as hex text.
//!
//! ```text
//! {"at_ms": 0, "frame": "02 30 32 30 30 33 45 39 38 43 38 03"}
//! {"at_ms": 4500, "frame": "02 30 32 30 30 32 44 35 41 34 41 03"}
//! ```
//!
//! Playback runs against real elapsed time since the reader was built,
//! handing out due frames one per call. Entries at offset zero are due
//! immediately, which is what loop tests want: one frame per tick, no
//! waiting.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::capture::TagReader;
use crate::error::ReaderError;

/// One scripted frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEntry {
    /// When this frame becomes due, relative to playback start.
    pub at_ms: u64,
    /// Raw frame bytes as hex text; whitespace is ignored.
    pub frame: String,
}

/// Plays a frame script back in due order. Resets are counted and
/// otherwise ignored; there is no hardware to power-cycle.
#[derive(Debug)]
pub struct ReplayReader {
    entries: VecDeque<(u64, Vec<u8>)>,
    epoch: Instant,
    resets: usize,
}

impl ReplayReader {
    pub fn new(entries: Vec<ReplayEntry>) -> Result<Self, ReaderError> {
        let mut parsed = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            parsed.push((entry.at_ms, parse_entry_frame(entry, idx + 1)?));
        }
        Ok(Self::from_parts(parsed))
    }

    /// Parse a JSON-lines script. Blank lines and `#` comments are
    /// skipped; error line numbers are 1-based over the raw input.
    pub fn from_jsonl(script: &str) -> Result<Self, ReaderError> {
        let mut parsed = Vec::new();
        for (idx, line) in script.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let entry: ReplayEntry = serde_json::from_str(trimmed)
                .map_err(|e| ReaderError::Script { line: line_no, detail: e.to_string() })?;
            parsed.push((entry.at_ms, parse_entry_frame(&entry, line_no)?));
        }
        Ok(Self::from_parts(parsed))
    }

    fn from_parts(mut parsed: Vec<(u64, Vec<u8>)>) -> Self {
        // Stable by offset, so equal-offset entries keep script order.
        parsed.sort_by_key(|(at_ms, _)| *at_ms);
        Self { entries: parsed.into(), epoch: Instant::now(), resets: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl TagReader for ReplayReader {
    fn read_frame(&mut self, _window: Duration) -> Result<Option<Vec<u8>>, ReaderError> {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        match self.entries.front() {
            Some((at_ms, _)) if *at_ms <= elapsed => {
                Ok(self.entries.pop_front().map(|(_, frame)| frame))
            }
            _ => Ok(None),
        }
    }

    fn reset(&mut self) -> Result<(), ReaderError> {
        self.resets += 1;
        Ok(())
    }
}

fn parse_entry_frame(entry: &ReplayEntry, line: usize) -> Result<Vec<u8>, ReaderError> {
    parse_hex_frame(&entry.frame).ok_or_else(|| ReaderError::Script {
        line,
        detail: format!("bad hex frame {:?}", entry.frame),
    })
}

/// Parse whitespace-tolerant hex text into bytes. `None` on an odd
/// digit count or a non-hex character; empty text is not a frame.
pub fn parse_hex_frame(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        let pair = std::str::from_utf8(pair).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?);
    }
    Some(bytes)
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(at_ms: u64, frame: &str) -> ReplayEntry {
        ReplayEntry { at_ms, frame: frame.to_string() }
    }

    fn window() -> Duration {
        Duration::from_millis(50)
    }

    // ── 1. Hex parsing ──────────────────────────────────────────────

    #[test]
    fn hex_frame_parses_with_and_without_spaces() {
        assert_eq!(parse_hex_frame("02 30 03"), Some(vec![0x02, 0x30, 0x03]));
        assert_eq!(parse_hex_frame("023003"), Some(vec![0x02, 0x30, 0x03]));
        assert_eq!(parse_hex_frame("02ab"), Some(vec![0x02, 0xAB]));
    }

    #[test]
    fn hex_frame_rejects_bad_text() {
        assert_eq!(parse_hex_frame(""), None);
        assert_eq!(parse_hex_frame("  "), None);
        assert_eq!(parse_hex_frame("023"), None);
        assert_eq!(parse_hex_frame("02ZZ"), None);
    }

    // ── 2. Script parsing ───────────────────────────────────────────

    #[test]
    fn jsonl_script_parses_with_comments_and_blanks() {
        let script = r#"
# entry burst, then a changeover
{"at_ms": 0, "frame": "02 30 03"}

{"at_ms": 250, "frame": "023103"}
"#;
        let reader = ReplayReader::from_jsonl(script).expect("script");
        assert_eq!(reader.remaining(), 2);
    }

    #[test]
    fn jsonl_bad_json_reports_line() {
        let script = "{\"at_ms\": 0, \"frame\": \"023003\"}\nnot json";
        let err = ReplayReader::from_jsonl(script).expect_err("bad line");
        assert!(matches!(err, ReaderError::Script { line: 2, .. }));
    }

    #[test]
    fn jsonl_bad_hex_reports_line() {
        let script = "\n{\"at_ms\": 0, \"frame\": \"02XX\"}";
        let err = ReplayReader::from_jsonl(script).expect_err("bad hex");
        assert!(matches!(err, ReaderError::Script { line: 2, .. }));
    }

    // ── 3. Playback ─────────────────────────────────────────────────

    #[test]
    fn due_frames_pop_one_per_call_in_order() {
        let mut reader =
            ReplayReader::new(vec![entry(0, "023003"), entry(0, "023103")]).expect("script");
        assert_eq!(reader.read_frame(window()).expect("read"), Some(vec![0x02, 0x30, 0x03]));
        assert_eq!(reader.read_frame(window()).expect("read"), Some(vec![0x02, 0x31, 0x03]));
        assert_eq!(reader.read_frame(window()).expect("read"), None);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn future_frames_are_not_due_yet() {
        let mut reader = ReplayReader::new(vec![entry(60_000, "023003")]).expect("script");
        assert_eq!(reader.read_frame(window()).expect("read"), None);
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn script_plays_in_offset_order() {
        let mut reader =
            ReplayReader::new(vec![entry(60_000, "023003"), entry(0, "023103")]).expect("script");
        assert_eq!(reader.read_frame(window()).expect("read"), Some(vec![0x02, 0x31, 0x03]));
        assert_eq!(reader.read_frame(window()).expect("read"), None);
    }

    #[test]
    fn reset_is_counted_and_harmless() {
        let mut reader = ReplayReader::new(vec![entry(0, "023003")]).expect("script");
        reader.reset().expect("reset");
        reader.reset().expect("reset");
        assert_eq!(reader.resets(), 2);
        assert!(reader.read_frame(window()).expect("read").is_some());
    }
}
