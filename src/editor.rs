//! Raw-mode line editor with history recall.
//!
//! The editor owns the visible state of one in-progress line: the input
//! buffer, the cursor offset into it, and every byte written back to the
//! terminal. Raw mode delivers keystrokes one at a time with echo off, so
//! all redraw is done here: each mutation clears the terminal line from the
//! affected column (`ESC[K`), reprints the buffer through its new end, and
//! walks the terminal cursor back to the edit point.
//!
//! [`LineEditor`] is generic over its byte source and sink so tests can
//! drive it with in-memory buffers instead of a terminal.

use crate::history::{HistoryLog, Recall};
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Longest accepted input line, in bytes.
pub const MAX_LINE: usize = 4096;

/// Prompt emitted before every line and on every full-line redraw.
pub const PROMPT: &str = "In_a_nutshell> ";

const ESC: u8 = 0x1b;
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Errors surfaced by [`LineEditor::read_line`].
#[derive(Debug, Error)]
pub enum EditorError {
    /// The input stream ended; the session should terminate.
    #[error("end of input")]
    Eof,
    /// The line grew past [`MAX_LINE`]; the partial line is discarded.
    #[error("line too long (limit {MAX_LINE} bytes)")]
    LineTooLong,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scoped raw-mode switch for the controlling terminal.
///
/// Construction saves the current `termios` state, then disables canonical
/// input and echo. Dropping the guard restores the saved state, so the
/// terminal is back in its original mode on every exit path, the `exit`
/// built-in included.
pub struct RawMode {
    saved: Termios,
}

impl RawMode {
    pub fn enable() -> nix::Result<Self> {
        let saved = termios::tcgetattr(io::stdin())?;
        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &raw)?;
        Ok(Self { saved })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &self.saved);
    }
}

/// Decoder state for arrow-key escape sequences.
///
/// A malformed or truncated sequence falls back to `Normal` without
/// consuming any byte beyond the sequence itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeState {
    Normal,
    SawEscape,
    SawBracket,
}

/// Interactive editor over a raw byte stream.
pub struct LineEditor<R, W> {
    input: R,
    output: W,
}

impl<R: Read, W: Write> LineEditor<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Present the prompt and read one complete line.
    ///
    /// The returned line is already appended to `history`, with the recall
    /// cursor reset past its end. Only printable ASCII is inserted; other
    /// bytes are editing keys or are ignored.
    pub fn read_line(&mut self, history: &mut HistoryLog) -> Result<String, EditorError> {
        let mut buf = String::new();
        let mut cursor = 0usize;
        let mut state = EscapeState::Normal;

        write!(self.output, "\r{PROMPT}")?;
        self.output.flush()?;

        loop {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None => return Err(EditorError::Eof),
            };

            match state {
                EscapeState::SawEscape => {
                    state = if byte == b'[' {
                        EscapeState::SawBracket
                    } else {
                        EscapeState::Normal
                    };
                }
                EscapeState::SawBracket => {
                    state = EscapeState::Normal;
                    match byte {
                        b'A' => self.recall_prev(history, &mut buf, &mut cursor)?,
                        b'B' => self.recall_next(history, &mut buf, &mut cursor)?,
                        b'C' => {
                            if cursor < buf.len() {
                                cursor += 1;
                                self.output.write_all(b"\x1b[C")?;
                                self.output.flush()?;
                            }
                        }
                        b'D' => {
                            if cursor > 0 {
                                cursor -= 1;
                                self.output.write_all(b"\x1b[D")?;
                                self.output.flush()?;
                            }
                        }
                        _ => {}
                    }
                }
                EscapeState::Normal => match byte {
                    b'\n' | b'\r' => {
                        history.push(buf.clone());
                        self.output.write_all(b"\n")?;
                        self.output.flush()?;
                        return Ok(buf);
                    }
                    DELETE | BACKSPACE => self.delete_before_cursor(&mut buf, &mut cursor)?,
                    ESC => state = EscapeState::SawEscape,
                    byte if (0x20..=0x7e).contains(&byte) => {
                        if buf.len() >= MAX_LINE {
                            self.output.write_all(b"\n")?;
                            self.output.flush()?;
                            return Err(EditorError::LineTooLong);
                        }
                        self.insert_at_cursor(&mut buf, &mut cursor, byte as char)?;
                    }
                    _ => {}
                },
            }
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, EditorError> {
        let mut byte = [0u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn insert_at_cursor(
        &mut self,
        buf: &mut String,
        cursor: &mut usize,
        ch: char,
    ) -> io::Result<()> {
        buf.insert(*cursor, ch);
        *cursor += 1;
        write!(self.output, "\x1b[K{}", &buf[*cursor - 1..])?;
        self.step_back(buf.len() - *cursor)?;
        self.output.flush()
    }

    fn delete_before_cursor(&mut self, buf: &mut String, cursor: &mut usize) -> io::Result<()> {
        if *cursor == 0 {
            return Ok(());
        }
        *cursor -= 1;
        buf.remove(*cursor);
        write!(self.output, "\x08\x1b[K{}", &buf[*cursor..])?;
        self.step_back(buf.len() - *cursor)?;
        self.output.flush()
    }

    fn recall_prev(
        &mut self,
        history: &mut HistoryLog,
        buf: &mut String,
        cursor: &mut usize,
    ) -> io::Result<()> {
        if let Some(entry) = history.prev() {
            *buf = entry.to_string();
            *cursor = buf.len();
            self.redraw_line(buf)?;
        }
        Ok(())
    }

    fn recall_next(
        &mut self,
        history: &mut HistoryLog,
        buf: &mut String,
        cursor: &mut usize,
    ) -> io::Result<()> {
        match history.next() {
            Some(Recall::Entry(entry)) => {
                *buf = entry;
                *cursor = buf.len();
                self.redraw_line(buf)?;
            }
            Some(Recall::Cleared) => {
                buf.clear();
                *cursor = 0;
                self.redraw_line(buf)?;
            }
            None => {}
        }
        Ok(())
    }

    /// Clear the whole terminal line and reprint prompt plus buffer.
    fn redraw_line(&mut self, buf: &str) -> io::Result<()> {
        write!(self.output, "\r\x1b[K{PROMPT}{buf}")?;
        self.output.flush()
    }

    fn step_back(&mut self, count: usize) -> io::Result<()> {
        for _ in 0..count {
            self.output.write_all(b"\x08")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read(bytes: &[u8], history: &mut HistoryLog) -> Result<String, EditorError> {
        let mut out = Vec::new();
        let mut editor = LineEditor::new(Cursor::new(bytes.to_vec()), &mut out);
        editor.read_line(history)
    }

    fn read_with_output(bytes: &[u8], history: &mut HistoryLog) -> (String, Vec<u8>) {
        let mut out = Vec::new();
        let line = {
            let mut editor = LineEditor::new(Cursor::new(bytes.to_vec()), &mut out);
            editor.read_line(history).unwrap()
        };
        (line, out)
    }

    #[test]
    fn returns_line_verbatim_and_appends_to_history() {
        let mut history = HistoryLog::new(10);
        let line = read(b"echo hi\n", &mut history).unwrap();
        assert_eq!(line, "echo hi");
        assert_eq!(history.len(), 1);
        assert_eq!(history.prev(), Some("echo hi"));
    }

    #[test]
    fn prompt_precedes_the_line() {
        let mut history = HistoryLog::new(10);
        let (_, out) = read_with_output(b"ls\n", &mut history);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&format!("\r{PROMPT}")));
    }

    #[test]
    fn backspace_removes_character_left_of_cursor() {
        let mut history = HistoryLog::new(10);
        let line = read(b"lss\x7f\n", &mut history).unwrap();
        assert_eq!(line, "ls");
    }

    #[test]
    fn backspace_on_empty_line_is_noop() {
        let mut history = HistoryLog::new(10);
        let line = read(b"\x7f\x7fok\n", &mut history).unwrap();
        assert_eq!(line, "ok");
    }

    #[test]
    fn left_arrow_moves_insertion_point() {
        let mut history = HistoryLog::new(10);
        // Type "hllo", walk left over "llo", insert the missing "e".
        let line = read(b"hllo\x1b[D\x1b[D\x1b[De\n", &mut history).unwrap();
        assert_eq!(line, "hello");
    }

    #[test]
    fn right_arrow_is_bounded_by_line_end() {
        let mut history = HistoryLog::new(10);
        let line = read(b"ab\x1b[D\x1b[C\x1b[Cc\n", &mut history).unwrap();
        assert_eq!(line, "abc");
    }

    #[test]
    fn backspace_mid_line_shifts_tail_left() {
        let mut history = HistoryLog::new(10);
        // "acbc", cursor left twice to sit after "ac", delete the "c".
        let line = read(b"acbc\x1b[D\x1b[D\x7f\n", &mut history).unwrap();
        assert_eq!(line, "abc");
    }

    #[test]
    fn up_arrow_recalls_previous_entries() {
        let mut history = HistoryLog::new(10);
        history.push("first".to_string());
        history.push("second".to_string());
        let line = read(b"\x1b[A\n", &mut history).unwrap();
        assert_eq!(line, "second");
    }

    #[test]
    fn up_then_down_returns_to_cleared_line() {
        let mut history = HistoryLog::new(10);
        history.push("stale".to_string());
        let line = read(b"\x1b[A\x1b[B\n", &mut history).unwrap();
        assert_eq!(line, "");
    }

    #[test]
    fn recalled_entry_can_be_edited() {
        let mut history = HistoryLog::new(10);
        history.push("cat in".to_string());
        let line = read(b"\x1b[A.txt\n", &mut history).unwrap();
        assert_eq!(line, "cat in.txt");
    }

    #[test]
    fn malformed_escape_sequence_does_not_eat_input() {
        let mut history = HistoryLog::new(10);
        let line = read(b"\x1bZab\n", &mut history).unwrap();
        assert_eq!(line, "ab");
    }

    #[test]
    fn unknown_csi_final_byte_is_ignored() {
        let mut history = HistoryLog::new(10);
        let line = read(b"\x1b[Zok\n", &mut history).unwrap();
        assert_eq!(line, "ok");
    }

    #[test]
    fn overlong_line_fails_with_defined_error() {
        let mut history = HistoryLog::new(10);
        let mut bytes = vec![b'x'; MAX_LINE + 1];
        bytes.push(b'\n');
        match read(&bytes, &mut history) {
            Err(EditorError::LineTooLong) => {}
            other => panic!("expected LineTooLong, got {other:?}"),
        }
    }

    #[test]
    fn end_of_input_is_reported() {
        let mut history = HistoryLog::new(10);
        match read(b"", &mut history) {
            Err(EditorError::Eof) => {}
            other => panic!("expected Eof, got {other:?}"),
        }
    }

    #[test]
    fn history_recall_redraws_prompt_and_buffer() {
        let mut history = HistoryLog::new(10);
        history.push("recalled".to_string());
        let (_, out) = read_with_output(b"\x1b[A\n", &mut history);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(&format!("\r\x1b[K{PROMPT}recalled")));
    }
}
