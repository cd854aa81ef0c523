//! The list of inputs to join, one per line:
//!
//! ```text
//! <path> [<mark-in seconds> [<mark-out seconds>]]
//! ```
//!
//! Marks may be fractional and are rounded to the nearest millisecond.
//! Lines are read as raw bytes, so paths need not be UTF-8.

use std::io::{self, BufRead};
use std::path::PathBuf;

use thiserror::Error;

use crate::join::Marks;

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Failed to read input list: {0}")]
    Io(#[from] io::Error),

    #[error("Line {line}: invalid mark {value:?}")]
    InvalidMark { line: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEntry {
    pub path: PathBuf,
    pub marks: Marks,
}

/// Parses one line. Blank lines yield `None`; words after the mark-out are
/// ignored.
pub fn parse_line(
    line: impl AsRef<[u8]>,
    line_no: usize,
) -> Result<Option<InputEntry>, PlaylistError> {
    let mut words = line
        .as_ref()
        .split(u8::is_ascii_whitespace)
        .filter(|word| !word.is_empty());
    let Some(path) = words.next() else {
        return Ok(None);
    };

    let mut marks = Marks::default();
    if let Some(word) = words.next() {
        marks.mark_in_ms = parse_mark(word, line_no)?;
    }
    if let Some(word) = words.next() {
        marks.mark_out_ms = parse_mark(word, line_no)?;
    }

    Ok(Some(InputEntry {
        path: path_from_bytes(path),
        marks,
    }))
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

fn parse_mark(word: &[u8], line: usize) -> Result<u32, PlaylistError> {
    let invalid = || PlaylistError::InvalidMark {
        line,
        value: String::from_utf8_lossy(word).into_owned(),
    };
    let seconds: f64 = std::str::from_utf8(word)
        .ok()
        .and_then(|word| word.parse().ok())
        .ok_or_else(invalid)?;
    let millis = (seconds * 1000.0 + 0.5).floor();
    if !millis.is_finite() || millis < 0.0 || millis > f64::from(u32::MAX) {
        return Err(invalid());
    }
    Ok(millis as u32)
}

/// Lazily parses the list, so inputs can be joined while it is still being
/// written (e.g. on a pipe).
pub fn read_playlist<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<InputEntry, PlaylistError>> {
    reader
        .split(b'\n')
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) => parse_line(&line, index + 1).transpose(),
            Err(error) => Some(Err(PlaylistError::Io(error))),
        })
}
