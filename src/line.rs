//! Bounded line reader.
//!
//! Reads a single `\n`-terminated line from a buffered stream, keeping at
//! most `max_len` bytes. Anything past the cap is consumed and dropped up
//! to the next line feed (or end of stream) so a client cannot grow the
//! buffer without bound.

use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Upper bound on the initial allocation for a line.
const INITIAL_CAPACITY: usize = 256;

/// A line read from a client, terminator and trailing whitespace removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Line {
    bytes: BytesMut,
    truncated: bool,
}

impl Line {
    /// The empty line, used when nothing usable could be read.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True if bytes other than trailing whitespace were cut off at the cap.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Line reading errors
#[derive(Debug)]
pub enum LineError {
    Io(std::io::Error),
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineError::Io(e) => write!(f, "read failed: {e}"),
        }
    }
}

impl std::error::Error for LineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LineError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for LineError {
    fn from(e: std::io::Error) -> Self {
        LineError::Io(e)
    }
}

/// Read one line of at most `max_len` bytes.
///
/// Stops at the first `\n` (not included) or at end of stream, in which
/// case whatever was accumulated is returned, possibly nothing. An I/O
/// error discards the partial line; callers treat it as empty.
///
/// Trailing whitespace is only stripped when it really ends the line. If
/// non-whitespace bytes were cut off past the cap, the kept prefix is
/// returned as is and the line is marked truncated.
pub async fn read_line<R>(reader: &mut R, max_len: usize) -> Result<Line, LineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut bytes = BytesMut::with_capacity(max_len.min(INITIAL_CAPACITY));
    let mut truncated = false;

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                // EOF
                break;
            }

            let (chunk, used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (&available[..pos], pos + 1, true),
                None => (available, available.len(), false),
            };

            let kept = chunk.len().min(max_len - bytes.len());
            if chunk[kept..].iter().any(|&b| !is_space(b)) {
                truncated = true;
            }
            bytes.extend_from_slice(&chunk[..kept]);
            (used, done)
        };

        reader.consume(used);
        if done {
            break;
        }
    }

    if !truncated {
        trim_trailing_whitespace(&mut bytes);
    }
    Ok(Line { bytes, truncated })
}

/// Strip trailing bytes matched by C's `isspace` in the "C" locale.
fn trim_trailing_whitespace(bytes: &mut BytesMut) {
    let keep = bytes
        .iter()
        .rposition(|&b| !is_space(b))
        .map_or(0, |pos| pos + 1);
    bytes.truncate(keep);
}

pub(crate) fn is_space(b: u8) -> bool {
    // u8::is_ascii_whitespace leaves out vertical tab
    b.is_ascii_whitespace() || b == 0x0b
}
