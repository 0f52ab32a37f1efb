//! Delimiter-based reads over a buffered transport
//!
//! Serial reads time out periodically; a timeout is not an error here, it is
//! the point where the cancellation token gets checked.

use crate::cancel::CancelToken;
use crate::error::{LinkError, Result};
use std::io::{self, BufRead};

/// Append bytes up to and including `byte` to `buf`
///
/// Returns `true` when `byte` was reached, `false` on end of stream.
pub(crate) fn read_chunk<R: BufRead + ?Sized>(
    reader: &mut R,
    byte: u8,
    buf: &mut Vec<u8>,
    cancel: &CancelToken,
) -> Result<bool> {
    loop {
        if cancel.is_cancelled() {
            return Err(LinkError::Cancelled);
        }
        match reader.read_until(byte, buf) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(buf.last() == Some(&byte)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Read until the multi-byte `delim` has been seen
///
/// Reads chunks ending in the delimiter's last byte and stops once the
/// accumulated bytes end with the whole delimiter. Returns everything before
/// the delimiter. End of stream is reported as an `UnexpectedEof` transport
/// error; other read errors propagate as they happen.
pub fn read_until<R: BufRead + ?Sized>(
    reader: &mut R,
    delim: &[u8],
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    let Some(&last) = delim.last() else {
        return Ok(Vec::new());
    };

    let mut line = Vec::new();
    loop {
        if !read_chunk(reader, last, &mut line, cancel)? {
            return Err(LinkError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {} bytes without delimiter", line.len()),
            )));
        }
        if line.ends_with(delim) {
            line.truncate(line.len() - delim.len());
            return Ok(line);
        }
    }
}
