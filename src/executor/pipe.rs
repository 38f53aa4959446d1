//! Internal utilities for draining child process pipes.
//!
//! Each pipe is read on its own thread so that a child filling one pipe
//! cannot block while the parent waits on the other.

use std::io::{BufRead, BufReader, Read};

/// Type of output stream for logging purposes.
#[derive(Clone, Copy)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic.
///
/// The returned `&str` borrows from the panic payload, so it is valid
/// as long as the `err` reference is valid.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Reads a pipe to the end, returning everything it produced.
///
/// - Each line is also emitted at TRACE level as it arrives.
/// - Binary data uses lossy UTF-8 conversion.
/// - I/O errors stop reading but keep what was read so far
///   (the exit status decides success, not the pipe).
pub(super) fn read_pipe<R: Read>(pipe: R, stream_type: StreamType) -> String {
    let mut reader = BufReader::new(pipe);
    let mut captured = Vec::new();
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let line = line_buf.strip_suffix(b"\n").unwrap_or(&line_buf);
                tracing::trace!(stream = %stream_type, "{}", String::from_utf8_lossy(line));
                captured.extend_from_slice(&line_buf);
            }
            Err(e) => {
                tracing::error!(stream = %stream_type, error = %e, "I/O error, stopping read");
                break;
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}
