//! Bridge from transport error output into the structured logger.

use std::io;
use std::net::SocketAddr;

/// Sink for errors raised below the request layer.
///
/// Implements [`io::Write`] so anything that writes error text to a
/// writer can be pointed at it; every non-empty line becomes one
/// `tracing` error event. The accept loop reports through the typed
/// methods instead.
///
/// ```rust
/// use std::io::Write;
/// use portico_server::ErrorSink;
///
/// let mut sink = ErrorSink::new("transport");
/// writeln!(sink, "http: TLS handshake error from 10.0.0.7:51234: EOF").unwrap();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ErrorSink {
    source: &'static str,
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new("transport")
    }
}

impl ErrorSink {
    /// Creates a sink tagging its events with `source`.
    #[must_use]
    pub const fn new(source: &'static str) -> Self {
        Self { source }
    }

    /// Reports a failed `accept`.
    pub fn accept_error(&self, error: &io::Error) {
        tracing::error!(source = self.source, kind = ?error.kind(), error = %error, "Failed to accept connection");
    }

    /// Reports a connection that ended with an error.
    pub fn connection_error(&self, remote_addr: SocketAddr, error: &dyn std::error::Error) {
        tracing::error!(source = self.source, %remote_addr, error = %error, "Connection error");
    }

    fn report(&self, text: &str) -> usize {
        let mut count = 0;
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            tracing::error!(source = self.source, "{line}");
            count += 1;
        }
        count
    }
}

impl io::Write for ErrorSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.report(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
