//! Infrastructure implementation of the `ConsoleSink` port.

use std::io::Write as _;

use crate::application::ports::ConsoleSink;

/// Forwards tool output to the process stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ConsoleSink for StdoutSink {
    fn forward(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not abort provisioning.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}
