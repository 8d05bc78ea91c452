// Progress channel: append-only human-readable log lines

/// Receives one line per saved file and one per recoverable error.
pub trait LogSink {
    fn record(&mut self, line: &str);
}

/// Collects lines in memory.
impl LogSink for Vec<String> {
    fn record(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Forwards every line to `tracing` at INFO level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&mut self, line: &str) {
        tracing::info!(target: "pdf2img::progress", "{line}");
    }
}
