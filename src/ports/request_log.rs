/// Destination for formatted access-log lines.
pub trait RequestLogSink: Send + Sync + 'static {
    /// Write one complete line (no trailing newline).
    fn write(&self, line: &str);
}
