use std::{
    io::Write,
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use owo_colors::{AnsiColors, OwoColorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A single writer of prefixed, interleaved log lines. Lines from different
/// children interleave in arrival order; atomicity only holds per line, not
/// per multi-line record, matching the spec's log multiplexing contract.
pub trait LineSink: Send + Sync {
    fn emit(&self, prefix: &str, color: AnsiColors, stream: Stream, line: &str, timestamps: bool);
}

/// Writes to a shared, mutex-guarded `Write` (normally stdout), tagging
/// every line with its package prefix in brackets and visually
/// distinguishing stderr lines. Concurrent emissions from different tasks
/// are safe because each task assembles one complete line before calling
/// `emit`.
pub struct ConsoleSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl LineSink for ConsoleSink {
    fn emit(&self, prefix: &str, color: AnsiColors, stream: Stream, line: &str, timestamps: bool) {
        let mut writer = self.writer.lock().expect("console sink mutex poisoned");
        let tag = format!("[{prefix}]").color(color);
        let body = match stream {
            Stream::Stdout => line.to_string(),
            Stream::Stderr => line.dimmed().to_string(),
        };
        if timestamps {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            let _ = writeln!(writer, "{tag} {secs} {body}");
        } else {
            let _ = writeln!(writer, "{tag} {body}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    struct RecordingWriter(Arc<StdMutex<Vec<u8>>>);
    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lines_carry_package_prefix() {
        let buf = Arc::new(StdMutex::new(Vec::new()));
        let sink = ConsoleSink::new(Box::new(RecordingWriter(buf.clone())));
        sink.emit("core", AnsiColors::Cyan, Stream::Stdout, "hello", false);
        let written = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(written.contains("[core]"));
        assert!(written.contains("hello"));
    }
}
