//! Tracing subscriber setup.
//!
//! Plain commands log to stderr. The TUI owns the terminal, so there each formatted event is
//! sent as a line to the log pane instead.

use std::io;

use crossbeam_channel::{Receiver, Sender};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

const DEFAULT_FILTER: &str = "info,yki_cli=info,speech_player=info,gemini_client=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_stderr() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .init();
}

/// Route log output into a channel; returns the receiving end for the log pane.
pub fn init_channel() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(ChannelWriter { tx })
        .init();
    rx
}

#[derive(Clone)]
struct ChannelWriter {
    tx: Sender<String>,
}

impl<'a> MakeWriter<'a> for ChannelWriter {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            tx: self.tx.clone(),
            buf: Vec::new(),
        }
    }
}

/// Buffers one formatted event and sends it line by line when dropped.
struct LineWriter {
    tx: Sender<String>,
    buf: Vec<u8>,
}

impl io::Write for LineWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let _ = self.tx.send(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn writer_sends_lines_on_drop() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let make = ChannelWriter { tx };
        {
            let mut w = make.make_writer();
            w.write_all(b"INFO first\n").unwrap();
            w.write_all(b"  detail\n\n").unwrap();
            assert!(rx.try_recv().is_err());
        }
        let lines: Vec<String> = rx.try_iter().collect();
        assert_eq!(lines, vec!["INFO first".to_string(), "  detail".to_string()]);
    }
}
