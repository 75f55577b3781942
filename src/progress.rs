//! Import progress bar and a log writer that prints above it.
//!
//! Every log line goes through the same `MultiProgress` the bar is drawn
//! on, so concurrent file tasks can log without tearing the bar.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static TERMINAL: OnceLock<MultiProgress> = OnceLock::new();

fn terminal() -> &'static MultiProgress {
    TERMINAL.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

fn print_line(line: &str) {
    let _ = terminal().println(line.trim_end_matches('\r'));
}

/// Progress bar counting imported files; hidden when there is nothing to do
pub fn file_progress_bar(total: usize) -> ProgressBar {
    if total == 0 {
        return ProgressBar::hidden();
    }

    let pb = terminal().add(ProgressBar::new(total as u64));
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files {msg}",
    ) {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// `MakeWriter` for the fmt layer; one [`LogWriter`] per event
#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Buffers partial output and prints complete lines above the bars
#[derive(Default)]
pub struct LogWriter {
    pending: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));

        while let Some(end) = self.pending.find('\n') {
            print_line(&self.pending[..end]);
            self.pending.drain(..=end);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            print_line(&self.pending);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::default()
    }
}
