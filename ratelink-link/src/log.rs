//! A [`Telemetry`] sink writing the plain-text link log.
//!
//! # Format
//!
//! The log opens with a header of `#`-prefixed lines describing the link, followed by one line
//! per event, timestamps in link milliseconds:
//!
//! ```text
//! # ratelink link (uplink) [/tmp/ratelink-ctl]
//! # queue: droptail [packets=100]
//! # cell size: 1500
//! # base timestamp: 0
//! 12 + 1400          <- arrival of 1400 bytes
//! 13 # 1500          <- delivery opportunity of 1500 bytes
//! 13 - 1400 1        <- departure of 1400 bytes after 1 ms in the link
//! ```

use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use ratelink_common::Timestamp;

use crate::{LinkInfo, Telemetry};

/// Writes link events to `W` in the link log format.
///
/// I/O errors never reach the link: the first failure is reported with `tracing::warn!` and the
/// sink goes quiet for good.
#[derive(Debug)]
pub struct LogTelemetry<W: Write> {
    writer: Option<W>,
}

impl LogTelemetry<BufWriter<File>> {
    /// Creates (or truncates) the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> LogTelemetry<W> {
    /// A sink writing to `writer`. Nothing is written before the link attaches.
    pub const fn new(writer: W) -> Self {
        Self { writer: Some(writer) }
    }

    /// Whether the sink is still writing.
    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }

    /// Flushes the underlying writer, if it is still active.
    pub fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    /// The writer, or `None` if it failed earlier.
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    /// Returns the writer, or `None` if it failed earlier.
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        let Some(writer) = self.writer.as_mut() else { return };

        if let Err(e) = writer.write_fmt(args).and_then(|_| writer.write_all(b"\n")) {
            tracing::warn!(error = %e, "failed to write link log, disabling it");
            self.writer = None;
        }
    }
}

impl<W: Write> Telemetry for LogTelemetry<W> {
    fn on_attach(&mut self, info: &LinkInfo) {
        self.line(format_args!("# ratelink link ({}) [{}]", info.name, info.control));
        self.line(format_args!("# queue: {}", info.queue));
        self.line(format_args!("# cell size: {}", info.cell_size));
        self.line(format_args!("# base timestamp: {}", info.base));
    }

    fn on_arrival(&mut self, at: Timestamp, size: usize) {
        self.line(format_args!("{at} + {size}"));
    }

    fn on_opportunity(&mut self, at: Timestamp, budget: usize) {
        self.line(format_args!("{at} # {budget}"));
    }

    fn on_departure(&mut self, at: Timestamp, size: usize, delay_ms: u64) {
        self.line(format_args!("{at} - {size} {delay_ms}"));
    }
}
