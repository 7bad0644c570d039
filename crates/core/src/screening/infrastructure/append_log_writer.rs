use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::screening::domain::log_entry::LogEntry;

struct AppendRequest {
    line: String,
    ack: Sender<io::Result<()>>,
}

/// Owns the screening log file on a dedicated thread.
///
/// Every entry is written by that one thread as a single `write_all` of a
/// complete line followed by a flush, so entries from concurrent workers
/// can never interleave. Workers reach it through cloned [`LogLane`]s.
pub struct AppendLogWriter {
    tx: Option<Sender<AppendRequest>>,
    handle: Option<JoinHandle<usize>>,
}

impl AppendLogWriter {
    /// Opens `path` for appending (creating it if needed) and starts the
    /// writer thread. Open errors surface here rather than on first append.
    pub fn spawn(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (tx, rx) = crossbeam_channel::unbounded::<AppendRequest>();
        let handle = std::thread::Builder::new()
            .name("screening-log".to_string())
            .spawn(move || run_writer(file, rx))?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn lane(&self) -> LogLane {
        LogLane {
            tx: self.tx.clone(),
        }
    }

    /// Stops accepting entries, waits for queued ones to land and returns how
    /// many lines were written. Lanes still held elsewhere keep the thread
    /// alive until they are dropped.
    pub fn finish(mut self) -> usize {
        self.shutdown()
    }

    fn shutdown(&mut self) -> usize {
        self.tx = None;
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(written)) => written,
            Some(Err(_)) => {
                log::error!("Log writer thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for AppendLogWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_writer(mut file: File, rx: Receiver<AppendRequest>) -> usize {
    let mut written = 0;
    for request in rx {
        let result = file
            .write_all(request.line.as_bytes())
            .and_then(|()| file.flush());
        if result.is_ok() {
            written += 1;
        }
        // The requester may have given up; the line is written either way.
        let _ = request.ack.send(result);
    }
    written
}

/// Cloneable handle for appending to the screening log.
#[derive(Clone)]
pub struct LogLane {
    tx: Option<Sender<AppendRequest>>,
}

impl LogLane {
    /// A lane with no writer behind it; every append fails.
    pub fn closed() -> Self {
        Self { tx: None }
    }

    /// Appends one entry and blocks until it has been written.
    pub fn append(&self, entry: &LogEntry) -> io::Result<()> {
        let closed = || io::Error::new(io::ErrorKind::BrokenPipe, "log writer is closed");
        let tx = self.tx.as_ref().ok_or_else(closed)?;

        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        tx.send(AppendRequest {
            line: entry.to_line(),
            ack: ack_tx,
        })
        .map_err(|_| closed())?;
        ack_rx.recv().map_err(|_| closed())?
    }
}
