use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::screening::domain::log_entry::LogEntry;
use crate::screening::domain::video_job::VideoJob;
use crate::screening::domain::video_outcome::{FailureReason, OutcomeStatus, VideoOutcome};
use crate::shared::constants::PARTIAL_SUFFIX;

use super::append_log_writer::LogLane;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to copy {source_path} to {dest}: {cause}")]
    Copy {
        source_path: PathBuf,
        dest: PathBuf,
        #[source]
        cause: io::Error,
    },
    #[error("failed to append log entry to {log_path}: {cause}")]
    LogAppend {
        log_path: PathBuf,
        #[source]
        cause: io::Error,
    },
}

/// Persists qualifying videos: a full copy into the output directory, then
/// one log entry.
///
/// Non-qualifying and failed outcomes pass through untouched. A persistence
/// failure turns a `Qualified` outcome into
/// `Failed(FailureReason::NotPersisted)`, keeping its frame count.
#[derive(Clone)]
pub struct OutputSink {
    log: LogLane,
}

impl OutputSink {
    pub fn new(log: LogLane) -> Self {
        Self { log }
    }

    pub fn persist(&self, job: &VideoJob, outcome: VideoOutcome) -> VideoOutcome {
        if !outcome.is_qualified() {
            return outcome;
        }
        match self.try_persist(job, outcome.qualifying_frames) {
            Ok(()) => outcome,
            Err(e) => VideoOutcome {
                status: OutcomeStatus::Failed(FailureReason::NotPersisted(e.to_string())),
                ..outcome
            },
        }
    }

    fn try_persist(&self, job: &VideoJob, qualifying_frames: usize) -> Result<(), PersistError> {
        let dest = job.destination();
        copy_atomically(job.source(), &dest).map_err(|cause| PersistError::Copy {
            source_path: job.source().to_path_buf(),
            dest: dest.clone(),
            cause,
        })?;
        log::debug!("Copied {} to {}", job.source().display(), dest.display());

        self.log
            .append(&LogEntry::new(&job.file_name(), qualifying_frames))
            .map_err(|cause| PersistError::LogAppend {
                log_path: job.log_path().to_path_buf(),
                cause,
            })
    }
}

/// Copies `src` to `<dest>.part`, syncs it, then renames over `dest`.
///
/// `dest` is therefore either the complete copy or untouched; the partial
/// file is removed on failure.
pub fn copy_atomically(src: &Path, dest: &Path) -> io::Result<()> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".");
    partial.push(PARTIAL_SUFFIX);
    let partial = PathBuf::from(partial);

    let result = (|| {
        fs::copy(src, &partial)?;
        fs::File::open(&partial)?.sync_all()?;
        fs::rename(&partial, dest)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}
