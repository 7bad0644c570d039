use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a video ended in the `Failed` state.
///
/// Causes are captured as text so outcomes can cross thread boundaries.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    #[error("unreadable source: {0}")]
    SourceUnreadable(String),
    #[error("decode fault at frame {frame}: {cause}")]
    DecodeFault { frame: usize, cause: String },
    #[error("face detector fault at frame {frame}: {cause}")]
    DetectorFault { frame: usize, cause: String },
    #[error("no face detector available: {0}")]
    DetectorUnavailable(String),
    #[error("qualified but not persisted: {0}")]
    NotPersisted(String),
}

/// Terminal classification of a screened video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutcomeStatus {
    Qualified,
    NotQualified,
    Failed(FailureReason),
}

/// Result of screening one [`VideoJob`](super::video_job::VideoJob).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoOutcome {
    pub source: PathBuf,
    pub status: OutcomeStatus,
    pub qualifying_frames: usize,
    /// Sampled frames that reached the face detector.
    pub frames_examined: usize,
}

impl VideoOutcome {
    pub fn new(source: &Path, status: OutcomeStatus, qualifying_frames: usize) -> Self {
        Self {
            source: source.to_path_buf(),
            status,
            qualifying_frames,
            frames_examined: 0,
        }
    }

    pub fn failed(source: &Path, reason: FailureReason) -> Self {
        Self::new(source, OutcomeStatus::Failed(reason), 0)
    }

    pub fn with_frames_examined(mut self, frames: usize) -> Self {
        self.frames_examined = frames;
        self
    }

    pub fn is_qualified(&self) -> bool {
        self.status == OutcomeStatus::Qualified
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            OutcomeStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Detection qualified the video but the copy or log append failed.
    pub fn is_unpersisted(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::Failed(FailureReason::NotPersisted(_))
        )
    }
}
