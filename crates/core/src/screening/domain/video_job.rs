use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// One input video to screen, together with where its results go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoJob {
    source: PathBuf,
    output_dir: PathBuf,
    log_path: PathBuf,
}

impl VideoJob {
    pub fn new(source: PathBuf, output_dir: PathBuf, log_path: PathBuf) -> Self {
        Self {
            source,
            output_dir,
            log_path,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Display form of the source's file name, for the log line.
    /// Non-UTF-8 bytes are replaced.
    pub fn file_name(&self) -> String {
        self.source_name().to_string_lossy().into_owned()
    }

    /// Copy target: the output directory joined with the source's file name,
    /// byte for byte.
    pub fn destination(&self) -> PathBuf {
        self.output_dir.join(self.source_name())
    }

    fn source_name(&self) -> &OsStr {
        self.source
            .file_name()
            .unwrap_or_else(|| self.source.as_os_str())
    }
}
