use std::fmt;

/// One line in the screening log.
///
/// Rendered as `<file name>: <count> frames with multiple faces`. Line
/// breaks in the file name are replaced so an entry is always exactly one
/// line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    file_name: String,
    qualifying_frames: usize,
}

impl LogEntry {
    pub fn new(file_name: &str, qualifying_frames: usize) -> Self {
        Self {
            file_name: file_name.replace(['\n', '\r'], " "),
            qualifying_frames,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn qualifying_frames(&self) -> usize {
        self.qualifying_frames
    }

    /// The full line including its trailing newline, ready for a single write.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} frames with multiple faces",
            self.file_name, self.qualifying_frames
        )
    }
}
