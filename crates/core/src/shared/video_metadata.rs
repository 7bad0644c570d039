use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Frame count for a container that doesn't record one, estimated from
    /// its duration in seconds.
    pub fn estimate_frames(duration_secs: f64, fps: f64) -> usize {
        if duration_secs <= 0.0 || fps <= 0.0 {
            return 0;
        }
        (duration_secs * fps).floor() as usize
    }
}
