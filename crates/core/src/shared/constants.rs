pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Container extensions picked up when enumerating an input directory.
/// Matched case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "m4v", "webm"];

/// Suffix appended to a file while it is being copied into the output
/// directory. Never a recognized video extension.
pub const PARTIAL_SUFFIX: &str = "part";
