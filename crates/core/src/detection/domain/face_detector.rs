use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Implementations own inference state (sessions, buffers), hence `&mut self`.
/// An instance is used by one worker at a time and never shared.
pub trait FaceDetector: Send {
    /// Returns every face found in `frame`. An empty list means no faces.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;
}
