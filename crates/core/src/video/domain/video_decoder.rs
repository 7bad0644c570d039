use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Random-access frame source.
///
/// Implementations handle codec and container details; screening only sees
/// [`Frame`] and [`VideoMetadata`]. Prefer [`OpenVideo::acquire`] over calling
/// `open`/`close` directly so the source is always released.
pub trait VideoDecoder: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Decodes the frame at `index`.
    ///
    /// Returns `Ok(None)` when the stream ends before `index` is reached.
    fn seek_and_decode(
        &mut self,
        index: usize,
    ) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases any resources held by the decoder. Must be idempotent.
    fn close(&mut self);
}

/// An opened video whose decoder is closed when the guard drops.
///
/// `close` runs on every exit path: normal completion, early return,
/// `?` propagation and unwinding.
pub struct OpenVideo<'a> {
    decoder: &'a mut dyn VideoDecoder,
    metadata: VideoMetadata,
}

impl<'a> OpenVideo<'a> {
    /// Opens `path`. On failure the decoder is closed before returning so
    /// nothing partially opened is left behind.
    pub fn acquire(
        decoder: &'a mut dyn VideoDecoder,
        path: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        match decoder.open(path) {
            Ok(metadata) => Ok(Self { decoder, metadata }),
            Err(e) => {
                decoder.close();
                Err(e)
            }
        }
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn frame_count(&self) -> usize {
        self.metadata.total_frames
    }

    pub fn seek_and_decode(
        &mut self,
        index: usize,
    ) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        self.decoder.seek_and_decode(index)
    }
}

impl Drop for OpenVideo<'_> {
    fn drop(&mut self) {
        self.decoder.close();
    }
}
