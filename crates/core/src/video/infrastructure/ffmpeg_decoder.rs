use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as VideoFrame;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_decoder::VideoDecoder;

/// `AV_TIME_BASE` as a float: container durations are in microseconds.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Random-access frame decoding via ffmpeg-next (libavformat + libavcodec).
///
/// Seeking decodes forward from the current position, so a rising sequence
/// of indices costs one pass over the stream. Requesting an index behind the
/// current position rewinds to the start of the stream first.
pub struct FfmpegDecoder {
    state: Option<DecodeState>,
}

// Safety: an FfmpegDecoder is created and used by one worker thread at a time.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegDecoder {}

struct DecodeState {
    ictx: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    /// Index the next frame out of the decoder will carry.
    next_index: usize,
    eof_sent: bool,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        self.close();
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let total_frames = if stream.frames() > 0 {
            stream.frames() as usize
        } else {
            VideoMetadata::estimate_frames(ictx.duration() as f64 / AV_TIME_BASE, fps)
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            next_index: 0,
            eof_sent: false,
        });

        Ok(metadata)
    }

    fn seek_and_decode(
        &mut self,
        index: usize,
    ) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let state = self.state.as_mut().ok_or("FfmpegDecoder: not opened")?;

        if index < state.next_index {
            state.rewind()?;
        }

        while let Some(decoded) = state.next_decoded()? {
            let current = state.next_index;
            state.next_index += 1;
            if current == index {
                return state.to_rgb(&decoded, index).map(Some);
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.state = None;
    }
}

impl DecodeState {
    fn rewind(&mut self) -> Result<(), ffmpeg_next::Error> {
        self.ictx.seek(0, ..0)?;
        self.decoder.flush();
        self.next_index = 0;
        self.eof_sent = false;
        Ok(())
    }

    /// Pulls the next decoded frame, feeding packets as needed.
    /// Returns `None` once the decoder is drained after end of stream.
    fn next_decoded(&mut self) -> Result<Option<VideoFrame>, ffmpeg_next::Error> {
        loop {
            let mut decoded = VideoFrame::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof_sent {
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    // Corrupt packets are skipped; the decoder resyncs on the next keyframe.
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn to_rgb(
        &mut self,
        decoded: &VideoFrame,
        index: usize,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let mut rgb_frame = VideoFrame::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Frame::new(pixels, self.width, self.height, index))
    }
}

/// Copies pixel data out of an ffmpeg frame, dropping per-row stride padding.
fn extract_rgb_pixels(rgb_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
