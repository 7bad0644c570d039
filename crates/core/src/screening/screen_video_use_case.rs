use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::sampling::frame_sampler::{FrameSampler, SampleIndices};
use crate::screening::domain::qualification_policy::{
    QualificationCriteria, QualificationPolicy, Verdict,
};
use crate::screening::domain::video_outcome::{FailureReason, OutcomeStatus, VideoOutcome};
use crate::shared::frame::Frame;
use crate::video::domain::video_decoder::{OpenVideo, VideoDecoder};

/// States a single video moves through while being screened.
///
/// `Qualified`, `NotQualified` and `Failed` are terminal.
#[derive(Debug)]
pub enum WorkerState {
    Opening,
    Sampling,
    Deciding(Frame),
    Qualified,
    NotQualified,
    Failed(FailureReason),
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerState::Qualified | WorkerState::NotQualified | WorkerState::Failed(_)
        )
    }
}

/// Screens one video: open, sample, detect, decide.
///
/// Owns its detector and decoder for its whole lifetime and reuses them
/// across the videos it is given, one at a time.
pub struct ScreenVideoUseCase {
    decoder: Box<dyn VideoDecoder>,
    detector: Box<dyn FaceDetector>,
    criteria: QualificationCriteria,
    sample_probes: usize,
}

impl ScreenVideoUseCase {
    pub fn new(
        decoder: Box<dyn VideoDecoder>,
        detector: Box<dyn FaceDetector>,
        criteria: QualificationCriteria,
        sample_probes: usize,
    ) -> Self {
        Self {
            decoder,
            detector,
            criteria,
            sample_probes,
        }
    }

    /// Runs the state machine to a terminal state.
    ///
    /// The video is released before this returns, whichever terminal state
    /// was reached.
    pub fn execute(&mut self, source: &Path) -> VideoOutcome {
        let decoder: &mut dyn VideoDecoder = self.decoder.as_mut();
        let mut run = ScreeningRun {
            source,
            decoder: Some(decoder),
            detector: self.detector.as_mut(),
            policy: QualificationPolicy::new(self.criteria),
            sample_probes: self.sample_probes,
            video: None,
            samples: None,
            frames_examined: 0,
        };

        let mut state = WorkerState::Opening;
        while !state.is_terminal() {
            state = run.step(state);
        }
        run.release();

        let status = match state {
            WorkerState::Qualified => OutcomeStatus::Qualified,
            WorkerState::Failed(reason) => OutcomeStatus::Failed(reason),
            _ => OutcomeStatus::NotQualified,
        };
        VideoOutcome::new(source, status, run.policy.qualifying_frames())
            .with_frames_examined(run.frames_examined)
    }
}

/// Per-video working set. Dropping it drops the [`OpenVideo`] guard.
struct ScreeningRun<'a> {
    source: &'a Path,
    /// Moves into `video` once opened.
    decoder: Option<&'a mut dyn VideoDecoder>,
    detector: &'a mut dyn FaceDetector,
    policy: QualificationPolicy,
    sample_probes: usize,
    video: Option<OpenVideo<'a>>,
    samples: Option<SampleIndices>,
    frames_examined: usize,
}

impl<'a> ScreeningRun<'a> {
    fn step(&mut self, state: WorkerState) -> WorkerState {
        match state {
            WorkerState::Opening => self.open(),
            WorkerState::Sampling => self.sample(),
            WorkerState::Deciding(frame) => self.decide(&frame),
            terminal => terminal,
        }
    }

    fn open(&mut self) -> WorkerState {
        let Some(decoder) = self.decoder.take() else {
            return WorkerState::Failed(FailureReason::SourceUnreadable(
                "decoder already in use".to_string(),
            ));
        };
        match OpenVideo::acquire(decoder, self.source) {
            Ok(video) => {
                let sampler = FrameSampler::with_probes(video.frame_count(), self.sample_probes);
                let metadata = video.metadata();
                log::debug!(
                    "{}: {} frames at {:.2} fps ({}), sampling every {} ({} probes)",
                    self.source.display(),
                    sampler.frame_count(),
                    metadata.fps,
                    metadata.codec,
                    sampler.step(),
                    sampler.len()
                );
                self.samples = Some(sampler.indices());
                self.video = Some(video);
                WorkerState::Sampling
            }
            Err(e) => WorkerState::Failed(FailureReason::SourceUnreadable(e.to_string())),
        }
    }

    fn sample(&mut self) -> WorkerState {
        let (Some(video), Some(samples)) = (self.video.as_mut(), self.samples.as_mut()) else {
            return WorkerState::Failed(FailureReason::SourceUnreadable(
                "video not open".to_string(),
            ));
        };
        let Some(index) = samples.next() else {
            return WorkerState::NotQualified;
        };
        match video.seek_and_decode(index) {
            Ok(Some(frame)) => WorkerState::Deciding(frame),
            Ok(None) => {
                log::debug!(
                    "{}: stream ended before frame {index}",
                    self.source.display()
                );
                WorkerState::NotQualified
            }
            Err(e) => WorkerState::Failed(FailureReason::DecodeFault {
                frame: index,
                cause: e.to_string(),
            }),
        }
    }

    fn decide(&mut self, frame: &Frame) -> WorkerState {
        self.frames_examined += 1;
        match self.detector.detect(frame) {
            Ok(faces) => match self.policy.observe(faces.len()) {
                Verdict::ThresholdExceeded => WorkerState::Qualified,
                Verdict::Pending => WorkerState::Sampling,
            },
            Err(e) => WorkerState::Failed(FailureReason::DetectorFault {
                frame: frame.index(),
                cause: e.to_string(),
            }),
        }
    }

    fn release(&mut self) {
        self.samples = None;
        self.video = None;
    }
}
