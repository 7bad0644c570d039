use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::detection::domain::face_detector::FaceDetector;
use crate::sampling::frame_sampler::DEFAULT_SAMPLE_PROBES;
use crate::screening::domain::batch_summary::BatchSummary;
use crate::screening::domain::qualification_policy::QualificationCriteria;
use crate::screening::domain::video_job::VideoJob;
use crate::screening::domain::video_outcome::{FailureReason, VideoOutcome};
use crate::screening::infrastructure::append_log_writer::AppendLogWriter;
use crate::screening::infrastructure::output_sink::OutputSink;
use crate::screening::screen_video_use_case::ScreenVideoUseCase;
use crate::screening::screening_logger::ScreeningLogger;
use crate::shared::constants::VIDEO_EXTENSIONS;
use crate::video::domain::video_decoder::VideoDecoder;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Builds one detector per worker. Called on the worker's own thread.
pub type DetectorFactory =
    Arc<dyn Fn() -> Result<Box<dyn FaceDetector>, SendError> + Send + Sync>;

/// Builds one decoder per worker. Called on the worker's own thread.
pub type DecoderFactory =
    Arc<dyn Fn() -> Result<Box<dyn VideoDecoder>, SendError> + Send + Sync>;

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("input directory not found: {0}")]
    InputDirMissing(PathBuf),
    #[error("failed to read input directory {path}: {source}")]
    InputDirUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open log file {path}: {source}")]
    LogOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Batch screening parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreeningConfig {
    pub criteria: QualificationCriteria,
    pub sample_probes: usize,
    /// Upper bound on concurrent workers. Never more than one per video.
    pub workers: usize,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            criteria: QualificationCriteria::default(),
            sample_probes: DEFAULT_SAMPLE_PROBES,
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

/// Screens every video in a directory with a bounded pool of workers.
///
/// Layout: `jobs → worker × N [decode/detect/persist] → results → main`
///
/// Each worker builds its own detector and decoder and screens one video at
/// a time. Qualifying videos are copied by the worker that screened them;
/// log entries from all workers funnel through a single [`AppendLogWriter`].
/// The calling thread consumes outcomes in completion order and drives the
/// [`ScreeningLogger`].
pub struct ScreenDirectoryUseCase {
    detector_factory: DetectorFactory,
    decoder_factory: DecoderFactory,
    logger: Box<dyn ScreeningLogger>,
    config: ScreeningConfig,
}

impl ScreenDirectoryUseCase {
    pub fn new(
        detector_factory: DetectorFactory,
        decoder_factory: DecoderFactory,
        logger: Box<dyn ScreeningLogger>,
        config: ScreeningConfig,
    ) -> Self {
        Self {
            detector_factory,
            decoder_factory,
            logger,
            config,
        }
    }

    pub fn execute(
        &mut self,
        video_dir: &Path,
        output_dir: &Path,
        log_path: &Path,
    ) -> Result<BatchSummary, ScreeningError> {
        let videos = enumerate_videos(video_dir)?;
        if videos.is_empty() {
            self.logger
                .info(&format!("No videos found in {}", video_dir.display()));
            return Ok(BatchSummary::new(0));
        }
        self.logger.info(&format!(
            "Found {} videos in {}",
            videos.len(),
            video_dir.display()
        ));

        fs::create_dir_all(output_dir).map_err(|source| ScreeningError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let log_writer =
            AppendLogWriter::spawn(log_path).map_err(|source| ScreeningError::LogOpen {
                path: log_path.to_path_buf(),
                source,
            })?;

        let total = videos.len();
        let pool_size = self.config.workers.clamp(1, total);
        log::debug!("Screening {total} videos with {pool_size} workers");

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<VideoJob>();
        for source in videos {
            let job = VideoJob::new(source, output_dir.to_path_buf(), log_path.to_path_buf());
            // Receiver is alive in this scope.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = crossbeam_channel::unbounded::<VideoOutcome>();
        let sink = OutputSink::new(log_writer.lane());
        let handles = (0..pool_size)
            .map(|id| {
                self.spawn_worker(id, job_rx.clone(), result_tx.clone(), sink.clone())
            })
            .collect::<Result<Vec<_>, _>>();
        drop(result_tx);
        drop(sink);
        drop(job_rx);
        let handles = handles?;

        let summary = self.collect_results(result_rx, total);

        for handle in handles {
            if handle.join().is_err() {
                log::error!("Screening worker panicked");
            }
        }
        let written = log_writer.finish();
        log::debug!("Appended {written} entries to {}", log_path.display());

        self.logger.summary(&summary);
        Ok(summary)
    }

    fn spawn_worker(
        &self,
        id: usize,
        job_rx: Receiver<VideoJob>,
        result_tx: Sender<VideoOutcome>,
        sink: OutputSink,
    ) -> Result<JoinHandle<()>, ScreeningError> {
        let detector_factory = Arc::clone(&self.detector_factory);
        let decoder_factory = Arc::clone(&self.decoder_factory);
        let config = self.config;

        std::thread::Builder::new()
            .name(format!("screen-worker-{id}"))
            .spawn(move || {
                let build = || -> Result<ScreenVideoUseCase, SendError> {
                    Ok(ScreenVideoUseCase::new(
                        decoder_factory()?,
                        detector_factory()?,
                        config.criteria,
                        config.sample_probes,
                    ))
                };
                run_worker(id, build, job_rx, result_tx, sink);
            })
            .map_err(ScreeningError::Spawn)
    }

    fn collect_results(&mut self, result_rx: Receiver<VideoOutcome>, total: usize) -> BatchSummary {
        let mut summary = BatchSummary::new(total);
        self.logger.progress(0, total);
        for outcome in result_rx {
            summary.record(&outcome);
            self.logger.outcome(&outcome);
            self.logger.progress(summary.processed, total);
        }
        summary
    }
}

/// Worker loop: pull jobs until the queue is drained.
///
/// Instances are built lazily and rebuilt after a panic. If they cannot be
/// built (error or panic in a factory), the job at hand fails with
/// `DetectorUnavailable`.
fn run_worker(
    id: usize,
    build: impl Fn() -> Result<ScreenVideoUseCase, SendError>,
    job_rx: Receiver<VideoJob>,
    result_tx: Sender<VideoOutcome>,
    sink: OutputSink,
) {
    let mut screener: Option<ScreenVideoUseCase> = None;
    for job in job_rx {
        if screener.is_none() {
            let built = catch_unwind(AssertUnwindSafe(|| build()))
                .unwrap_or_else(|payload| Err(panic_message(payload.as_ref()).into()));
            match built {
                Ok(built) => screener = Some(built),
                Err(e) => {
                    log::error!("Worker {id}: failed to build detector/decoder: {e}");
                    let outcome = VideoOutcome::failed(
                        job.source(),
                        FailureReason::DetectorUnavailable(e.to_string()),
                    );
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                    continue;
                }
            }
        }
        let Some(use_case) = screener.as_mut() else {
            continue;
        };

        let outcome = match catch_unwind(AssertUnwindSafe(|| use_case.execute(job.source()))) {
            Ok(outcome) => sink.persist(&job, outcome),
            Err(payload) => {
                let cause = panic_message(payload.as_ref());
                log::error!("Worker {id}: panicked on {}: {cause}", job.source().display());
                screener = None;
                VideoOutcome::failed(job.source(), FailureReason::DetectorUnavailable(cause))
            }
        };
        if result_tx.send(outcome).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}

/// Lists the videos directly inside `dir`, sorted by path.
///
/// Only regular files with a recognized extension (any case) are returned;
/// subdirectories are not descended into.
pub fn enumerate_videos(dir: &Path) -> Result<Vec<PathBuf>, ScreeningError> {
    if !dir.is_dir() {
        return Err(ScreeningError::InputDirMissing(dir.to_path_buf()));
    }
    let unreadable = |source| ScreeningError::InputDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut videos = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && is_video(&path) {
            videos.push(path);
        }
    }
    videos.sort();
    Ok(videos)
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::screening_logger::NullScreeningLogger;
    use crate::shared::face_box::FaceBox;
    use crate::shared::frame::Frame;
    use crate::shared::video_metadata::VideoMetadata;
    use rstest::rstest;
    use std::sync::Mutex;

    const BROKEN: &[u8] = b"broken";
    const PANIC_FACES: u8 = 255;

    /// Decoder that reads the file's bytes as the per-frame face count.
    /// A file whose content is `BROKEN` cannot be opened.
    #[derive(Default)]
    struct FileScriptDecoder {
        script: Option<Vec<u8>>,
    }

    impl VideoDecoder for FileScriptDecoder {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            let bytes = fs::read(path)?;
            if bytes == BROKEN {
                return Err("invalid data found when processing input".into());
            }
            let total_frames = bytes.len();
            self.script = Some(bytes);
            Ok(VideoMetadata {
                width: 1,
                height: 1,
                fps: 30.0,
                total_frames,
                codec: "script".into(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn seek_and_decode(
            &mut self,
            index: usize,
        ) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            let script = self.script.as_ref().ok_or("not opened")?;
            Ok(script
                .get(index)
                .map(|&n| Frame::new(vec![n, 0, 0], 1, 1, index)))
        }

        fn close(&mut self) {
            self.script = None;
        }
    }

    /// Reports as many faces as the frame's first byte; panics on
    /// `PANIC_FACES`.
    struct ByteCountDetector;

    impl FaceDetector for ByteCountDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            let n = frame.data()[0];
            if n == PANIC_FACES {
                panic!("inference crashed");
            }
            let face = FaceBox {
                x1: 0.0,
                y1: 0.0,
                x2: 1.0,
                y2: 1.0,
                confidence: 0.9,
            };
            Ok(vec![face; n as usize])
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLogger {
        progress: Arc<Mutex<Vec<(usize, usize)>>>,
        messages: Arc<Mutex<Vec<String>>>,
        summaries: Arc<Mutex<Vec<BatchSummary>>>,
    }

    impl ScreeningLogger for RecordingLogger {
        fn progress(&mut self, completed: usize, total: usize) {
            self.progress.lock().unwrap().push((completed, total));
        }
        fn outcome(&mut self, _outcome: &VideoOutcome) {}
        fn info(&mut self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
        fn summary(&mut self, summary: &BatchSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
    }

    struct Dirs {
        _root: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
        log: PathBuf,
    }

    fn dirs() -> Dirs {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("videos");
        fs::create_dir_all(&input).unwrap();
        Dirs {
            output: root.path().join("flagged"),
            log: root.path().join("screened.log"),
            input,
            _root: root,
        }
    }

    fn write_video(dir: &Path, name: &str, faces_per_frame: &[u8]) {
        fs::write(dir.join(name), faces_per_frame).unwrap();
    }

    fn detectors() -> DetectorFactory {
        Arc::new(|| -> Result<Box<dyn FaceDetector>, SendError> { Ok(Box::new(ByteCountDetector)) })
    }

    fn decoders() -> DecoderFactory {
        Arc::new(|| -> Result<Box<dyn VideoDecoder>, SendError> {
            Ok(Box::new(FileScriptDecoder::default()))
        })
    }

    fn use_case(workers: usize, logger: Box<dyn ScreeningLogger>) -> ScreenDirectoryUseCase {
        ScreenDirectoryUseCase::new(
            detectors(),
            decoders(),
            logger,
            ScreeningConfig {
                workers,
                ..ScreeningConfig::default()
            },
        )
    }

    fn run(d: &Dirs, workers: usize) -> Result<BatchSummary, ScreeningError> {
        use_case(workers, Box::new(NullScreeningLogger)).execute(&d.input, &d.output, &d.log)
    }

    fn output_names(d: &Dirs) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&d.output)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn log_lines(d: &Dirs) -> Vec<String> {
        let mut lines: Vec<String> = fs::read_to_string(&d.log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        lines.sort();
        lines
    }

    /// 12 videos; every third one has 25 frames with two faces.
    fn populate_batch(d: &Dirs) -> Vec<String> {
        let mut qualifying = Vec::new();
        for i in 0..12 {
            let name = format!("clip{i:02}.mp4");
            if i % 3 == 0 {
                write_video(&d.input, &name, &[2; 25]);
                qualifying.push(name);
            } else {
                write_video(&d.input, &name, &[1; 25]);
            }
        }
        qualifying
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    #[case(16)]
    fn test_only_qualifying_videos_are_copied_and_logged(#[case] workers: usize) {
        let d = dirs();
        let qualifying = populate_batch(&d);

        let summary = run(&d, workers).unwrap();

        assert_eq!(summary.found, 12);
        assert_eq!(summary.processed, 12);
        assert_eq!(summary.qualified, 4);
        assert_eq!(summary.not_qualified, 8);
        assert_eq!(summary.failed, 0);
        assert_eq!(output_names(&d), qualifying);
        let expected: Vec<String> = qualifying
            .iter()
            .map(|n| format!("{n}: 21 frames with multiple faces"))
            .collect();
        assert_eq!(log_lines(&d), expected);
        for name in &qualifying {
            assert_eq!(
                fs::read(d.output.join(name)).unwrap(),
                fs::read(d.input.join(name)).unwrap()
            );
        }
    }

    #[test]
    fn test_unreadable_source_fails_without_affecting_batch() {
        let d = dirs();
        write_video(&d.input, "a.mp4", &[3; 30]);
        fs::write(d.input.join("b.avi"), BROKEN).unwrap();
        write_video(&d.input, "c.mp4", &[0; 30]);

        let summary = run(&d, 2).unwrap();

        assert_eq!(summary.qualified, 1);
        assert_eq!(summary.not_qualified, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unpersisted, 0);
        assert_eq!(output_names(&d), vec!["a.mp4"]);
        assert_eq!(log_lines(&d), vec!["a.mp4: 21 frames with multiple faces"]);
    }

    #[test]
    fn test_second_run_appends_without_corrupting_log() {
        let d = dirs();
        write_video(&d.input, "party.mp4", &[2; 40]);
        write_video(&d.input, "solo.mp4", &[1; 40]);

        run(&d, 2).unwrap();
        let summary = run(&d, 2).unwrap();

        assert_eq!(summary.qualified, 1);
        assert_eq!(output_names(&d), vec!["party.mp4"]);
        assert_eq!(
            log_lines(&d),
            vec![
                "party.mp4: 21 frames with multiple faces",
                "party.mp4: 21 frames with multiple faces"
            ]
        );
    }

    #[test]
    fn test_empty_directory_exits_cleanly() {
        let d = dirs();
        fs::write(d.input.join("notes.txt"), b"not a video").unwrap();
        let logger = RecordingLogger::default();

        let summary = use_case(4, Box::new(logger.clone()))
            .execute(&d.input, &d.output, &d.log)
            .unwrap();

        assert_eq!(summary, BatchSummary::new(0));
        assert!(!d.log.exists());
        let messages = logger.messages.lock().unwrap();
        assert!(messages[0].starts_with("No videos found"));
    }

    #[test]
    fn test_missing_input_directory_is_reported() {
        let d = dirs();
        let missing = d.input.join("nope");

        let err = use_case(1, Box::new(NullScreeningLogger))
            .execute(&missing, &d.output, &d.log)
            .unwrap_err();

        assert!(matches!(err, ScreeningError::InputDirMissing(p) if p == missing));
    }

    #[test]
    fn test_output_directory_is_created() {
        let d = dirs();
        write_video(&d.input, "a.mp4", &[0; 3]);
        assert!(!d.output.exists());

        run(&d, 1).unwrap();

        assert!(d.output.is_dir());
    }

    #[test]
    fn test_failing_detector_factory_fails_every_job() {
        let d = dirs();
        populate_batch(&d);

        let mut use_case = ScreenDirectoryUseCase::new(
            Arc::new(|| -> Result<Box<dyn FaceDetector>, SendError> {
                Err("model file is corrupt".into())
            }),
            decoders(),
            Box::new(NullScreeningLogger),
            ScreeningConfig {
                workers: 3,
                ..ScreeningConfig::default()
            },
        );
        let summary = use_case.execute(&d.input, &d.output, &d.log).unwrap();

        assert_eq!(summary.processed, 12);
        assert_eq!(summary.failed, 12);
        assert!(output_names(&d).is_empty());
        assert!(log_lines(&d).is_empty());
    }

    #[test]
    fn test_panicking_detector_factory_fails_every_job() {
        let d = dirs();
        populate_batch(&d);

        let mut use_case = ScreenDirectoryUseCase::new(
            Arc::new(|| -> Result<Box<dyn FaceDetector>, SendError> {
                panic!("session init crashed")
            }),
            decoders(),
            Box::new(NullScreeningLogger),
            ScreeningConfig {
                workers: 2,
                ..ScreeningConfig::default()
            },
        );
        let summary = use_case.execute(&d.input, &d.output, &d.log).unwrap();

        assert_eq!(summary.processed, 12);
        assert_eq!(summary.failed, 12);
        assert_eq!(summary.missing(), 0);
        assert!(output_names(&d).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_are_copied_byte_for_byte() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let d = dirs();
        let first = OsStr::from_bytes(b"a\xff.mp4");
        let second = OsStr::from_bytes(b"a\xfe.mp4");
        fs::write(d.input.join(first), [2u8; 25]).unwrap();
        fs::write(d.input.join(second), [3u8; 25]).unwrap();

        let summary = run(&d, 2).unwrap();

        assert_eq!(summary.qualified, 2);
        let mut copied: Vec<Vec<u8>> = fs::read_dir(&d.output)
            .unwrap()
            .map(|e| e.unwrap().file_name().as_bytes().to_vec())
            .collect();
        copied.sort();
        assert_eq!(copied, vec![b"a\xfe.mp4".to_vec(), b"a\xff.mp4".to_vec()]);
        assert_eq!(fs::read(d.output.join(first)).unwrap(), vec![2u8; 25]);
        assert_eq!(fs::read(d.output.join(second)).unwrap(), vec![3u8; 25]);
        assert_eq!(log_lines(&d).len(), 2);
    }

    #[test]
    fn test_panicking_detector_fails_one_video_only() {
        let d = dirs();
        write_video(&d.input, "a.mp4", &[PANIC_FACES; 5]);
        write_video(&d.input, "b.mp4", &[2; 25]);
        write_video(&d.input, "c.mp4", &[2; 25]);

        let summary = run(&d, 1).unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.qualified, 2);
        assert_eq!(output_names(&d), vec!["b.mp4", "c.mp4"]);
    }

    #[test]
    fn test_progress_counts_every_completion() {
        let d = dirs();
        populate_batch(&d);
        let logger = RecordingLogger::default();

        use_case(4, Box::new(logger.clone()))
            .execute(&d.input, &d.output, &d.log)
            .unwrap();

        let progress = logger.progress.lock().unwrap();
        let completed: Vec<usize> = progress.iter().map(|&(c, _)| c).collect();
        assert_eq!(completed, (0..=12).collect::<Vec<_>>());
        assert!(progress.iter().all(|&(_, total)| total == 12));
        assert!(logger.messages.lock().unwrap()[0].starts_with("Found 12 videos"));
        assert_eq!(logger.summaries.lock().unwrap()[0].qualified, 4);
    }

    #[test]
    fn test_custom_criteria_are_applied() {
        let d = dirs();
        write_video(&d.input, "crowd.mp4", &[3; 10]);
        write_video(&d.input, "pair.mp4", &[2; 10]);

        let mut use_case = use_case(2, Box::new(NullScreeningLogger));
        use_case.config.criteria = QualificationCriteria {
            min_faces_exclusive: 2,
            frame_threshold: 5,
        };
        let summary = use_case.execute(&d.input, &d.output, &d.log).unwrap();

        assert_eq!(summary.qualified, 1);
        assert_eq!(log_lines(&d), vec!["crowd.mp4: 6 frames with multiple faces"]);
    }

    #[test]
    fn test_enumerate_filters_and_sorts() {
        let d = dirs();
        for name in ["b.MP4", "a.avi", "c.mkv", "d.txt", "e.mp4.part", "f"] {
            fs::write(d.input.join(name), b"x").unwrap();
        }
        fs::create_dir(d.input.join("nested.mp4")).unwrap();

        let names: Vec<String> = enumerate_videos(&d.input)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.avi", "b.MP4", "c.mkv"]);
    }

    #[test]
    fn test_default_config() {
        let config = ScreeningConfig::default();
        assert_eq!(config.sample_probes, 45);
        assert!(config.workers >= 1);
        assert_eq!(config.criteria, QualificationCriteria::default());
    }
}
