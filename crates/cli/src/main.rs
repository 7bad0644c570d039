use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use facescreen_core::detection::domain::face_detector::FaceDetector;
use facescreen_core::detection::infrastructure::execution_provider::preferred_device_name;
use facescreen_core::detection::infrastructure::model_resolver;
use facescreen_core::detection::infrastructure::onnx_yolo_detector::{
    OnnxYoloDetector, DEFAULT_CONFIDENCE,
};
use facescreen_core::sampling::frame_sampler::DEFAULT_SAMPLE_PROBES;
use facescreen_core::screening::domain::qualification_policy::{
    QualificationCriteria, DEFAULT_FRAME_THRESHOLD, DEFAULT_MIN_FACES_EXCLUSIVE,
};
use facescreen_core::screening::screen_directory_use_case::{
    enumerate_videos, DecoderFactory, DetectorFactory, ScreenDirectoryUseCase, ScreeningConfig,
    ScreeningError,
};
use facescreen_core::screening::screening_logger::StdoutScreeningLogger;
use facescreen_core::shared::constants::{FACE_MODEL_NAME, FACE_MODEL_URL};
use facescreen_core::video::domain::video_decoder::VideoDecoder;
use facescreen_core::video::infrastructure::ffmpeg_decoder::FfmpegDecoder;

type SendError = Box<dyn std::error::Error + Send + Sync>;

const PROGRESS_EVERY_VIDEOS: usize = 10;

/// Screen a directory of videos for frames with more than one face.
///
/// Videos with enough such frames are copied to the output directory and
/// recorded in the log file.
#[derive(Parser, Debug)]
#[command(name = "facescreen")]
struct Cli {
    /// Directory containing the videos to screen.
    #[arg(long)]
    video_dir: PathBuf,

    /// Directory receiving copies of qualifying videos (created if absent).
    #[arg(long)]
    output_dir: PathBuf,

    /// Log file; one line is appended per qualifying video.
    #[arg(long)]
    log_file: PathBuf,

    /// A video qualifies when more than this many sampled frames qualify.
    #[arg(long, default_value_t = DEFAULT_FRAME_THRESHOLD)]
    threshold: usize,

    /// A frame qualifies when more than this many faces are detected.
    #[arg(long, default_value_t = DEFAULT_MIN_FACES_EXCLUSIVE)]
    min_faces: usize,

    /// Target number of frames sampled per video.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_PROBES)]
    probes: usize,

    /// Concurrent workers (default: available parallelism).
    #[arg(long)]
    workers: Option<usize>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Face model path; downloaded to the user cache when omitted.
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() {
    logger_builder().init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// `RUST_LOG` still overrides; without it progress and the summary show at `info`.
fn logger_builder() -> env_logger::Builder {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    screen(&cli)
}

fn screen(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    validate(cli)?;

    // Checked before the model is resolved, which may download it.
    match enumerate_videos(&cli.video_dir) {
        Err(ScreeningError::InputDirMissing(dir)) => {
            // Reported, but not treated as a failure of the run.
            log::error!("Video directory not found: {}", dir.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
        Ok(videos) if videos.is_empty() => {
            log::info!("No videos found in {}", cli.video_dir.display());
            return Ok(());
        }
        Ok(_) => {}
    }

    let config = screening_config(cli);
    log::info!(
        "Screening with {} workers on {}",
        config.workers,
        preferred_device_name()
    );

    let mut use_case = ScreenDirectoryUseCase::new(
        build_detector_factory(cli)?,
        decoder_factory(),
        Box::new(StdoutScreeningLogger::new(PROGRESS_EVERY_VIDEOS)),
        config,
    );
    match use_case.execute(&cli.video_dir, &cli.output_dir, &cli.log_file) {
        Ok(summary) => {
            if summary.found > 0 {
                log::info!(
                    "Done: {} of {} videos qualified, log at {}",
                    summary.qualified,
                    summary.found,
                    cli.log_file.display()
                );
            }
            Ok(())
        }
        Err(ScreeningError::InputDirMissing(dir)) => {
            log::error!("Video directory not found: {}", dir.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn screening_config(cli: &Cli) -> ScreeningConfig {
    let defaults = ScreeningConfig::default();
    ScreeningConfig {
        criteria: QualificationCriteria {
            min_faces_exclusive: cli.min_faces,
            frame_threshold: cli.threshold,
        },
        sample_probes: cli.probes,
        workers: cli.workers.unwrap_or(defaults.workers),
    }
}

/// Resolves the model once up front; each worker then loads its own session.
fn build_detector_factory(cli: &Cli) -> Result<DetectorFactory, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {FACE_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        cli.model.as_deref(),
        FACE_MODEL_NAME,
        FACE_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    log::debug!("Using model {}", model_path.display());

    let confidence = cli.confidence;
    Ok(Arc::new(move || -> Result<Box<dyn FaceDetector>, SendError> {
        let detector = OnnxYoloDetector::new(&model_path, confidence)
            .map_err(|e| -> SendError { e.to_string().into() })?;
        Ok(Box::new(detector))
    }))
}

fn decoder_factory() -> DecoderFactory {
    Arc::new(|| -> Result<Box<dyn VideoDecoder>, SendError> {
        Ok(Box::new(FfmpegDecoder::new()))
    })
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.probes == 0 {
        return Err("Probes must be at least 1".into());
    }
    if cli.workers == Some(0) {
        return Err("Workers must be at least 1".into());
    }
    let same_dir = match (
        fs::canonicalize(&cli.output_dir),
        fs::canonicalize(&cli.video_dir),
    ) {
        (Ok(output), Ok(input)) => output == input,
        _ => cli.output_dir == cli.video_dir,
    };
    if same_dir {
        return Err("Output directory must differ from the video directory".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
