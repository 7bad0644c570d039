use std::time::Instant;

use crate::screening::domain::batch_summary::BatchSummary;
use crate::screening::domain::video_outcome::{OutcomeStatus, VideoOutcome};

/// Observer for batch screening events.
///
/// Keeps the dispatcher independent of how progress and diagnostics are
/// shown (terminal, log file, nothing at all).
pub trait ScreeningLogger: Send {
    /// Report how many videos have completed so far.
    fn progress(&mut self, completed: usize, total: usize);

    /// Report one video's terminal outcome.
    fn outcome(&mut self, outcome: &VideoOutcome);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit the end-of-run summary. Default: no-op.
    fn summary(&mut self, _summary: &BatchSummary) {}
}

/// Silent logger that discards all events. Used by tests.
pub struct NullScreeningLogger;

impl ScreeningLogger for NullScreeningLogger {
    fn progress(&mut self, _completed: usize, _total: usize) {}
    fn outcome(&mut self, _outcome: &VideoOutcome) {}
    fn info(&mut self, _message: &str) {}
}

/// CLI logger: progress lines, per-video diagnostics and a closing summary
/// through the `log` facade.
///
/// Progress is printed every `throttle_videos` completions and on the last
/// one, so large batches don't flood the terminal.
pub struct StdoutScreeningLogger {
    throttle_videos: usize,
    start_time: Instant,
}

impl StdoutScreeningLogger {
    pub fn new(throttle_videos: usize) -> Self {
        Self {
            throttle_videos: throttle_videos.max(1),
            start_time: Instant::now(),
        }
    }

    pub fn summary_string(&self, summary: &BatchSummary) -> String {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Screening summary ({} videos, {elapsed:.1}s):",
            summary.found
        )];
        lines.push(format!("  processed:     {}", summary.processed));
        lines.push(format!("  qualified:     {}", summary.qualified));
        lines.push(format!("  not qualified: {}", summary.not_qualified));
        lines.push(format!("  failed:        {}", summary.failed));
        if summary.unpersisted > 0 {
            lines.push(format!(
                "    of which qualified but not saved: {}",
                summary.unpersisted
            ));
        }
        if summary.missing() > 0 {
            lines.push(format!("  no result:     {}", summary.missing()));
        }
        if summary.processed > 0 && elapsed > 0.0 {
            lines.push(format!(
                "  Throughput: {:.2} videos/s",
                summary.processed as f64 / elapsed
            ));
        }
        lines.join("\n")
    }
}

impl Default for StdoutScreeningLogger {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ScreeningLogger for StdoutScreeningLogger {
    fn progress(&mut self, completed: usize, total: usize) {
        if total > 0 && (completed % self.throttle_videos == 0 || completed == total) {
            let pct = completed as f64 / total as f64 * 100.0;
            log::info!("Processing videos: {completed}/{total} ({pct:.1}%)");
        }
    }

    fn outcome(&mut self, outcome: &VideoOutcome) {
        let source = outcome.source.display();
        match &outcome.status {
            OutcomeStatus::Qualified => log::info!(
                "{source}: {} frames with multiple faces, copied to output",
                outcome.qualifying_frames
            ),
            OutcomeStatus::NotQualified => log::debug!(
                "{source}: not qualified ({} of {} sampled frames)",
                outcome.qualifying_frames,
                outcome.frames_examined
            ),
            OutcomeStatus::Failed(reason) => log::warn!("{source}: {reason}"),
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&mut self, summary: &BatchSummary) {
        log::info!("\n\n{}", self.summary_string(summary));
    }
}
