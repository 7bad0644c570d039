use super::video_outcome::{OutcomeStatus, VideoOutcome};

/// Tally of outcomes for one screening run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub found: usize,
    pub processed: usize,
    pub qualified: usize,
    pub not_qualified: usize,
    pub failed: usize,
    /// Subset of `failed`: detection qualified the video but the copy or
    /// log entry could not be written.
    pub unpersisted: usize,
}

impl BatchSummary {
    pub fn new(found: usize) -> Self {
        Self {
            found,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &VideoOutcome) {
        self.processed += 1;
        match outcome.status {
            OutcomeStatus::Qualified => self.qualified += 1,
            OutcomeStatus::NotQualified => self.not_qualified += 1,
            OutcomeStatus::Failed(_) => {
                self.failed += 1;
                if outcome.is_unpersisted() {
                    self.unpersisted += 1;
                }
            }
        }
    }

    /// Jobs that never produced an outcome (lost to a crashed worker).
    pub fn missing(&self) -> usize {
        self.found.saturating_sub(self.processed)
    }
}
