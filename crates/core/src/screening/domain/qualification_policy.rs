/// A frame qualifies when it has strictly more faces than this.
pub const DEFAULT_MIN_FACES_EXCLUSIVE: usize = 1;

/// A video qualifies when strictly more qualifying frames than this are seen.
pub const DEFAULT_FRAME_THRESHOLD: usize = 20;

/// The two thresholds that decide whether a video is flagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualificationCriteria {
    pub min_faces_exclusive: usize,
    pub frame_threshold: usize,
}

impl Default for QualificationCriteria {
    fn default() -> Self {
        Self {
            min_faces_exclusive: DEFAULT_MIN_FACES_EXCLUSIVE,
            frame_threshold: DEFAULT_FRAME_THRESHOLD,
        }
    }
}

/// Result of feeding one detection count to the policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    ThresholdExceeded,
}

/// Per-video counter of qualifying frames.
///
/// The count only ever grows. Once the threshold has been exceeded every
/// later observation keeps reporting [`Verdict::ThresholdExceeded`].
#[derive(Debug)]
pub struct QualificationPolicy {
    criteria: QualificationCriteria,
    qualifying_frames: usize,
}

impl QualificationPolicy {
    pub fn new(criteria: QualificationCriteria) -> Self {
        Self {
            criteria,
            qualifying_frames: 0,
        }
    }

    pub fn observe(&mut self, detection_count: usize) -> Verdict {
        if detection_count > self.criteria.min_faces_exclusive {
            self.qualifying_frames += 1;
        }
        self.verdict()
    }

    pub fn verdict(&self) -> Verdict {
        if self.qualifying_frames > self.criteria.frame_threshold {
            Verdict::ThresholdExceeded
        } else {
            Verdict::Pending
        }
    }

    pub fn qualifying_frames(&self) -> usize {
        self.qualifying_frames
    }
}

impl Default for QualificationPolicy {
    fn default() -> Self {
        Self::new(QualificationCriteria::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flips_exactly_on_twenty_first_qualifying_frame() {
        let mut policy = QualificationPolicy::default();
        for n in 1..=22 {
            let verdict = policy.observe(2);
            if n <= 20 {
                assert_eq!(verdict, Verdict::Pending, "flipped early at {n}");
            } else {
                assert_eq!(verdict, Verdict::ThresholdExceeded, "not flipped at {n}");
            }
        }
        assert_eq!(policy.qualifying_frames(), 22);
    }

    #[test]
    fn test_single_faces_never_qualify() {
        let mut policy = QualificationPolicy::default();
        for i in 0..500 {
            assert_eq!(policy.observe(i % 2), Verdict::Pending);
        }
        assert_eq!(policy.qualifying_frames(), 0);
    }

    #[test]
    fn test_non_qualifying_frames_do_not_reset_count() {
        let mut policy = QualificationPolicy::default();
        for _ in 0..20 {
            policy.observe(3);
            policy.observe(0);
        }
        assert_eq!(policy.qualifying_frames(), 20);
        assert_eq!(policy.observe(5), Verdict::ThresholdExceeded);
    }

    #[test]
    fn test_custom_criteria() {
        let mut policy = QualificationPolicy::new(QualificationCriteria {
            min_faces_exclusive: 3,
            frame_threshold: 1,
        });
        assert_eq!(policy.observe(3), Verdict::Pending);
        assert_eq!(policy.observe(4), Verdict::Pending);
        assert_eq!(policy.observe(4), Verdict::ThresholdExceeded);
    }

    #[test]
    fn test_zero_threshold_qualifies_on_first_frame() {
        let mut policy = QualificationPolicy::new(QualificationCriteria {
            min_faces_exclusive: 1,
            frame_threshold: 0,
        });
        assert_eq!(policy.verdict(), Verdict::Pending);
        assert_eq!(policy.observe(2), Verdict::ThresholdExceeded);
    }
}
