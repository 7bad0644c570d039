/// Number of frames probed per video when no other value is configured.
pub const DEFAULT_SAMPLE_PROBES: usize = 45;

/// Evenly spaced frame indices across a video.
///
/// The step is `max(1, frame_count / probes)` (integer division), so a long
/// video is probed roughly `probes` times regardless of its length. Videos
/// shorter than `2 * probes` frames are sampled at every frame.
///
/// The sampler is `Copy`; each call to [`indices`](Self::indices) starts a
/// fresh pass from frame 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSampler {
    frame_count: usize,
    step: usize,
}

impl FrameSampler {
    pub fn new(frame_count: usize) -> Self {
        Self::with_probes(frame_count, DEFAULT_SAMPLE_PROBES)
    }

    pub fn with_probes(frame_count: usize, probes: usize) -> Self {
        let step = (frame_count / probes.max(1)).max(1);
        Self { frame_count, step }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Number of indices a full pass yields.
    pub fn len(&self) -> usize {
        self.frame_count.div_ceil(self.step)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn indices(&self) -> SampleIndices {
        SampleIndices {
            next: 0,
            step: self.step,
            end: self.frame_count,
        }
    }
}

impl IntoIterator for FrameSampler {
    type Item = usize;
    type IntoIter = SampleIndices;

    fn into_iter(self) -> SampleIndices {
        self.indices()
    }
}

/// Lazy pass over a [`FrameSampler`]'s indices.
#[derive(Clone, Debug)]
pub struct SampleIndices {
    next: usize,
    step: usize,
    end: usize,
}

impl Iterator for SampleIndices {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next = self.next.saturating_add(self.step);
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next).div_ceil(self.step);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SampleIndices {}
