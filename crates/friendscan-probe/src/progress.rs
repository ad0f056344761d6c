/// Snapshot emitted after every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub batch: usize,
    pub batches: usize,
    /// Eligible contacts probed so far
    pub processed: usize,
    pub total: usize,
    pub findings: usize,
}

/// Receives one update per completed batch.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: &ProgressUpdate) {}
}
