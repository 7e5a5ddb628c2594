/// Receives coarse progress updates from long-running passes.
pub trait ProgressObserver: Send + Sync {
    /// `fraction` is in `0.0..=1.0`.
    fn on_progress(&self, fraction: f32, message: &str);
}

/// Observer that discards every update.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _fraction: f32, _message: &str) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(f32, &str) + Send + Sync,
{
    fn on_progress(&self, fraction: f32, message: &str) {
        self(fraction, message)
    }
}
