//! For tracking conversion progress and aborting early

/// A trait that is used to report progress to some consumer.
///
/// The [`Resampler`][crate::Resampler] calls it once per source frame,
/// and the [`Batch`][crate::Batch] once per converted file.
pub trait ProgressReporter: Send {
    /// Called after each unit of work has been completed.
    ///
    /// This method may return `false` to abort processing.
    fn increase(&mut self) -> bool;

    /// Writing is done when the call that was given this reporter returns
    fn done(&mut self, _msg: &str) {}
}

/// No-op progress reporter
pub struct NoProgress {}

impl ProgressReporter for NoProgress {
    fn increase(&mut self) -> bool {
        true
    }
    fn done(&mut self, _msg: &str) {}
}

/// Implement the progress reporter trait for a progress bar,
/// to make it usable for batch progress reporting.
#[cfg(feature = "pbr")]
impl<T> ProgressReporter for pbr::ProgressBar<T> where T: std::io::Write + Send {
    fn increase(&mut self) -> bool {
        self.inc();
        true
    }

    fn done(&mut self, msg: &str) {
        self.finish_print(msg);
    }
}
