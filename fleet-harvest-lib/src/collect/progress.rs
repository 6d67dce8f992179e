/// Callback returning `(total, current, message)` for determinate progress.
pub type DeterminateCallback = Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>;

/// Callback returning a message for indeterminate progress.
pub type IndeterminateCallback = Box<dyn Fn() -> String + Send + Sync + 'static>;

/// A sink for progress of long-running collection work.
///
/// Implementations are purely observational: nothing they do can influence the collection.
pub trait Progress: Send + Sync {
    /// Set the phase label for the current operation (e.g., "Listing", "Collecting").
    fn set_phase(&self, phase: &str);

    /// Configure determinate progress reporting.
    ///
    /// The callback is polled by the sink and should return (total, current, message).
    fn set_determinate(&self, callback: DeterminateCallback);

    /// Configure indeterminate progress reporting, for work of unknown size.
    fn set_indeterminate(&self, callback: IndeterminateCallback);

    /// Print a message line without disrupting the progress indicator.
    fn println(&self, msg: &str);

    /// Finish and clear the progress indicator.
    fn done(&self);

    /// Whether messages produced for this sink may contain ANSI colors.
    fn use_colors(&self) -> bool {
        false
    }
}

/// A progress sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn set_phase(&self, _phase: &str) {}
    fn set_determinate(&self, _callback: DeterminateCallback) {}
    fn set_indeterminate(&self, _callback: IndeterminateCallback) {}
    fn println(&self, _msg: &str) {}
    fn done(&self) {}
}
