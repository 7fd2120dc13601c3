//! Progress reporting contract for long-running vault operations
//!
//! Callbacks receive integers 0–100, never decreasing, with the final call
//! always exactly 100. The reporter enforces that contract so individual
//! operations don't have to.

/// Optional progress callback accepted by export/import
pub type ProgressCallback<'a> = Option<&'a mut dyn FnMut(u8)>;

/// Enforces the monotonic 0–100 progress contract over a raw callback
pub(crate) struct ProgressReporter<'a> {
    callback: ProgressCallback<'a>,
    last: u8,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(callback: ProgressCallback<'a>) -> Self {
        Self { callback, last: 0 }
    }

    /// Report progress; values are clamped so the sequence never decreases
    pub fn report(&mut self, percent: u8) {
        let percent = percent.min(100).max(self.last);
        self.last = percent;
        if let Some(callback) = self.callback.as_mut() {
            callback(percent);
        }
    }

    /// Final call, always exactly 100
    pub fn finish(&mut self) {
        self.report(100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_and_terminates_at_100() {
        let mut seen = Vec::new();
        let mut callback = |p: u8| seen.push(p);

        let mut reporter = ProgressReporter::new(Some(&mut callback));
        reporter.report(0);
        reporter.report(40);
        reporter.report(20); // out of order, must not go backwards
        reporter.report(90);
        reporter.finish();

        assert_eq!(seen, vec![0, 40, 40, 90, 100]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[test]
    fn test_values_clamped_to_100() {
        let mut seen = Vec::new();
        let mut callback = |p: u8| seen.push(p);

        let mut reporter = ProgressReporter::new(Some(&mut callback));
        reporter.report(250);
        assert_eq!(seen, vec![100]);
    }

    #[test]
    fn test_no_callback_is_fine() {
        let mut reporter = ProgressReporter::new(None);
        reporter.report(50);
        reporter.finish();
    }
}
