//! An error reporter that keeps what it is told.

use parking_lot::Mutex;
use tether_net::{ErrorReporter, ReportContext};

/// An [`ErrorReporter`] recording every report.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, ReportContext)>>,
}

impl RecordingReporter {
    /// Creates an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every report received, in order.
    pub fn reports(&self) -> Vec<(String, ReportContext)> {
        self.reports.lock().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, message: &str, context: &ReportContext) {
        self.reports.lock().push((message.to_string(), context.clone()));
    }
}
