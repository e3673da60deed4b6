//! Job-level log sink handed to every pipeline component.
//!
//! Components log through [`JobLog`] rather than calling `tracing` directly so
//! that the number and kind of entries a run produces can be asserted in tests.

use tracing::{error, info, warn};

pub trait JobLog: Send + Sync {
    fn info(&self, tag: &str, message: &str);
    fn error(&self, tag: &str, message: &str, cause: &(dyn std::error::Error + 'static));
    fn validation_warning(&self, tag: &str, message: &str, data: &str);
}

/// Forwards job log entries to the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl JobLog for TracingLog {
    fn info(&self, tag: &str, message: &str) {
        info!(tag, "{message}");
    }

    fn error(&self, tag: &str, message: &str, cause: &(dyn std::error::Error + 'static)) {
        error!(tag, error = %cause, "{message}");
    }

    fn validation_warning(&self, tag: &str, message: &str, data: &str) {
        warn!(tag, data, "{message}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::JobLog;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Level {
        Info,
        Error,
        Validation,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct Entry {
        pub level: Level,
        pub tag: String,
        pub message: String,
        pub detail: String,
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingLog {
        entries: Mutex<Vec<Entry>>,
    }

    impl RecordingLog {
        pub(crate) fn entries(&self, level: Level) -> Vec<Entry> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.level == level)
                .cloned()
                .collect()
        }

        fn push(&self, level: Level, tag: &str, message: &str, detail: String) {
            self.entries.lock().unwrap().push(Entry {
                level,
                tag: tag.to_string(),
                message: message.to_string(),
                detail,
            });
        }
    }

    impl JobLog for RecordingLog {
        fn info(&self, tag: &str, message: &str) {
            self.push(Level::Info, tag, message, String::new());
        }

        fn error(&self, tag: &str, message: &str, cause: &(dyn std::error::Error + 'static)) {
            self.push(Level::Error, tag, message, cause.to_string());
        }

        fn validation_warning(&self, tag: &str, message: &str, data: &str) {
            self.push(Level::Validation, tag, message, data.to_string());
        }
    }
}
