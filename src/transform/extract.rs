use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::debug;

use crate::entities::event::{EventBatch, PatientRecord};
use crate::error::CollectorError;
use crate::logging::JobLog;

const LOG_TAG: &str = "Extract Patients";

/// Turns a combined openFDA document into an [`EventBatch`].
pub struct EventExtractor {
    log: Arc<dyn JobLog>,
}

impl EventExtractor {
    pub fn new(log: Arc<dyn JobLog>) -> Self {
        Self { log }
    }

    /// Decodes the `patient` object of every entry in `results`.
    ///
    /// An entry whose patient does not decode is logged as a validation
    /// warning and skipped; it never fails the batch. Only an empty input or
    /// an unparseable top-level document is an error.
    pub fn extract(
        &self,
        raw: &str,
        report_date: OffsetDateTime,
    ) -> Result<EventBatch, CollectorError> {
        if raw.trim().is_empty() {
            let err = CollectorError::InvalidArgument(
                "raw openFDA document must not be null or empty".into(),
            );
            self.log.error("Convert To FDA Events", "Missing raw data", &err);
            return Err(err);
        }

        let process_date = OffsetDateTime::now_utc();
        let document: Map<String, Value> = match serde_json::from_str(raw) {
            Ok(document) => document,
            Err(source) => {
                let err = CollectorError::MalformedDocument {
                    context: "raw openFDA document".into(),
                    source,
                };
                self.log
                    .error("Convert To FDA Events", "Failed to parse raw FDA data JSON", &err);
                return Err(err);
            }
        };

        let patients = self.extract_patients(&document, raw);
        Ok(EventBatch::builder()
            .process_date(process_date)
            .report_date(report_date)
            .patients(patients)
            .build())
    }

    fn extract_patients(&self, document: &Map<String, Value>, raw: &str) -> Vec<PatientRecord> {
        let Some(results) = document.get("results").and_then(Value::as_array) else {
            return Vec::new();
        };

        results
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| self.extract_patient(index, entry, raw))
            .collect()
    }

    fn extract_patient(&self, index: usize, entry: &Value, raw: &str) -> Option<PatientRecord> {
        let patient = match entry.get("patient") {
            None | Some(Value::Null) => {
                debug!(index, "result entry has no patient object");
                return None;
            }
            Some(patient) => patient,
        };

        match PatientRecord::deserialize(patient) {
            Ok(record) => Some(record),
            Err(source) => {
                let err = CollectorError::RecordDecode { index, source };
                self.log.validation_warning(
                    LOG_TAG,
                    &format!("Failed to deserialize patient. {err}"),
                    raw,
                );
                None
            }
        }
    }
}
