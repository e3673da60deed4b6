//! Ordered post-processing stages applied to an [`EventBatch`] before publish.

use crate::entities::event::{EventBatch, FEMALE_SEX_CODE};

/// How many records the head stage keeps.
pub const HEAD_FILTER_LIMIT: usize = 10;

pub trait EventFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrites the batch's records and total in place. A batch with no
    /// record list passes through untouched.
    fn apply(&self, batch: &mut EventBatch);
}

/// Keeps records whose sex code equals `code`.
#[derive(Debug, Clone)]
pub struct SexFilter {
    code: &'static str,
}

impl SexFilter {
    pub fn female() -> Self {
        Self {
            code: FEMALE_SEX_CODE,
        }
    }
}

impl EventFilter for SexFilter {
    fn name(&self) -> &'static str {
        "sex"
    }

    fn apply(&self, batch: &mut EventBatch) {
        let Some(patients) = batch.patients.take() else {
            return;
        };
        let kept = patients
            .into_iter()
            .filter(|p| p.sex.as_deref() == Some(self.code))
            .collect();
        batch.replace_patients(kept);
    }
}

/// Keeps the first `limit` records.
#[derive(Debug, Clone)]
pub struct HeadFilter {
    limit: usize,
}

impl HeadFilter {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl EventFilter for HeadFilter {
    fn name(&self) -> &'static str {
        "head"
    }

    fn apply(&self, batch: &mut EventBatch) {
        let Some(mut patients) = batch.patients.take() else {
            return;
        };
        patients.truncate(self.limit);
        batch.replace_patients(patients);
    }
}

/// Stages run in the order they were added; every stage runs, even after an
/// earlier one emptied the batch.
#[derive(Default)]
pub struct FilterChain {
    stages: Vec<Box<dyn EventFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production chain: female records only, then the first
    /// [`HEAD_FILTER_LIMIT`] of those.
    pub fn standard() -> Self {
        Self::new()
            .then(SexFilter::female())
            .then(HeadFilter::new(HEAD_FILTER_LIMIT))
    }

    pub fn then(mut self, stage: impl EventFilter + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn apply(&self, mut batch: EventBatch) -> EventBatch {
        for stage in &self.stages {
            stage.apply(&mut batch);
        }
        batch
    }
}
