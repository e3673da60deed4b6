use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Sex code openFDA uses for female patients (`1` male, `0` unknown).
pub const FEMALE_SEX_CODE: &str = "2";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "patientonsetage", default, skip_serializing_if = "Option::is_none")]
    pub onset_age: Option<String>,
    /// 800 decade, 801 year, 802 month, 803 week, 804 day, 805 hour.
    #[serde(rename = "patientonsetageunit", default, skip_serializing_if = "Option::is_none")]
    pub onset_age_unit: Option<String>,
    #[serde(rename = "patientagegroup", default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(rename = "patientweight", default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<String>,
    #[serde(rename = "patientsex", default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    #[serde(rename = "reaction", default, skip_serializing_if = "Option::is_none")]
    pub reactions: Option<Vec<Reaction>>,
    #[serde(rename = "drug", default, skip_serializing_if = "Option::is_none")]
    pub drugs: Option<Vec<Drug>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl PatientRecord {
    pub fn is_female(&self) -> bool {
        self.sex.as_deref() == Some(FEMALE_SEX_CODE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drug {
    /// 1 suspect, 2 concomitant, 3 interacting.
    #[serde(rename = "drugcharacterization", default, skip_serializing_if = "Option::is_none")]
    pub characterization: Option<String>,
    #[serde(rename = "medicinalproduct", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "drugbatchnumb", default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    #[serde(rename = "drugauthorizationnumb", default, skip_serializing_if = "Option::is_none")]
    pub authorization_number: Option<String>,
    #[serde(rename = "drugdosagetext", default, skip_serializing_if = "Option::is_none")]
    pub dosage_text: Option<String>,
    #[serde(rename = "drugdosageform", default, skip_serializing_if = "Option::is_none")]
    pub dosage_form: Option<String>,
    #[serde(rename = "drugadministrationroute", default, skip_serializing_if = "Option::is_none")]
    pub administration_route: Option<String>,
    #[serde(rename = "drugindication", default, skip_serializing_if = "Option::is_none")]
    pub indication: Option<String>,
    #[serde(rename = "actiondrug", default, skip_serializing_if = "Option::is_none")]
    pub action_taken: Option<String>,
    #[serde(rename = "drugadditional", default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<String>,
    #[serde(rename = "activesubstance", default, skip_serializing_if = "Option::is_none")]
    pub active_substance: Option<ActiveSubstance>,
    #[serde(rename = "openfda", default, skip_serializing_if = "Option::is_none")]
    pub openfda: Option<OpenFdaMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveSubstance {
    #[serde(rename = "activesubstancename", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenFdaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_number: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_name: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_ndc: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substance_name: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_ndc: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nui: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharm_class_epc: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pharm_class_moa: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unii: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "reactionmeddraversionpt", default, skip_serializing_if = "Option::is_none")]
    pub meddra_version: Option<String>,
    #[serde(rename = "reactionmeddrapt", default, skip_serializing_if = "Option::is_none")]
    pub meddra_term: Option<String>,
    /// 1 recovered, 2 recovering, 3 not recovered, 4 with sequelae, 5 fatal, 6 unknown.
    #[serde(rename = "reactionoutcome", default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "narrativeincludeclinical", default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// One run's worth of extracted patient records.
///
/// `patients` is `None` whenever `total_records` is zero; it is never
/// `Some(vec![])`. Filters rewrite `patients` and `total_records` together
/// through [`EventBatch::replace_patients`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventBatch {
    #[serde(with = "time::serde::rfc3339")]
    pub process_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub report_date: OffsetDateTime,
    pub total_records: usize,
    pub patients: Option<Vec<PatientRecord>>,
}

impl EventBatch {
    pub fn builder() -> EventBatchBuilder {
        EventBatchBuilder::default()
    }

    /// Replaces the record list and recomputes the total from its length.
    /// An empty replacement leaves `patients` absent.
    pub fn replace_patients(&mut self, patients: Vec<PatientRecord>) {
        self.total_records = patients.len();
        self.patients = (!patients.is_empty()).then_some(patients);
    }
}

#[derive(Debug, Default)]
pub struct EventBatchBuilder {
    process_date: Option<OffsetDateTime>,
    report_date: Option<OffsetDateTime>,
    patients: Vec<PatientRecord>,
}

impl EventBatchBuilder {
    pub fn process_date(mut self, at: OffsetDateTime) -> Self {
        self.process_date = Some(at);
        self
    }

    pub fn report_date(mut self, at: OffsetDateTime) -> Self {
        self.report_date = Some(at);
        self
    }

    pub fn patients(mut self, patients: Vec<PatientRecord>) -> Self {
        self.patients = patients;
        self
    }

    /// The total is always the number of records supplied.
    pub fn build(self) -> EventBatch {
        let total_records = self.patients.len();
        EventBatch {
            process_date: self.process_date.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            report_date: self.report_date.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            total_records,
            patients: (total_records != 0).then_some(self.patients),
        }
    }
}
