//! Structured facts recognized in free-text clinical input.
//!
//! Symptom descriptions, medical-history notes and narrative lab values
//! are matched against keyword tables and patterns; the results enrich
//! the prompt sent with the images. Lab-analysis answers from the
//! inference service are parsed back into a `LabReport`.

pub mod history;
pub mod labs;
pub mod report;
pub mod symptoms;

pub use history::*;
pub use labs::*;
pub use report::*;
pub use symptoms::*;

use serde::Serialize;

use crate::models::AgeGroup;
use crate::pipeline::prompt::PatientData;

/// Everything recognized in one patient's clinical text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClinicalFindings {
    pub age_group: Option<AgeGroup>,
    pub history: MedicalHistory,
    pub symptoms: Option<SymptomProfile>,
    pub lab_values: Vec<LabValue>,
}

impl ClinicalFindings {
    pub fn gather(patient: &PatientData) -> Self {
        let findings = Self {
            age_group: patient.age.map(AgeGroup::from_age),
            history: patient
                .history
                .as_deref()
                .map(extract_medical_history)
                .unwrap_or_default(),
            symptoms: patient.symptoms.as_deref().and_then(process_symptoms),
            lab_values: patient
                .lab_notes
                .as_deref()
                .map(|notes| extract_lab_values(notes, patient.gender.as_deref()))
                .unwrap_or_default(),
        };

        tracing::debug!(
            chronic = findings.history.chronic.len(),
            symptom_categories = findings.symptoms.as_ref().map_or(0, |s| s.categories.len()),
            lab_values = findings.lab_values.len(),
            "Clinical text processed"
        );
        findings
    }
}
