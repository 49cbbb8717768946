use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::templates::{
    comparison_prompt, follow_up_prompt, generic_multi_image_prompt, region_instructions,
    same_study_prompt, SAFETY_INSTRUCTIONS,
};
use crate::models::{ImageContext, Relationship};
use crate::pipeline::clinical::{ClinicalFindings, LabValue, MedicalHistory, SymptomProfile};

/// Instruction sent with every request, fixing the response layout.
pub const SYSTEM_INSTRUCTION: &str = r#"
You are an assistant that reads medical images (radiographs, CT, ultrasound and MRI)
and describes what is visible in them. You are careful and methodical. You describe
only what you can observe, you state uncertainty plainly, and you never present a
preliminary reading as a definitive diagnosis.

ALWAYS answer initial analyses using this structured format:

"The image you provided is {short description of the study type}. I can say the following:

**Analysis:**
{Detailed description of what is observed, including visible anatomical structures and their appearance}

**Findings:**
- {Relevant findings, abnormalities or notable features}
- {One finding per bullet}
- {Be specific and precise}

**Preliminary Interpretation:**
{Preliminary reading based on the findings, including possible conditions}

**Important:**
{Limitations of this analysis and considerations the patient should keep in mind}

**Recommendations:**
- {Specific medical recommendations}
- {Additional studies if needed}
- {Follow-up advice, including review by a qualified clinician}"

Follow this format for every initial answer. Follow-up questions may be answered more
freely, keeping a professional and structured tone.
"#;

/// Used when there is content to analyze but no image context.
pub const FALLBACK_PROMPT: &str =
    "What can you see in the provided medical information? Please analyze all the available data.";

/// Closing instructions of the prompt used when there is no image context.
pub const CLINICAL_ANALYSIS_INSTRUCTIONS: &str = "## ANALYSIS INSTRUCTIONS
1. Analyze the provided medical images in the context of the clinical information.
2. Identify relevant findings and correlate them with the symptoms and history.
3. Provide a detailed analysis and a preliminary interpretation.
4. Suggest possible differential diagnoses based on the available evidence.
5. State what additional information would help reach a more precise diagnosis.
";

/// Appended after reported lab values.
pub const LAB_VALUE_INSTRUCTIONS: &str = "Evaluate each value against the normal ranges appropriate for the patient's age and sex, explain the clinical meaning of any abnormal value, and correlate the values with the reported symptoms and imaging findings.";

/// Clinical information supplied alongside the images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientData {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub history: Option<String>,
    pub symptoms: Option<String>,
    /// Free-text lab values, e.g. `glucose 180 mg/dL, LDL 130`.
    pub lab_notes: Option<String>,
    /// Number of lab results attached to the request.
    pub lab_result_count: usize,
    pub has_medical_history: bool,
}

impl PatientData {
    fn has_patient_info(&self) -> bool {
        self.age.is_some() || non_blank(&self.gender).is_some() || non_blank(&self.history).is_some()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Labelled, comma-joined line; nothing when `items` is empty.
fn list_line(prompt: &mut String, prefix: &str, label: &str, items: &[String]) {
    if !items.is_empty() {
        let _ = write!(prompt, "\n{prefix}{label}: {}", items.join(", "));
    }
}

fn history_lines(prompt: &mut String, prefix: &str, history: &MedicalHistory) {
    list_line(prompt, prefix, "Chronic conditions", &history.chronic);
    list_line(prompt, prefix, "Previous surgeries", &history.surgeries);
    list_line(prompt, prefix, "Allergies", &history.allergies);
    list_line(prompt, prefix, "Current medication", &history.medications);
    list_line(prompt, prefix, "Family history", &history.family);
}

fn symptom_lines(prompt: &mut String, prefix: &str, profile: &SymptomProfile) {
    if let Some(duration) = &profile.duration {
        let _ = write!(prompt, "\n{prefix}Duration: {}", duration.describe());
    }
    if let Some(severity) = profile.severity {
        let _ = write!(prompt, "\n{prefix}Severity: {severity}");
    }
    let categories: Vec<String> = profile
        .category_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    list_line(prompt, prefix, "Main categories", &categories);
    list_line(prompt, prefix, "Aggravating factors", &profile.factors.aggravating);
    list_line(prompt, prefix, "Relieving factors", &profile.factors.relieving);
}

/// Recognized values one per line, or the raw notes when none matched.
fn lab_value_lines(prompt: &mut String, notes: &str, values: &[LabValue]) {
    if values.is_empty() {
        let _ = write!(prompt, "\n{notes}");
    }
    for value in values {
        let _ = write!(prompt, "\n- {}", value.describe());
    }
}

/// Append the patient-context block to `base`.
pub fn add_patient_context(base: &str, patient: &PatientData) -> String {
    let findings = ClinicalFindings::gather(patient);
    let mut prompt = base.to_string();

    if patient.has_patient_info() {
        prompt.push_str("\n\nPATIENT INFORMATION:");
        if let Some(age) = patient.age {
            let _ = write!(prompt, "\n- Age: {age} years");
            if let Some(group) = findings.age_group {
                let _ = write!(prompt, " ({})", group.label());
            }
        }
        if let Some(gender) = non_blank(&patient.gender) {
            let _ = write!(prompt, "\n- Gender: {gender}");
        }
        if let Some(history) = non_blank(&patient.history) {
            let _ = write!(prompt, "\n- History: {history}");
            history_lines(&mut prompt, "- ", &findings.history);
        }
    }

    if let Some(symptoms) = non_blank(&patient.symptoms) {
        let _ = write!(prompt, "\n\nCLINICAL SYMPTOMS:\n{symptoms}");
        if let Some(profile) = &findings.symptoms {
            symptom_lines(&mut prompt, "- ", profile);
        }
    }

    if patient.lab_result_count > 0 {
        let _ = write!(
            prompt,
            "\n\nAVAILABLE LAB RESULTS:\n{} lab results were provided for clinical correlation.",
            patient.lab_result_count
        );
    }

    if let Some(notes) = non_blank(&patient.lab_notes) {
        prompt.push_str("\n\nLAB VALUES:");
        lab_value_lines(&mut prompt, notes, &findings.lab_values);
        let _ = write!(prompt, "\n{LAB_VALUE_INSTRUCTIONS}");
    }

    if patient.has_medical_history {
        prompt.push_str(
            "\n\nMEDICAL HISTORY:\nAdditional medical history was provided for clinical context.",
        );
    }

    prompt.push_str(
        "\n\nIMPORTANT: Consider all the available clinical information in your analysis and diagnostic interpretation.",
    );
    prompt
}

/// Prompt for clinical information without image context: structured
/// patient, symptom and lab sections followed by analysis instructions.
pub fn build_enhanced_prompt(patient: &PatientData) -> String {
    let findings = ClinicalFindings::gather(patient);
    let mut prompt = String::from("Analyze the following medical information:\n\n");

    if patient.has_patient_info() {
        prompt.push_str("## PATIENT INFORMATION");
        if let Some(age) = patient.age {
            let _ = write!(prompt, "\nAge: {age} years");
            if let Some(group) = findings.age_group {
                let _ = write!(prompt, " ({})", group.label());
            }
        }
        if let Some(gender) = non_blank(&patient.gender) {
            let _ = write!(prompt, "\nGender: {gender}");
        }
        if findings.history.is_empty() {
            if let Some(history) = non_blank(&patient.history) {
                let _ = write!(prompt, "\nMedical history: {history}");
            }
        } else {
            history_lines(&mut prompt, "", &findings.history);
        }
        prompt.push_str("\n\n");
    }

    if let Some(profile) = &findings.symptoms {
        prompt.push_str("## CURRENT SYMPTOMS");
        symptom_lines(&mut prompt, "", profile);
        let _ = write!(prompt, "\n\nFull description: {}\n\n", profile.original.trim());
    }

    let notes = non_blank(&patient.lab_notes);
    if patient.lab_result_count > 0 || notes.is_some() {
        prompt.push_str("## LAB RESULTS");
        if patient.lab_result_count > 0 {
            let _ = write!(
                prompt,
                "\n{} lab result file(s) provided.",
                patient.lab_result_count
            );
        }
        if let Some(notes) = notes {
            lab_value_lines(&mut prompt, notes, &findings.lab_values);
            let _ = write!(prompt, "\n{LAB_VALUE_INSTRUCTIONS}");
        }
        prompt.push_str("\n\n");
    }

    if patient.has_medical_history {
        prompt.push_str(
            "## MEDICAL HISTORY\nAdditional medical history was provided for clinical context.\n\n",
        );
    }

    prompt.push_str(CLINICAL_ANALYSIS_INSTRUCTIONS);
    prompt
}

/// Relationship-aware prompt: template, patient context, safety trailer.
pub fn build_optimized_prompt(context: &ImageContext, patient: &PatientData) -> String {
    let base = match context.relationship {
        Relationship::SameStudy => same_study_prompt(context),
        Relationship::FollowUp => follow_up_prompt(context),
        Relationship::Comparison => comparison_prompt(context),
        _ => generic_multi_image_prompt(context.views.len()),
    };

    let mut prompt = add_patient_context(&base, patient);
    prompt.push_str("\n\n");
    prompt.push_str(SAFETY_INSTRUCTIONS);
    prompt
}

/// Full text part of the first request in a conversation.
///
/// With an image context: the optimized prompt followed by the region
/// checklist when the region has one. Without: the enhanced clinical
/// prompt, or the bare fallback prompt when no clinical data exists.
pub fn build_initial_prompt(context: Option<&ImageContext>, patient: &PatientData) -> String {
    match context {
        Some(ctx) => {
            let mut prompt = build_optimized_prompt(ctx, patient);
            if let Some(checklist) = ctx.anatomical_region.and_then(region_instructions) {
                prompt.push_str("\n\n");
                prompt.push_str(checklist);
            }
            prompt
        }
        None if patient == &PatientData::default() => FALLBACK_PROMPT.to_string(),
        None => build_enhanced_prompt(patient),
    }
}
