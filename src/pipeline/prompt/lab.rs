use super::assembler::PatientData;
use crate::pipeline::clinical::{detect_lab_type, expected_parameters};

/// Replaces the imaging instruction for lab-report conversations.
pub const LAB_SYSTEM_INSTRUCTION: &str = r#"
You are an assistant that reads clinical laboratory reports. You transcribe only
values you can read, you compare them with adult reference ranges, and you never
present a preliminary interpretation as a definitive diagnosis. Answer using exactly
the section layout requested in the prompt.
"#;

/// Prompt for reading a photographed or scanned lab report. The answer
/// layout matches what `clinical::parse_lab_report` expects.
pub fn lab_analysis_prompt(file_name: &str, patient: &PatientData) -> String {
    let lab_type = detect_lab_type(file_name);
    let age = patient
        .age
        .map_or_else(|| "Age not specified".to_string(), |a| format!("{a} years"));
    let gender = patient
        .gender
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or("Gender not specified");
    let label = lab_type.label();
    let upper = label.to_uppercase();
    let parameters = expected_parameters(lab_type);

    let mut prompt = format!(
        r#"UNIVERSAL MEDICAL LAB ANALYSIS

FILE: {file_name}
DETECTED TYPE: {label}
PATIENT: {age}, {gender}

SPECIFIC INSTRUCTIONS:
1. IDENTIFY the type of analysis (blood, urine, stool, specialized)
2. EXTRACT every visible numeric value with its unit
3. MATCH each value with its parameter
4. EVALUATE whether each value is within the normal range
5. IDENTIFY critical or abnormal values
6. CORRELATE with the patient's age, gender and history

EXPECTED PARAMETERS FOR {upper}:
{parameters}

REQUIRED RESPONSE FORMAT:
## LAB TYPE
[Specify: Hematology, Blood chemistry, Urinalysis, etc.]

## IDENTIFIED VALUES
- Parameter: Value Unit (Normal range) - Status
- Example: Hemoglobin: 12.5 g/dL (12.0-16.0) - Normal
- Example: Glucose: 180 mg/dL (70-100) - ⚠️ HIGH

## CRITICAL VALUES
[List every value outside the normal range, marked ⚠️ HIGH or ⚠️ LOW]

## CLINICAL INTERPRETATION
[Contextual analysis considering age, gender and symptoms]

## RECOMMENDATIONS
[Suggestions based on the findings]

IMPORTANT: If a value cannot be read clearly, say so explicitly."#
    );

    if let Some(symptoms) = patient.symptoms.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("\n\nREPORTED SYMPTOMS: ");
        prompt.push_str(symptoms);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blood_report_lists_blood_panels() {
        let patient = PatientData {
            age: Some(45),
            gender: Some("male".into()),
            ..PatientData::default()
        };
        let prompt = lab_analysis_prompt("hemogram_2024.jpg", &patient);
        assert!(prompt.contains("FILE: hemogram_2024.jpg"));
        assert!(prompt.contains("DETECTED TYPE: Blood Analysis"));
        assert!(prompt.contains("PATIENT: 45 years, male"));
        assert!(prompt.contains("EXPECTED PARAMETERS FOR BLOOD ANALYSIS:"));
        assert!(prompt.contains("Lipid Profile:"));
        assert!(prompt.contains("## CRITICAL VALUES"));
        assert!(!prompt.contains("REPORTED SYMPTOMS"));
    }

    #[test]
    fn unknown_report_without_patient_data() {
        let patient = PatientData {
            symptoms: Some("fatigue".into()),
            ..PatientData::default()
        };
        let prompt = lab_analysis_prompt("scan001.png", &patient);
        assert!(prompt.contains("DETECTED TYPE: General Analysis"));
        assert!(prompt.contains("PATIENT: Age not specified, Gender not specified"));
        assert!(prompt.contains("General laboratory parameters"));
        assert!(prompt.ends_with("REPORTED SYMPTOMS: fatigue"));
    }
}
