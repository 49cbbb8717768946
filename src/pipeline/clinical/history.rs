use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const CHRONIC_CONDITIONS: &[&str] = &[
    "diabetes",
    "hypertension",
    "asthma",
    "copd",
    "osteoarthritis",
    "arthritis",
    "fibromyalgia",
    "lupus",
    "sclerosis",
    "parkinson",
    "alzheimer",
    "epilepsy",
    "migraine",
    "depression",
    "anxiety",
    "hypothyroidism",
    "hyperthyroidism",
    "heart failure",
    "heart disease",
    "kidney disease",
];

static SURGERY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(?:surgery|operation)\s+(?:on|for)\s+([^.,;]+)",
        r"\boperated\s+(?:on\s+)?(?:for\s+)?([^.,;]+)",
        r"\b(\w+ectomy)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static ALLERGY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\ballerg(?:y|ies|ic)\s+to\s+([^.,;]+)",
        r"\bintoleran(?:ce|t)\s+to\s+([^.,;]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static MEDICATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"\b(?:takes|taking|treated with|medicated with|on medication)\s+([^.,;]+)"]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

static FAMILY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bfamily history of\s+([^.,;]+)",
        r"\b(?:father|mother|brother|sister|grandfather|grandmother)\s+(?:with|had|has)\s+([^.,;]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Facts recognized in a free-text medical history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicalHistory {
    pub chronic: Vec<String>,
    pub surgeries: Vec<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub family: Vec<String>,
}

impl MedicalHistory {
    pub fn is_empty(&self) -> bool {
        self.chronic.is_empty()
            && self.surgeries.is_empty()
            && self.allergies.is_empty()
            && self.medications.is_empty()
            && self.family.is_empty()
    }
}

pub fn extract_medical_history(text: &str) -> MedicalHistory {
    let lowered = text.to_lowercase();
    if lowered.trim().is_empty() {
        return MedicalHistory::default();
    }

    // "osteoarthritis" also contains "arthritis"; keep only the longer match.
    let mut chronic: Vec<String> = Vec::new();
    for condition in CHRONIC_CONDITIONS {
        if lowered.contains(condition) && !chronic.iter().any(|c| c.contains(condition)) {
            chronic.push(condition.to_string());
        }
    }

    MedicalHistory {
        chronic,
        surgeries: collect_matches(&SURGERY_PATTERNS, &lowered),
        allergies: collect_matches(&ALLERGY_PATTERNS, &lowered),
        medications: collect_matches(&MEDICATION_PATTERNS, &lowered),
        family: collect_matches(&FAMILY_PATTERNS, &lowered),
    }
}

/// First capture of every match across `patterns`, trimmed and deduplicated.
fn collect_matches(patterns: &[Regex], text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for re in patterns {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let value = m.as_str().trim();
            if !value.is_empty() && !found.iter().any(|f| f == value) {
                found.push(value.to_string());
            }
        }
    }
    found
}
