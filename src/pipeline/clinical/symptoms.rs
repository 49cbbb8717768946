use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{DurationUnit, Severity, SymptomCategory};

/// Substring keywords per category, checked against the lowercased text.
const CATEGORY_KEYWORDS: &[(SymptomCategory, &[&str])] = &[
    (
        SymptomCategory::Pain,
        &["pain", "ache", "burning", "stabbing", "sharp", "chronic"],
    ),
    (
        SymptomCategory::Respiratory,
        &["cough", "dyspnea", "breath", "choking", "wheez", "lung", "bronch", "asthma", "phlegm"],
    ),
    (
        SymptomCategory::Digestive,
        &["nausea", "vomit", "diarrhea", "constipation", "abdom", "stomach", "digestion", "appetite"],
    ),
    (
        SymptomCategory::Neurological,
        &["dizz", "vertigo", "faint", "seizure", "tremor", "tingling", "paralysis", "memory", "confusion"],
    ),
    (
        SymptomCategory::Cardiovascular,
        &["palpitation", "tachycardia", "pressure", "hypertension", "heart", "edema", "swelling"],
    ),
    (
        SymptomCategory::Musculoskeletal,
        &["joint", "muscle", "stiffness", "back", "neck", "fracture", "sprain", "weakness"],
    ),
    (
        SymptomCategory::Dermatological,
        &["rash", "itch", "hives", "skin", "lesion", "blister", "redness"],
    ),
    (
        SymptomCategory::General,
        &["fever", "fatigue", "tired", "malaise", "weight loss", "sweating", "insomnia"],
    ),
];

/// Checked in order; the first level with a matching keyword wins.
const SEVERITY_KEYWORDS: &[(Severity, &[&str])] = &[
    (Severity::Mild, &["mild", "slight", "minor", "minimal"]),
    (Severity::Moderate, &["moderate", "medium", "intermediate"]),
    (
        Severity::Severe,
        &["severe", "serious", "intense", "strong", "unbearable", "extreme"],
    ),
];

const ACUTE_KEYWORDS: &[&str] = &["acute", "recent", "sudden"];
const CHRONIC_KEYWORDS: &[&str] = &["chronic", "long time", "for years"];

/// `for 3 weeks`, `past 2 days`, `5 months ago`.
static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:for|over|past|last|since)\s+(?:the\s+)?(\d+)\s+(day|week|month|year)s?|(\d+)\s+(day|week|month|year)s?\s+ago)\b",
    )
    .unwrap()
});

static AGGRAVATING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:worse(?:ns)?|worsening|increases|aggravated|hurts more)\s+(?:with|when|on|after)\s+([^.,;]+)")
        .unwrap()
});

static RELIEVING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:better|improves|relieved|eases|decreases|subsides)\s+(?:with|when|on|after|by)\s+([^.,;]+)")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMatch {
    pub category: SymptomCategory,
    pub keywords: Vec<String>,
    /// Matched keywords over keywords in the category.
    pub relevance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymptomDuration {
    Span {
        value: u32,
        unit: DurationUnit,
        text: String,
    },
    Acute,
    Chronic,
}

impl SymptomDuration {
    pub fn describe(&self) -> String {
        match self {
            Self::Span { value, unit, .. } => format!("{value} {unit}"),
            Self::Acute => "acute / recent onset".to_string(),
            Self::Chronic => "chronic condition".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomFactors {
    pub aggravating: Vec<String>,
    pub relieving: Vec<String>,
}

/// Free-text symptoms with the facts recognized in them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomProfile {
    pub original: String,
    pub categories: Vec<CategoryMatch>,
    pub duration: Option<SymptomDuration>,
    pub severity: Option<Severity>,
    pub factors: SymptomFactors,
}

impl SymptomProfile {
    pub fn category_names(&self) -> Vec<&'static str> {
        self.categories.iter().map(|c| c.category.as_str()).collect()
    }
}

/// Profile a symptom description. Blank text yields `None`.
pub fn process_symptoms(text: &str) -> Option<SymptomProfile> {
    if text.trim().is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();

    let categories = CATEGORY_KEYWORDS
        .iter()
        .filter_map(|(category, keywords)| {
            let matched: Vec<String> = keywords
                .iter()
                .filter(|k| lowered.contains(*k))
                .map(|k| k.to_string())
                .collect();
            (!matched.is_empty()).then(|| CategoryMatch {
                category: *category,
                relevance: matched.len() as f32 / keywords.len() as f32,
                keywords: matched,
            })
        })
        .collect();

    Some(SymptomProfile {
        original: text.to_string(),
        categories,
        duration: extract_duration(&lowered),
        severity: extract_severity(&lowered),
        factors: extract_factors(&lowered),
    })
}

fn extract_duration(text: &str) -> Option<SymptomDuration> {
    if let Some(caps) = DURATION_PATTERN.captures(text) {
        let value = caps.get(1).or_else(|| caps.get(3));
        let unit = caps.get(2).or_else(|| caps.get(4));
        if let (Some(value), Some(unit)) = (value, unit) {
            if let Ok(value) = value.as_str().parse() {
                let unit = match unit.as_str() {
                    "day" => DurationUnit::Days,
                    "week" => DurationUnit::Weeks,
                    "month" => DurationUnit::Months,
                    _ => DurationUnit::Years,
                };
                return Some(SymptomDuration::Span {
                    value,
                    unit,
                    text: caps[0].to_string(),
                });
            }
        }
    }

    if ACUTE_KEYWORDS.iter().any(|k| text.contains(k)) {
        Some(SymptomDuration::Acute)
    } else if CHRONIC_KEYWORDS.iter().any(|k| text.contains(k)) {
        Some(SymptomDuration::Chronic)
    } else {
        None
    }
}

fn extract_severity(text: &str) -> Option<Severity> {
    SEVERITY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(level, _)| *level)
}

fn extract_factors(text: &str) -> SymptomFactors {
    let collect = |re: &Regex| -> Vec<String> {
        re.captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };

    SymptomFactors {
        aggravating: collect(&AGGRAVATING_PATTERN),
        relieving: collect(&RELIEVING_PATTERN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_has_no_profile() {
        assert!(process_symptoms("   ").is_none());
    }

    #[test]
    fn categories_with_relevance() {
        let profile = process_symptoms("Dry cough and fever, short of breath").unwrap();
        assert_eq!(profile.category_names(), vec!["respiratory", "general"]);
        let respiratory = &profile.categories[0];
        assert_eq!(respiratory.keywords, vec!["cough", "breath"]);
        assert!((respiratory.relevance - 2.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn numeric_duration() {
        let profile = process_symptoms("Chest pain for 3 weeks").unwrap();
        assert_eq!(
            profile.duration,
            Some(SymptomDuration::Span {
                value: 3,
                unit: DurationUnit::Weeks,
                text: "for 3 weeks".into()
            })
        );
        assert_eq!(profile.duration.unwrap().describe(), "3 weeks");

        let ago = process_symptoms("it started 2 days ago").unwrap();
        assert!(matches!(
            ago.duration,
            Some(SymptomDuration::Span { value: 2, unit: DurationUnit::Days, .. })
        ));
    }

    #[test]
    fn qualitative_duration() {
        assert_eq!(
            process_symptoms("sudden headache").unwrap().duration,
            Some(SymptomDuration::Acute)
        );
        assert_eq!(
            process_symptoms("chronic knee trouble").unwrap().duration,
            Some(SymptomDuration::Chronic)
        );
        assert_eq!(process_symptoms("headache").unwrap().duration, None);
    }

    #[test]
    fn first_severity_level_wins() {
        assert_eq!(
            process_symptoms("mild but sometimes severe pain").unwrap().severity,
            Some(Severity::Mild)
        );
        assert_eq!(
            process_symptoms("unbearable pain").unwrap().severity,
            Some(Severity::Severe)
        );
    }

    #[test]
    fn aggravating_and_relieving_factors() {
        let profile =
            process_symptoms("Pain gets worse when lying down, improves with rest.").unwrap();
        assert_eq!(profile.factors.aggravating, vec!["lying down"]);
        assert_eq!(profile.factors.relieving, vec!["rest"]);
    }
}
