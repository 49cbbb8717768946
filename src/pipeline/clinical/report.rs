use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::labs::parse_lab_number;

/// `- Glucose: 180 mg/dL (70-100) - ⚠️ HIGH`
static VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\s*([^:]+):\s*([0-9.,]+)\s*([^(]*)\s*\(([^)]+)\)\s*-\s*(.+)$").unwrap()
});

const CRITICAL_MARKERS: &[&str] = &["⚠️", "HIGH", "LOW", "CRITICAL"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedValue {
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub normal_range: String,
    pub status: String,
}

/// Structured view of a lab-analysis answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub lab_type: String,
    pub values: Vec<ReportedValue>,
    pub critical_values: Vec<String>,
    pub interpretation: String,
    pub recommendations: String,
}

impl LabReport {
    pub fn has_critical_values(&self) -> bool {
        !self.critical_values.is_empty()
    }
}

pub fn parse_lab_report(text: &str) -> LabReport {
    let lab_type = section(text, "LAB TYPE")
        .filter(|s| !s.is_empty())
        .unwrap_or("Not specified")
        .to_string();

    let values = text.lines().filter_map(parse_value_line).collect();

    let critical_values = section(text, "CRITICAL VALUES")
        .map(|body| {
            body.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && CRITICAL_MARKERS.iter().any(|m| l.contains(m)))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    LabReport {
        lab_type,
        values,
        critical_values,
        interpretation: section(text, "CLINICAL INTERPRETATION")
            .unwrap_or_default()
            .to_string(),
        recommendations: section(text, "RECOMMENDATIONS")
            .unwrap_or_default()
            .to_string(),
    }
}

fn parse_value_line(line: &str) -> Option<ReportedValue> {
    let caps = VALUE_LINE.captures(line.trim())?;
    Some(ReportedValue {
        parameter: caps[1].trim().to_string(),
        value: parse_lab_number(&caps[2])?,
        unit: caps[3].trim().to_string(),
        normal_range: caps[4].trim().to_string(),
        status: caps[5].trim().to_string(),
    })
}

/// Trimmed body between `## {title}` and the next `##` heading.
fn section<'a>(text: &'a str, title: &str) -> Option<&'a str> {
    let heading = format!("## {title}");
    let start = text.find(&heading)? + heading.len();
    let rest = &text[start..];
    let end = rest.find("##").unwrap_or(rest.len());
    Some(rest[..end].trim())
}
