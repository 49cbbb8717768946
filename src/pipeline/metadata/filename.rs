use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{AnatomyHints, BodyPart, Projection};

/// Keyword table for body parts, checked in order. First match wins.
const BODY_PART_KEYWORDS: &[(BodyPart, &[&str])] = &[
    (BodyPart::Chest, &["chest", "torax", "pecho"]),
    (BodyPart::Abdomen, &["abdomen", "abdominal"]),
    (BodyPart::Head, &["head", "cabeza", "craneo"]),
    (BodyPart::Spine, &["spine", "columna"]),
];

/// Keyword table for projections, checked in order. First match wins.
///
/// Matching is plain substring search, so short tokens like `pa` and `lat`
/// also fire inside longer words.
const PROJECTION_KEYWORDS: &[(Projection, &[&str])] = &[
    (Projection::Frontal, &["frontal", "front", "pa"]),
    (Projection::Lateral, &["lateral", "side", "lat"]),
    (Projection::Oblique, &["oblique", "obl"]),
];

/// `YYYY-MM-DD` / `YYYY_MM_DD`, or `DD-MM-YYYY` / `DD_MM_YYYY`.
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[-_](\d{2})[-_](\d{2})|(\d{2})[-_](\d{2})[-_](\d{4})").unwrap()
});

/// Everything the filename pass can tell about an image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilenameFacts {
    pub hints: AnatomyHints,
    pub study_date: Option<NaiveDate>,
}

/// Case-insensitive keyword and date search over a file name.
pub fn extract_from_filename(name: &str) -> FilenameFacts {
    let lowered = name.to_lowercase();
    FilenameFacts {
        hints: AnatomyHints {
            body_part: match_keywords(&lowered, BODY_PART_KEYWORDS),
            projection: match_keywords(&lowered, PROJECTION_KEYWORDS),
        },
        study_date: parse_filename_date(&lowered),
    }
}

fn match_keywords<T: Copy>(haystack: &str, table: &[(T, &[&str])]) -> Option<T> {
    table
        .iter()
        .find(|(_, words)| words.iter().any(|w| haystack.contains(w)))
        .map(|(value, _)| *value)
}

/// First date-looking substring in `name`. Impossible dates yield `None`.
pub fn parse_filename_date(name: &str) -> Option<NaiveDate> {
    let caps = DATE_PATTERN.captures(name)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    if caps.get(1).is_some() {
        let year = num(1)? as i32;
        NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)
    } else {
        let year = num(6)? as i32;
        NaiveDate::from_ymd_opt(year, num(5)?, num(4)?)
    }
}
