use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Per-image entry markers: `image 2`, `view 1`, `study 3`.
static IMAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:image|view|study)\s+(\d+)").unwrap());

const INDIVIDUAL_MARKERS: &[&str] = &["analysis by view", "individual analysis", "analysis by image"];
const CORRELATION_MARKERS: &[&str] = &["correlation", "temporal comparison", "systematic comparison"];
const RECOMMENDATION_MARKERS: &[&str] = &[
    "recommendations",
    "conclusions",
    "integral diagnosis",
    "final diagnosis",
];

/// Analysis of one image, `index` being zero-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub index: usize,
    pub content: String,
}

/// A model response split into its report sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    pub integral: String,
    pub individual: Vec<ImageAnalysis>,
    pub correlation: String,
    pub recommendations: String,
}

impl StructuredAnalysis {
    /// True when no section marker was recognized.
    pub fn is_unstructured(&self) -> bool {
        self.individual.is_empty() && self.correlation.is_empty() && self.recommendations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Integral,
    Individual,
    Correlation,
    Recommendations,
}

fn classify_heading(line: &str) -> Option<Section> {
    let lowered = line.trim().to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lowered.contains(m));

    if has(INDIVIDUAL_MARKERS) {
        Some(Section::Individual)
    } else if has(CORRELATION_MARKERS) {
        Some(Section::Correlation)
    } else if has(RECOMMENDATION_MARKERS) {
        Some(Section::Recommendations)
    } else {
        None
    }
}

/// Split a model response into sections by their heading lines.
///
/// Heading lines are dropped from the output. Text before the first heading
/// is the integral section; when no heading is found at all the integral
/// section is the whole response. Several headings mapping to the same
/// section have their bodies joined.
pub fn parse_structured_response(text: &str, image_count: usize) -> StructuredAnalysis {
    let mut result = StructuredAnalysis::default();
    let mut current = Section::Integral;
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        match classify_heading(line) {
            Some(next) => {
                flush(&mut result, current, &buffer, image_count);
                buffer.clear();
                current = next;
            }
            None => buffer.push(line),
        }
    }
    flush(&mut result, current, &buffer, image_count);

    if result.is_unstructured() {
        result.integral = text.to_string();
    }
    result
}

fn flush(result: &mut StructuredAnalysis, section: Section, lines: &[&str], image_count: usize) {
    let body = lines.join("\n");
    let body = body.trim();
    if body.is_empty() {
        return;
    }

    let append = |target: &mut String| {
        if !target.is_empty() {
            target.push_str("\n\n");
        }
        target.push_str(body);
    };

    match section {
        Section::Integral => append(&mut result.integral),
        Section::Correlation => append(&mut result.correlation),
        Section::Recommendations => append(&mut result.recommendations),
        Section::Individual => result
            .individual
            .extend(parse_individual(body, image_count)),
    }
}

/// Split an individual-analysis section into per-image entries.
///
/// A line mentioning `image N` / `view N` / `study N` (N >= 1) starts a new
/// entry. Without any such line, paragraphs are assigned to images in order
/// when more than one image was sent; otherwise the whole body belongs to
/// the first image.
pub fn parse_individual(body: &str, image_count: usize) -> Vec<ImageAnalysis> {
    let mut entries: Vec<ImageAnalysis> = Vec::new();
    let mut current: Option<ImageAnalysis> = None;
    let mut preamble = String::new();

    for line in body.lines() {
        let marker = IMAGE_MARKER
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .filter(|n| *n >= 1);

        if let Some(n) = marker {
            if let Some(done) = current.take() {
                push_entry(&mut entries, done);
            }
            current = Some(ImageAnalysis {
                index: n - 1,
                content: format!("{line}\n"),
            });
        } else if let Some(entry) = current.as_mut() {
            entry.content.push_str(line);
            entry.content.push('\n');
        } else {
            preamble.push_str(line);
            preamble.push('\n');
        }
    }
    if let Some(done) = current.take() {
        push_entry(&mut entries, done);
    }

    if !entries.is_empty() {
        return entries;
    }

    if image_count > 1 {
        body.split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .take(image_count)
            .enumerate()
            .map(|(index, p)| ImageAnalysis {
                index,
                content: p.to_string(),
            })
            .collect()
    } else {
        let content = preamble.trim();
        if content.is_empty() {
            Vec::new()
        } else {
            vec![ImageAnalysis {
                index: 0,
                content: content.to_string(),
            }]
        }
    }
}

fn push_entry(entries: &mut Vec<ImageAnalysis>, mut entry: ImageAnalysis) {
    let trimmed = entry.content.trim();
    if trimmed.is_empty() {
        return;
    }
    entry.content = trimmed.to_string();
    entries.push(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAME_STUDY_RESPONSE: &str = "\
Overall the study is of good quality.

## ANALYSIS BY VIEW
Image 1 (frontal): clear lung fields.
Normal cardiac silhouette.
Image 2 (lateral): no retrocardiac opacity.

## DIAGNOSTIC CORRELATION
Both views agree.

## INTEGRAL DIAGNOSIS
No acute cardiopulmonary process.

## RECOMMENDATIONS
Clinical follow-up.";

    #[test]
    fn splits_sections() {
        let parsed = parse_structured_response(SAME_STUDY_RESPONSE, 2);
        assert_eq!(parsed.integral, "Overall the study is of good quality.");
        assert_eq!(parsed.individual.len(), 2);
        assert_eq!(parsed.individual[0].index, 0);
        assert_eq!(
            parsed.individual[0].content,
            "Image 1 (frontal): clear lung fields.\nNormal cardiac silhouette."
        );
        assert_eq!(parsed.individual[1].index, 1);
        assert_eq!(parsed.correlation, "Both views agree.");
        assert_eq!(
            parsed.recommendations,
            "No acute cardiopulmonary process.\n\nClinical follow-up."
        );
    }

    #[test]
    fn unstructured_text_is_integral() {
        let text = "The radiograph shows no abnormality.\nSee a doctor.";
        let parsed = parse_structured_response(text, 1);
        assert!(parsed.is_unstructured());
        assert_eq!(parsed.integral, text);
    }

    #[test]
    fn follow_up_headings() {
        let text = "## INDIVIDUAL ANALYSIS BY STUDY\nStudy 1: baseline.\nStudy 2: improved.\n## TEMPORAL COMPARISON\nLess opacity.\n## FOLLOW-UP CONCLUSIONS\nResolving.";
        let parsed = parse_structured_response(text, 2);
        assert_eq!(parsed.individual.len(), 2);
        assert_eq!(parsed.individual[1].content, "Study 2: improved.");
        assert_eq!(parsed.correlation, "Less opacity.");
        assert_eq!(parsed.recommendations, "Resolving.");
        assert!(parsed.integral.is_empty());
    }

    #[test]
    fn paragraphs_fallback_for_many_images() {
        let body = "First film looks fine.\n\nSecond film shows a nodule.\n\nExtra note.";
        let entries = parse_individual(body, 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "First film looks fine.");
        assert_eq!(entries[1].index, 1);
    }

    #[test]
    fn single_image_without_markers() {
        let entries = parse_individual("Looks fine.\n\nNothing else.", 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].content, "Looks fine.\n\nNothing else.");
    }

    #[test]
    fn zero_index_marker_is_ignored() {
        let entries = parse_individual("View 0 is a scout.\nView 1: normal.", 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].content, "View 1: normal.");
    }
}
