use chrono::NaiveDate;
use tracing::debug;

use crate::models::{
    BodyPart, ImageContext, ImageMetadata, Projection, Relationship, StudyType,
};

pub const REC_NO_IMAGES: &str = "No images to analyze";
pub const REC_SINGLE_IMAGE: &str = "Single image analysis";
pub const REC_SAME_STUDY: &str = "Images from the same study - joint analysis recommended";
pub const REC_FOLLOW_UP: &str =
    "Temporal follow-up images - evolutionary comparison recommended";
pub const REC_POSSIBLE_SAME_STUDY: &str = "Possibly the same study based on anatomical region";
pub const REC_UNCERTAIN: &str =
    "Uncertain relationship - consider specifying the context manually";
pub const REC_ORTHOGONAL_VIEWS: &str =
    "Frontal and lateral views detected - orthogonal views, optimal for correlated analysis";
pub const REC_GROUPING: &str = "Multiple images detected - consider grouping them by context";

const SAME_DAY_CONFIDENCE: f32 = 0.8;
const FOLLOW_UP_CONFIDENCE: f32 = 0.7;
const SAME_REGION_CONFIDENCE: f32 = 0.6;
const COMPARISON_CONFIDENCE: f32 = 0.4;
const SINGLE_IMAGE_CONFIDENCE: f32 = 1.0;

/// Above this many images a grouping recommendation is added.
const GROUPING_THRESHOLD: usize = 3;

/// Classify the relationship between the images of one batch.
///
/// Deterministic single pass over already-extracted metadata; input order
/// matters only for majority tie-breaks and the order of `views`.
pub fn detect_context(images: &[ImageMetadata]) -> ImageContext {
    let context = match images {
        [] => ImageContext {
            recommendations: vec![REC_NO_IMAGES.to_string()],
            ..ImageContext::unknown()
        },
        [single] => detect_single(single),
        many => detect_many(many),
    };

    debug!(
        images = images.len(),
        relationship = %context.relationship,
        confidence = context.confidence,
        region = ?context.anatomical_region,
        "Image context detected"
    );

    context
}

fn detect_single(meta: &ImageMetadata) -> ImageContext {
    let study_type = meta
        .filename_hints
        .body_part
        .map(StudyType::from_body_part)
        .unwrap_or(StudyType::Unknown);

    ImageContext {
        relationship: Relationship::Unknown,
        confidence: SINGLE_IMAGE_CONFIDENCE,
        study_type,
        anatomical_region: meta.body_part_votes().next(),
        views: vec![meta.inferred_projection],
        recommendations: vec![REC_SINGLE_IMAGE.to_string()],
        manually_set: false,
    }
}

fn detect_many(images: &[ImageMetadata]) -> ImageContext {
    // Filename votes for every image first, then pixel votes.
    let votes: Vec<BodyPart> = images
        .iter()
        .filter_map(|m| m.filename_hints.body_part)
        .chain(images.iter().filter_map(|m| m.pixel_hints.body_part))
        .collect();
    let views: Vec<Projection> = images
        .iter()
        .filter_map(|m| m.filename_hints.projection)
        .chain(images.iter().filter_map(|m| m.pixel_hints.projection))
        .collect();
    let dates: Vec<NaiveDate> = images.iter().filter_map(|m| m.study_date).collect();

    let region = majority(&votes);
    let mut recommendations = Vec::new();

    let (relationship, confidence) = if dates.len() >= 2 {
        if dates.iter().all(|d| *d == dates[0]) {
            recommendations.push(REC_SAME_STUDY.to_string());
            (Relationship::SameStudy, SAME_DAY_CONFIDENCE)
        } else if span_in_days(&dates) >= 1 {
            recommendations.push(REC_FOLLOW_UP.to_string());
            (Relationship::FollowUp, FOLLOW_UP_CONFIDENCE)
        } else {
            (Relationship::Unknown, 0.0)
        }
    } else {
        let same_body_part = votes.first().is_some_and(|first| votes.iter().all(|v| v == first));
        if same_body_part && views.len() > 1 {
            recommendations.push(REC_POSSIBLE_SAME_STUDY.to_string());
            (Relationship::SameStudy, SAME_REGION_CONFIDENCE)
        } else {
            recommendations.push(REC_UNCERTAIN.to_string());
            (Relationship::Comparison, COMPARISON_CONFIDENCE)
        }
    };

    if views.contains(&Projection::Frontal) && views.contains(&Projection::Lateral) {
        recommendations.push(REC_ORTHOGONAL_VIEWS.to_string());
    }
    if images.len() > GROUPING_THRESHOLD {
        recommendations.push(REC_GROUPING.to_string());
    }

    ImageContext {
        relationship,
        confidence,
        study_type: region.map(StudyType::from_body_part).unwrap_or(StudyType::Unknown),
        anatomical_region: region,
        views,
        recommendations,
        manually_set: false,
    }
}

/// Most frequent value; ties go to the value that occurs first.
fn majority(votes: &[BodyPart]) -> Option<BodyPart> {
    let mut best: Option<(BodyPart, usize)> = None;
    for (i, candidate) in votes.iter().enumerate() {
        // Only score a value at its first occurrence.
        if votes[..i].contains(candidate) {
            continue;
        }
        let count = votes.iter().filter(|v| *v == candidate).count();
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((*candidate, count));
        }
    }
    best.map(|(part, _)| part)
}

fn span_in_days(dates: &[NaiveDate]) -> i64 {
    match (dates.iter().min(), dates.iter().max()) {
        (Some(first), Some(last)) => (*last - *first).num_days(),
        _ => 0,
    }
}
