use serde::{Deserialize, Serialize};

use super::enums::{BodyPart, Projection, Relationship, StudyType};

/// Confidence assigned when a user overrides the detected relationship
/// with a different value.
pub const MANUAL_OVERRIDE_CONFIDENCE: f32 = 0.5;

/// Relationship detected across the active image set.
///
/// Recomputed from scratch on every detection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContext {
    pub relationship: Relationship,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub study_type: StudyType,
    pub anatomical_region: Option<BodyPart>,
    /// Not deduplicated.
    pub views: Vec<Projection>,
    pub recommendations: Vec<String>,
    pub manually_set: bool,
}

impl ImageContext {
    pub fn unknown() -> Self {
        Self {
            relationship: Relationship::Unknown,
            confidence: 0.0,
            study_type: StudyType::Unknown,
            anatomical_region: None,
            views: Vec::new(),
            recommendations: Vec::new(),
            manually_set: false,
        }
    }

    /// New context with a user-chosen relationship.
    ///
    /// Confidence is kept when the choice matches the detected relationship,
    /// otherwise it drops to [`MANUAL_OVERRIDE_CONFIDENCE`].
    pub fn with_manual_relationship(&self, relationship: Relationship) -> Self {
        let confidence = if relationship == self.relationship {
            self.confidence
        } else {
            MANUAL_OVERRIDE_CONFIDENCE
        };

        Self {
            relationship,
            confidence,
            manually_set: true,
            ..self.clone()
        }
    }

    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }

    pub fn has_view(&self, view: Projection) -> bool {
        self.views.contains(&view)
    }
}
