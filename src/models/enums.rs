use std::fmt;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(BodyPart {
    Chest => "chest",
    Abdomen => "abdomen",
    Head => "head",
    Spine => "spine",
    Unknown => "unknown",
});

str_enum!(Projection {
    Frontal => "frontal",
    Lateral => "lateral",
    Oblique => "oblique",
    Unknown => "unknown",
});

str_enum!(Relationship {
    SameStudy => "same_study",
    FollowUp => "follow_up",
    Comparison => "comparison",
    Bilateral => "bilateral",
    Progression => "progression",
    Unknown => "unknown",
});

str_enum!(StudyType {
    ChestXray => "chest_xray",
    AbdomenXray => "abdomen_xray",
    HeadXray => "head_xray",
    SpineXray => "spine_xray",
    Unknown => "unknown",
});

str_enum!(PreprocessStep {
    Normalize => "normalize",
    ReduceNoise => "reduce_noise",
    EnhanceContrast => "enhance_contrast",
});

str_enum!(SymptomCategory {
    Pain => "pain",
    Respiratory => "respiratory",
    Digestive => "digestive",
    Neurological => "neurological",
    Cardiovascular => "cardiovascular",
    Musculoskeletal => "musculoskeletal",
    Dermatological => "dermatological",
    General => "general",
});

str_enum!(Severity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

str_enum!(DurationUnit {
    Days => "days",
    Weeks => "weeks",
    Months => "months",
    Years => "years",
});

str_enum!(AgeGroup {
    Infant => "infant",
    Child => "child",
    Adolescent => "adolescent",
    YoungAdult => "young_adult",
    Adult => "adult",
    OlderAdult => "older_adult",
});

str_enum!(LabType {
    Blood => "blood",
    Urine => "urine",
    Stool => "stool",
    Specialized => "specialized",
    Unknown => "unknown",
});

str_enum!(LabStatus {
    Low => "low",
    Normal => "normal",
    High => "high",
});

impl AgeGroup {
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=1 => Self::Infant,
            2..=11 => Self::Child,
            12..=17 => Self::Adolescent,
            18..=29 => Self::YoungAdult,
            30..=59 => Self::Adult,
            _ => Self::OlderAdult,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Infant => "infant",
            Self::Child => "child",
            Self::Adolescent => "adolescent",
            Self::YoungAdult => "young adult",
            Self::Adult => "adult",
            Self::OlderAdult => "older adult",
        }
    }
}

impl LabType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Blood => "Blood Analysis",
            Self::Urine => "Urine Analysis",
            Self::Stool => "Stool Analysis",
            Self::Specialized => "Specialized Analysis",
            Self::Unknown => "General Analysis",
        }
    }
}

impl Relationship {
    /// Human-readable label used in context descriptions and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SameStudy => "Same study (multiple views)",
            Self::FollowUp => "Temporal follow-up",
            Self::Comparison => "Diagnostic comparison",
            Self::Progression => "Disease progression",
            Self::Bilateral => "Bilateral comparison",
            Self::Unknown => "Undetermined relationship",
        }
    }
}

impl StudyType {
    /// Plain radiograph of the given region; `Unknown` stays unknown.
    pub fn from_body_part(part: BodyPart) -> Self {
        match part {
            BodyPart::Chest => Self::ChestXray,
            BodyPart::Abdomen => Self::AbdomenXray,
            BodyPart::Head => Self::HeadXray,
            BodyPart::Spine => Self::SpineXray,
            BodyPart::Unknown => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn relationship_round_trips_through_str() {
        for rel in [
            Relationship::SameStudy,
            Relationship::FollowUp,
            Relationship::Comparison,
            Relationship::Bilateral,
            Relationship::Progression,
            Relationship::Unknown,
        ] {
            assert_eq!(Relationship::from_str(rel.as_str()).unwrap(), rel);
        }
    }

    #[test]
    fn invalid_value_reports_field() {
        let err = BodyPart::from_str("knee").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("BodyPart"));
        assert!(msg.contains("knee"));
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&Relationship::FollowUp).unwrap();
        assert_eq!(json, "\"follow_up\"");
        let step: PreprocessStep = serde_json::from_str("\"enhance_contrast\"").unwrap();
        assert_eq!(step, PreprocessStep::EnhanceContrast);
    }

    #[test]
    fn age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(1), AgeGroup::Infant);
        assert_eq!(AgeGroup::from_age(2), AgeGroup::Child);
        assert_eq!(AgeGroup::from_age(17), AgeGroup::Adolescent);
        assert_eq!(AgeGroup::from_age(29), AgeGroup::YoungAdult);
        assert_eq!(AgeGroup::from_age(59), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(60), AgeGroup::OlderAdult);
        assert_eq!(AgeGroup::OlderAdult.as_str(), "older_adult");
    }

    #[test]
    fn study_type_follows_body_part() {
        assert_eq!(StudyType::from_body_part(BodyPart::Chest), StudyType::ChestXray);
        assert_eq!(StudyType::from_body_part(BodyPart::Unknown), StudyType::Unknown);
        assert_eq!(StudyType::ChestXray.to_string(), "chest_xray");
    }
}
