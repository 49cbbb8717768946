//! Relationship-specific instruction templates for multi-image analysis.

use crate::models::{BodyPart, ImageContext};

pub const SAFETY_INSTRUCTIONS: &str = r#"SAFETY INSTRUCTIONS:
- Provide a detailed analysis, but remember it is for educational purposes
- Suggest a consultation with a medical professional for a definitive diagnosis
- State the limitations of an AI-based analysis where appropriate
- Use precise medical terminology but explain complex terms
- Keep an objective, evidence-based approach"#;

const CHEST_CONSIDERATIONS: &str = r#"

CHEST-SPECIFIC CONSIDERATIONS:
- Frontal view: assess the cardiac silhouette, hila, lung fields and costophrenic angles
- Lateral view: assess the retrosternal and retrocardiac spaces and the thoracic spine
- Correlate findings between both views for three-dimensional localization
- Look for signs of disease that may be subtle in a single view"#;

fn region_or<'a>(context: &ImageContext, fallback: &'a str) -> &'a str {
    context.anatomical_region.map(|r| r.as_str()).unwrap_or(fallback)
}

/// Several views of one radiological study.
pub fn same_study_prompt(context: &ImageContext) -> String {
    let view_count = context.views.len();
    let region = region_or(context, "anatomical region");
    let views = if context.views.is_empty() {
        "multiple views".to_string()
    } else {
        context
            .views
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let study_type = context.study_type;

    let mut prompt = format!(
        r#"COMPREHENSIVE RADIOLOGICAL ANALYSIS - MULTIPLE VIEWS

You are an expert radiologist analyzing {view_count} images from the same radiological study:
- Anatomical region: {region}
- Available views: {views}
- Study type: {study_type}

SPECIFIC INSTRUCTIONS:
1. Analyze EACH image individually first
2. Identify specific findings in each view
3. Correlate findings across ALL views
4. Look for findings that are only visible in specific views
5. Provide an INTEGRAL diagnosis based on ALL the available information

ANALYSIS METHODOLOGY:
- Evaluate the technical quality of each image
- Describe the normal anatomy visible in each view
- Identify any pathological finding
- Correlate findings between views to confirm or rule out disease
- Consider the diagnostic value of each view

REQUIRED RESPONSE FORMAT:
## ANALYSIS BY VIEW
[Detailed analysis for each image]

## DIAGNOSTIC CORRELATION
[How the findings correlate between views]

## INTEGRAL DIAGNOSIS
[Final diagnosis based on all images]

## RECOMMENDATIONS
[Follow-up or additional studies if needed]"#
    );

    if context.anatomical_region == Some(BodyPart::Chest) {
        prompt.push_str(CHEST_CONSIDERATIONS);
    }

    prompt
}

/// Studies of the same patient taken at different times.
pub fn follow_up_prompt(context: &ImageContext) -> String {
    let image_count = context.views.len();
    let region = region_or(context, "anatomical region");

    format!(
        r#"TEMPORAL MEDICAL FOLLOW-UP ANALYSIS

You are an expert radiologist analyzing {image_count} follow-up studies of the same patient:
- Anatomical region: {region}
- Follow-up type: temporal evolution
- Goal: assess changes, progression or response to treatment

TEMPORAL ANALYSIS METHODOLOGY:
1. Analyze each study individually
2. Establish the chronological sequence (oldest to most recent)
3. Systematically compare each study with the previous one
4. Document every observed change
5. Assess the clinical significance of the changes

KEY ASPECTS TO EVALUATE:
- Changes between studies
- New findings
- Resolution or persistence of previous findings
- Progression or regression of known disease
- Response to treatment (if applicable)
- Stability of findings

REQUIRED RESPONSE FORMAT:
## INDIVIDUAL ANALYSIS BY STUDY
[Describe each study separately, in chronological order]

## TEMPORAL COMPARISON
[Systematically compare the changes between studies]

## EVOLUTION ASSESSMENT
[Interpret the clinical significance of the changes]

## FOLLOW-UP CONCLUSIONS
[Summary of the evolution and recommendations]"#
    )
}

/// Images compared to find diagnostic differences.
pub fn comparison_prompt(context: &ImageContext) -> String {
    let image_count = context.views.len();
    let region = region_or(context, "anatomical region");

    format!(
        r#"COMPARATIVE DIAGNOSTIC ANALYSIS

You are an expert radiologist performing a comparative analysis of {image_count} images:
- Anatomical region: {region}
- Goal: diagnostic comparison to identify significant differences

COMPARISON METHODOLOGY:
1. Analyze each image individually
2. Identify the findings in each image
3. Systematically compare the findings
4. Determine similarities and differences
5. Assess the clinical significance of the differences

ASPECTS TO COMPARE:
- Normal versus pathological anatomy
- Different degrees of severity
- Similar or different disease patterns
- Anatomical location of findings
- Morphological characteristics

REQUIRED RESPONSE FORMAT:
## INDIVIDUAL ANALYSIS
[Describe each image separately]

## SYSTEMATIC COMPARISON
[Compare findings across all images]

## SIGNIFICANT DIFFERENCES
[Identify and explain important differences]

## DIAGNOSTIC INTERPRETATION
[Conclusions based on the comparison]"#
    )
}

/// Several images with no specific relationship.
pub fn generic_multi_image_prompt(image_count: usize) -> String {
    format!(
        r#"MULTIPLE MEDICAL IMAGE ANALYSIS

You are an expert radiologist analyzing {image_count} medical images.

GENERAL INSTRUCTIONS:
1. Analyze each image individually
2. Identify the study type and anatomical region of each image
3. Describe the findings in each image
4. If the images are related, correlate the findings
5. Provide an integral diagnostic interpretation

METHODOLOGY:
- Evaluate the technical quality of each image
- Identify the visible anatomy and structures
- Look for pathological or abnormal findings
- Consider the clinical context if available
- Provide a differential diagnosis when appropriate

RESPONSE FORMAT:
## ANALYSIS BY IMAGE
[Detailed analysis of each image]

## MAIN FINDINGS
[Summary of the most important findings]

## DIAGNOSTIC INTERPRETATION
[Conclusions and recommendations]"#
    )
}

/// Region-specific evaluation checklist, if one exists for the region.
pub fn region_instructions(region: BodyPart) -> Option<&'static str> {
    match region {
        BodyPart::Chest => Some(
            r#"CHEST-SPECIFIC EVALUATION:
- Cardiac silhouette: size, shape, borders
- Lung fields: lucency, patterns, nodules
- Pulmonary hila: size, density, symmetry
- Mediastinum: width, contours, masses
- Costophrenic angles: blunting, effusions
- Soft tissues and skeleton: ribs, clavicles, soft tissues"#,
        ),
        BodyPart::Abdomen => Some(
            r#"ABDOMEN-SPECIFIC EVALUATION:
- Bowel gas pattern: distribution, dilatation
- Solid organs: hepatic, splenic and renal contours
- Calcifications: gallbladder, kidneys, vessels
- Abnormal masses or collections
- Skeleton: lumbar spine, pelvis
- Abdominal soft tissues"#,
        ),
        BodyPart::Head => Some(
            r#"SKULL-SPECIFIC EVALUATION:
- Cranial vault: fractures, lytic or blastic lesions
- Paranasal sinuses: opacification, air-fluid levels
- Orbits: fractures, foreign bodies
- Temporomandibular joints
- Soft tissues: swelling, calcifications"#,
        ),
        BodyPart::Spine => Some(
            r#"SPINE-SPECIFIC EVALUATION:
- Alignment: curvature, listhesis
- Vertebral bodies: height, fractures, lytic or blastic lesions
- Intervertebral spaces: narrowing, degenerative changes
- Posterior elements: pedicles, facets, spinous processes
- Paravertebral soft tissues"#,
        ),
        BodyPart::Unknown => None,
    }
}
