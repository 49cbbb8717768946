use crate::models::ImageContext;

/// One-line human readable summary of a detected context.
///
/// Format: `<label> - <region> (<views>) - Confidence: NN%`, where the
/// region and views parts are omitted when absent.
pub fn describe_context(context: &ImageContext) -> String {
    let mut description = context.relationship.label().to_string();

    if let Some(region) = context.anatomical_region {
        description.push_str(&format!(" - {region}"));
    }

    if !context.views.is_empty() {
        let views: Vec<&str> = context.views.iter().map(|v| v.as_str()).collect();
        description.push_str(&format!(" ({})", views.join(", ")));
    }

    description.push_str(&format!(" - Confidence: {}%", context.confidence_percent()));
    description
}
