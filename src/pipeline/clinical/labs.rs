use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{LabStatus, LabType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Lenient parse of a free-text gender field.
    pub fn from_gender(gender: &str) -> Option<Self> {
        match gender.trim().to_lowercase().as_str() {
            "m" | "male" | "man" => Some(Self::Male),
            "f" | "female" | "woman" => Some(Self::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceRange {
    Between(f64, f64),
    BySex { male: (f64, f64), female: (f64, f64) },
    /// Normal strictly below the bound.
    Below(f64),
    /// Normal strictly above the bound.
    Above(f64),
    AboveBySex { male: f64, female: f64 },
    Qualitative(&'static str),
}

impl ReferenceRange {
    pub fn describe(&self, sex: Option<Sex>) -> String {
        match (self, sex) {
            (Self::Between(lo, hi), _) => format!("{lo}-{hi}"),
            (Self::BySex { male, .. }, Some(Sex::Male)) => format!("{}-{}", male.0, male.1),
            (Self::BySex { female, .. }, Some(Sex::Female)) => {
                format!("{}-{}", female.0, female.1)
            }
            (Self::BySex { male, female }, None) => format!(
                "M {}-{} / F {}-{}",
                male.0, male.1, female.0, female.1
            ),
            (Self::Below(bound), _) => format!("<{bound}"),
            (Self::Above(bound), _) => format!(">{bound}"),
            (Self::AboveBySex { male, .. }, Some(Sex::Male)) => format!(">{male}"),
            (Self::AboveBySex { female, .. }, Some(Sex::Female)) => format!(">{female}"),
            (Self::AboveBySex { male, female }, None) => format!("M >{male} / F >{female}"),
            (Self::Qualitative(text), _) => (*text).to_string(),
        }
    }

    /// `None` when the range depends on an unknown sex or is not numeric.
    pub fn classify(&self, value: f64, sex: Option<Sex>) -> Option<LabStatus> {
        let between = |lo: f64, hi: f64| {
            if value < lo {
                LabStatus::Low
            } else if value > hi {
                LabStatus::High
            } else {
                LabStatus::Normal
            }
        };
        let above = |bound: f64| {
            if value > bound {
                LabStatus::Normal
            } else {
                LabStatus::Low
            }
        };

        match (self, sex) {
            (Self::Between(lo, hi), _) => Some(between(*lo, *hi)),
            (Self::BySex { male, .. }, Some(Sex::Male)) => Some(between(male.0, male.1)),
            (Self::BySex { female, .. }, Some(Sex::Female)) => {
                Some(between(female.0, female.1))
            }
            (Self::Below(bound), _) => Some(if value < *bound {
                LabStatus::Normal
            } else {
                LabStatus::High
            }),
            (Self::Above(bound), _) => Some(above(*bound)),
            (Self::AboveBySex { male, .. }, Some(Sex::Male)) => Some(above(*male)),
            (Self::AboveBySex { female, .. }, Some(Sex::Female)) => Some(above(*female)),
            (Self::BySex { .. } | Self::AboveBySex { .. }, None) | (Self::Qualitative(_), _) => {
                None
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::Qualitative(_))
    }
}

/// One analyte of the reference table.
#[derive(Debug, Clone, Copy)]
pub struct LabParameter {
    pub name: &'static str,
    /// Lowercase spellings recognized in free text, `name` included.
    pub aliases: &'static [&'static str],
    pub unit: &'static str,
    pub lab_type: LabType,
    pub panel: &'static str,
    pub range: ReferenceRange,
}

const fn param(
    lab_type: LabType,
    panel: &'static str,
    name: &'static str,
    aliases: &'static [&'static str],
    unit: &'static str,
    range: ReferenceRange,
) -> LabParameter {
    LabParameter {
        name,
        aliases,
        unit,
        lab_type,
        panel,
        range,
    }
}

use LabType::{Blood, Specialized, Stool, Urine};
use ReferenceRange::{AboveBySex, Below, Between, BySex, Qualitative};

/// Adult reference values, grouped by lab type then panel.
#[rustfmt::skip]
pub const LAB_PARAMETERS: &[LabParameter] = &[
    // Blood
    param(Blood, "Hematology", "Hemoglobin", &["hemoglobin", "hgb", "hb"], "g/dL",
        BySex { male: (13.5, 17.5), female: (12.0, 16.0) }),
    param(Blood, "Hematology", "Hematocrit", &["hematocrit", "hct"], "%",
        BySex { male: (41.0, 53.0), female: (36.0, 46.0) }),
    param(Blood, "Hematology", "Leukocytes", &["leukocytes", "wbc", "white blood cells"], "/μL",
        Between(4000.0, 11000.0)),
    param(Blood, "Hematology", "Platelets", &["platelets", "plt"], "/μL",
        Between(150000.0, 450000.0)),
    param(Blood, "Hematology", "Neutrophils", &["neutrophils"], "%", Between(50.0, 70.0)),
    param(Blood, "Hematology", "Lymphocytes", &["lymphocytes"], "%", Between(20.0, 40.0)),
    param(Blood, "Blood Chemistry", "Glucose", &["glucose", "blood sugar"], "mg/dL",
        Between(70.0, 100.0)),
    param(Blood, "Blood Chemistry", "Creatinine", &["creatinine"], "mg/dL",
        BySex { male: (0.7, 1.3), female: (0.6, 1.1) }),
    param(Blood, "Blood Chemistry", "Urea", &["urea", "bun"], "mg/dL", Between(7.0, 20.0)),
    param(Blood, "Blood Chemistry", "Uric acid", &["uric acid"], "mg/dL",
        BySex { male: (3.5, 7.2), female: (2.6, 6.0) }),
    param(Blood, "Blood Chemistry", "Sodium", &["sodium"], "mEq/L", Between(136.0, 145.0)),
    param(Blood, "Blood Chemistry", "Potassium", &["potassium"], "mEq/L", Between(3.5, 5.1)),
    param(Blood, "Blood Chemistry", "Chloride", &["chloride"], "mEq/L", Between(98.0, 107.0)),
    param(Blood, "Lipid Profile", "Total cholesterol", &["total cholesterol", "cholesterol"],
        "mg/dL", Below(200.0)),
    param(Blood, "Lipid Profile", "HDL", &["hdl"], "mg/dL",
        AboveBySex { male: 40.0, female: 50.0 }),
    param(Blood, "Lipid Profile", "LDL", &["ldl"], "mg/dL", Below(100.0)),
    param(Blood, "Lipid Profile", "Triglycerides", &["triglycerides"], "mg/dL", Below(150.0)),
    param(Blood, "Liver Function", "ALT", &["alt", "sgpt"], "U/L",
        BySex { male: (10.0, 40.0), female: (7.0, 35.0) }),
    param(Blood, "Liver Function", "AST", &["ast", "sgot"], "U/L",
        BySex { male: (10.0, 40.0), female: (9.0, 32.0) }),
    param(Blood, "Liver Function", "Total bilirubin", &["total bilirubin", "bilirubin"], "mg/dL",
        Between(0.3, 1.2)),
    param(Blood, "Liver Function", "Direct bilirubin", &["direct bilirubin"], "mg/dL",
        Between(0.0, 0.3)),
    param(Blood, "Liver Function", "Alkaline phosphatase", &["alkaline phosphatase", "alp"], "U/L",
        Between(44.0, 147.0)),
    param(Blood, "Liver Function", "Albumin", &["albumin"], "g/dL", Between(3.5, 5.0)),
    param(Blood, "Cardiac Markers", "Troponin I", &["troponin i"], "ng/mL", Below(0.04)),
    param(Blood, "Cardiac Markers", "Troponin T", &["troponin t"], "ng/mL", Below(0.01)),
    param(Blood, "Cardiac Markers", "CK-MB", &["ck-mb"], "ng/mL", Below(6.3)),
    param(Blood, "Cardiac Markers", "Total CK", &["total ck", "cpk"], "U/L",
        BySex { male: (30.0, 200.0), female: (30.0, 135.0) }),
    param(Blood, "Thyroid Function", "TSH", &["tsh"], "mIU/L", Between(0.27, 4.2)),
    param(Blood, "Thyroid Function", "Free T4", &["free t4", "ft4"], "ng/dL", Between(0.93, 1.7)),
    param(Blood, "Thyroid Function", "Free T3", &["free t3", "ft3"], "pg/mL", Between(2.0, 4.4)),
    param(Blood, "Thyroid Function", "Total T4", &["total t4"], "μg/dL", Between(4.5, 12.0)),
    // Urine
    param(Urine, "Basic Urinalysis", "Specific gravity", &["specific gravity"], "",
        Between(1.003, 1.030)),
    param(Urine, "Basic Urinalysis", "pH", &["ph"], "", Between(4.6, 8.0)),
    param(Urine, "Basic Urinalysis", "Protein", &["protein"], "mg/dL",
        Qualitative("negative or trace")),
    param(Urine, "Basic Urinalysis", "Glucose", &["glucose"], "mg/dL", Qualitative("negative")),
    param(Urine, "Basic Urinalysis", "Ketones", &["ketones"], "mg/dL", Qualitative("negative")),
    param(Urine, "Basic Urinalysis", "Blood", &["blood"], "", Qualitative("negative")),
    param(Urine, "Basic Urinalysis", "Leukocytes", &["leukocytes"], "/field", Between(0.0, 5.0)),
    param(Urine, "Basic Urinalysis", "Erythrocytes", &["erythrocytes"], "/field", Between(0.0, 3.0)),
    param(Urine, "Basic Urinalysis", "Bacteria", &["bacteria"], "", Qualitative("scant")),
    param(Urine, "Urinary Sediment", "Hyaline casts", &["hyaline casts"], "/field", Between(0.0, 2.0)),
    param(Urine, "Urinary Sediment", "Granular casts", &["granular casts"], "/field",
        Qualitative("absent")),
    param(Urine, "Urinary Sediment", "Crystals", &["crystals"], "", Qualitative("scant")),
    param(Urine, "Urinary Sediment", "Epithelial cells", &["epithelial cells"], "/field",
        Qualitative("scant")),
    // Stool
    param(Stool, "Stool Examination", "Consistency", &["consistency"], "", Qualitative("formed")),
    param(Stool, "Stool Examination", "Color", &["color"], "", Qualitative("brown")),
    param(Stool, "Stool Examination", "Occult blood", &["occult blood"], "", Qualitative("negative")),
    param(Stool, "Stool Examination", "Leukocytes", &["leukocytes"], "/field", Between(0.0, 5.0)),
    param(Stool, "Stool Examination", "Erythrocytes", &["erythrocytes"], "/field",
        Qualitative("absent")),
    param(Stool, "Stool Examination", "Parasites", &["parasites"], "", Qualitative("absent")),
    param(Stool, "Stool Examination", "Cysts", &["cysts"], "", Qualitative("absent")),
    param(Stool, "Stool Culture", "Normal flora", &["normal flora"], "", Qualitative("present")),
    param(Stool, "Stool Culture", "Pathogens", &["pathogens"], "", Qualitative("absent")),
    param(Stool, "Stool Culture", "Salmonella", &["salmonella"], "", Qualitative("absent")),
    param(Stool, "Stool Culture", "Shigella", &["shigella"], "", Qualitative("absent")),
    param(Stool, "Stool Culture", "Pathogenic E. coli", &["e. coli"], "", Qualitative("absent")),
    // Specialized
    param(Specialized, "Hormone Profile", "Cortisol", &["cortisol"], "μg/dL", Between(6.2, 19.4)),
    param(Specialized, "Hormone Profile", "Insulin", &["insulin"], "μU/mL", Between(2.6, 24.9)),
    param(Specialized, "Hormone Profile", "Testosterone", &["testosterone"], "ng/dL",
        BySex { male: (264.0, 916.0), female: (15.0, 70.0) }),
    param(Specialized, "Hormone Profile", "Estradiol", &["estradiol"], "pg/mL",
        Qualitative("varies with cycle")),
    param(Specialized, "Hormone Profile", "Progesterone", &["progesterone"], "ng/mL",
        Qualitative("varies with cycle")),
    param(Specialized, "Tumor Markers", "PSA", &["psa"], "ng/mL", Below(4.0)),
    param(Specialized, "Tumor Markers", "CA 125", &["ca 125", "ca-125"], "U/mL", Below(35.0)),
    param(Specialized, "Tumor Markers", "CA 19-9", &["ca 19-9"], "U/mL", Below(37.0)),
    param(Specialized, "Tumor Markers", "CEA", &["cea"], "ng/mL", Below(5.0)),
    param(Specialized, "Tumor Markers", "AFP", &["afp"], "ng/mL", Below(10.0)),
    param(Specialized, "Coagulation", "Prothrombin time", &["prothrombin time"], "s",
        Between(11.0, 13.0)),
    param(Specialized, "Coagulation", "INR", &["inr"], "", Between(0.8, 1.1)),
    param(Specialized, "Coagulation", "PTT", &["ptt", "aptt"], "s", Between(25.0, 35.0)),
    param(Specialized, "Coagulation", "Fibrinogen", &["fibrinogen"], "mg/dL",
        Between(200.0, 400.0)),
];

/// Filename keywords per lab type, checked in order.
const LAB_TYPE_KEYWORDS: &[(LabType, &[&str])] = &[
    (
        Blood,
        &["blood", "hemogram", "cbc", "hematology", "chemistry", "lipid", "glucose", "cholesterol"],
    ),
    (Urine, &["urine", "urinalysis", "uro"]),
    (Stool, &["stool", "feces", "copro", "parasit"]),
    (Specialized, &["hormon", "thyroid", "cardiac", "tumor", "coagulation"]),
];

pub fn detect_lab_type(file_name: &str) -> LabType {
    let lowered = file_name.to_lowercase();
    LAB_TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(lab_type, _)| *lab_type)
        .unwrap_or(LabType::Unknown)
}

/// Reference listing for one lab type, panel by panel.
pub fn expected_parameters(lab_type: LabType) -> String {
    if lab_type == LabType::Unknown {
        return "General laboratory parameters".to_string();
    }

    let mut listing = String::new();
    let mut panel = "";
    for p in LAB_PARAMETERS.iter().filter(|p| p.lab_type == lab_type) {
        if p.panel != panel {
            panel = p.panel;
            let _ = writeln!(listing, "\n{panel}:");
        }
        let unit = if p.unit.is_empty() { "-" } else { p.unit };
        let _ = writeln!(listing, "  - {} ({unit}): {}", p.name, p.range.describe(None));
    }
    listing
}

/// A numeric value found in free text, judged against the reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabValue {
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub lab_type: LabType,
    pub reference: String,
    pub status: Option<LabStatus>,
}

impl LabValue {
    pub fn describe(&self) -> String {
        let mut line = format!("{}: {}", self.parameter, self.value);
        if !self.unit.is_empty() {
            let _ = write!(line, " {}", self.unit);
        }
        let _ = write!(line, " (reference {})", self.reference);
        if let Some(status) = self.status {
            let _ = write!(line, " - {status}");
        }
        line
    }
}

/// Numeric parameters keyed by alias. The first table entry wins a shared alias.
static ALIAS_INDEX: LazyLock<HashMap<&'static str, &'static LabParameter>> = LazyLock::new(|| {
    let mut index = HashMap::new();
    for p in LAB_PARAMETERS.iter().filter(|p| p.range.is_numeric()) {
        for alias in p.aliases {
            index.entry(*alias).or_insert(p);
        }
    }
    index
});

static VALUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let mut aliases: Vec<&str> = ALIAS_INDEX.keys().copied().collect();
    // Longest first so "total cholesterol" beats "cholesterol".
    aliases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternation = aliases
        .iter()
        .map(|a| regex::escape(a))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"\b({alternation})\b\s*(?:[:=]|\bis\b|\bof\b|\bat\b)?\s*(\d{{1,3}}(?:,\d{{3}})+|\d+(?:[.,]\d+)?)"
    ))
    .unwrap()
});

static THOUSANDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+$").unwrap());

/// `250,000` is a grouped integer; `5,4` is a decimal comma.
pub fn parse_lab_number(raw: &str) -> Option<f64> {
    let normalized = if THOUSANDS.is_match(raw) {
        raw.replace(',', "")
    } else {
        raw.replace(',', ".")
    };
    normalized.parse().ok()
}

/// Pull `parameter value` pairs out of free text. Each parameter is
/// reported once, at its first mention.
pub fn extract_lab_values(text: &str, gender: Option<&str>) -> Vec<LabValue> {
    let sex = gender.and_then(Sex::from_gender);
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut values = Vec::new();

    for caps in VALUE_PATTERN.captures_iter(&lowered) {
        let Some(param) = ALIAS_INDEX.get(&caps[1]) else {
            continue;
        };
        let Some(value) = parse_lab_number(&caps[2]) else {
            continue;
        };
        if !seen.insert(param.name) {
            continue;
        }
        values.push(LabValue {
            parameter: param.name.to_string(),
            value,
            unit: param.unit.to_string(),
            lab_type: param.lab_type,
            reference: param.range.describe(sex),
            status: param.range.classify(value, sex),
        });
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_type_from_file_name() {
        assert_eq!(detect_lab_type("CBC_2024.pdf"), LabType::Blood);
        assert_eq!(detect_lab_type("urinalysis-march.png"), LabType::Urine);
        assert_eq!(detect_lab_type("stool_parasites.jpg"), LabType::Stool);
        assert_eq!(detect_lab_type("thyroid_panel.jpg"), LabType::Specialized);
        assert_eq!(detect_lab_type("scan.jpg"), LabType::Unknown);
    }

    #[test]
    fn expected_parameters_lists_panels() {
        let listing = expected_parameters(LabType::Blood);
        assert!(listing.contains("\nHematology:\n"));
        assert!(listing.contains("  - Hemoglobin (g/dL): M 13.5-17.5 / F 12-16"));
        assert!(listing.contains("  - LDL (mg/dL): <100"));
        assert!(!listing.contains("Urinalysis"));
        assert_eq!(
            expected_parameters(LabType::Unknown),
            "General laboratory parameters"
        );
    }

    #[test]
    fn sex_specific_ranges() {
        let range = BySex {
            male: (13.5, 17.5),
            female: (12.0, 16.0),
        };
        assert_eq!(range.classify(13.0, Some(Sex::Male)), Some(LabStatus::Low));
        assert_eq!(range.classify(13.0, Some(Sex::Female)), Some(LabStatus::Normal));
        assert_eq!(range.classify(13.0, None), None);
        assert_eq!(range.describe(Some(Sex::Female)), "12-16");
    }

    #[test]
    fn one_sided_bounds() {
        assert_eq!(Below(200.0).classify(200.0, None), Some(LabStatus::High));
        assert_eq!(Below(200.0).classify(180.0, None), Some(LabStatus::Normal));
        assert_eq!(ReferenceRange::Above(40.0).classify(40.0, None), Some(LabStatus::Low));
        let hdl = AboveBySex {
            male: 40.0,
            female: 50.0,
        };
        assert_eq!(hdl.classify(45.0, Some(Sex::Female)), Some(LabStatus::Low));
        assert_eq!(hdl.classify(45.0, None), None);
        assert_eq!(Qualitative("negative").classify(1.0, None), None);
    }

    #[test]
    fn numbers_with_grouping_and_decimal_commas() {
        assert_eq!(parse_lab_number("250,000"), Some(250000.0));
        assert_eq!(parse_lab_number("5,4"), Some(5.4));
        assert_eq!(parse_lab_number("13.2"), Some(13.2));
        assert_eq!(parse_lab_number("1.2.3"), None);
    }

    #[test]
    fn values_from_narrative() {
        let values = extract_lab_values(
            "Hemoglobin 11.2 g/dL, fasting glucose: 180 mg/dL; platelets 250,000. LDL is 90",
            Some("female"),
        );
        let names: Vec<&str> = values.iter().map(|v| v.parameter.as_str()).collect();
        assert_eq!(names, vec!["Hemoglobin", "Glucose", "Platelets", "LDL"]);

        assert_eq!(values[0].status, Some(LabStatus::Low));
        assert_eq!(values[0].reference, "12-16");
        assert_eq!(values[1].status, Some(LabStatus::High));
        assert_eq!(values[2].value, 250000.0);
        assert_eq!(values[2].status, Some(LabStatus::Normal));
        assert_eq!(values[3].status, Some(LabStatus::Normal));
        assert_eq!(
            values[1].describe(),
            "Glucose: 180 mg/dL (reference 70-100) - high"
        );
    }

    #[test]
    fn longest_alias_wins_and_repeats_are_dropped() {
        let values = extract_lab_values("total cholesterol 230, cholesterol 190", None);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].parameter, "Total cholesterol");
        assert_eq!(values[0].value, 230.0);
        assert_eq!(values[0].status, Some(LabStatus::High));
    }

    #[test]
    fn unknown_sex_leaves_sex_specific_status_open() {
        let values = extract_lab_values("creatinine 1.2", None);
        assert_eq!(values[0].status, None);
        assert_eq!(values[0].reference, "M 0.7-1.3 / F 0.6-1.1");
    }

    #[test]
    fn text_without_values_yields_nothing() {
        assert!(extract_lab_values("glucose was normal", None).is_empty());
    }
}
