//! Command-line front end: load files, analyze the batch, optionally ask the
//! inference service.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use tracing::warn;

use crate::chat::{AnalysisError, AnalysisRequest, AnalysisService, LabAnalysis};
use crate::config::InferenceSettings;
use crate::models::{ImageAsset, ImageContext, ImageMetadata, ModelError, PreprocessStep, Relationship};
use crate::pipeline::batch::{BatchAnalysis, BatchConfig, ImageBatchAnalyzer};
use crate::pipeline::context::describe_context;
use crate::pipeline::preprocess::PreprocessOptions;
use crate::pipeline::prompt::PatientData;

#[derive(Parser, Debug)]
#[command(name = "mediscan")]
#[command(version, about = "Medical image context detection and AI-assisted reading", long_about = None)]
pub struct Cli {
    /// Image files (JPEG, PNG or WebP, at most 4 MB each)
    #[arg(value_name = "FILE", required_unless_present = "lab")]
    pub files: Vec<PathBuf>,

    /// Lab report (image or PDF) to read with the inference service
    #[arg(long, value_name = "FILE")]
    pub lab: Option<PathBuf>,

    /// Send the images to the inference service and print its reading
    #[arg(long)]
    pub analyze: bool,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Skip normalization, denoising and contrast enhancement
    #[arg(long)]
    pub no_preprocess: bool,

    /// Clinical symptoms added to the request
    #[arg(long, value_name = "TEXT")]
    pub symptoms: Option<String>,

    /// Patient age in years
    #[arg(long)]
    pub age: Option<u32>,

    /// Patient gender
    #[arg(long)]
    pub gender: Option<String>,

    /// Medical history: conditions, surgeries, allergies, medication
    #[arg(long, value_name = "TEXT")]
    pub history: Option<String>,

    /// Lab values as free text, e.g. "glucose 180 mg/dL, LDL 130"
    #[arg(long, value_name = "TEXT")]
    pub lab_notes: Option<String>,

    /// Replace the detected relationship (same_study, follow_up, comparison, ...)
    #[arg(long, value_name = "RELATIONSHIP")]
    pub relationship: Option<Relationship>,

    /// Number of images processed in parallel
    #[arg(short = 'j', long, value_name = "N", default_value_t = 4)]
    pub workers: usize,
}

impl Cli {
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            preprocess: if self.no_preprocess {
                PreprocessOptions::disabled()
            } else {
                PreprocessOptions::default()
            },
            max_workers: self.workers.max(1),
        }
    }

    pub fn patient(&self) -> PatientData {
        PatientData {
            age: self.age,
            gender: self.gender.clone(),
            history: self.history.clone(),
            symptoms: self.symptoms.clone(),
            lab_notes: self.lab_notes.clone(),
            ..PatientData::default()
        }
    }
}

/// Load every path, keeping files within the upload limits.
/// Rejected files are returned next to the accepted ones.
pub fn load_assets(paths: &[PathBuf]) -> (Vec<ImageAsset>, Vec<(PathBuf, ModelError)>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for path in paths {
        match load_one(path) {
            Ok(asset) => accepted.push(asset),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file");
                rejected.push((path.clone(), e));
            }
        }
    }
    (accepted, rejected)
}

fn load_one(path: &Path) -> Result<ImageAsset, ModelError> {
    let asset = ImageAsset::from_path(path)?;
    asset.check_upload_limits()?;
    Ok(asset)
}

#[derive(Debug, Serialize)]
struct ImageSummary<'a> {
    name: &'a str,
    applied_steps: &'a [PreprocessStep],
    metadata: Option<&'a ImageMetadata>,
}

#[derive(Debug, Serialize)]
struct BatchSummary<'a> {
    description: String,
    context: &'a ImageContext,
    images: Vec<ImageSummary<'a>>,
}

fn summarize(batch: &BatchAnalysis) -> BatchSummary<'_> {
    BatchSummary {
        description: describe_context(&batch.context),
        context: &batch.context,
        images: batch
            .images
            .iter()
            .map(|i| ImageSummary {
                name: &i.processed.source().original_name,
                applied_steps: i.processed.applied_steps(),
                metadata: i.metadata.as_ref(),
            })
            .collect(),
    }
}

fn print_batch(batch: &BatchAnalysis, json: bool) -> Result<(), AnalysisError> {
    if json {
        let text = serde_json::to_string_pretty(&summarize(batch))
            .map_err(|e| AnalysisError::Output(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    println!("{}", describe_context(&batch.context));
    for rec in &batch.context.recommendations {
        println!("  - {rec}");
    }
    Ok(())
}

fn print_lab(lab: &LabAnalysis, json: bool) -> Result<(), AnalysisError> {
    if json {
        let text = serde_json::to_string_pretty(&lab.report)
            .map_err(|e| AnalysisError::Output(e.to_string()))?;
        println!("{text}");
    } else {
        println!("{}", lab.response);
    }
    if lab.report.has_critical_values() {
        warn!(
            count = lab.report.critical_values.len(),
            "Lab report lists critical values"
        );
    }
    Ok(())
}

/// Run one CLI invocation.
pub fn execute(cli: &Cli) -> Result<(), AnalysisError> {
    if let Some(path) = &cli.lab {
        let report = ImageAsset::from_path(path)?;
        let service =
            AnalysisService::from_settings(&InferenceSettings::from_env(), cli.batch_config())?;
        let lab = service.analyze_lab(&report, &cli.patient())?;
        print_lab(&lab, cli.json)?;
        if cli.files.is_empty() {
            return Ok(());
        }
    }

    let (assets, rejected) = load_assets(&cli.files);
    for (path, e) in &rejected {
        eprintln!("skipped {}: {e}", path.display());
    }
    if assets.is_empty() {
        return Err(AnalysisError::EmptyRequest);
    }

    if !cli.analyze {
        let analyzer = ImageBatchAnalyzer::with_config(cli.batch_config());
        let mut batch = analyzer.analyze(assets);
        if let Some(relationship) = cli.relationship {
            batch.override_relationship(relationship);
        }
        return print_batch(&batch, cli.json);
    }

    let service = AnalysisService::from_settings(&InferenceSettings::from_env(), cli.batch_config())?;
    let outcome = service.analyze(AnalysisRequest {
        assets,
        patient: cli.patient(),
        relationship_override: cli.relationship,
    })?;

    if cli.json {
        let text = serde_json::to_string_pretty(&outcome.report())
            .map_err(|e| AnalysisError::Output(e.to_string()))?;
        println!("{text}");
    } else {
        println!("{}\n", describe_context(&outcome.batch.context));
        println!("{}", outcome.response);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "mediscan",
            "--json",
            "--no-preprocess",
            "--symptoms",
            "cough",
            "--relationship",
            "follow_up",
            "-j",
            "2",
            "a.png",
            "b.png",
        ])
        .unwrap();

        assert!(cli.json);
        assert!(!cli.analyze);
        assert_eq!(cli.files.len(), 2);
        assert_eq!(cli.relationship, Some(Relationship::FollowUp));
        assert_eq!(cli.batch_config().max_workers, 2);
        assert_eq!(cli.batch_config().preprocess, PreprocessOptions::disabled());
        assert_eq!(cli.patient().symptoms.as_deref(), Some("cough"));
    }

    #[test]
    fn files_are_required() {
        assert!(Cli::try_parse_from(["mediscan", "--json"]).is_err());
    }

    #[test]
    fn lab_report_alone_is_enough() {
        let cli = Cli::try_parse_from(["mediscan", "--lab", "cbc.pdf"]).unwrap();
        assert!(cli.files.is_empty());
        assert_eq!(cli.lab.as_deref(), Some(Path::new("cbc.pdf")));
    }

    #[test]
    fn patient_flags_fill_patient_data() {
        let cli = Cli::try_parse_from([
            "mediscan",
            "--age",
            "61",
            "--gender",
            "female",
            "--history",
            "diabetes",
            "--lab-notes",
            "glucose 180",
            "a.png",
        ])
        .unwrap();
        let patient = cli.patient();
        assert_eq!(patient.age, Some(61));
        assert_eq!(patient.gender.as_deref(), Some("female"));
        assert_eq!(patient.history.as_deref(), Some("diabetes"));
        assert_eq!(patient.lab_notes.as_deref(), Some("glucose 180"));
    }

    #[test]
    fn unknown_relationship_is_rejected() {
        assert!(Cli::try_parse_from(["mediscan", "--relationship", "sideways", "a.png"]).is_err());
    }

    #[test]
    fn load_assets_splits_accepted_and_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("chest_pa.png");
        std::fs::File::create(&good).unwrap().write_all(b"not really a png").unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        let missing = dir.path().join("missing.jpg");

        let (accepted, rejected) = load_assets(&[good, text, missing]);

        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].original_name, "chest_pa.png");
        assert_eq!(rejected.len(), 2);
        assert!(matches!(rejected[0].1, ModelError::UnsupportedFormat { .. }));
        assert!(matches!(rejected[1].1, ModelError::Read { .. }));
    }

    #[test]
    fn json_summary_lists_images_in_order() {
        let analyzer = ImageBatchAnalyzer::with_config(BatchConfig {
            preprocess: PreprocessOptions::disabled(),
            max_workers: 1,
        });
        let batch = analyzer.analyze(vec![
            ImageAsset::new("first.png", "image/png", vec![0, 1]),
            ImageAsset::new("second.pdf", "application/pdf", vec![2]),
        ]);

        let value = serde_json::to_value(summarize(&batch)).unwrap();
        assert_eq!(value["images"][0]["name"], "first.png");
        assert_eq!(value["images"][1]["name"], "second.pdf");
        assert!(value["images"][1]["metadata"].is_null());
        assert_eq!(value["context"]["relationship"], "unknown");
    }
}
