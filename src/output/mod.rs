use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::pipeline::{JobId, JobOutcome};

/// Finished job as written by the CLI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport<'a> {
    pub job_id: JobId,
    pub video_id: &'a str,
    pub target_language: &'a str,
    #[serde(flatten)]
    pub outcome: ReportBody<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReportBody<'a> {
    #[serde(rename_all = "camelCase")]
    Completed {
        original_text: &'a str,
        translated_text: &'a str,
    },
    Failed { error: String },
}

impl<'a> JobReport<'a> {
    pub fn new(job_id: JobId, video_id: &'a str, target_language: &'a str, outcome: &'a JobOutcome) -> Self {
        let outcome = match outcome {
            JobOutcome::Completed {
                original_text,
                translated_text,
            } => ReportBody::Completed {
                original_text,
                translated_text,
            },
            JobOutcome::Failed { stage, reason } => ReportBody::Failed {
                error: format!("{} failed: {}", stage, reason),
            },
            JobOutcome::Aborted { reason } => ReportBody::Failed { error: reason.clone() },
        };

        Self {
            job_id,
            video_id,
            target_language,
            outcome,
        }
    }
}

pub fn format_as_text(report: &JobReport<'_>) -> String {
    match &report.outcome {
        ReportBody::Completed {
            original_text,
            translated_text,
        } => {
            let original = if original_text.is_empty() {
                "(no speech detected)"
            } else {
                original_text
            };
            format!(
                "Video: {}\n\nOriginal:\n{}\n\nTranslation ({}):\n{}\n",
                report.video_id, original, report.target_language, translated_text
            )
        }
        ReportBody::Failed { error } => format!("Video: {}\n\nError: {}\n", report.video_id, error),
    }
}

pub fn format_as_json(report: &JobReport<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn render(report: &JobReport<'_>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(report)),
        OutputFormat::Json => format_as_json(report),
    }
}

/// Save job result to file
pub fn save_to_file(report: &JobReport<'_>, path: &Path, format: OutputFormat) -> Result<()> {
    let content = render(report, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print job result to console
pub fn print_to_console(report: &JobReport<'_>, format: OutputFormat) -> Result<()> {
    println!("{}", render(report, format)?);
    Ok(())
}
