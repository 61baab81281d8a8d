//! Rendering command results for stdout
//!
//! Human output is for operators; json/yaml are stable shapes for
//! scripting. Logs go to stderr, rendered results are the only thing on
//! stdout.

use crate::artifact::Artifact;
use crate::pipeline::RunReport;
use serde::Serialize;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

/// Serializes any result type for the machine-readable formats. Output is
/// always newline-terminated so the final line survives exit-time flushing.
fn render_serializable<T: Serialize>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let mut rendered = serde_json::to_string_pretty(value)
                .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e));
            rendered.push('\n');
            rendered
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(value).unwrap_or_else(|e| format!("error: {}\n", e))
        }
        OutputFormat::Human => String::new(),
    }
}

/// Renders a run report in the requested format.
pub fn render_report(report: &RunReport, format: OutputFormat) -> String {
    if format != OutputFormat::Human {
        return render_serializable(report, format);
    }

    let mut out = String::new();
    out.push_str(&format!("run:      {}\n", report.run_id));
    out.push_str(&format!("state:    {}\n", report.state));
    out.push_str(&format!("instance: {}\n", report.instance));
    out.push_str(&format!("image:    {}\n", report.image));
    if let Some(digest) = &report.artifact_digest {
        out.push_str(&format!("artifact: sha256:{}\n", digest));
    }

    if let Some(failure) = &report.failure {
        out.push_str(&format!("failed:   {} stage: {}\n", failure.stage, failure.message));
        if let Some(diagnostics) = &failure.diagnostics {
            out.push_str("--- last instance output ---\n");
            out.push_str(diagnostics);
            if !diagnostics.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    for warning in &report.warnings {
        out.push_str(&format!("warning:  [{}] {}\n", warning.stage, warning.message));
    }

    out
}

/// Renders a verified artifact in the requested format.
pub fn render_artifact(artifact: &Artifact, format: OutputFormat) -> String {
    if format != OutputFormat::Human {
        return render_serializable(artifact, format);
    }

    format!(
        "artifact: {} ({} bytes)\nsha256:   {}\n",
        artifact.path.display(),
        artifact.size_bytes,
        artifact.digest
    )
}
