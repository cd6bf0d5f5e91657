use crate::analysis::{Finding, Severity};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, findings: &[Finding]) -> Result<()> {
        let report = JsonReport::from_findings(findings);
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport {
    version: &'static str,
    total_issues: usize,
    issues: Vec<JsonIssue>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonIssue {
    code: &'static str,
    severity: &'static str,
    kind: &'static str,
    name: String,
    owner_class: Option<String>,
    message: String,
}

#[derive(Serialize)]
struct JsonSummary {
    errors: usize,
    warnings: usize,
    infos: usize,
}

impl JsonReport {
    fn from_findings(findings: &[Finding]) -> Self {
        let mut errors = 0;
        let mut warnings = 0;
        let mut infos = 0;

        let issues: Vec<JsonIssue> = findings
            .iter()
            .map(|f| {
                match f.severity {
                    Severity::Error => errors += 1,
                    Severity::Warning => warnings += 1,
                    Severity::Info => infos += 1,
                }

                JsonIssue {
                    code: f.kind.code(),
                    severity: f.severity.as_str(),
                    kind: f.node_kind,
                    name: f.name.clone(),
                    owner_class: f.owner_class.clone(),
                    message: f.message.clone(),
                }
            })
            .collect();

        Self {
            version: "1.0",
            total_issues: findings.len(),
            issues,
            summary: JsonSummary {
                errors,
                warnings,
                infos,
            },
        }
    }
}
