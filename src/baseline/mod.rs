//! Baseline support: ignore known findings and report only new ones.
//!
//! Fingerprints are keyed by the stable external name plus the finding
//! code, so a baseline survives graph rebuilds and model re-exports.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

use crate::analysis::Finding;

/// Baseline errors
#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("Failed to read baseline file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse baseline: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Baseline version mismatch")]
    VersionMismatch,
}

/// Current baseline format version
const BASELINE_VERSION: u32 = 1;

/// A fingerprint for a finding that can be matched across runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueFingerprint {
    /// Stable external name (or display name for nodes without one)
    pub name: String,
    /// Node kind label
    pub kind: String,
    /// Finding code, e.g. "RG001"
    pub code: String,
}

impl IssueFingerprint {
    pub fn from_finding(finding: &Finding) -> Self {
        Self {
            name: finding.name.clone(),
            kind: finding.node_kind.to_string(),
            code: finding.kind.code().to_string(),
        }
    }

    pub fn matches(&self, finding: &Finding) -> bool {
        self.name == finding.name
            && self.kind == finding.node_kind
            && self.code == finding.kind.code()
    }
}

/// A baseline containing known findings to ignore
#[derive(Debug, Serialize, Deserialize)]
pub struct Baseline {
    /// Baseline format version
    pub version: u32,
    /// Unix timestamp of creation
    pub created_at: String,
    /// Known findings to ignore
    pub issues: Vec<IssueFingerprint>,
    /// Total count at baseline time
    pub total_at_baseline: usize,
}

impl Baseline {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let issues: Vec<IssueFingerprint> =
            findings.iter().map(IssueFingerprint::from_finding).collect();

        Self {
            version: BASELINE_VERSION,
            created_at: unix_now(),
            issues,
            total_at_baseline: findings.len(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, BaselineError> {
        let file = fs::File::open(path)?;
        let reader = BufReader::new(file);
        let baseline: Self = serde_json::from_reader(reader)?;

        if baseline.version != BASELINE_VERSION {
            return Err(BaselineError::VersionMismatch);
        }

        Ok(baseline)
    }

    pub fn save(&self, path: &Path) -> Result<(), BaselineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Keep only findings that are not in the baseline
    pub fn filter_new<'a>(&self, findings: &'a [Finding]) -> Vec<&'a Finding> {
        findings
            .iter()
            .filter(|f| !self.is_baselined(f))
            .collect()
    }

    pub fn is_baselined(&self, finding: &Finding) -> bool {
        self.issues.iter().any(|fp| fp.matches(finding))
    }

    pub fn stats(&self, findings: &[Finding]) -> BaselineStats {
        let baselined = findings.iter().filter(|f| self.is_baselined(f)).count();

        BaselineStats {
            total_in_baseline: self.issues.len(),
            baselined_found: baselined,
            new_issues: findings.len() - baselined,
        }
    }
}

/// Statistics about baseline comparison
#[derive(Debug, Clone)]
pub struct BaselineStats {
    pub total_in_baseline: usize,
    pub baselined_found: usize,
    pub new_issues: usize,
}

impl std::fmt::Display for BaselineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} new issues ({} baselined, {} in baseline file)",
            self.new_issues, self.baselined_found, self.total_in_baseline
        )
    }
}

fn unix_now() -> String {
    use std::time::SystemTime;

    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FindingKind;
    use crate::graph::NodeId;
    use tempfile::TempDir;

    fn make_finding(name: &str, kind: FindingKind) -> Finding {
        Finding {
            node: NodeId(0),
            kind,
            severity: kind.default_severity(),
            node_kind: "method",
            name: name.to_string(),
            owner_class: None,
            message: format!("'{}' is never used", name),
        }
    }

    #[test]
    fn test_fingerprint_matching() {
        let finding = make_finding("a.App void run()", FindingKind::Unused);
        let fp = IssueFingerprint::from_finding(&finding);

        assert!(fp.matches(&finding));
        // Same name, different finding code
        assert!(!fp.matches(&make_finding(
            "a.App void run()",
            FindingKind::RedundantOverride
        )));
        assert!(!fp.matches(&make_finding("a.App void walk()", FindingKind::Unused)));
    }

    #[test]
    fn test_baseline_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let baseline_path = temp_dir.path().join("baseline.json");

        let findings = vec![
            make_finding("a.App void run()", FindingKind::Unused),
            make_finding("a.App count", FindingKind::WriteOnly),
        ];

        let baseline = Baseline::from_findings(&findings);
        baseline.save(&baseline_path).unwrap();

        let loaded = Baseline::load(&baseline_path).unwrap();
        assert_eq!(loaded.issues.len(), 2);
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn test_baseline_filter() {
        let findings = vec![
            make_finding("a.App void run()", FindingKind::Unused),
            make_finding("a.App void walk()", FindingKind::Unused),
        ];

        let baseline = Baseline::from_findings(&findings[..1]);

        let new_findings = baseline.filter_new(&findings);
        assert_eq!(new_findings.len(), 1);
        assert_eq!(new_findings[0].name, "a.App void walk()");
    }
}
