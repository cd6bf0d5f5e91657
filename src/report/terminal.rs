use crate::analysis::{Finding, Severity};
use colored::Colorize;
use miette::Result;
use std::collections::HashMap;

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// Group findings by owning class instead of a flat list
    group_by_class: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            group_by_class: true,
        }
    }

    pub fn with_grouping(mut self, group_by_class: bool) -> Self {
        self.group_by_class = group_by_class;
        self
    }

    pub fn report(&self, findings: &[Finding]) -> Result<()> {
        if findings.is_empty() {
            println!("{}", "No issues found!".green().bold());
            return Ok(());
        }

        println!();
        println!(
            "{}",
            format!("Found {} issues:", findings.len()).yellow().bold()
        );
        println!();

        if self.group_by_class {
            self.print_grouped(findings);
        } else {
            for finding in findings {
                self.print_finding(finding);
            }
            println!();
        }

        self.print_summary(findings);

        Ok(())
    }

    fn print_grouped(&self, findings: &[Finding]) {
        let mut by_class: HashMap<&str, Vec<&Finding>> = HashMap::new();
        for finding in findings {
            let key = finding.owner_class.as_deref().unwrap_or("<top level>");
            by_class.entry(key).or_default().push(finding);
        }

        let mut classes: Vec<_> = by_class.keys().copied().collect();
        classes.sort();

        for class in classes {
            println!("{}", class.cyan().bold());
            for finding in &by_class[class] {
                self.print_finding(finding);
            }
            println!();
        }
    }

    fn print_finding(&self, finding: &Finding) {
        let severity_str = match finding.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
        };

        println!(
            "  {} [{}] {}",
            severity_str,
            finding.kind.code().dimmed(),
            finding.message
        );
        println!(
            "    {} {} '{}'",
            "→".dimmed(),
            finding.node_kind.dimmed(),
            finding.name.white()
        );
    }

    fn print_summary(&self, findings: &[Finding]) {
        let mut errors = 0;
        let mut warnings = 0;
        let mut infos = 0;

        let mut by_code: HashMap<&'static str, usize> = HashMap::new();

        for finding in findings {
            match finding.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info => infos += 1,
            }
            *by_code.entry(finding.kind.code()).or_default() += 1;
        }

        println!("{}", "─".repeat(60).dimmed());

        let mut severity_parts = Vec::new();
        if errors > 0 {
            severity_parts.push(format!("{} errors", errors).red().to_string());
        }
        if warnings > 0 {
            severity_parts.push(format!("{} warnings", warnings).yellow().to_string());
        }
        if infos > 0 {
            severity_parts.push(format!("{} info", infos).blue().to_string());
        }
        println!("Summary: {}", severity_parts.join(", "));

        let mut codes: Vec<_> = by_code.into_iter().collect();
        codes.sort();
        let code_parts: Vec<String> = codes
            .iter()
            .map(|(code, count)| format!("{} x{}", code, count))
            .collect();
        println!("{}", format!("By code: {}", code_parts.join(", ")).dimmed());
        println!();
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
