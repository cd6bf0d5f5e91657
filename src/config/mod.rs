// Configuration loader - some methods reserved for future use
#![allow(dead_code)]

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a refgraph analysis session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package prefixes that belong to the analyzed program.
    /// Empty means every non-library declaration is in scope.
    pub scope_packages: Vec<String>,

    /// Explicit entry points, by external name
    pub entry_points: Vec<String>,

    /// Name patterns to pin as entry points - never report as dead
    pub retain_patterns: Vec<String>,

    /// Role classification patterns
    pub roles: RoleConfig,

    /// Application entry method signatures
    pub main_patterns: Vec<MainPattern>,

    /// Report configuration
    pub report: ReportConfig,

    /// Detection configuration
    pub detection: DetectionConfig,
}

/// Regexes matched against supertype names to classify framework roles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub applet: String,
    pub servlet: String,
    pub test_case: String,
    pub ejb: String,
}

/// Signature pattern for an application entry method: static void with the
/// given name and exact parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainPattern {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal, json
    pub format: String,

    /// Group results by: class, kind
    pub group_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Report suspicious (unused) declarations
    pub unused: bool,

    /// Report fields with asymmetric read/write usage
    pub write_only: bool,

    /// Report methods that always return the same constant
    pub constant_return: bool,

    /// Report declared exceptions that are never thrown
    pub unthrown_exceptions: bool,

    /// Report overrides that are empty or only call super
    pub redundant_override: bool,

    /// Report cycles of mutually-referencing dead declarations
    pub dead_cycles: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scope_packages: vec![],
            entry_points: vec![],
            retain_patterns: vec![],
            roles: RoleConfig::default(),
            main_patterns: vec![
                MainPattern {
                    name: "main".to_string(),
                    params: vec!["java.lang.String[]".to_string()],
                },
                MainPattern {
                    name: "premain".to_string(),
                    params: vec![
                        "java.lang.String".to_string(),
                        "java.lang.instrument.Instrumentation".to_string(),
                    ],
                },
            ],
            report: ReportConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            applet: r"^java\.applet\.Applet$".to_string(),
            servlet: r"^javax\.servlet\..*Servlet$".to_string(),
            test_case: r"^junit\.framework\.TestCase$".to_string(),
            ejb: r"^javax\.ejb\.".to_string(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "terminal".to_string(),
            group_by: "class".to_string(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            unused: true,
            write_only: true,
            constant_return: true,
            unthrown_exceptions: true,
            redundant_override: true,
            dead_cycles: false,
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self> {
        let default_names = [
            ".refgraph.yml",
            ".refgraph.yaml",
            ".refgraph.toml",
            "refgraph.yml",
            "refgraph.yaml",
            "refgraph.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Check if a name matches any retain pattern
    pub fn should_retain(&self, name: &str) -> bool {
        self.retain_patterns.iter().any(|p| glob_match(p, name))
    }
}

/// Simple glob matching for patterns like "*Bean" or "Test*"
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        return text.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return text.starts_with(prefix);
    }
    text == pattern
}
