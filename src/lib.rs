//! refgraph - Whole-program reference graph for unused code analysis
//!
//! This library builds a reference graph over a language-neutral program
//! model and reports declarations that nothing reachable still uses.
//!
//! # Architecture
//!
//! The analysis pipeline consists of:
//! 1. **Model Loading** - Deserialize the program model (classes, members, bodies)
//! 2. **Graph Building** - Two-phase lazy construction of the reference graph
//! 3. **Entry Point Pinning** - Mark externally reachable nodes
//! 4. **Analysis** - Evaluate suspicion rules and secondary checks
//! 5. **Reporting** - Output findings in various formats

pub mod analysis;
pub mod baseline;
pub mod config;
pub mod graph;
pub mod model;
pub mod report;

pub use analysis::{Analyzer, CycleDetector, EntryPointRegistrar, Finding, FindingKind, Severity};
pub use baseline::Baseline;
pub use config::Config;
pub use graph::{
    GraphBuilder, NodeId, ParallelGraphBuilder, RefGraph, RefKind, SessionConfig, ValueTemplate,
};
pub use model::{ModelBuilder, ProgramModel};
pub use report::{ReportFormat, Reporter};
