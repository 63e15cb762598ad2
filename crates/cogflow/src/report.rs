//! Human-readable report assembly: combines a
//! validation pass and an analysis pass, then renders as Markdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cogflow_engine::ValidationResult;

use crate::analyze::{AnalysisResult, ComplexityBucket};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub validation: ValidationResult,
    pub analysis: AnalysisResult,
    pub generated_at: DateTime<Utc>,
}

pub fn build(validation: ValidationResult, analysis: AnalysisResult) -> Report {
    Report {
        validation,
        analysis,
        generated_at: Utc::now(),
    }
}

impl Report {
    /// Renders the Markdown form the CLI `info` command prints.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Document report\n\n");
        out.push_str(&format!(
                "Validation: **{}**\n\n",
                if self.validation.valid { "valid" } else { "invalid" }
        ));
        out.push_str(&format!(
                "- nodes: {}\n- relations: {}\n",
                self.validation.summary.node_count, self.validation.summary.relation_count
        ));

        if !self.validation.errors.is_empty() {
            out.push_str("\n## Errors\n\n");
            for e in &self.validation.errors {
                out.push_str(&format!("- {e}\n"));
            }
        }
        if !self.validation.warnings.is_empty() {
            out.push_str("\n## Warnings\n\n");
            for w in &self.validation.warnings {
                out.push_str(&format!("- {w}\n"));
            }
        }

        let bucket = match self.analysis.complexity_bucket {
            ComplexityBucket::Low => "low",
            ComplexityBucket::Medium => "medium",
            ComplexityBucket::High => "high",
        };
        out.push_str(&format!("\n## Complexity\n\n{bucket}\n"));

        if !self.analysis.issues.is_empty() {
            out.push_str("\n## Issues\n\n");
            for i in &self.analysis.issues {
                out.push_str(&format!("- {i}\n"));
            }
        }
        if !self.analysis.recommendations.is_empty() {
            out.push_str("\n## Recommendations\n\n");
            for r in &self.analysis.recommendations {
                out.push_str(&format!("- {r}\n"));
            }
        }

        out
    }
}
