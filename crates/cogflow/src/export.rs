//! Execution history export: json, csv, or a Markdown summary
//! table, one row per trace step in the csv case.

use cogflow_engine::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Summary,
}

pub fn render(document_id: &str, results: &[ExecutionResult], format: ExportFormat) -> String {
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(results).unwrap_or_default(),
        ExportFormat::Csv => render_csv(results),
        ExportFormat::Summary => render_summary(document_id, results),
    }
}

fn render_csv(results: &[ExecutionResult]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let _ = writer.write_record(["run", "step", "node_id", "action", "duration_ms"]);
    for (run_idx, result) in results.iter().enumerate() {
        for step in &result.trace {
            let _ = writer.write_record([
                    run_idx.to_string(),
                    step.step.to_string(),
                    step.node_id.clone(),
                    format!("{:?}", step.action).to_lowercase(),
                    step.duration_ms.to_string(),
            ]);
        }
    }
    String::from_utf8(writer.into_inner().unwrap_or_default()).unwrap_or_default()
}

fn render_summary(document_id: &str, results: &[ExecutionResult]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Execution history for `{document_id}`\n\n"));
    out.push_str("| run | success | iterations | nodes evaluated | duration (ms) | errors |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                i + 1,
                r.success,
                r.metrics.iterations_completed,
                r.metrics.nodes_evaluated,
                r.metrics.duration_ms,
                r.errors.len()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogflow_engine::schedule::ExecutionMetrics;

    fn sample_result(success: bool) -> ExecutionResult {
        ExecutionResult {
            success,
            final_state: Default::default(),
            trace: vec![],
            metrics: ExecutionMetrics { iterations_completed: 1, nodes_evaluated: 2, duration_ms: 5 },
            errors: vec![],
        }
    }

    #[test]
    fn summary_renders_one_row_per_run() {
        let results = vec![sample_result(true), sample_result(false)];
        let table = render_summary("doc-1", &results);
        assert!(table.contains("doc-1"));
        assert_eq!(table.lines().count(), 2 + 2);
    }

    #[test]
    fn json_export_round_trips_through_serde() {
        let results = vec![sample_result(true)];
        let json = render("doc-1", &results, ExportFormat::Json);
        let parsed: Vec<ExecutionResult> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
