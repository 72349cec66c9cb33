//! Best-effort KPI dashboard regeneration after a run.
//!
//! Renders a small markdown dashboard from the most recent run records.
//! Failures are logged and swallowed; the dashboard must never fail a run.

use std::path::Path;

use doc_store::DocumentStore;
use serde_json::Value;
use tracing::{info, warn};

const DASHBOARD_FILE: &str = "kpi_dashboard.md";
const RUNS_SHOWN: usize = 20;

/// Regenerate the dashboard under `log_dir`.
pub async fn regenerate(store: &dyn DocumentStore, log_dir: &Path) {
    let runs = match store.recent_runs(RUNS_SHOWN).await {
        Ok(runs) => runs,
        Err(e) => {
            warn!(error = %e, "could not regenerate KPI dashboard");
            return;
        }
    };

    let body = render(&runs);
    let out_path = log_dir.join(DASHBOARD_FILE);
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        warn!(error = %e, "could not create log dir for KPI dashboard");
        return;
    }
    match std::fs::write(&out_path, body) {
        Ok(()) => info!(path = %out_path.display(), "KPI dashboard regenerated"),
        Err(e) => warn!(error = %e, "could not write KPI dashboard"),
    }
}

fn render(runs: &[Value]) -> String {
    let mut out = String::from("# Ingestion KPI Dashboard\n\n");
    out.push_str(&format!(
        "Generated: {}\n\n",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    ));

    if runs.is_empty() {
        out.push_str("No ingestion runs recorded yet.\n");
        return out;
    }

    out.push_str("| Run | Started | Status | Updated | Reingested | Errors | Files | Duration |\n");
    out.push_str("|---|---|---|---|---|---|---|---|\n");
    for run in runs {
        let stats = run.get("stats").cloned().unwrap_or(Value::Null);
        let num = |v: &Value, key: &str| v.get(key).and_then(Value::as_u64).unwrap_or(0);
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {:.1}s |\n",
            run.get("run_id").and_then(Value::as_str).unwrap_or("?"),
            run.get("timestamp").and_then(Value::as_str).unwrap_or("?"),
            run.get("status").and_then(Value::as_str).unwrap_or("?"),
            num(&stats, "updated"),
            num(&stats, "full_reingest"),
            num(&stats, "error"),
            num(&stats, "files_processed"),
            run.get("duration_seconds").and_then(Value::as_f64).unwrap_or(0.0),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_run_rows() {
        let runs = vec![json!({
            "run_id": "20250101_020304_ab12cd",
            "timestamp": "2025-01-01T02:03:04Z",
            "status": "completed",
            "duration_seconds": 12.5,
            "stats": {"updated": 3, "full_reingest": 1, "error": 0, "files_processed": 42},
        })];
        let out = render(&runs);
        assert!(out.contains("20250101_020304_ab12cd"));
        assert!(out.contains("| 3 | 1 | 0 | 42 | 12.5s |"));
    }

    #[test]
    fn empty_history_renders_placeholder() {
        assert!(render(&[]).contains("No ingestion runs"));
    }
}
