//! Human-readable outcome formatting.

use serde::Serialize;

use flowplace_core::{AffinityMatrix, ScheduleOutcome, Workload};

/// Headline numbers for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub strategy: String,
    pub placed: usize,
    pub local: usize,
    pub fallback: usize,
    pub unplaced: usize,
    pub load_deviation: f64,
    pub kernel_affinity: u64,
    pub co_location_affinity: u64,
}

impl Summary {
    pub fn of(outcome: &ScheduleOutcome, workload: &Workload, matrix: &AffinityMatrix) -> Self {
        Self {
            strategy: outcome.strategy.clone(),
            placed: outcome.placed_count(),
            local: outcome.local_placements(workload),
            fallback: outcome.fallback.len(),
            unplaced: outcome.unplaced.len(),
            load_deviation: outcome.load_deviation(outcome.mean_load()),
            kernel_affinity: outcome.kernel_affinity(matrix),
            co_location_affinity: outcome.co_location_affinity(matrix),
        }
    }
}

pub fn format_outcome(outcome: &ScheduleOutcome, workload: &Workload, matrix: &AffinityMatrix) -> String {
    let summary = Summary::of(outcome, workload, matrix);
    let mut out = String::new();

    out.push_str("\n╔══════════════════════════════════════════╗\n");
    out.push_str("║  flowplace schedule                      ║\n");
    out.push_str("╠══════════════════════════════════════════╣\n");
    out.push_str(&format!("║  Strategy: {:<30}║\n", summary.strategy));
    out.push_str(&format!("║  Servers:  {:<30}║\n", outcome.servers.len()));
    out.push_str(&format!("║  Tasks:    {:<30}║\n", workload.tasks().len()));
    out.push_str("╚══════════════════════════════════════════╝\n\n");

    out.push_str(&format!("Placed {} task(s):\n", summary.placed));
    out.push_str(&format!("  {} local\n", summary.local));
    out.push_str(&format!("  {} by fallback\n", summary.fallback));
    out.push_str(&format!("  {} unplaced\n\n", summary.unplaced));

    out.push_str("SERVERS:\n\n");
    for server in &outcome.servers {
        let kernel = outcome
            .kernel_of(server.id)
            .map(|k| format!(" kernel={k}"))
            .unwrap_or_default();
        let tasks: Vec<String> = server.tasks.iter().map(ToString::to_string).collect();
        out.push_str(&format!(
            "  {:<6} {}/{}{kernel}  [{}]\n",
            server.id.to_string(),
            server.tasks.len(),
            server.slot,
            tasks.join(" ")
        ));
    }
    out.push('\n');

    out.push_str(&format!("Load deviation:        {:.2}\n", summary.load_deviation));
    out.push_str(&format!("Kernel affinity:       {}\n", summary.kernel_affinity));
    out.push_str(&format!("Co-location affinity:  {}\n", summary.co_location_affinity));

    if let Some(shortfall) = outcome.shortfall() {
        out.push_str(&format!("\n❌ {shortfall}\n"));
    }

    out
}

pub fn format_comparison(rows: &[Summary]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<14} {:>7} {:>7} {:>9} {:>9} {:>10} {:>8} {:>8}\n",
        "strategy", "placed", "local", "fallback", "unplaced", "load-dev", "kernel", "co-loc"
    ));
    for row in rows {
        out.push_str(&format!(
            "{:<14} {:>7} {:>7} {:>9} {:>9} {:>10.2} {:>8} {:>8}\n",
            row.strategy,
            row.placed,
            row.local,
            row.fallback,
            row.unplaced,
            row.load_deviation,
            row.kernel_affinity,
            row.co_location_affinity
        ));
    }
    out
}
