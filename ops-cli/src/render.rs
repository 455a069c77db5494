//! Human-readable and JSON rendering of allocator reports

use colored::Colorize;
use registration_numbering::{ExecutionResult, ReportSummary, VerificationReport};
use serde::Serialize;
use uuid::Uuid;

pub fn to_json<T: Serialize>(report: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn summary(summary: &ReportSummary) -> String {
    let mut lines = vec![
        "📋 Registration number plan".bold().to_string(),
        format!("  Total appointments:   {}", summary.total_appointments),
        format!("  Initial visits:       {}", summary.initial_visits),
        format!("  Follow-up visits:     {}", summary.follow_up_visits),
        format!("  Orphaned follow-ups:  {}", summary.orphaned_follow_ups),
    ];
    if !summary.initial_visits_by_service.is_empty() {
        lines.push("  Initial visits by service:".to_string());
        lines.extend(
            summary
                .initial_visits_by_service
                .iter()
                .map(|(code, count)| format!("    {code:<10} {count}")),
        );
    }
    finish(lines)
}

pub fn execution(result: &ExecutionResult) -> String {
    let mut lines = vec![
        "✅ Registration numbers rebuilt".green().bold().to_string(),
        format!("  Quarantined rows:        {}", result.quarantined),
        format!("  Processed initial visits: {}", result.processed_initial_visits),
        format!("  Skipped initial visits:  {}", result.skipped_initial_visits),
        format!("  Conflicts resolved:      {}", result.conflicts_resolved),
        format!("  Updated follow-ups:      {}", result.updated_follow_ups),
        format!("  Skipped series:          {}", result.skipped_series),
    ];
    if !result.assigned_by_service.is_empty() {
        lines.push("  Last sequence by service:".to_string());
        lines.extend(
            result
                .assigned_by_service
                .iter()
                .map(|(code, last)| format!("    {code:<10} {last}")),
        );
    }
    lines.extend(result.skipped.iter().map(|skipped| {
        format!(
            "  {} {} ({})",
            "skipped".yellow(),
            skipped.appointment_id,
            skipped.reason
        )
    }));
    finish(lines)
}

pub fn verification(report: &VerificationReport) -> String {
    let status = if report.is_consistent() {
        "✅ Registration numbers are consistent".green().bold()
    } else {
        "❌ Registration numbers are inconsistent".red().bold()
    };
    let mut lines = vec![
        status.to_string(),
        format!("  Checked appointments: {}", report.checked_appointments),
    ];

    if !report.duplicate_numbers.is_empty() {
        lines.push(format!(
            "  Duplicate numbers: {}",
            report.duplicate_numbers.join(", ")
        ));
    }
    push_ids(&mut lines, "Unnumbered initial visits", &report.unnumbered_initial_visits);
    push_ids(&mut lines, "Malformed numbers", &report.malformed_numbers);
    push_ids(&mut lines, "Series mismatches", &report.series_mismatches);
    finish(lines)
}

fn push_ids(lines: &mut Vec<String>, label: &str, ids: &[Uuid]) {
    if ids.is_empty() {
        return;
    }
    lines.push(format!("  {label}: {}", ids.len()));
    lines.extend(ids.iter().map(|id| format!("    {id}")));
}

fn finish(mut lines: Vec<String>) -> String {
    lines.push(String::new());
    lines.join("\n")
}
