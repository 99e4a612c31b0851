//! CLI output formatting

use crate::core::blueprint::Blueprint;
use crate::core::state::{RunReport, RunStatus};
use crate::core::variables::Variables;
use crate::execution::PipelineEvent;
use console::Emoji;
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Completed => style("COMPLETED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Format a run event for display
///
/// Returns `None` for events that are only interesting in verbose mode.
pub fn format_event(event: &PipelineEvent, verbose: bool) -> Option<String> {
    match event {
        PipelineEvent::PipelineStarted { run_id, name, phases } => Some(format!(
            "{} Starting {} ({} phase(s), run {})",
            ROCKET,
            style(name.as_deref().unwrap_or("job")).bold(),
            phases,
            style(short_id(&run_id.to_string())).dim()
        )),
        PipelineEvent::PhaseStarted { phase, task_id } => Some(format!(
            "{} Phase {} → {}",
            INFO,
            style(phase).bold(),
            style(task_id).cyan()
        )),
        PipelineEvent::TaskStarted { task_id, token, priority } if verbose => Some(format!(
            "{} {} (priority {}, {})",
            SPINNER,
            style(task_id).cyan(),
            priority,
            style(short_id(token)).dim()
        )),
        PipelineEvent::TaskStarted { .. } => None,
        PipelineEvent::TaskCompleted {
            task_id,
            spawned,
            logs,
            metrics,
            ..
        } => {
            let mut line = if *spawned > 0 {
                format!("{} {} → {} message(s)", CHECK, style(task_id).green(), style(spawned).cyan())
            } else {
                format!("{} {}", CHECK, style(task_id).green())
            };
            if verbose {
                if let Some(logs) = logs {
                    line.push_str(&format!("\n{}", format_output(&render(logs), 5)));
                }
                if let Some(metrics) = metrics {
                    line.push_str(&format!("\n  {} {}", style("metrics:").dim(), render(metrics)));
                }
            }
            Some(line)
        }
        PipelineEvent::SkipTargetMissing { task_id, target } => Some(format!(
            "{} {} skips to {}, which is not a later step; skip branch ignored",
            WARN,
            style(task_id).yellow(),
            style(target).yellow()
        )),
        PipelineEvent::SentinelSet { value } => Some(format!(
            "{} Sentinel set to {}",
            INFO,
            style(render(value)).cyan()
        )),
        PipelineEvent::PipelineFinished { status, .. } => {
            let icon = match status {
                RunStatus::Completed => CHECK,
                RunStatus::Failed => CROSS,
                _ => WARN,
            };
            Some(format!("{} Run finished: {}", icon, format_status(*status)))
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Format a run report for display
pub fn format_report(report: &RunReport) -> String {
    let mut lines = vec![
        format!(
            "{} {} {}",
            INFO,
            style(report.name.as_deref().unwrap_or("job")).bold(),
            format_status(report.status)
        ),
        format!("  Run: {}", style(report.run_id).dim()),
        format!(
            "  Phases: {}/{} ({})",
            report.phases_completed,
            report.phases_total,
            style(format!("{:.0}%", report.progress() * 100.0)).cyan()
        ),
        format!(
            "  Tasks: {} dispatched, {} message(s) spawned",
            style(report.tasks_dispatched).cyan(),
            style(report.messages_spawned).cyan()
        ),
    ];
    if let Some(duration) = report.duration() {
        lines.push(format!("  Duration: {}", style(format_duration(duration)).dim()));
    }
    if let Some(sentinel) = &report.sentinel {
        lines.push(format!("  Sentinel: {}", style(render(sentinel)).cyan()));
    }
    if !report.pending_sentinels.is_empty() {
        lines.push(format!(
            "  Pending sentinels: {}",
            style(report.pending_sentinels.len()).cyan()
        ));
    }
    if let Some(error) = &report.error {
        lines.push(format!("  Error: {}", style(error).red()));
    }
    lines.join("\n")
}

/// Format a blueprint, one line per step
pub fn format_blueprint(blueprint: &Blueprint) -> String {
    let mut lines = Vec::new();
    for (index, phase) in blueprint.phases.iter().enumerate() {
        lines.push(format!("{}", style(format!("Phase {}", index)).bold()));
        for step in phase {
            let mut line = format!("  {} {}", style(&step.id).cyan(), style(&step.name).dim());
            if let Some(target) = &step.skip_to {
                line.push_str(&format!(" (skip to {})", style(target).yellow()));
            }
            if step.pass_sentinel {
                line.push_str(" [sentinel]");
            }
            lines.push(line);
            if let Some(params) = &step.params {
                for (key, value) in params {
                    lines.push(format!("      {} = {}", key, render(value)));
                }
            }
        }
    }
    lines.join("\n")
}

/// Format variables in declaration order
pub fn format_variables(variables: &Variables) -> String {
    variables
        .iter()
        .map(|(key, value)| format!("  {} = {}", style(key).cyan(), style(value).dim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
