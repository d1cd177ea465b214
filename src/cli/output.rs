//! CLI output formatting

use crate::execution::{EngineEvent, HttpResponse, Task};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a status code for display
pub fn format_status(status: u16) -> String {
    match status {
        200..=299 => style(status).green().to_string(),
        300..=399 => style(status).cyan().to_string(),
        400..=499 => style(status).yellow().to_string(),
        _ => style(status).red().to_string(),
    }
}

/// Format an engine event for display
pub fn format_engine_event(event: &EngineEvent) -> String {
    match event {
        EngineEvent::RequestStarted {
            request_id,
            method,
            path,
        } => format!(
            "{} {} {} ({})",
            ROCKET,
            style(method).bold(),
            style(path).cyan(),
            style(&request_id.to_string()[..8]).dim()
        ),
        EngineEvent::ActionResolved {
            kind,
            object_id,
            action,
            steps,
            ..
        } => format!(
            "{} {} {} → {} ({} steps)",
            INFO,
            style(kind).dim(),
            style(object_id).bold(),
            style(action).cyan(),
            steps
        ),
        EngineEvent::RequestCompleted {
            status,
            halted,
            error,
            ..
        } => {
            let icon = if error.is_some() { CROSS } else { CHECK };
            let halted = if *halted {
                format!(" {}", style("(halted)").yellow())
            } else {
                String::new()
            };
            format!("{} {}{}", icon, format_status(*status), halted)
        }
    }
}

/// Format a response: status line, headers, then the body
pub fn format_response(response: &HttpResponse) -> String {
    let mut out = format!(
        "{} {}{}\n",
        format_status(response.status),
        style(&response.content_type).dim(),
        if response.full_page {
            format!(" {}", style("[page]").dim())
        } else {
            String::new()
        }
    );
    for (name, value) in &response.headers {
        out.push_str(&format!("{}: {}\n", style(name).cyan(), value));
    }
    out.push('\n');
    out.push_str(&response.body);
    out
}

/// Format a queued task for display
pub fn format_task(task: &Task) -> String {
    let arguments = serde_json::to_string(&task.arguments).unwrap_or_default();
    format!(
        "{} {} {} ({})",
        INFO,
        style(&task.name).bold(),
        style(arguments).dim(),
        style(&task.id.to_string()[..8]).dim()
    )
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
