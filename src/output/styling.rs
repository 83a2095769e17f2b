use console::style;

use crate::forge::status::RunStatus;

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bold()
}

/// Colors a normalized state: green when good, red when bad, yellow in between.
pub fn state(text: &str) -> console::StyledObject<String> {
    match text {
        "open" | "success" | "passed" => bright_green(text),
        "merged" => style(text.to_string()).magenta(),
        "failed" | "canceled" => bright_red(text),
        "closed" => dim(text),
        _ => bright_yellow(text),
    }
}

/// One-character marker for a pipeline or job status.
pub fn status_icon(status: &RunStatus) -> console::StyledObject<String> {
    match status.as_str() {
        "success" | "passed" => bright_green("✓"),
        "failed" => bright_red("✗"),
        "canceled" => dim("⊘"),
        "running" => bright_yellow("●"),
        "skipped" | "manual" => dim("○"),
        _ => dim("…"),
    }
}

/// `running` gets a trailing ellipsis so live views show motion.
pub fn run_status_label(status: &RunStatus) -> String {
    if status.is_running() {
        format!("{status}...")
    } else {
        status.to_string()
    }
}

/// Compact human duration, e.g. `42s`, `3m 05s`, `1h 02m`.
pub fn format_duration(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m {:02}s", s / 60, s % 60),
        s => format!("{}h {:02}m", s / 3600, (s % 3600) / 60),
    }
}
