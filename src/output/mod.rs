mod format;
mod progress;
mod styling;
mod tables;

pub use format::{print_data, OutputFormat};
pub use progress::{transfer_bar, Spinner};
pub use styling::{
    bold, bright_green, bright_red, bright_yellow, cyan, dim, format_duration, run_status_label,
    state, status_icon,
};
pub use tables::{create_table, duration_cell, state_cell, truncate};

/// Prints a success line to stderr.
pub fn success(message: impl std::fmt::Display) {
    eprintln!("{} {message}", bright_green("✓"));
}

/// Prints a warning line to stderr.
pub fn warning(message: impl std::fmt::Display) {
    eprintln!("{} {message}", bright_yellow("!"));
}
