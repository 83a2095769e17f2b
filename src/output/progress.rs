use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright_green, bright_red, bright_yellow};

/// Spinner on stderr for a single network operation.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn start(message: impl Into<String>) -> Self {
        let pb = create_spinner(bright_yellow(message.into()).to_string());
        Self { pb }
    }

    pub fn finish(self, message: impl Into<String>) {
        self.pb
            .finish_with_message(bright_green(format!("{} ✓", message.into())).to_string());
    }

    /// Removes the spinner without leaving a line behind.
    pub fn clear(self) {
        self.pb.finish_and_clear();
    }

    pub fn fail(self, message: impl Into<String>) {
        self.pb
            .abandon_with_message(bright_red(format!("{} ✗", message.into())).to_string());
    }
}

/// Byte counter for uploads and downloads; a bar when the size is known.
pub fn transfer_bar(total: Option<u64>, message: impl Into<String>) -> ProgressBar {
    let pb = match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("  {msg} [{bar:30}] {bytes}/{total_bytes}")
            {
                pb.set_style(style.progress_chars("=> "));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {bytes} {spinner}") {
                pb.set_style(style);
            }
            pb
        }
    };
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_message(message.into());
    pb
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
