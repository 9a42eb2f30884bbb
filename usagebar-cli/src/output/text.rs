//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Utc};
use usagebar_core::{DisplayPhase, UsageMeter, UsageSnapshot, UsageState};

use crate::Cli;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Creates a formatter honouring the global `--no-color` flag.
    pub fn for_cli(cli: &Cli) -> Self {
        Self::new(!cli.no_color)
    }

    /// Set the progress bar width.
    #[cfg(test)]
    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width;
        self
    }

    /// Formats the whole dashboard for a state.
    pub fn format_state(
        &self,
        state: &UsageState,
        stale_after: Option<Duration>,
        now: DateTime<Utc>,
    ) -> String {
        let mut lines = vec![self.bold("Claude Usage"), String::new()];

        match state.phase() {
            DisplayPhase::Loading => lines.push(self.dim("Loading usage data...")),
            DisplayPhase::Empty => lines.push(self.dim("No usage data yet")),
            DisplayPhase::Error(message) => {
                lines.push(self.format_error(message));
                // The last good snapshot is still worth showing.
                if let Some(snapshot) = &state.snapshot {
                    lines.push(String::new());
                    lines.push(self.format_snapshot(snapshot));
                }
            }
            DisplayPhase::Ready(snapshot) => lines.push(self.format_snapshot(snapshot)),
        }

        if let Some(snapshot) = &state.snapshot {
            lines.push(String::new());
            lines.push(self.format_footer(snapshot, state.is_loading, stale_after, now));
        }

        lines.join("\n")
    }

    /// Formats every visible meter of a snapshot.
    pub fn format_snapshot(&self, snapshot: &UsageSnapshot) -> String {
        snapshot
            .meters()
            .iter()
            .map(|meter| self.format_meter(meter))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Formats one usage card: title, bar and optional reset line.
    pub fn format_meter(&self, meter: &UsageMeter) -> String {
        let pct = self.color_for_percent(
            meter.percentage,
            &format!("{}% used", meter.percentage.floor()),
        );
        let mut result = format!(
            "{}\n{} {}",
            self.bold(meter.kind.title()),
            self.progress_bar(meter.percentage),
            pct
        );

        if let Some(reset) = meter.reset_text() {
            result.push('\n');
            result.push_str(&self.dim(&reset));
        }

        result
    }

    /// Formats a progress bar filled to `percent_used`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_used: f64) -> String {
        let ratio = (percent_used / 100.0).clamp(0.0, 1.0);
        let filled = (ratio * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_used, &bar)
    }

    /// Formats the "Updated ..." footer.
    pub fn format_footer(
        &self,
        snapshot: &UsageSnapshot,
        refreshing: bool,
        stale_after: Option<Duration>,
        now: DateTime<Utc>,
    ) -> String {
        let mut footer = self.dim(&format!("Updated {}", format_age(snapshot.age(now))));

        if stale_after.is_some_and(|threshold| snapshot.is_stale(threshold, now)) {
            footer.push(' ');
            footer.push_str(&self.yellow("(stale)"));
        }
        if refreshing {
            footer.push(' ');
            footer.push_str(&self.dim("· refreshing"));
        }

        footer
    }

    /// Formats an error message.
    pub fn format_error(&self, error: &str) -> String {
        format!("{}: {}", self.red("Error"), error)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent_used: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent_used >= usagebar_core::APPROACHING_LIMIT_PERCENT {
            self.red(text)
        } else if percent_used >= 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}

/// Formats an age as "just now", "5 min ago", "3 h ago" or "2 d ago".
pub fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{} min ago", secs / 60)
    } else if secs < 86_400 {
        format!("{} h ago", secs / 3600)
    } else {
        format!("{} d ago", secs / 86_400)
    }
}
