use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Reset, RgbColor, Style};

use crate::theme;

const PRIMARY_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Rgb(RgbColor(
    theme::ACCENT_RGB.0,
    theme::ACCENT_RGB.1,
    theme::ACCENT_RGB.2,
))));
const SUCCESS_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green)));
const ERROR_COLOR: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)));
const DIM: Style = Style::new().dimmed();

/// Only emit escape codes when stderr is a terminal.
fn paint(style: Style, s: &str) -> String {
    if std::io::stderr().is_terminal() {
        format!("{style}{s}{Reset}")
    } else {
        s.to_string()
    }
}

fn render_arrow() -> String {
    paint(PRIMARY_COLOR, "❱")
}

#[must_use]
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let tenths = d.subsec_millis() / 100;
    if total_secs < 60 {
        format!("{total_secs}.{tenths}s")
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{mins}m {secs}.{tenths}s")
    }
}

#[must_use]
pub fn format_start_message(command: &str) -> String {
    format!("{} {}\n\n", render_arrow(), command)
}

#[must_use]
pub fn format_success_message(elapsed: Duration) -> String {
    format!(
        "\n{} Command succeeded {} {}\n",
        render_arrow(),
        paint(SUCCESS_COLOR, "✓"),
        paint(DIM, &format_duration(elapsed))
    )
}

#[must_use]
pub fn format_failure_message(command: &str, exit_code: i32) -> String {
    format!(
        "\n{} {} failed {} (exit code {})\n",
        render_arrow(),
        command,
        paint(ERROR_COLOR, "✘"),
        exit_code
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1_250)), "1.2s");
        assert_eq!(format_duration(Duration::from_millis(125_400)), "2m 5.4s");
    }
}
