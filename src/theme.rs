use anstyle::{AnsiColor, Color, Style};

/// Raw RGB tuple for the accent used in command banners
pub const ACCENT_RGB: (u8, u8, u8) = (207, 106, 76);

pub const ERROR: Style = Style::new()
    .fg_color(Some(Color::Ansi(AnsiColor::Red)))
    .bold();
pub const WARN: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
pub const INFO: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Blue)));
pub const DEBUG: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));
