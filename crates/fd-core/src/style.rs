//! Terminal styling with NO_COLOR support.

use fd_protocol::VehicleStatus;

/// Check if color output is enabled (respects `NO_COLOR` env var).
pub fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

#[derive(Debug, Clone, Copy)]
pub struct Style {
    enabled: bool,
}

impl Style {
    /// Colors on for a terminal unless NO_COLOR is set.
    pub fn for_terminal(is_tty: bool) -> Self {
        Self {
            enabled: is_tty && color_enabled(),
        }
    }

    pub fn force_enabled() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn error(&self, text: &str) -> String {
        self.paint("31", text)
    }

    pub fn accent(&self, text: &str) -> String {
        self.paint("36", text)
    }

    /// Status label colored by availability.
    pub fn status(&self, status: Option<VehicleStatus>) -> String {
        match status {
            Some(VehicleStatus::Available) => self.paint("32", "available"),
            Some(VehicleStatus::Rented) => self.paint("33", "rented"),
            Some(VehicleStatus::Maintenance) => self.paint("31", "maintenance"),
            None => self.dim("-"),
        }
    }
}

/// Visible width of a string, ignoring ANSI escape sequences.
pub fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    for c in s.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if c == '\x1b' {
            in_escape = true;
        } else if !c.is_control() {
            width += 1;
        }
    }
    width
}

/// Right-pad `s` with spaces to `width` visible columns.
pub fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(visible_width(s));
    format!("{s}{}", " ".repeat(fill))
}

/// Cut plain text to at most `max` chars, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_style_is_plain() {
        let style = Style::disabled();
        assert_eq!(style.bold("x"), "x");
        assert_eq!(style.status(Some(VehicleStatus::Rented)), "rented");
        assert_eq!(style.status(None), "-");
    }

    #[test]
    fn enabled_style_wraps_in_escapes() {
        let style = Style::force_enabled();
        assert_eq!(style.error("bad"), "\x1b[31mbad\x1b[0m");
        assert_eq!(
            style.status(Some(VehicleStatus::Available)),
            "\x1b[32mavailable\x1b[0m"
        );
    }

    #[test]
    fn non_tty_has_no_color() {
        assert_eq!(Style::for_terminal(false).dim("x"), "x");
    }

    #[test]
    fn visible_width_strips_ansi() {
        assert_eq!(visible_width("\x1b[31mhello\x1b[0m"), 5);
        assert_eq!(visible_width("Peña"), 4);
        assert_eq!(visible_width(""), 0);
    }

    #[test]
    fn pad_counts_visible_columns() {
        let painted = Style::force_enabled().bold("ab");
        assert_eq!(visible_width(&pad(&painted, 5)), 5);
        assert_eq!(pad("long text", 3), "long text");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Los Angeles International", 10), "Los Ang...");
    }
}
