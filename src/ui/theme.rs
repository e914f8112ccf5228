//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::block::BorderType;
use ratatui::widgets::{Block, Borders};

/// How good or bad a displayed value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Warning,
    Bad,
    Muted,
}

impl Tone {
    /// Tone of an RDS instance status.
    pub fn for_instance_status(status: &str) -> Self {
        match status {
            "available" => Tone::Good,
            "" => Tone::Muted,
            "failed" | "incompatible-parameters" | "incompatible-network" | "storage-full" => {
                Tone::Bad
            }
            _ => Tone::Warning,
        }
    }

    /// Tone of a collection job or stream log level.
    pub fn for_job_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" | "success" | "finished" | "done" => Tone::Good,
            "failed" | "error" | "cancelled" => Tone::Bad,
            "warn" | "warning" => Tone::Warning,
            _ => Tone::Muted,
        }
    }

    /// Tone of a month-over-month change of a value where lower is better.
    pub fn for_change(current: f64, previous: f64) -> Self {
        if current > previous {
            Tone::Bad
        } else if current < previous {
            Tone::Good
        } else {
            Tone::Muted
        }
    }
}

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for warnings and slow queries.
    pub warning: Color,
    /// Color for errors and banners.
    pub critical: Color,
    /// Color for running and successful states.
    pub healthy: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    /// Style for the active tab.
    pub tab_active: Style,
    /// Style for inactive tabs.
    pub tab_inactive: Style,
    /// Background of the error banner.
    pub banner: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            banner: Style::default().fg(Color::White).bg(Color::Red),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            banner: Style::default().fg(Color::White).bg(Color::LightRed),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        // Use terminal-light crate to detect background luminance
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a tone
    pub fn tone_style(&self, tone: Tone) -> Style {
        match tone {
            Tone::Good => Style::default().fg(self.healthy),
            Tone::Warning => Style::default().fg(self.warning),
            Tone::Bad => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
            Tone::Muted => Style::default().add_modifier(Modifier::DIM),
        }
    }

    /// Bordered block with the theme's border style.
    pub fn block<'a>(&self, title: impl Into<Line<'a>>) -> Block<'a> {
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(self.border_type)
            .border_style(Style::default().fg(self.border))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_status_tones() {
        assert_eq!(Tone::for_instance_status("available"), Tone::Good);
        assert_eq!(Tone::for_instance_status("modifying"), Tone::Warning);
        assert_eq!(Tone::for_instance_status("storage-full"), Tone::Bad);
    }

    #[test]
    fn test_change_tone() {
        assert_eq!(Tone::for_change(12.0, 10.0), Tone::Bad);
        assert_eq!(Tone::for_change(8.0, 10.0), Tone::Good);
        assert_eq!(Tone::for_change(1.0, 1.0), Tone::Muted);
    }
}
