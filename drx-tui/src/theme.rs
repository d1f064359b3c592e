//! Theme system for dark/light modes

use drx_core::config::ThemeVariant;
use ratatui::style::{Color, Modifier, Style};

/// Theme definition
#[derive(Clone, Debug)]
pub struct Theme {
    pub base: Style,
    pub heading: [Style; 6],
    pub code: Style,
    pub quote: Style,
    pub list_marker: Style,
    pub rule: Style,
    /// Collapse/expand icon in front of headings
    pub toggle: Style,
    /// "N hidden blocks" marker under a collapsed heading
    pub hidden_marker: Style,
    pub outline_bg: Color,
    pub outline_border: Color,
    pub outline_active: Style,
    pub outline_hidden: Style,
    pub cursor_line_bg: Color,
    pub status_bar_fg: Color,
    pub status_bar_bg: Color,
    pub status_warning: Style,
}

impl Theme {
    /// Create a theme for the given variant
    pub fn for_variant(variant: ThemeVariant) -> Self {
        match variant {
            ThemeVariant::Dark => Self::dark(),
            ThemeVariant::Light => Self::light(),
        }
    }

    /// Style for a heading level, clamped to the six styled levels
    pub fn heading_style(&self, level: Option<u8>) -> Style {
        let index = level.unwrap_or(1).clamp(1, 6) as usize - 1;
        self.heading[index]
    }

    /// Dark theme (default)
    pub fn dark() -> Self {
        Self {
            base: Style::default().fg(Color::White),
            heading: [
                Style::default()
                    .fg(Color::LightBlue)
                    .add_modifier(Modifier::BOLD),
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD),
                Style::default()
                    .fg(Color::LightGreen)
                    .add_modifier(Modifier::BOLD),
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD),
                Style::default()
                    .fg(Color::LightMagenta)
                    .add_modifier(Modifier::BOLD),
                Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
            ],
            code: Style::default().fg(Color::Yellow),
            quote: Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            list_marker: Style::default().fg(Color::LightRed),
            rule: Style::default().fg(Color::DarkGray),
            toggle: Style::default().fg(Color::LightCyan),
            hidden_marker: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            outline_bg: Color::Black,
            outline_border: Color::DarkGray,
            outline_active: Style::default()
                .fg(Color::Black)
                .bg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
            outline_hidden: Style::default().fg(Color::DarkGray),
            cursor_line_bg: Color::Rgb(40, 40, 40),
            status_bar_fg: Color::Black,
            status_bar_bg: Color::LightBlue,
            status_warning: Style::default()
                .fg(Color::Black)
                .bg(Color::LightYellow)
                .add_modifier(Modifier::BOLD),
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            base: Style::default().fg(Color::Black),
            heading: [
                Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                Style::default()
                    .fg(Color::Rgb(150, 100, 0))
                    .add_modifier(Modifier::BOLD),
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            ],
            code: Style::default().fg(Color::Rgb(150, 75, 0)),
            quote: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            list_marker: Style::default().fg(Color::Red),
            rule: Style::default().fg(Color::Gray),
            toggle: Style::default().fg(Color::Blue),
            hidden_marker: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
            outline_bg: Color::White,
            outline_border: Color::Gray,
            outline_active: Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            outline_hidden: Style::default().fg(Color::Gray),
            cursor_line_bg: Color::Rgb(230, 230, 250),
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            status_warning: Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_style_clamps() {
        let theme = Theme::dark();
        assert_eq!(theme.heading_style(None), theme.heading[0]);
        assert_eq!(theme.heading_style(Some(3)), theme.heading[2]);
        assert_eq!(theme.heading_style(Some(9)), theme.heading[5]);
    }
}
