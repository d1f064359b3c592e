//! UI rendering

use crate::app::App;
use drx_core::config::OutlineSide;
use drx_core::outline::outline;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// Draw the UI
pub fn draw(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Document and outline
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let doc_area = if app.show_outline {
        let outline_width = app.config.outline.width;
        let left = app.config.outline.side == OutlineSide::Left;
        let constraints = if left {
            [Constraint::Length(outline_width), Constraint::Min(1)]
        } else {
            [Constraint::Min(1), Constraint::Length(outline_width)]
        };
        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(chunks[0]);

        if left {
            render_outline(frame, app, main_chunks[0]);
            main_chunks[1]
        } else {
            render_outline(frame, app, main_chunks[1]);
            main_chunks[0]
        }
    } else {
        chunks[0]
    };

    render_document(frame, app, doc_area);
    render_status_bar(frame, app, chunks[1]);

    if app.show_help {
        render_help(frame, app);
    }
}

fn render_document(frame: &mut Frame, app: &mut App, area: Rect) {
    let title = if app.is_modified() {
        format!(" {} [+] ", app.doc.display_name())
    } else {
        format!(" {} ", app.doc.display_name())
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.outline_border))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    app.doc_area = inner;
    let height = inner.height as usize;
    let rendered = app.rendered(inner.width);
    app.ensure_cursor_visible(&rendered, height);
    app.scroll = app.scroll.min(rendered.len().saturating_sub(1));

    let cursor_style = Style::default().bg(app.theme.cursor_line_bg);
    let lines: Vec<Line> = rendered
        .lines
        .iter()
        .zip(&rendered.line_blocks)
        .skip(app.scroll)
        .take(height)
        .map(|(line, &block)| {
            if block == app.cursor {
                line.clone().patch_style(cursor_style)
            } else {
                line.clone()
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_outline(frame: &mut Frame, app: &App, area: Rect) {
    let entries = outline(app.editor.doc());
    // Closest heading at or before the cursor
    let active = entries.iter().rposition(|e| e.index <= app.cursor);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.theme.outline_border))
        .style(Style::default().bg(app.theme.outline_bg))
        .title(" Outline ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = inner.width as usize;
    let lines: Vec<Line> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let indent = "  ".repeat(entry.level.unwrap_or(1).saturating_sub(1) as usize);
            let marker = if entry.collapsed { "▸ " } else { "  " };
            let text = crate::render::truncate(&format!("{}{}{}", indent, marker, entry.text), width);
            let style = if Some(i) == active {
                app.theme.outline_active
            } else if entry.hidden {
                app.theme.outline_hidden
            } else {
                app.theme.heading_style(entry.level)
            };
            Line::from(Span::styled(text, style))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let base = Style::default()
        .fg(app.theme.status_bar_fg)
        .bg(app.theme.status_bar_bg);

    let visible = app.visible_blocks();
    let position = visible
        .iter()
        .position(|&i| i == app.cursor)
        .map(|p| p + 1)
        .unwrap_or(0);

    let mut spans = vec![Span::styled(
        format!(
            " {}{} | {} | {}/{} ",
            app.doc.display_name(),
            if app.is_modified() { " [+]" } else { "" },
            app.doc.format,
            position,
            visible.len()
        ),
        base.add_modifier(Modifier::BOLD),
    )];

    let hidden = app.block_count() - visible.len();
    if hidden > 0 {
        spans.push(Span::styled(format!("| {} hidden ", hidden), base));
    }

    if app.doc.dirty_on_disk {
        spans.push(Span::styled(" changed on disk (r to reload) ", app.theme.status_warning));
    }

    if let Some(message) = &app.status_message {
        spans.push(Span::styled(format!(" {} ", message), base));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).style(base), area);
}

const HELP: &[(&str, &str)] = &[
    ("j / k", "Next / previous block"),
    ("] / [", "Next / previous heading"),
    ("gg / G", "First / last block"),
    ("Ctrl-d / Ctrl-u", "Half page down / up"),
    ("Enter, Space, za", "Toggle heading"),
    ("zM / zR", "Collapse / expand all"),
    ("click ▸ ▾", "Toggle heading"),
    ("u / Ctrl-r", "Undo / redo"),
    ("w, Ctrl-s", "Save"),
    ("r", "Reload from disk"),
    ("t", "Toggle outline"),
    ("T", "Toggle theme"),
    ("?", "Close help"),
    ("q", "Quit"),
];

fn render_help(frame: &mut Frame, app: &App) {
    let area = centered(frame.area(), 48, HELP.len() as u16 + 2);
    let lines: Vec<Line> = HELP
        .iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(format!(" {:<18}", keys), app.theme.heading_style(Some(2))),
                Span::styled(*what, app.theme.base),
            ])
        })
        .collect();

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.outline_border))
                .title(" Help "),
        ),
        area,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
