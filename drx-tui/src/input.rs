//! Input handling and keybindings

use crate::app::{App, KeyPrefix};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

/// Result of handling input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Handle a key event with the viewport height for page commands
pub fn handle_input(app: &mut App, key: KeyEvent, viewport_height: usize) -> Result<Action> {
    // Clear status message on any keystroke (except pure modifiers)
    if !matches!(key.code, KeyCode::Modifier(_)) {
        app.clear_status_message();
    }

    // Handle Ctrl+C
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return Ok(Action::Quit);
    }

    // Help dialog swallows everything but Esc and ?
    if app.show_help {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            app.toggle_help();
        }
        return Ok(Action::Continue);
    }

    if let Some(prefix) = app.pending_prefix.take() {
        match (prefix, key.code) {
            (KeyPrefix::G, KeyCode::Char('g')) => app.cursor_top(),
            (KeyPrefix::Z, KeyCode::Char('a')) => {
                app.toggle_current();
            }
            (KeyPrefix::Z, KeyCode::Char('M')) => app.collapse_all(),
            (KeyPrefix::Z, KeyCode::Char('R')) => app.expand_all(),
            _ => {}
        }
        return Ok(Action::Continue);
    }

    let half_page = (viewport_height / 2).max(1);

    match key {
        KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            ..
        } => {
            app.quit();
            return Ok(Action::Quit);
        }

        // Ctrl+D/U - half page, counted in blocks
        KeyEvent {
            code: KeyCode::Char('d'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => app.move_cursor_down(half_page),
        KeyEvent {
            code: KeyCode::Char('u'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => app.move_cursor_up(half_page),

        // Ctrl+R - redo
        KeyEvent {
            code: KeyCode::Char('r'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => app.redo(),

        // Ctrl+S - save
        KeyEvent {
            code: KeyCode::Char('s'),
            modifiers: KeyModifiers::CONTROL,
            ..
        } => {
            if let Err(e) = app.save() {
                app.set_status_message(format!("Save failed: {:#}", e));
            }
        }

        KeyEvent {
            code: KeyCode::Char('j') | KeyCode::Down,
            ..
        } => app.move_cursor_down(1),
        KeyEvent {
            code: KeyCode::Char('k') | KeyCode::Up,
            ..
        } => app.move_cursor_up(1),
        KeyEvent {
            code: KeyCode::Char(']'),
            ..
        } => app.next_heading(),
        KeyEvent {
            code: KeyCode::Char('['),
            ..
        } => app.prev_heading(),
        KeyEvent {
            code: KeyCode::Char('g'),
            ..
        } => app.pending_prefix = Some(KeyPrefix::G),
        KeyEvent {
            code: KeyCode::Char('G') | KeyCode::End,
            ..
        } => app.cursor_bottom(),
        KeyEvent {
            code: KeyCode::Home,
            ..
        } => app.cursor_top(),

        // Collapsing
        KeyEvent {
            code: KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Tab,
            ..
        } => {
            app.toggle_current();
        }
        KeyEvent {
            code: KeyCode::Char('z'),
            ..
        } => app.pending_prefix = Some(KeyPrefix::Z),

        KeyEvent {
            code: KeyCode::Char('u'),
            ..
        } => app.undo(),
        KeyEvent {
            code: KeyCode::Char('w'),
            ..
        } => {
            if let Err(e) = app.save() {
                app.set_status_message(format!("Save failed: {:#}", e));
            }
        }
        KeyEvent {
            code: KeyCode::Char('r'),
            ..
        } => {
            if let Err(e) = app.reload_document() {
                app.set_status_message(format!("Reload failed: {:#}", e));
            }
        }

        KeyEvent {
            code: KeyCode::Char('t'),
            ..
        } => app.toggle_outline(),
        KeyEvent {
            code: KeyCode::Char('T'),
            ..
        } => app.toggle_theme(),
        KeyEvent {
            code: KeyCode::Char('?'),
            ..
        } => app.toggle_help(),

        _ => {}
    }

    Ok(Action::Continue)
}

/// Handle a mouse event
pub fn handle_mouse(app: &mut App, mouse: MouseEvent) -> Result<Action> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            app.clear_status_message();
            app.click(mouse.column, mouse.row);
        }
        MouseEventKind::ScrollDown => app.move_cursor_down(1),
        MouseEventKind::ScrollUp => app.move_cursor_up(1),
        _ => {}
    }
    Ok(Action::Continue)
}
