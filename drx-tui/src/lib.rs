//! DRX TUI - Terminal user interface components
//!
//! This crate contains all ratatui/crossterm integration:
//! - App state management
//! - Event loop, key and mouse handling
//! - Rendering (document with collapsible headings, outline, status bar)
//! - Theme system

pub mod app;
pub mod input;
pub mod render;
pub mod terminal;
pub mod theme;
pub mod ui;
#[cfg(feature = "watch")]
pub mod watcher;

use anyhow::{Context, Result};
use crossterm::event::{Event, KeyEventKind};
use std::time::Duration;

// Re-export main types
pub use app::App;

/// Run the TUI application
pub fn run(mut app: App) -> Result<()> {
    terminal::install_panic_hook();
    let mut terminal = terminal::init().context("Failed to initialize terminal")?;

    let result = run_loop(&mut terminal, &mut app);

    // Always restore terminal, even if run_loop fails
    terminal::restore().context("Failed to restore terminal")?;

    result
}

fn run_loop(terminal: &mut terminal::Tui, app: &mut App) -> Result<()> {
    loop {
        // -1 for status bar, -2 for the document border
        let viewport_height = terminal.size()?.height.saturating_sub(3) as usize;

        terminal
            .draw(|frame| ui::draw(frame, app))
            .context("Failed to draw frame")?;

        if app.should_quit {
            break;
        }

        if crossterm::event::poll(Duration::from_millis(100)).context("Failed to poll events")? {
            match crossterm::event::read().context("Failed to read event")? {
                // Only handle key press events, ignore release
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    input::handle_input(app, key, viewport_height)?;
                }
                Event::Mouse(mouse) => {
                    input::handle_mouse(app, mouse)?;
                }
                _ => {}
            }
        }

        #[cfg(feature = "watch")]
        check_watcher(app);
    }

    Ok(())
}

#[cfg(feature = "watch")]
fn check_watcher(app: &mut App) {
    use watcher::FileEvent;

    let Some(event) = app.watcher.as_mut().and_then(|w| w.poll(250)) else {
        return;
    };

    match event {
        FileEvent::Changed if app.config.watch.auto_reload && !app.is_modified() => {
            if let Err(e) = app.reload_document() {
                log::warn!("Failed to reload document: {:#}", e);
                app.set_status_message(format!("Reload failed: {:#}", e));
            }
        }
        FileEvent::Changed => app.mark_dirty_on_disk(),
        FileEvent::Removed => {
            app.mark_dirty_on_disk();
            app.set_status_message("File was removed on disk".to_string());
        }
    }
}
