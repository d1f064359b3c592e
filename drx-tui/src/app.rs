//! Application state

use anyhow::Result;
use drx_core::config::ThemeVariant;
use drx_core::heading::is_collapsed;
use drx_core::view::{EventDisposition, ViewEvent};
use drx_core::{Config, Document, Editor, NodeType};
use log::debug;
use ratatui::layout::Rect;

use crate::render::{self, LineKind, RenderKey, RenderedDoc, RendererCache, GUTTER_WIDTH};
use crate::theme::Theme;
#[cfg(feature = "watch")]
use crate::watcher::FileWatcher;

/// Pending key prefix for two-key commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// `g` waiting for `g`
    G,
    /// `z` waiting for `a`, `M` or `R`
    Z,
}

/// Main application state
pub struct App {
    pub config: Config,
    pub doc: Document,
    pub editor: Editor,
    pub theme: Theme,
    pub theme_variant: ThemeVariant,
    /// Index of the selected top-level block
    pub cursor: usize,
    /// First rendered line shown in the document pane
    pub scroll: usize,
    pub show_help: bool,
    pub show_outline: bool,
    pub pending_prefix: Option<KeyPrefix>,
    pub status_message: Option<String>,
    pub should_quit: bool,
    /// Document pane area from the last frame, for mouse hit tests
    pub doc_area: Rect,
    render_cache: RendererCache,
    #[cfg(feature = "watch")]
    pub watcher: Option<FileWatcher>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config, doc: Document) -> Result<Self> {
        let editor = Editor::with_heading_levels(doc.root.clone(), &config.headings.levels)?;

        #[cfg(feature = "watch")]
        let watcher = if config.watch.enabled {
            match FileWatcher::new(&doc.path) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    log::warn!("File watching disabled: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let mut app = Self {
            theme: Theme::for_variant(config.theme),
            theme_variant: config.theme,
            show_outline: config.outline.enabled,
            config,
            doc,
            editor,
            cursor: 0,
            scroll: 0,
            show_help: false,
            pending_prefix: None,
            status_message: None,
            should_quit: false,
            doc_area: Rect::default(),
            render_cache: RendererCache::new(),
            #[cfg(feature = "watch")]
            watcher,
        };
        app.clamp_cursor();
        Ok(app)
    }

    /// Rendered document for the given width, cached per revision
    pub fn rendered(&mut self, width: u16) -> RenderedDoc {
        let key = RenderKey {
            doc_rev: self.editor.rev(),
            width,
            theme: self.theme_variant,
        };
        if let Some(cached) = self.render_cache.get(&key) {
            return cached.clone();
        }
        let rendered = render::render_document(&self.editor, &self.theme, width);
        self.render_cache.put(key, rendered.clone());
        rendered
    }

    pub fn block_count(&self) -> usize {
        self.editor.doc().child_count()
    }

    /// Position of a top-level block
    pub fn block_pos(&self, index: usize) -> Option<usize> {
        self.editor
            .doc()
            .children_with_offsets()
            .nth(index)
            .map(|(pos, _)| pos)
    }

    pub fn is_block_hidden(&self, index: usize) -> bool {
        self.block_pos(index)
            .is_some_and(|pos| self.editor.is_hidden(pos))
    }

    /// Indices of the top-level blocks not hidden by a collapsed heading
    pub fn visible_blocks(&self) -> Vec<usize> {
        let decorations = self.editor.decorations();
        self.editor
            .doc()
            .children_with_offsets()
            .enumerate()
            .filter(|(_, (pos, _))| !decorations.is_hidden(*pos))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn move_cursor_down(&mut self, n: usize) {
        let visible = self.visible_blocks();
        if let Some(at) = visible.iter().position(|&i| i == self.cursor) {
            let target = (at + n).min(visible.len().saturating_sub(1));
            self.cursor = visible[target];
        }
    }

    pub fn move_cursor_up(&mut self, n: usize) {
        let visible = self.visible_blocks();
        if let Some(at) = visible.iter().position(|&i| i == self.cursor) {
            self.cursor = visible[at.saturating_sub(n)];
        }
    }

    pub fn cursor_top(&mut self) {
        if let Some(&first) = self.visible_blocks().first() {
            self.cursor = first;
        }
    }

    pub fn cursor_bottom(&mut self) {
        if let Some(&last) = self.visible_blocks().last() {
            self.cursor = last;
        }
    }

    /// Move the cursor to the next visible heading after it
    pub fn next_heading(&mut self) {
        let doc = self.editor.doc();
        let next = self
            .visible_blocks()
            .into_iter()
            .filter(|&i| i > self.cursor)
            .find(|&i| doc.child(i).is_some_and(|n| n.kind() == NodeType::Heading));
        if let Some(index) = next {
            self.cursor = index;
        }
    }

    /// Move the cursor to the closest visible heading before it
    pub fn prev_heading(&mut self) {
        let doc = self.editor.doc();
        let prev = self
            .visible_blocks()
            .into_iter()
            .rev()
            .filter(|&i| i < self.cursor)
            .find(|&i| doc.child(i).is_some_and(|n| n.kind() == NodeType::Heading));
        if let Some(index) = prev {
            self.cursor = index;
        }
    }

    /// Keep the cursor on an existing block that is not hidden. A hidden
    /// cursor moves back to the heading that hides it.
    pub fn clamp_cursor(&mut self) {
        let count = self.block_count();
        if count == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.min(count - 1);
        while self.cursor > 0 && self.is_block_hidden(self.cursor) {
            self.cursor -= 1;
        }
    }

    /// Toggle the heading under the cursor through its view
    pub fn toggle_current(&mut self) -> bool {
        let Some((kind, id)) = self.editor.doc().child(self.cursor).map(|n| (n.kind(), n.id())) else {
            return false;
        };
        if kind != NodeType::Heading {
            self.set_status_message("Not a heading".to_string());
            return false;
        }

        let rev = self.editor.rev();
        let disposition = self.editor.handle_view_event(id, ViewEvent::ToggleClick);
        let changed = matches!(disposition, EventDisposition::Handled(Some(_))) && self.editor.rev() != rev;
        if changed {
            let collapsed = self
                .editor
                .doc()
                .child(self.cursor)
                .is_some_and(is_collapsed);
            debug!("Toggled block {} collapsed={}", self.cursor, collapsed);
            self.set_status_message(if collapsed { "Collapsed" } else { "Expanded" }.to_string());
        }
        self.clamp_cursor();
        changed
    }

    pub fn collapse_all(&mut self) {
        if self.editor.set_all_collapsed(true) {
            self.set_status_message("Collapsed all sections".to_string());
        }
        self.clamp_cursor();
    }

    pub fn expand_all(&mut self) {
        if self.editor.set_all_collapsed(false) {
            self.set_status_message("Expanded all sections".to_string());
        }
        self.clamp_cursor();
    }

    pub fn undo(&mut self) {
        if self.editor.undo() {
            self.set_status_message("Undo".to_string());
        } else {
            self.set_status_message("Already at oldest change".to_string());
        }
        self.clamp_cursor();
    }

    pub fn redo(&mut self) {
        if self.editor.redo() {
            self.set_status_message("Redo".to_string());
        } else {
            self.set_status_message("Already at newest change".to_string());
        }
        self.clamp_cursor();
    }

    /// Whether the editor content differs from the file's last saved content
    pub fn is_modified(&self) -> bool {
        self.editor.doc() != &self.doc.root
    }

    /// Write the current content back to the file
    pub fn save(&mut self) -> Result<()> {
        self.doc.save(self.editor.doc(), self.editor.state().schema())?;
        self.set_status_message(format!("Saved {}", self.doc.display_name()));
        Ok(())
    }

    /// Reload the file from disk, replacing the editor content. The reload
    /// is undoable.
    pub fn reload_document(&mut self) -> Result<()> {
        self.doc.reload(self.editor.state().schema())?;
        let root = self.doc.root.clone();
        self.editor.replace_doc(&root)?;
        self.clamp_cursor();
        self.set_status_message(format!("Reloaded {}", self.doc.display_name()));
        Ok(())
    }

    /// Record that the file changed on disk without reloading it
    pub fn mark_dirty_on_disk(&mut self) {
        self.doc.check_disk();
        self.doc.dirty_on_disk = true;
    }

    pub fn toggle_theme(&mut self) {
        self.theme_variant = match self.theme_variant {
            ThemeVariant::Dark => ThemeVariant::Light,
            ThemeVariant::Light => ThemeVariant::Dark,
        };
        self.theme = Theme::for_variant(self.theme_variant);
    }

    pub fn toggle_outline(&mut self) {
        self.show_outline = !self.show_outline;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some(message);
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }

    /// Scroll so the whole cursor block fits in a viewport of `height` lines
    pub fn ensure_cursor_visible(&mut self, rendered: &RenderedDoc, height: usize) {
        let Some(first) = rendered.block_first_line.get(self.cursor).copied().flatten() else {
            return;
        };
        let last = rendered
            .line_blocks
            .iter()
            .zip(&rendered.line_kinds)
            .enumerate()
            .filter(|(_, (block, kind))| **block == self.cursor && **kind != LineKind::Separator)
            .map(|(line, _)| line)
            .last()
            .unwrap_or(first);

        if first < self.scroll {
            self.scroll = first;
        } else if height > 0 && last >= self.scroll + height {
            self.scroll = (last + 1 - height).min(first);
        }
    }

    /// Handle a left click at a terminal cell. Clicking a heading's toggle
    /// icon or the hidden-block marker under it toggles the heading; any
    /// other line just moves the cursor.
    pub fn click(&mut self, column: u16, row: u16) -> bool {
        let area = self.doc_area;
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        if !inside {
            return false;
        }

        let rendered = self.rendered(area.width);
        let line = self.scroll + (row - area.y) as usize;
        let (Some(&block), Some(&kind)) = (rendered.line_blocks.get(line), rendered.line_kinds.get(line)) else {
            return false;
        };

        self.cursor = block;
        let on_toggle = kind == LineKind::Heading && column - area.x < GUTTER_WIDTH;
        if on_toggle || kind == LineKind::HiddenMarker {
            self.toggle_current();
        }
        true
    }
}
