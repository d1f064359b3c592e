//! Rendering cache and document composition

use drx_core::config::ThemeVariant;
use drx_core::heading::heading_level;
use drx_core::view::{ToggleIcon, ViewModel};
use drx_core::{Editor, Node, NodeType};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use serde_json::Value;
use std::num::NonZeroUsize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Columns reserved in front of every line for the toggle icon
pub const GUTTER_WIDTH: u16 = 2;

/// Key for render cache
#[derive(Hash, PartialEq, Eq, Clone, Debug)]
pub struct RenderKey {
    pub doc_rev: u64,
    pub width: u16,
    pub theme: ThemeVariant,
}

/// What a rendered line shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// First line of a heading; the gutter holds its toggle icon
    Heading,
    /// Marker standing in for the blocks hidden under a collapsed heading
    HiddenMarker,
    Content,
    Separator,
}

/// Rendered document output
#[derive(Clone, Debug)]
pub struct RenderedDoc {
    pub lines: Vec<Line<'static>>,
    /// Top-level block index each line belongs to
    pub line_blocks: Vec<usize>,
    pub line_kinds: Vec<LineKind>,
    /// First rendered line of each top-level block, `None` when hidden
    pub block_first_line: Vec<Option<usize>>,
}

impl RenderedDoc {
    fn new(block_count: usize) -> Self {
        Self {
            lines: Vec::new(),
            line_blocks: Vec::new(),
            line_kinds: Vec::new(),
            block_first_line: vec![None; block_count],
        }
    }

    fn push(&mut self, block: usize, kind: LineKind, line: Line<'static>) {
        if self.block_first_line[block].is_none() {
            self.block_first_line[block] = Some(self.lines.len());
        }
        self.lines.push(line);
        self.line_blocks.push(block);
        self.line_kinds.push(kind);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// LRU cache for rendered documents
pub struct RendererCache {
    cache: lru::LruCache<RenderKey, RenderedDoc>,
}

impl RendererCache {
    pub fn new() -> Self {
        Self {
            cache: lru::LruCache::new(NonZeroUsize::MIN.saturating_add(31)),
        }
    }

    pub fn get(&mut self, key: &RenderKey) -> Option<&RenderedDoc> {
        self.cache.get(key)
    }

    pub fn put(&mut self, key: RenderKey, doc: RenderedDoc) {
        self.cache.put(key, doc);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for RendererCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the top-level blocks of the editor's document. Blocks covered by a
/// collapsed-content decoration are left out; a marker line under their
/// heading says how many there are.
pub fn render_document(editor: &Editor, theme: &crate::theme::Theme, width: u16) -> RenderedDoc {
    let doc = editor.doc();
    let decorations = editor.decorations();
    let text_width = width.saturating_sub(GUTTER_WIDTH).max(1) as usize;
    let blocks: Vec<(usize, &Node)> = doc.children_with_offsets().collect();
    let mut out = RenderedDoc::new(blocks.len());

    for (index, (pos, node)) in blocks.iter().enumerate() {
        if decorations.is_hidden(*pos) {
            continue;
        }

        if node.kind() == NodeType::Heading {
            let model = editor.view(node.id()).map(|view| view.render());
            out.push(index, LineKind::Heading, heading_line(node, model.as_ref(), theme, text_width));

            let collapsed = model
                .as_ref()
                .and_then(|m| m.toggle)
                .is_some_and(|t| t.icon == ToggleIcon::Collapsed);
            if collapsed {
                let hidden = blocks[index + 1..]
                    .iter()
                    .take_while(|(p, _)| decorations.is_hidden(*p))
                    .count();
                if hidden > 0 {
                    let noun = if hidden == 1 { "block" } else { "blocks" };
                    let marker = format!("{}… {} hidden {}", gutter(), hidden, noun);
                    out.push(
                        index,
                        LineKind::HiddenMarker,
                        Line::from(Span::styled(marker, theme.hidden_marker)),
                    );
                }
            }
        } else {
            for line in block_lines(node, theme, text_width) {
                let mut spans = vec![Span::raw(gutter())];
                spans.extend(line.spans);
                out.push(index, LineKind::Content, Line::from(spans));
            }
        }

        if index + 1 < blocks.len() {
            out.push(index, LineKind::Separator, Line::raw(""));
        }
    }

    out
}

fn gutter() -> String {
    " ".repeat(GUTTER_WIDTH as usize)
}

fn heading_line(
    node: &Node,
    model: Option<&ViewModel>,
    theme: &crate::theme::Theme,
    width: usize,
) -> Line<'static> {
    let level = model
        .and_then(|m| m.data_attr("data-level"))
        .and_then(|l| l.parse::<u8>().ok())
        .or_else(|| heading_level(node));
    let text = model
        .map(|m| m.content.clone())
        .unwrap_or_else(|| node.text_content());

    let icon = match model.and_then(|m| m.toggle) {
        Some(toggle) => format!("{} ", toggle.icon.glyph()),
        None => gutter(),
    };
    Line::from(vec![
        Span::styled(icon, theme.toggle),
        Span::styled(truncate(&text, width), theme.heading_style(level)),
    ])
}

/// Lines of a non-heading block, without the gutter
fn block_lines(node: &Node, theme: &crate::theme::Theme, width: usize) -> Vec<Line<'static>> {
    match node.kind() {
        NodeType::Paragraph => wrap_text(&inline_text(node), width)
            .into_iter()
            .map(|l| Line::from(Span::styled(l, theme.base)))
            .collect(),
        // Headings nested in containers render as plain styled text
        NodeType::Heading => vec![Line::from(Span::styled(
            truncate(&node.text_content(), width),
            theme.heading_style(heading_level(node)),
        ))],
        NodeType::CodeBlock => {
            let code = node.text_content();
            code.split('\n')
                .map(|l| Line::from(Span::styled(truncate(l, width), theme.code)))
                .collect()
        }
        NodeType::HorizontalRule => vec![Line::from(Span::styled("─".repeat(width), theme.rule))],
        NodeType::Blockquote => prefixed_children(node, theme, width, |_| "│ ".to_string(), theme.quote),
        NodeType::BulletList => prefixed_items(node, theme, width, |_, _| "• ".to_string()),
        NodeType::OrderedList => {
            let start = node.attr("start").and_then(Value::as_u64).unwrap_or(1);
            prefixed_items(node, theme, width, move |i, _| format!("{}. ", start + i as u64))
        }
        NodeType::TaskList => prefixed_items(node, theme, width, |_, item| {
            let checked = item.attr("checked").and_then(Value::as_bool).unwrap_or(false);
            let marker = if checked { "☑ " } else { "☐ " };
            marker.to_string()
        }),
        NodeType::ListItem | NodeType::TaskItem | NodeType::Doc => node
            .content()
            .iter()
            .flat_map(|child| block_lines(child, theme, width))
            .collect(),
        NodeType::Text | NodeType::HardBreak => {
            vec![Line::from(Span::styled(node.text_content(), theme.base))]
        }
    }
}

fn prefixed_children<F>(
    node: &Node,
    theme: &crate::theme::Theme,
    width: usize,
    prefix: F,
    style: Style,
) -> Vec<Line<'static>>
where
    F: Fn(usize) -> String,
{
    let mut lines = Vec::new();
    for (i, child) in node.content().iter().enumerate() {
        let marker = prefix(i);
        let inner = width.saturating_sub(marker.width()).max(1);
        for line in block_lines(child, theme, inner) {
            let mut spans = vec![Span::styled(marker.clone(), style)];
            spans.extend(line.spans.into_iter().map(|s| {
                let patched = s.style.patch(style);
                Span::styled(s.content.into_owned(), patched)
            }));
            lines.push(Line::from(spans));
        }
    }
    lines
}

fn prefixed_items<F>(node: &Node, theme: &crate::theme::Theme, width: usize, marker: F) -> Vec<Line<'static>>
where
    F: Fn(usize, &Node) -> String,
{
    let mut lines = Vec::new();
    for (i, item) in node.content().iter().enumerate() {
        let marker = marker(i, item);
        let indent = " ".repeat(marker.width());
        let inner = width.saturating_sub(marker.width()).max(1);
        for (j, line) in block_lines(item, theme, inner).into_iter().enumerate() {
            let lead = if j == 0 {
                Span::styled(marker.clone(), theme.list_marker)
            } else {
                Span::raw(indent.clone())
            };
            let mut spans = vec![lead];
            spans.extend(line.spans);
            lines.push(Line::from(spans));
        }
    }
    lines
}

/// Inline content with hard breaks as newlines
fn inline_text(node: &Node) -> String {
    node.content()
        .iter()
        .map(|child| match child.kind() {
            NodeType::HardBreak => "\n".to_string(),
            _ => child.text_content(),
        })
        .collect()
}

/// Greedy word wrap by display width; words wider than a line are split
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            let needed = if current.is_empty() { word_width } else { word_width + 1 };

            if current_width + needed <= width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += needed;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }

            if word_width <= width {
                current.push_str(word);
                current_width = word_width;
                continue;
            }

            // Split an overlong word
            for c in word.chars() {
                let w = c.width().unwrap_or(0);
                if current_width + w > width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(c);
                current_width += w;
            }
        }

        lines.push(current);
    }

    lines
}

/// Truncate to a display width, marking the cut with an ellipsis
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Theme;

    fn editor(doc: Node) -> Editor {
        Editor::with_heading_levels(doc, &[1, 2, 3, 4]).unwrap()
    }

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("", 10), vec![""]);
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("longer text", 6), "longe…");
    }

    #[test]
    fn test_collapsed_sections_are_replaced_by_marker() {
        let doc = Node::doc(vec![
            Node::heading(1, "Title").with_attr("collapsed", true),
            Node::paragraph("hidden one"),
            Node::paragraph("hidden two"),
            Node::heading(1, "Next"),
        ]);
        let rendered = render_document(&editor(doc), &Theme::dark(), 40);
        let text: Vec<String> = rendered.lines.iter().map(plain).collect();
        assert_eq!(text, vec!["▸ Title", "  … 2 hidden blocks", "", "▾ Next"]);
        assert_eq!(rendered.block_first_line, vec![Some(0), None, None, Some(3)]);
        assert_eq!(rendered.line_kinds[1], LineKind::HiddenMarker);
        assert_eq!(rendered.line_blocks, vec![0, 0, 0, 3]);
    }

    #[test]
    fn test_expanded_document_renders_all_blocks() {
        let item = Node::new(NodeType::ListItem, Default::default(), vec![Node::paragraph("item")]);
        let list = Node::new(NodeType::BulletList, Default::default(), vec![item]);
        let doc = Node::doc(vec![Node::heading(2, "Head"), Node::paragraph("body"), list]);
        let rendered = render_document(&editor(doc), &Theme::dark(), 40);
        let text: Vec<String> = rendered.lines.iter().map(plain).collect();
        assert_eq!(text, vec!["▾ Head", "", "  body", "", "  • item"]);
    }

    #[test]
    fn test_cache_round_trip() {
        let mut cache = RendererCache::new();
        let key = RenderKey {
            doc_rev: 1,
            width: 80,
            theme: ThemeVariant::Dark,
        };
        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), RenderedDoc::new(0));
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.len(), 1);
    }
}
