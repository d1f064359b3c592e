//! Markdown import and export
//!
//! Headings carry their markup attributes in a trailing attribute block, e.g.
//! `## Budget {data-collapsed=true}`, so collapsed state survives a round trip.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use serde_json::Value;

use crate::heading::heading_level;
use crate::node::{Attrs, Node, NodeType};
use crate::schema::{MarkupAttrs, Schema};

/// A node under construction
struct Frame {
    /// `None` for inline wrappers (emphasis, links, ...) whose content is
    /// spliced into the parent
    kind: Option<NodeType>,
    attrs: Attrs,
    content: Vec<Node>,
    /// Paragraph opened for bare inline content (tight list items)
    implicit: bool,
    /// Raw text of a code block
    code: String,
}

impl Frame {
    fn block(kind: NodeType, attrs: Attrs) -> Self {
        Self {
            kind: Some(kind),
            attrs,
            content: Vec::new(),
            implicit: false,
            code: String::new(),
        }
    }

    fn inline() -> Self {
        Self {
            kind: None,
            ..Self::block(NodeType::Paragraph, Attrs::new())
        }
    }
}

struct Builder<'a> {
    schema: &'a Schema,
    stack: Vec<Frame>,
}

impl<'a> Builder<'a> {
    fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            stack: vec![Frame::block(NodeType::Doc, Attrs::new())],
        }
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn start(&mut self, tag: Tag<'_>) {
        let block = match tag {
            Tag::Paragraph | Tag::HtmlBlock => Some((NodeType::Paragraph, Attrs::new())),
            Tag::Heading { level, attrs, .. } => {
                let markup: MarkupAttrs = attrs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.map(|v| v.to_string()).unwrap_or_default()))
                    .collect();
                let mut node_attrs = self.schema.parse_markup_attrs(NodeType::Heading, &markup);
                let level = self.schema.clamp_heading_level(level as u8);
                node_attrs.insert("level".to_string(), Value::from(level));
                Some((NodeType::Heading, node_attrs))
            }
            Tag::BlockQuote(_) => Some((NodeType::Blockquote, Attrs::new())),
            Tag::CodeBlock(kind) => {
                let mut attrs = Attrs::new();
                if let CodeBlockKind::Fenced(info) = kind {
                    if let Some(lang) = info.split_whitespace().next() {
                        attrs.insert("language".to_string(), Value::from(lang));
                    }
                }
                Some((NodeType::CodeBlock, attrs))
            }
            Tag::List(Some(start)) => {
                let mut attrs = Attrs::new();
                attrs.insert("start".to_string(), Value::from(start));
                Some((NodeType::OrderedList, attrs))
            }
            Tag::List(None) => Some((NodeType::BulletList, Attrs::new())),
            Tag::Item => Some((NodeType::ListItem, Attrs::new())),
            _ => None,
        };

        match block {
            Some((kind, attrs)) => {
                self.close_implicit();
                self.stack.push(Frame::block(kind, attrs));
            }
            None => {
                self.ensure_textblock();
                self.stack.push(Frame::inline());
            }
        }
    }

    /// Every `End` event closes the frame its `Start` opened
    fn end(&mut self) {
        self.close_implicit();
        self.close();
    }

    fn close_implicit(&mut self) {
        while self.stack.len() > 1 && self.top().implicit {
            self.close();
        }
    }

    fn close(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let kind = frame.kind;
        let node = match kind {
            None => {
                self.top().content.extend(frame.content);
                return;
            }
            Some(kind) => self.finish(kind, frame),
        };
        self.top().content.push(node);
    }

    fn finish(&self, kind: NodeType, frame: Frame) -> Node {
        let content = match kind {
            NodeType::CodeBlock => {
                let code = frame.code.strip_suffix('\n').unwrap_or(&frame.code);
                if code.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::text(code)]
                }
            }
            NodeType::TaskList => frame
                .content
                .into_iter()
                .map(|item| match item.kind() {
                    NodeType::ListItem => {
                        let attrs = self.schema.default_attrs(NodeType::TaskItem);
                        Node::new(NodeType::TaskItem, attrs, item.content().to_vec())
                    }
                    _ => item,
                })
                .collect(),
            NodeType::ListItem | NodeType::TaskItem | NodeType::Blockquote
                if frame.content.is_empty() =>
            {
                vec![Node::paragraph("")]
            }
            k if k.is_textblock() => merge_text(frame.content),
            _ => frame.content,
        };
        Node::new(kind, self.schema.normalize_attrs(kind, &frame.attrs), content)
    }

    /// Open a paragraph if inline content arrives outside a textblock
    fn ensure_textblock(&mut self) {
        let inline_ok = match self.top().kind {
            None => true,
            Some(kind) => kind.is_textblock(),
        };
        if !inline_ok {
            let mut frame = Frame::block(NodeType::Paragraph, Attrs::new());
            frame.implicit = true;
            self.stack.push(frame);
        }
    }

    fn text(&mut self, text: &str) {
        if self.top().kind == Some(NodeType::CodeBlock) {
            self.top().code.push_str(text);
            return;
        }
        if text.is_empty() {
            return;
        }
        self.ensure_textblock();
        self.top().content.push(Node::text(text));
    }

    fn hard_break(&mut self) {
        self.ensure_textblock();
        let node = Node::new(NodeType::HardBreak, Attrs::new(), Vec::new());
        self.top().content.push(node);
    }

    fn rule(&mut self) {
        self.close_implicit();
        let node = Node::new(NodeType::HorizontalRule, Attrs::new(), Vec::new());
        self.top().content.push(node);
    }

    /// Turn the innermost list item into a task item, and its list into a task list
    fn task_marker(&mut self, checked: bool) {
        let Some(index) = self
            .stack
            .iter()
            .rposition(|f| f.kind == Some(NodeType::ListItem))
        else {
            return;
        };
        let item = &mut self.stack[index];
        item.kind = Some(NodeType::TaskItem);
        item.attrs.insert("checked".to_string(), Value::Bool(checked));
        if index > 0 {
            let list = &mut self.stack[index - 1];
            if matches!(list.kind, Some(NodeType::BulletList | NodeType::OrderedList)) {
                list.kind = Some(NodeType::TaskList);
                list.attrs = Attrs::new();
            }
        }
    }

    fn finish_doc(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close();
        }
        let root = self.top();
        let mut content = std::mem::take(&mut root.content);
        if content.is_empty() {
            content.push(Node::paragraph(""));
        }
        Node::doc(content)
    }
}

/// Merge adjacent text nodes
fn merge_text(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let (Some(prev), Some(text)) = (merged.last(), node.text_str()) {
            if let Some(prev_text) = prev.text_str() {
                let joined = format!("{}{}", prev_text, text);
                merged.pop();
                merged.push(Node::text(joined));
                continue;
            }
        }
        merged.push(node);
    }
    merged
}

/// Parse Markdown into a document
pub fn from_markdown(source: &str, schema: &Schema) -> Node {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut builder = Builder::new(schema);
    for event in Parser::new_ext(source, options) {
        match event {
            Event::Start(tag) => builder.start(tag),
            Event::End(_) => builder.end(),
            Event::Text(text)
            | Event::Code(text)
            | Event::InlineMath(text)
            | Event::DisplayMath(text)
            | Event::InlineHtml(text)
            | Event::FootnoteReference(text) => builder.text(&text),
            Event::Html(html) => builder.text(html.trim_end_matches('\n')),
            Event::SoftBreak => builder.text(" "),
            Event::HardBreak => builder.hard_break(),
            Event::Rule => builder.rule(),
            Event::TaskListMarker(checked) => builder.task_marker(checked),
        }
    }
    builder.finish_doc()
}

/// Render a document as Markdown
pub fn to_markdown(doc: &Node, schema: &Schema) -> String {
    let mut out = render_blocks(doc.content(), schema).join("\n");
    out.push('\n');
    out
}

/// Render sibling blocks, separated by blank lines
fn render_blocks(nodes: &[Node], schema: &Schema) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.extend(render_block(node, schema));
    }
    lines
}

fn render_block(node: &Node, schema: &Schema) -> Vec<String> {
    match node.kind() {
        NodeType::Heading => {
            let level = schema.clamp_heading_level(heading_level(node).unwrap_or(1)) as usize;
            let text = render_inline(node).replace("\\\n", " ");
            let mut line = format!("{} {}", "#".repeat(level), text);
            let attrs = schema.render_markup_attrs(NodeType::Heading, node.attrs());
            if !attrs.is_empty() {
                let rendered: Vec<String> =
                    attrs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                line.push_str(&format!(" {{{}}}", rendered.join(" ")));
            }
            vec![line]
        }
        NodeType::Paragraph => render_inline(node).split('\n').map(str::to_string).collect(),
        NodeType::CodeBlock => {
            let code = node.text_content();
            let longest = longest_backtick_run(&code);
            let fence = "`".repeat(longest.max(2) + 1);
            let lang = node.attr("language").and_then(Value::as_str).unwrap_or("");
            let mut lines = vec![format!("{}{}", fence, lang)];
            if !code.is_empty() {
                lines.extend(code.split('\n').map(str::to_string));
            }
            lines.push(fence);
            lines
        }
        NodeType::HorizontalRule => vec!["---".to_string()],
        NodeType::HardBreak | NodeType::Text => vec![render_inline(node)],
        NodeType::Blockquote => render_blocks(node.content(), schema)
            .into_iter()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {}", line)
                }
            })
            .collect(),
        NodeType::BulletList => render_list(node, schema, |_, _| "- ".to_string()),
        NodeType::OrderedList => {
            let start = node.attr("start").and_then(Value::as_u64).unwrap_or(1);
            render_list(node, schema, |i, _| format!("{}. ", start + i as u64))
        }
        NodeType::TaskList => render_list(node, schema, |_, item| {
            let checked = item.attr("checked").and_then(Value::as_bool).unwrap_or(false);
            let marker = if checked { "- [x] " } else { "- [ ] " };
            marker.to_string()
        }),
        NodeType::ListItem | NodeType::TaskItem | NodeType::Doc => {
            render_blocks(node.content(), schema)
        }
    }
}

fn render_list<F>(list: &Node, schema: &Schema, marker: F) -> Vec<String>
where
    F: Fn(usize, &Node) -> String,
{
    let mut lines = Vec::new();
    for (i, item) in list.content().iter().enumerate() {
        let marker = marker(i, item);
        // Continuation lines align with the list item content
        let indent = if item.kind() == NodeType::TaskItem { 2 } else { marker.len() };
        let body = render_blocks(item.content(), schema);
        if body.is_empty() {
            lines.push(marker.trim_end().to_string());
            continue;
        }
        for (j, line) in body.into_iter().enumerate() {
            if j == 0 {
                lines.push(format!("{}{}", marker, line));
            } else if line.is_empty() {
                lines.push(String::new());
            } else {
                lines.push(format!("{}{}", " ".repeat(indent), line));
            }
        }
    }
    lines
}

/// Inline content as Markdown text; hard breaks become backslash line ends
fn render_inline(node: &Node) -> String {
    let mut out = String::new();
    let mut line = String::new();
    for child in node.content() {
        match child.text_str() {
            Some(text) => line.push_str(&escape(text, line.is_empty())),
            None if child.kind() == NodeType::HardBreak => {
                out.push_str(&protect_edge_spaces(&line));
                out.push_str("\\\n");
                line.clear();
            }
            None => line.push_str(&escape(&child.text_content(), line.is_empty())),
        }
    }
    out.push_str(&protect_edge_spaces(&line));
    out
}

/// Write leading and trailing blanks of a line as character references,
/// which Markdown keeps instead of trimming
fn protect_edge_spaces(line: &str) -> String {
    let is_blank = |c: char| c == ' ' || c == '\t';
    let lead = line.len() - line.trim_start_matches(is_blank).len();
    let (head, rest) = line.split_at(lead);
    let body = rest.trim_end_matches(is_blank);
    let tail = &rest[body.len()..];
    if head.is_empty() && tail.is_empty() {
        return line.to_string();
    }
    let reference = |blanks: &str| -> String {
        blanks.chars().map(|c| format!("&#{};", c as u32)).collect()
    };
    format!("{}{}{}", reference(head), body, reference(tail))
}

fn escape(text: &str, line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '*' | '_' | '`' | '[' | ']' | '<' | '>' | '#' | '{' | '}' | '&'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    if line_start {
        escape_block_start(&mut out);
    }
    out
}

/// Escape characters that would start a list or setext underline
fn escape_block_start(text: &mut String) {
    if text.starts_with(['-', '+', '=']) {
        text.insert(0, '\\');
        return;
    }
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 && text[digits..].starts_with(['.', ')']) {
        text.insert(digits, '\\');
    }
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
