//! HTML export

use serde_json::Value;

use crate::heading::heading_level;
use crate::node::{Node, NodeType};
use crate::schema::Schema;

/// Render a document as an HTML fragment
pub fn to_html(doc: &Node, schema: &Schema) -> String {
    let mut out = String::new();
    for node in doc.content() {
        write_node(&mut out, node, schema);
    }
    out
}

fn write_node(out: &mut String, node: &Node, schema: &Schema) {
    if let Some(text) = node.text_str() {
        out.push_str(&escape(text));
        return;
    }

    let (tag, extra) = match node.kind() {
        NodeType::Doc => {
            write_children(out, node, schema);
            return;
        }
        NodeType::HardBreak => {
            out.push_str("<br>");
            return;
        }
        NodeType::HorizontalRule => {
            out.push_str("<hr>");
            return;
        }
        NodeType::CodeBlock => {
            out.push_str("<pre><code");
            if let Some(lang) = node.attr("language").and_then(Value::as_str) {
                out.push_str(&format!(" class=\"language-{}\"", escape(lang)));
            }
            out.push('>');
            out.push_str(&escape(&node.text_content()));
            out.push_str("</code></pre>");
            return;
        }
        NodeType::Heading => (format!("h{}", heading_level(node).unwrap_or(1)), Vec::new()),
        NodeType::Paragraph => ("p".to_string(), Vec::new()),
        NodeType::Blockquote => ("blockquote".to_string(), Vec::new()),
        NodeType::BulletList => ("ul".to_string(), Vec::new()),
        NodeType::OrderedList => {
            let start = node.attr("start").and_then(Value::as_u64).unwrap_or(1);
            let extra = if start == 1 {
                Vec::new()
            } else {
                vec![("start".to_string(), start.to_string())]
            };
            ("ol".to_string(), extra)
        }
        NodeType::ListItem => ("li".to_string(), Vec::new()),
        NodeType::TaskList => (
            "ul".to_string(),
            vec![("data-type".to_string(), "taskList".to_string())],
        ),
        NodeType::TaskItem => {
            let checked = node.attr("checked").and_then(Value::as_bool).unwrap_or(false);
            (
                "li".to_string(),
                vec![
                    ("data-type".to_string(), "taskItem".to_string()),
                    ("data-checked".to_string(), checked.to_string()),
                ],
            )
        }
        NodeType::Text => return,
    };

    out.push('<');
    out.push_str(&tag);
    let markup = schema.render_markup_attrs(node.kind(), node.attrs());
    for (name, value) in extra.iter().chain(markup.iter()) {
        out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
    }
    out.push('>');
    write_children(out, node, schema);
    out.push_str(&format!("</{}>", tag));
}

fn write_children(out: &mut String, node: &Node, schema: &Schema) {
    for child in node.content() {
        write_node(out, child, schema);
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
