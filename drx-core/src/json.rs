//! JSON document format
//!
//! Documents are stored as nested `{ "type", "attrs", "content", "text",
//! "marks" }` objects, the shape rich-text editors commonly persist.

use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Attrs, Mark, Node, NodeType};
use crate::schema::Schema;

#[derive(Debug, Serialize, Deserialize)]
struct JsonNode {
    #[serde(rename = "type")]
    kind: NodeType,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    attrs: Attrs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    content: Vec<JsonNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    marks: Vec<Mark>,
}

impl JsonNode {
    fn from_node(node: &Node) -> Self {
        Self {
            kind: node.kind(),
            attrs: node.attrs().clone(),
            content: node.content().iter().map(JsonNode::from_node).collect(),
            text: node.text_str().map(str::to_string),
            marks: node.marks().to_vec(),
        }
    }

    fn into_node(self, schema: &Schema) -> Result<Node> {
        if self.kind == NodeType::Text {
            let Some(text) = self.text else {
                bail!("Text node without text");
            };
            if text.is_empty() {
                bail!("Empty text node");
            }
            return Ok(Node::marked_text(text, self.marks));
        }
        if !self.marks.is_empty() {
            bail!("Only text nodes may carry marks, found them on '{}'", self.kind);
        }
        if self.text.is_some() {
            bail!("Only text nodes may carry text, found it on '{}'", self.kind);
        }
        if self.kind.is_leaf() && !self.content.is_empty() {
            bail!("Leaf node '{}' cannot have content", self.kind);
        }

        let content = self
            .content
            .into_iter()
            .map(|child| child.into_node(schema))
            .collect::<Result<Vec<_>>>()?;
        let attrs = schema.normalize_attrs(self.kind, &self.attrs);
        Ok(Node::new(self.kind, attrs, content))
    }
}

/// Serialize a document
pub fn to_json(doc: &Node) -> Result<String> {
    serde_json::to_string_pretty(&JsonNode::from_node(doc)).context("Failed to serialize document")
}

/// Serialize a document into a JSON value
pub fn to_json_value(doc: &Node) -> Result<Value> {
    serde_json::to_value(JsonNode::from_node(doc)).context("Failed to serialize document")
}

/// Parse a JSON document, filling in schema defaults
pub fn from_json(json: &str, schema: &Schema) -> Result<Node> {
    let value: Value = serde_json::from_str(json).context("Invalid JSON")?;
    from_json_value(value, schema)
}

pub fn from_json_value(value: Value, schema: &Schema) -> Result<Node> {
    let root: JsonNode = serde_json::from_value(value).context("Malformed document JSON")?;
    if root.kind != NodeType::Doc {
        bail!("Document root must be 'doc', found '{}'", root.kind);
    }
    root.into_node(schema)
}

/// Load stored content leniently.
///
/// Empty input gives a document with one empty paragraph. A JSON document is
/// used as is and fails to load if any part of it cannot be read. Legacy
/// `{"text": "..."}` objects and anything that is not JSON become one
/// paragraph per line. Other JSON values give a single empty paragraph.
pub fn parse_content(content: &str, schema: &Schema) -> Result<Node> {
    if content.is_empty() {
        return Ok(empty_doc());
    }

    let Ok(value) = serde_json::from_str::<Value>(content) else {
        debug!("Content is not JSON, reading it as plain text");
        return Ok(plain_text_doc(content));
    };

    let doc = match value.get("type").and_then(Value::as_str) {
        Some("doc") => from_json_value(value, schema).context("Unreadable document")?,
        _ => match value.get("text") {
            Some(Value::String(text)) => plain_text_doc(text),
            Some(_) => plain_text_doc(content),
            None => empty_doc(),
        },
    };
    Ok(doc)
}

fn empty_doc() -> Node {
    Node::doc(vec![Node::paragraph("")])
}

/// One paragraph per line; empty lines become empty paragraphs
pub fn plain_text_doc(text: &str) -> Node {
    Node::doc(text.split('\n').map(Node::paragraph).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Extension;
    use crate::heading::{is_collapsed, CollapsibleHeading};

    fn schema() -> Schema {
        let mut schema = Schema::basic();
        CollapsibleHeading::default()
            .extend_schema(&mut schema)
            .unwrap();
        schema
    }

    #[test]
    fn test_round_trip_keeps_collapsed() -> Result<()> {
        let schema = schema();
        let doc = Node::doc(vec![
            Node::heading(2, "Intro").with_attr("collapsed", true),
            Node::paragraph("body"),
            Node::heading(2, "Next").with_attr("collapsed", false),
        ]);
        let json = to_json(&doc)?;
        assert!(json.contains("\"collapsed\": true"));

        let parsed = from_json(&json, &schema)?;
        assert_eq!(parsed, doc);
        assert!(is_collapsed(&parsed.content()[0]));
        Ok(())
    }

    #[test]
    fn test_missing_collapsed_defaults_to_false() -> Result<()> {
        let json = r#"{"type":"doc","content":[
            {"type":"heading","attrs":{"level":1},"content":[{"type":"text","text":"A"}]}
        ]}"#;
        let doc = from_json(json, &schema())?;
        assert_eq!(doc.content()[0].attr("collapsed"), Some(&Value::Bool(false)));
        Ok(())
    }

    #[test]
    fn test_marks_are_kept() -> Result<()> {
        let json = r#"{"type":"doc","content":[{"type":"paragraph","content":[
            {"type":"text","text":"bold","marks":[{"type":"bold"}]},
            {"type":"text","text":" and "},
            {"type":"text","text":"link","marks":[{"type":"link","attrs":{"href":"https://example.com"}}]}
        ]}]}"#;
        let schema = schema();
        let doc = from_json(json, &schema)?;
        let para = &doc.content()[0];
        assert_eq!(para.content()[0].marks(), &[Mark::new("bold")]);
        assert!(para.content()[1].marks().is_empty());
        let link = &para.content()[2].marks()[0];
        assert_eq!(link.kind, "link");
        assert_eq!(link.attrs.get("href"), Some(&Value::from("https://example.com")));

        let saved = to_json(&doc)?;
        assert_eq!(saved.matches("\"marks\"").count(), 2);
        assert_eq!(from_json(&saved, &schema)?, doc);
        Ok(())
    }

    #[test]
    fn test_marks_only_on_text() {
        let json = r#"{"type":"doc","content":[{"type":"paragraph","marks":[{"type":"bold"}]}]}"#;
        assert!(from_json(json, &schema()).is_err());
    }

    #[test]
    fn test_rejects_malformed_trees() {
        let schema = schema();
        assert!(from_json(r#"{"type":"paragraph"}"#, &schema).is_err());
        assert!(from_json(r#"{"type":"doc","content":[{"type":"widget"}]}"#, &schema).is_err());
        assert!(from_json(
            r#"{"type":"doc","content":[{"type":"paragraph","content":[{"type":"text"}]}]}"#,
            &schema
        )
        .is_err());
    }

    #[test]
    fn test_parse_content_fallbacks() -> Result<()> {
        let schema = schema();

        let empty = parse_content("", &schema)?;
        assert_eq!(empty, Node::doc(vec![Node::paragraph("")]));

        let legacy = parse_content(r#"{"text":"one\n\ntwo"}"#, &schema)?;
        assert_eq!(
            legacy,
            Node::doc(vec![
                Node::paragraph("one"),
                Node::paragraph(""),
                Node::paragraph("two")
            ])
        );

        let other = parse_content("[1, 2, 3]", &schema)?;
        assert_eq!(other, Node::doc(vec![Node::paragraph("")]));

        let plain = parse_content("hello\nworld", &schema)?;
        assert_eq!(
            plain,
            Node::doc(vec![Node::paragraph("hello"), Node::paragraph("world")])
        );
        Ok(())
    }

    #[test]
    fn test_parse_content_non_string_legacy_text_is_plain_text() -> Result<()> {
        let raw = r#"{"text": 5}"#;
        let doc = parse_content(raw, &schema())?;
        assert_eq!(doc, Node::doc(vec![Node::paragraph(raw)]));
        Ok(())
    }

    #[test]
    fn test_parse_content_doc() -> Result<()> {
        let raw = r#"{"type":"doc","content":[{"type":"heading","attrs":{"level":3,"collapsed":true}}]}"#;
        let doc = parse_content(raw, &schema())?;
        assert!(is_collapsed(&doc.content()[0]));
        Ok(())
    }

    #[test]
    fn test_parse_content_rejects_unreadable_doc() {
        let raw = r#"{"type":"doc","content":[
            {"type":"paragraph","content":[{"type":"text","text":"kept?"}]},
            {"type":"image","attrs":{"src":"a.png"}}
        ]}"#;
        let err = parse_content(raw, &schema()).unwrap_err();
        assert!(format!("{:#}", err).contains("Unreadable document"));
    }
}
