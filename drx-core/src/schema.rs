//! Node type registry: attribute defaults and markup serialization rules

use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::node::{Attrs, NodeType};

/// Attributes of a serialized markup element (e.g. `data-collapsed="true"`)
pub type MarkupAttrs = BTreeMap<String, String>;

/// Declaration of a single node attribute
#[derive(Clone, Debug)]
pub struct AttrSpec {
    pub name: &'static str,
    pub default: Value,
    /// Read the attribute back from serialized markup
    pub parse_markup: Option<fn(&MarkupAttrs) -> Value>,
    /// Markup attributes emitted for this attribute
    pub render_markup: Option<fn(&Attrs) -> Vec<(String, String)>>,
}

impl AttrSpec {
    /// Attribute with a default value and no markup representation
    pub fn new(name: &'static str, default: impl Into<Value>) -> Self {
        Self {
            name,
            default: default.into(),
            parse_markup: None,
            render_markup: None,
        }
    }
}

/// Declaration of a node type
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub kind: NodeType,
    pub attrs: Vec<AttrSpec>,
}

impl NodeSpec {
    pub fn new(kind: NodeType, attrs: Vec<AttrSpec>) -> Self {
        Self { kind, attrs }
    }
}

/// Registry of node specs
#[derive(Clone, Debug)]
pub struct Schema {
    specs: HashMap<NodeType, NodeSpec>,
    heading_levels: Vec<u8>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::basic()
    }
}

impl Schema {
    /// Schema with every built-in node type and its plain attributes
    pub fn basic() -> Self {
        let mut specs = HashMap::new();
        for kind in NodeType::ALL {
            let attrs = match kind {
                NodeType::Heading => vec![AttrSpec::new("level", 1)],
                NodeType::OrderedList => vec![AttrSpec::new("start", 1)],
                NodeType::TaskItem => vec![AttrSpec::new("checked", false)],
                NodeType::CodeBlock => vec![AttrSpec::new("language", Value::Null)],
                _ => Vec::new(),
            };
            specs.insert(kind, NodeSpec::new(kind, attrs));
        }

        Self {
            specs,
            heading_levels: vec![1, 2, 3, 4, 5, 6],
        }
    }

    /// Register a spec for a node type that has none yet
    pub fn register(&mut self, spec: NodeSpec) -> Result<()> {
        if self.specs.contains_key(&spec.kind) {
            bail!("Node type '{}' is already registered", spec.kind);
        }
        self.specs.insert(spec.kind, spec);
        Ok(())
    }

    /// Add attributes to an existing node type, keeping the attributes it
    /// already declares. Redeclaring an attribute is an error.
    pub fn extend(&mut self, kind: NodeType, attrs: Vec<AttrSpec>) -> Result<()> {
        let Some(spec) = self.specs.get_mut(&kind) else {
            bail!("Cannot extend unregistered node type '{}'", kind);
        };
        for attr in attrs {
            if spec.attrs.iter().any(|a| a.name == attr.name) {
                bail!("Attribute '{}' is already declared on '{}'", attr.name, kind);
            }
            spec.attrs.push(attr);
        }
        Ok(())
    }

    /// Restrict the heading levels this schema accepts
    pub fn set_heading_levels(&mut self, levels: &[u8]) -> Result<()> {
        if levels.is_empty() {
            bail!("At least one heading level must be enabled");
        }
        if let Some(bad) = levels.iter().find(|l| !(1..=6).contains(*l)) {
            bail!("Heading level {} is out of range (1-6)", bad);
        }
        let mut levels = levels.to_vec();
        levels.sort_unstable();
        levels.dedup();
        self.heading_levels = levels;
        Ok(())
    }

    pub fn heading_levels(&self) -> &[u8] {
        &self.heading_levels
    }

    /// Clamp a heading level to the closest enabled level
    pub fn clamp_heading_level(&self, level: u8) -> u8 {
        self.heading_levels
            .iter()
            .copied()
            .min_by_key(|l| l.abs_diff(level))
            .unwrap_or(1)
    }

    pub fn spec(&self, kind: NodeType) -> Option<&NodeSpec> {
        self.specs.get(&kind)
    }

    /// Default attributes for a node type
    pub fn default_attrs(&self, kind: NodeType) -> Attrs {
        let mut attrs = Attrs::new();
        if let Some(spec) = self.spec(kind) {
            for attr in &spec.attrs {
                attrs.insert(attr.name.to_string(), attr.default.clone());
            }
        }
        attrs
    }

    /// Fill in declared attributes that are missing, keeping everything present
    pub fn normalize_attrs(&self, kind: NodeType, attrs: &Attrs) -> Attrs {
        let mut normalized = self.default_attrs(kind);
        for (name, value) in attrs {
            normalized.insert(name.clone(), value.clone());
        }
        normalized
    }

    /// Build node attributes from a serialized markup element
    pub fn parse_markup_attrs(&self, kind: NodeType, markup: &MarkupAttrs) -> Attrs {
        let mut attrs = self.default_attrs(kind);
        if let Some(spec) = self.spec(kind) {
            for attr in &spec.attrs {
                if let Some(parse) = attr.parse_markup {
                    attrs.insert(attr.name.to_string(), parse(markup));
                }
            }
        }
        attrs
    }

    /// Markup attributes for a node, in declaration order
    pub fn render_markup_attrs(&self, kind: NodeType, attrs: &Attrs) -> Vec<(String, String)> {
        let Some(spec) = self.spec(kind) else {
            return Vec::new();
        };
        spec.attrs
            .iter()
            .filter_map(|attr| attr.render_markup)
            .flat_map(|render| render(attrs))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag_parse(markup: &MarkupAttrs) -> Value {
        Value::Bool(markup.get("data-flag").is_some_and(|v| v == "yes"))
    }

    fn flag_render(attrs: &Attrs) -> Vec<(String, String)> {
        let on = attrs.get("flag").and_then(Value::as_bool).unwrap_or(false);
        vec![("data-flag".to_string(), if on { "yes" } else { "no" }.to_string())]
    }

    fn flag_spec() -> AttrSpec {
        AttrSpec {
            name: "flag",
            default: Value::Bool(false),
            parse_markup: Some(flag_parse),
            render_markup: Some(flag_render),
        }
    }

    #[test]
    fn test_basic_defaults() {
        let schema = Schema::basic();
        let attrs = schema.default_attrs(NodeType::Heading);
        assert_eq!(attrs.get("level"), Some(&Value::from(1)));
        assert!(schema.default_attrs(NodeType::Paragraph).is_empty());
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut schema = Schema::basic();
        let result = schema.register(NodeSpec::new(NodeType::Heading, vec![]));
        assert!(result.is_err());
    }

    #[test]
    fn test_extend_keeps_parent_attrs() -> Result<()> {
        let mut schema = Schema::basic();
        schema.extend(NodeType::Heading, vec![flag_spec()])?;

        let attrs = schema.default_attrs(NodeType::Heading);
        assert_eq!(attrs.get("level"), Some(&Value::from(1)));
        assert_eq!(attrs.get("flag"), Some(&Value::Bool(false)));
        Ok(())
    }

    #[test]
    fn test_extend_twice_fails() -> Result<()> {
        let mut schema = Schema::basic();
        schema.extend(NodeType::Heading, vec![flag_spec()])?;
        assert!(schema.extend(NodeType::Heading, vec![flag_spec()]).is_err());
        Ok(())
    }

    #[test]
    fn test_markup_round_trip() -> Result<()> {
        let mut schema = Schema::basic();
        schema.extend(NodeType::Heading, vec![flag_spec()])?;

        let mut markup = MarkupAttrs::new();
        markup.insert("data-flag".to_string(), "yes".to_string());
        let attrs = schema.parse_markup_attrs(NodeType::Heading, &markup);
        assert_eq!(attrs.get("flag"), Some(&Value::Bool(true)));

        let rendered = schema.render_markup_attrs(NodeType::Heading, &attrs);
        assert_eq!(rendered, vec![("data-flag".to_string(), "yes".to_string())]);
        Ok(())
    }

    #[test]
    fn test_normalize_keeps_unknown_attrs() {
        let schema = Schema::basic();
        let mut attrs = Attrs::new();
        attrs.insert("textAlign".to_string(), Value::from("center"));
        let normalized = schema.normalize_attrs(NodeType::Heading, &attrs);
        assert_eq!(normalized.get("level"), Some(&Value::from(1)));
        assert_eq!(normalized.get("textAlign"), Some(&Value::from("center")));
    }

    #[test]
    fn test_heading_levels() -> Result<()> {
        let mut schema = Schema::basic();
        schema.set_heading_levels(&[4, 1, 2, 3, 2])?;
        assert_eq!(schema.heading_levels(), &[1, 2, 3, 4]);
        assert_eq!(schema.clamp_heading_level(6), 4);
        assert_eq!(schema.clamp_heading_level(2), 2);
        assert!(schema.set_heading_levels(&[]).is_err());
        assert!(schema.set_heading_levels(&[7]).is_err());
        Ok(())
    }
}
