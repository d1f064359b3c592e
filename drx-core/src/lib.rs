//! DRX Core - Document model, collapsible sections, and configuration
//!
//! This crate contains the editor logic for drx, independent of terminal UI concerns:
//! - Document tree, schema, transactions and position mapping
//! - Editor state with plugins, decorations and node views
//! - Collapsible headings and the hidden-range decoration engine
//! - JSON and Markdown formats, HTML export, outline
//! - Configuration management

pub mod collapse;
pub mod config;
pub mod decoration;
pub mod document;
pub mod editor;
pub mod heading;
pub mod html;
pub mod json;
pub mod markdown;
pub mod node;
pub mod outline;
pub mod schema;
pub mod state;
pub mod transform;
pub mod view;

// Re-export commonly used types
pub use collapse::{build_decorations, compute_hidden_ranges, HiddenRange};
pub use config::Config;
pub use decoration::{Decoration, DecorationSet};
pub use document::{Document, Format};
pub use editor::{Editor, Extension};
pub use heading::CollapsibleHeading;
pub use node::{Attrs, Mark, Node, NodeId, NodeType};
pub use schema::Schema;
pub use state::{EditorState, Plugin, PluginKey};
pub use transform::{StepError, Transaction};
