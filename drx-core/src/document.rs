//! File-backed documents

use anyhow::{Context, Result};
use log::debug;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::json;
use crate::markdown;
use crate::node::Node;
use crate::schema::Schema;

/// On-disk representation of a document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// JSON document tree, loaded leniently (plain text is accepted)
    Json,
    Markdown,
}

impl Format {
    /// Guess the format from a file extension; anything that is not Markdown is
    /// treated as stored JSON content
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("md" | "markdown" | "mdown") => Format::Markdown,
            _ => Format::Json,
        }
    }

    pub fn parse(self, content: &str, schema: &Schema) -> Result<Node> {
        match self {
            Format::Json => json::parse_content(content, schema),
            Format::Markdown => Ok(markdown::from_markdown(content, schema)),
        }
    }

    pub fn serialize(self, doc: &Node, schema: &Schema) -> Result<String> {
        match self {
            Format::Json => json::to_json(doc),
            Format::Markdown => Ok(markdown::to_markdown(doc, schema)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Markdown => f.write_str("markdown"),
        }
    }
}

/// A document loaded from disk
#[derive(Clone, Debug)]
pub struct Document {
    pub path: PathBuf,
    pub format: Format,
    /// Content as last loaded or saved
    pub root: Node,
    pub loaded_mtime: Option<SystemTime>,
    pub disk_mtime: Option<SystemTime>,
    pub dirty_on_disk: bool,
    pub rev: u64,
}

impl Document {
    /// Load a document from a file path. The format is guessed from the
    /// extension unless given.
    pub fn load(path: &Path, format: Option<Format>, schema: &Schema) -> Result<Self> {
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize path: {}", path.display()))?;

        let content = fs::read_to_string(&abs_path)
            .with_context(|| format!("Failed to read file: {}", abs_path.display()))?;

        let format = format.unwrap_or_else(|| Format::from_path(&abs_path));
        debug!("Loading {} as {}", abs_path.display(), format);
        let root = format
            .parse(&content, schema)
            .with_context(|| format!("Failed to load {}", abs_path.display()))?;
        let mtime = modified(&abs_path);

        Ok(Self {
            path: abs_path,
            format,
            root,
            loaded_mtime: mtime,
            disk_mtime: mtime,
            dirty_on_disk: false,
            rev: 1,
        })
    }

    /// Reload the document from disk
    pub fn reload(&mut self, schema: &Schema) -> Result<()> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to reload file: {}", self.path.display()))?;

        self.root = self
            .format
            .parse(&content, schema)
            .with_context(|| format!("Failed to reload {}", self.path.display()))?;
        let mtime = modified(&self.path);
        self.loaded_mtime = mtime;
        self.disk_mtime = mtime;
        self.dirty_on_disk = false;
        self.rev += 1;
        Ok(())
    }

    /// Write `doc` to the document's path in its format
    pub fn save(&mut self, doc: &Node, schema: &Schema) -> Result<()> {
        let content = self.format.serialize(doc, schema)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write file: {}", self.path.display()))?;

        self.root = doc.clone();
        let mtime = modified(&self.path);
        self.loaded_mtime = mtime;
        self.disk_mtime = mtime;
        self.dirty_on_disk = false;
        self.rev += 1;
        debug!("Saved {}", self.path.display());
        Ok(())
    }

    /// Compare the file's modification time with the loaded one. Returns true
    /// if the file changed on disk since it was loaded.
    pub fn check_disk(&mut self) -> bool {
        self.disk_mtime = modified(&self.path);
        if self.disk_mtime != self.loaded_mtime {
            self.dirty_on_disk = true;
        }
        self.dirty_on_disk
    }

    /// File name for display
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
