//! Per-file attribute snapshot used by rule conditions and path templates.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::error::{FileFusionError, Result};
use crate::expr::Value;

/// Value of `app` when the content kind cannot be guessed.
pub const UNKNOWN_APP: &str = "unknown";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// The four attributes a rule may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Size,
    Type,
    Date,
    App,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Size,
        Attribute::Type,
        Attribute::Date,
        Attribute::App,
    ];

    /// Resolve an attribute name. A leading `$` is accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.strip_prefix('$').unwrap_or(name) {
            "size" => Some(Attribute::Size),
            "type" => Some(Attribute::Type),
            "date" => Some(Attribute::Date),
            "app" => Some(Attribute::App),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Size => "size",
            Attribute::Type => "type",
            Attribute::Date => "date",
            Attribute::App => "app",
        }
    }
}

/// Attributes of a single file at the moment it was visited.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttributes {
    /// Size in fractional megabytes.
    pub size: f64,
    /// Lower-cased extension including the dot, or empty.
    pub file_type: String,
    /// Local modification date, `YYYY-MM-DD`.
    pub date: String,
    /// MIME type guessed from the extension.
    pub app: String,
    /// Raw size in bytes.
    pub bytes: u64,
}

impl FileAttributes {
    /// Stat `path` and build its attribute set.
    pub fn extract(path: &Path) -> Result<Self> {
        let to_err = |source| FileFusionError::AttributeExtraction {
            path: path.to_path_buf(),
            source,
        };

        let metadata = fs::metadata(path).map_err(to_err)?;
        let modified = metadata.modified().map_err(to_err)?;
        let date = DateTime::<Local>::from(modified)
            .format("%Y-%m-%d")
            .to_string();

        let app = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(UNKNOWN_APP)
            .to_string();

        Ok(Self::from_parts(
            metadata.len(),
            extension_of(path),
            date,
            app,
        ))
    }

    pub fn from_parts(bytes: u64, file_type: String, date: String, app: String) -> Self {
        Self {
            size: bytes as f64 / BYTES_PER_MB,
            file_type: file_type.to_lowercase(),
            date,
            app,
            bytes,
        }
    }

    pub fn value(&self, attribute: Attribute) -> Value {
        match attribute {
            Attribute::Size => Value::Number(self.size),
            Attribute::Type => Value::Str(self.file_type.clone()),
            Attribute::Date => Value::Str(self.date.clone()),
            Attribute::App => Value::Str(self.app.clone()),
        }
    }

    /// Text form used when an attribute is substituted into a path template.
    pub fn render(&self, attribute: Attribute) -> String {
        self.value(attribute).to_string()
    }
}

/// `.ext` in lower case; empty for files without an extension and for
/// dotfiles such as `.bashrc`.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
