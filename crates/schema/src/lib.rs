//! # Schema - Table Definitions
//!
//! Parses a table's `definition` file into an ordered [`Schema`].
//!
//! ## Definition Format
//!
//! One column per line, whitespace-separated:
//!
//! ```text
//! int    forum_id    primary
//! str64  forum_title
//! blob   forum_description
//! ```
//!
//! Empty lines and lines starting with `#` are ignored. The declaration
//! order is the binary layout order of every record in the table's data
//! file, so the parser never reorders columns.
//!
//! ## Types
//!
//! | Token   | Width | Holds                                 |
//! |---------|-------|---------------------------------------|
//! | `int`   | 8     | signed 64-bit integer                 |
//! | `str32` | 32    | UTF-8 text, truncated to 32 bytes     |
//! | `str64` | 64    | UTF-8 text, truncated to 64 bytes     |
//! | `blob`  | 32    | token naming an out-of-line blob file |

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::PathBuf;

use config::{ConfigError, StorageConfig};
use thiserror::Error;

/// Marker token flagging a column as part of the primary key.
pub const PRIMARY_MARKER: &str = "primary";

/// Column type. The width of each type is fixed forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Str32,
    Str64,
    Blob,
}

impl Type {
    /// Parses a type token from a definition line.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "int" => Some(Type::Int),
            "str32" => Some(Type::Str32),
            "str64" => Some(Type::Str64),
            "blob" => Some(Type::Blob),
            _ => None,
        }
    }

    /// Size in bytes of this type's segment within a record.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Type::Int => 8,
            Type::Str32 => 32,
            Type::Str64 => 64,
            Type::Blob => 32,
        }
    }

    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Type::Int => "int",
            Type::Str32 => "str32",
            Type::Str64 => "str64",
            Type::Blob => "blob",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A single column declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: Type,
    pub is_primary: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: Type, is_primary: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            is_primary,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.ty.width()
    }
}

/// Errors raised while loading or validating a definition.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table {table}: column type {ty:?} is undefined (line {line})")]
    UnknownType {
        table: String,
        ty: String,
        line: usize,
    },

    #[error("table {table}: duplicate column {column:?} (line {line})")]
    DuplicateColumn {
        table: String,
        column: String,
        line: usize,
    },

    #[error("table {table}: line {line} declares a type but no column name")]
    MissingName { table: String, line: usize },

    /// Anything after the name other than the primary marker.
    #[error("table {table}: unexpected token {token:?} on line {line}")]
    UnexpectedToken {
        table: String,
        token: String,
        line: usize,
    },

    #[error("table {table}: definition declares no columns")]
    Empty { table: String },

    #[error("invalid table: {0}")]
    Table(#[from] ConfigError),

    #[error("failed to read definition {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The ordered column list of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    table: String,
    columns: Vec<Column>,
}

impl Schema {
    /// Builds a schema from columns already in layout order, applying the
    /// same validation as [`Schema::parse`].
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Result<Self, SchemaError> {
        let table = table.into();
        if columns.is_empty() {
            return Err(SchemaError::Empty { table });
        }
        let mut seen = HashSet::new();
        for (idx, col) in columns.iter().enumerate() {
            if !seen.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table,
                    column: col.name.clone(),
                    line: idx + 1,
                });
            }
        }
        Ok(Self { table, columns })
    }

    /// Parses the text of a definition file.
    pub fn parse(table: &str, source: &str) -> Result<Self, SchemaError> {
        let mut columns: Vec<Column> = Vec::new();
        let mut seen = HashSet::new();

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split_whitespace();
            // A non-empty trimmed line always yields a first field.
            let ty_token = fields.next().unwrap_or_default();
            let ty = Type::from_token(ty_token).ok_or_else(|| SchemaError::UnknownType {
                table: table.to_string(),
                ty: ty_token.to_string(),
                line,
            })?;

            let name = fields.next().ok_or_else(|| SchemaError::MissingName {
                table: table.to_string(),
                line,
            })?;

            if !seen.insert(name.to_string()) {
                return Err(SchemaError::DuplicateColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                    line,
                });
            }

            let is_primary = match fields.next() {
                None => false,
                Some(PRIMARY_MARKER) => true,
                Some(other) => {
                    return Err(SchemaError::UnexpectedToken {
                        table: table.to_string(),
                        token: other.to_string(),
                        line,
                    })
                }
            };

            if let Some(extra) = fields.next() {
                return Err(SchemaError::UnexpectedToken {
                    table: table.to_string(),
                    token: extra.to_string(),
                    line,
                });
            }

            columns.push(Column::new(name, ty, is_primary));
        }

        if columns.is_empty() {
            return Err(SchemaError::Empty {
                table: table.to_string(),
            });
        }

        Ok(Self {
            table: table.to_string(),
            columns,
        })
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns in declaration (= layout) order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary)
    }

    pub fn blob_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.ty == Type::Blob)
    }

    /// Sum of the column widths: the size of one record on disk.
    #[must_use]
    pub fn record_width(&self) -> usize {
        self.columns.iter().map(Column::width).sum()
    }

    /// Byte offset of `name`'s segment within a record.
    #[must_use]
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;
        for col in &self.columns {
            if col.name == name {
                return Some(offset);
            }
            offset += col.width();
        }
        None
    }

    /// Renders the schema back into definition-file syntax.
    #[must_use]
    pub fn to_definition(&self) -> String {
        let mut out = String::new();
        for col in &self.columns {
            out.push_str(col.ty.token());
            out.push(' ');
            out.push_str(&col.name);
            if col.is_primary {
                out.push(' ');
                out.push_str(PRIMARY_MARKER);
            }
            out.push('\n');
        }
        out
    }
}

/// Loads schemas from the definition files under a data root.
///
/// Nothing is cached: every call re-reads the definition so edits take
/// effect on the next operation.
#[derive(Debug, Clone)]
pub struct Catalog {
    config: StorageConfig,
}

impl Catalog {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn load(&self, table: &str) -> Result<Schema, SchemaError> {
        let path = self.config.definition_path(table)?;
        let source = std::fs::read_to_string(&path).map_err(|source| SchemaError::Io {
            path: path.clone(),
            source,
        })?;
        Schema::parse(table, &source)
    }
}
