//! Static table metadata emitted by the model generator.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Index role of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Primary,
    Foreign,
    Index,
    #[default]
    None,
}

impl KeyKind {
    /// Map the `Key` column of `DESCRIBE` (`PRI`, `UNI`, `MUL` or empty).
    pub fn from_describe(key: &str) -> Self {
        match key.trim().to_ascii_uppercase().as_str() {
            "PRI" => Self::Primary,
            "UNI" | "MUL" => Self::Index,
            _ => Self::None,
        }
    }

    /// Path of this variant in generated code.
    pub fn as_path(self) -> &'static str {
        match self {
            Self::Primary => "KeyKind::Primary",
            Self::Foreign => "KeyKind::Foreign",
            Self::Index => "KeyKind::Index",
            Self::None => "KeyKind::None",
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: &'static str,
    /// Column type exactly as `DESCRIBE` reports it, e.g. `int(10) unsigned`.
    pub sql_type: &'static str,
    pub nullable: bool,
    pub key: KeyKind,
    pub default: Option<&'static str>,
    /// `DESCRIBE`'s `Extra`, e.g. `auto_increment`.
    pub extra: &'static str,
    /// Referenced table, when known.
    pub references: Option<&'static str>,
}

impl ColumnDescriptor {
    pub fn is_primary(&self) -> bool {
        self.key == KeyKind::Primary
    }

    pub fn is_auto_increment(&self) -> bool {
        self.extra.to_ascii_lowercase().contains("auto_increment")
    }

    /// The literal default written when a NOT NULL column resolves to null.
    ///
    /// `None` for nullable columns, columns without a default and
    /// expression defaults (`CURRENT_TIMESTAMP`, `uuid()`), which only the
    /// server can evaluate.
    pub fn literal_default(&self) -> Option<Value> {
        if self.nullable {
            return None;
        }
        let default = self.default?;
        let upper = default.trim().to_ascii_uppercase();
        if upper.starts_with("CURRENT_TIMESTAMP") || upper.starts_with("NOW") || default.contains('(')
        {
            return None;
        }
        Some(Value::Text(default.to_string()))
    }

    /// Whether a NOT NULL column has a default only the server can evaluate.
    pub fn has_expression_default(&self) -> bool {
        !self.nullable && self.default.is_some() && self.literal_default().is_none()
    }
}

/// A table as seen by the entity runtime.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Name of the connection the table lives on.
    pub connection: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnDescriptor],
}

impl TableDescriptor {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> {
        self.columns.iter().map(|c| c.name)
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &'static ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_primary())
    }

    /// First primary-key column.
    pub fn primary_key(&self) -> Option<&'static ColumnDescriptor> {
        self.primary_keys().next()
    }

    /// Same connection and table.
    pub fn same_table(&self, other: &TableDescriptor) -> bool {
        self.connection == other.connection && self.table == other.table
    }

    /// `connection.table`, for messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.connection, self.table)
    }
}
