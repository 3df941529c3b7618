//! Live schema introspection.
//!
//! Reads the table list and each table's `DESCRIBE` output, then classifies
//! foreign-key columns. A table whose structure cannot be read is logged,
//! recorded in [`SchemaSnapshot::skipped`] and left out; the rest of the run
//! continues.

use crate::client::{DescribeRow, GenericClient};
use crate::entity::KeyKind;
use crate::error::{OrmError, OrmResult};
use crate::naming;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How foreign-key columns are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyMode {
    /// `<base>_id` columns whose `<base>` (or its plural) is a table.
    #[default]
    Naming,
    /// Declared constraints from `information_schema.KEY_COLUMN_USAGE`,
    /// falling back to [`ForeignKeyMode::Naming`] when the lookup fails.
    InformationSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub key: KeyKind,
    pub default: Option<String>,
    pub extra: String,
    /// Referenced table, for foreign keys.
    pub references: Option<String>,
}

impl ColumnInfo {
    pub fn from_describe(row: DescribeRow) -> Self {
        Self {
            key: KeyKind::from_describe(&row.key),
            name: row.field,
            sql_type: row.sql_type,
            nullable: row.nullable,
            default: row.default,
            extra: row.extra,
            references: None,
        }
    }

    fn mark_foreign(&mut self, table: &str) {
        if self.key != KeyKind::Primary {
            self.key = KeyKind::Foreign;
        }
        self.references = Some(table.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub schema: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A table left out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTable {
    pub name: String,
    pub message: String,
}

impl SkippedTable {
    pub fn to_error(&self) -> OrmError {
        OrmError::SchemaIntrospection {
            table: self.name.clone(),
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Described tables, in table-list order.
    pub tables: Vec<TableInfo>,
    pub skipped: Vec<SkippedTable>,
}

impl SchemaSnapshot {
    pub fn find_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.skipped.iter().any(|s| s.name == name)
    }
}

/// Introspect the client's current schema.
///
/// Only a failure to list tables is fatal.
pub async fn introspect(
    client: &impl GenericClient,
    mode: ForeignKeyMode,
) -> OrmResult<SchemaSnapshot> {
    let tables = client.table_list().await?;
    let known: BTreeSet<String> = tables.iter().map(|t| t.name.clone()).collect();
    let mut snapshot = SchemaSnapshot::default();

    for table in &tables {
        let qualified = if table.schema.is_empty() {
            table.name.clone()
        } else {
            format!("{}.{}", table.schema, table.name)
        };
        let schema = Some(table.schema.as_str()).filter(|s| !s.is_empty());
        match client.table_structure(schema, &table.name).await {
            Ok(rows) => snapshot.tables.push(TableInfo {
                name: table.name.clone(),
                schema: table.schema.clone(),
                columns: rows.into_iter().map(ColumnInfo::from_describe).collect(),
            }),
            Err(e) => {
                let err = OrmError::SchemaIntrospection {
                    table: qualified.clone(),
                    message: e.to_string(),
                };
                tracing::error!(target: "myorm::schema", table = %qualified, error = %err, "skipping table");
                snapshot.skipped.push(SkippedTable {
                    name: table.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    for table in &mut snapshot.tables {
        match mode {
            ForeignKeyMode::Naming => classify_by_naming(table, &known),
            ForeignKeyMode::InformationSchema => match client.foreign_keys(&table.name).await {
                Ok(keys) => {
                    for fk in keys {
                        if let Some(col) = table.columns.iter_mut().find(|c| c.name == fk.column) {
                            col.mark_foreign(&fk.referenced_table);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        target: "myorm::schema",
                        table = %table.name,
                        error = %e,
                        "foreign key lookup failed, using naming convention"
                    );
                    classify_by_naming(table, &known);
                }
            },
        }
    }

    tracing::info!(
        target: "myorm::schema",
        tables = snapshot.tables.len(),
        skipped = snapshot.skipped.len(),
        "schema introspected"
    );
    Ok(snapshot)
}

/// Mark `<base>_id` columns whose target table exists.
pub fn classify_by_naming(table: &mut TableInfo, known: &BTreeSet<String>) {
    for col in &mut table.columns {
        if col.key == KeyKind::Primary {
            continue;
        }
        let Some(candidates) = naming::reference_candidates(&col.name) else {
            continue;
        };
        if let Some(target) = candidates.iter().find(|c| known.contains(c.as_str())) {
            col.mark_foreign(target);
        }
    }
}
