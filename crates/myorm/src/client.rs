//! Generic client trait for unified database access.

use crate::error::{OrmError, OrmResult};
use crate::qb;
use crate::row::{FromRow, Row};
use crate::value::Value;
use std::future::Future;

/// A trait that unifies database connections.
///
/// Query builders, entity finders and the schema introspector only ever talk
/// to the database through this trait, so a test double can stand in for a
/// live server.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute an INSERT and return the generated id (`LAST_INSERT_ID()`).
    fn insert(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send;

    /// Execute a query and return the **first** row.
    ///
    /// Returns `OrmError::NotFound` if no rows are returned.
    fn query_one(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<Row>> + Send {
        async move {
            self.query(sql, params)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("Expected 1 row, got 0"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }

    /// Name of the current schema (`SELECT DATABASE()`).
    fn database(&self) -> impl Future<Output = OrmResult<Option<String>>> + Send {
        async move {
            let row = self.query_one("SELECT DATABASE() AS db", &[]).await?;
            row.try_get::<Option<String>>("db")
        }
    }

    /// Base tables of the current schema, ordered by name.
    fn table_list(&self) -> impl Future<Output = OrmResult<Vec<TableRef>>> + Send {
        async move {
            let rows = self.query(TABLE_LIST_SQL, &[]).await?;
            rows.iter().map(TableRef::from_row).collect()
        }
    }

    /// `DESCRIBE` output for one table, qualified with `schema` when given.
    fn table_structure(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> impl Future<Output = OrmResult<Vec<DescribeRow>>> + Send {
        async move {
            let mut query = qb::describe(table);
            if let Some(db) = schema.filter(|s| !s.is_empty()) {
                query = query.database(db);
            }
            let stmt = query.build()?;
            let rows = self.query(&stmt.sql, &stmt.params).await?;
            rows.iter().map(DescribeRow::from_row).collect()
        }
    }

    /// Declared foreign keys of one table in the current schema.
    fn foreign_keys(
        &self,
        table: &str,
    ) -> impl Future<Output = OrmResult<Vec<ForeignKeyRef>>> + Send {
        async move {
            let rows = self
                .query(FOREIGN_KEYS_SQL, &[Value::from(table)])
                .await?;
            rows.iter().map(ForeignKeyRef::from_row).collect()
        }
    }
}

/// Opt-in, caller-scoped transactions.
///
/// `rollback` without an active transaction is a no-op.
pub trait Transactional: GenericClient {
    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send;
    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send;
    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send;
    fn in_transaction(&self) -> impl Future<Output = bool> + Send;
}

impl<C: GenericClient> GenericClient for std::sync::Arc<C> {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Row>>> + Send {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        (**self).execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> impl Future<Output = OrmResult<u64>> + Send {
        (**self).insert(sql, params)
    }

    fn database(&self) -> impl Future<Output = OrmResult<Option<String>>> + Send {
        (**self).database()
    }

    fn table_list(&self) -> impl Future<Output = OrmResult<Vec<TableRef>>> + Send {
        (**self).table_list()
    }

    fn table_structure(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> impl Future<Output = OrmResult<Vec<DescribeRow>>> + Send {
        (**self).table_structure(schema, table)
    }

    fn foreign_keys(
        &self,
        table: &str,
    ) -> impl Future<Output = OrmResult<Vec<ForeignKeyRef>>> + Send {
        (**self).foreign_keys(table)
    }
}

const TABLE_LIST_SQL: &str = "SELECT TABLE_NAME AS name, TABLE_SCHEMA AS `schema` \
FROM information_schema.TABLES \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
ORDER BY TABLE_NAME";

const FOREIGN_KEYS_SQL: &str = "SELECT COLUMN_NAME AS `column`, \
REFERENCED_TABLE_NAME AS referenced_table, REFERENCED_COLUMN_NAME AS referenced_column \
FROM information_schema.KEY_COLUMN_USAGE \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND REFERENCED_TABLE_NAME IS NOT NULL \
ORDER BY ORDINAL_POSITION";

/// One entry of [`GenericClient::table_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub schema: String,
}

impl FromRow for TableRef {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            name: row.try_get("name")?,
            schema: row.try_get("schema")?,
        })
    }
}

/// One row of `DESCRIBE <table>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeRow {
    pub field: String,
    pub sql_type: String,
    pub nullable: bool,
    /// `PRI`, `UNI`, `MUL` or empty.
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

impl FromRow for DescribeRow {
    fn from_row(row: &Row) -> OrmResult<Self> {
        let null: String = row.try_get("Null")?;
        Ok(Self {
            field: row.try_get("Field")?,
            sql_type: row.try_get("Type")?,
            nullable: null.eq_ignore_ascii_case("YES"),
            key: row.try_get::<Option<String>>("Key")?.unwrap_or_default(),
            default: row.try_get("Default")?,
            extra: row.try_get::<Option<String>>("Extra")?.unwrap_or_default(),
        })
    }
}

/// A declared foreign key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl FromRow for ForeignKeyRef {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(Self {
            column: row.try_get("column")?,
            referenced_table: row.try_get("referenced_table")?,
            referenced_column: row.try_get("referenced_column")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClient;

    #[tokio::test]
    async fn table_structure_issues_describe() {
        let client = MockClient::new();
        client.push_rows(vec![Row::from_pairs([
            ("Field", Value::from("id")),
            ("Type", Value::Bytes(b"int(10) unsigned".to_vec())),
            ("Null", Value::from("NO")),
            ("Key", Value::from("PRI")),
            ("Default", Value::Null),
            ("Extra", Value::from("auto_increment")),
        ])]);

        let cols = client.table_structure(Some("app"), "users").await.unwrap();
        assert_eq!(client.statements()[0].sql, "DESCRIBE `app`.`users`");
        assert_eq!(
            cols,
            vec![DescribeRow {
                field: "id".into(),
                sql_type: "int(10) unsigned".into(),
                nullable: false,
                key: "PRI".into(),
                default: None,
                extra: "auto_increment".into(),
            }]
        );
    }

    #[tokio::test]
    async fn table_list_reads_name_and_schema() {
        let client = MockClient::new();
        client.push_rows(vec![
            Row::from_pairs([("name", "orders"), ("schema", "shop")]),
            Row::from_pairs([("name", "users"), ("schema", "shop")]),
        ]);
        let tables = client.table_list().await.unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].name, "users");
        assert!(client.statements()[0].sql.contains("information_schema.TABLES"));
    }
}
