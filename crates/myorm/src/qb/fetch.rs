//! Terminal operations: compile, run and map.

use crate::client::GenericClient;
use crate::entity::{Entity, Record};
use crate::error::{OrmError, OrmResult};
use crate::qb::query::{Query, QueryKind};
use crate::row::{FromRow, Row};
use crate::value::Value;
use std::collections::BTreeMap;

/// Result of [`Query::fetch_shaped`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// Exactly one row was returned and an array was not forced.
    One(T),
    Many(Vec<T>),
}

impl<T> Fetched<T> {
    /// Always return a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Fetched::One(item) => vec![item],
            Fetched::Many(items) => items,
        }
    }
}

impl Query {
    /// Execute and return all rows.
    pub async fn fetch_rows(&self, conn: &impl GenericClient) -> OrmResult<Vec<Row>> {
        self.validate()?;
        let stmt = self.build()?;
        conn.query(&stmt.sql, &stmt.params).await
    }

    /// Execute and map all rows to `T`.
    pub async fn fetch_as<T: FromRow>(&self, conn: &impl GenericClient) -> OrmResult<Vec<T>> {
        let rows = self.fetch_rows(conn).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Execute and map the first row. `OrmError::NotFound` if there is none.
    pub async fn fetch_one_as<T: FromRow>(&self, conn: &impl GenericClient) -> OrmResult<T> {
        self.validate()?;
        let stmt = self.build()?;
        let row = conn.query_one(&stmt.sql, &stmt.params).await?;
        T::from_row(&row)
    }

    /// Execute and map the first row, if any.
    pub async fn fetch_opt_as<T: FromRow>(
        &self,
        conn: &impl GenericClient,
    ) -> OrmResult<Option<T>> {
        self.validate()?;
        let stmt = self.build()?;
        let row = conn.query_opt(&stmt.sql, &stmt.params).await?;
        row.as_ref().map(T::from_row).transpose()
    }

    /// Rows as column-name maps.
    pub async fn fetch_assoc(
        &self,
        conn: &impl GenericClient,
    ) -> OrmResult<Vec<BTreeMap<String, Value>>> {
        self.fetch_as(conn).await
    }

    /// Rows as positional value lists.
    pub async fn fetch_positional(&self, conn: &impl GenericClient) -> OrmResult<Vec<Vec<Value>>> {
        self.fetch_as(conn).await
    }

    /// Rows as mapped items, unwrapped when exactly one row comes back and
    /// `force_array` is false.
    pub async fn fetch_shaped<T: FromRow>(
        &self,
        conn: &impl GenericClient,
        force_array: bool,
    ) -> OrmResult<Fetched<T>> {
        let mut items = self.fetch_as::<T>(conn).await?;
        if items.len() == 1 && !force_array {
            if let Some(item) = items.pop() {
                return Ok(Fetched::One(item));
            }
        }
        Ok(Fetched::Many(items))
    }

    /// Rows hydrated as loaded entities of type `E`.
    ///
    /// Every selected column must belong to `E`'s table; anything else is an
    /// `OrmError::InvalidFetchTarget`.
    pub async fn fetch_entities<E: Entity>(&self, conn: &impl GenericClient) -> OrmResult<Vec<E>> {
        let descriptor = E::descriptor();
        let rows = self.fetch_rows(conn).await?;
        rows.into_iter()
            .map(|row| {
                if let Some(unknown) = row.columns().iter().find(|c| descriptor.column(c).is_none())
                {
                    return Err(OrmError::invalid_fetch_target(
                        descriptor.table,
                        format!("column `{unknown}` is not part of the table"),
                    ));
                }
                Ok(E::from_record(Record::hydrate(descriptor, row)))
            })
            .collect()
    }

    /// Entities shaped like [`Query::fetch_shaped`]: a single row is
    /// unwrapped unless `force_array` is set.
    pub async fn fetch_entities_shaped<E: Entity>(
        &self,
        conn: &impl GenericClient,
        force_array: bool,
    ) -> OrmResult<Fetched<E>> {
        let mut items = self.fetch_entities::<E>(conn).await?;
        if items.len() == 1 && !force_array {
            if let Some(item) = items.pop() {
                return Ok(Fetched::One(item));
            }
        }
        Ok(Fetched::Many(items))
    }

    /// Run the derived count query.
    pub async fn count(&self, conn: &impl GenericClient) -> OrmResult<u64> {
        let stmt = self.to_count().build()?;
        let row = conn.query_one(&stmt.sql, &stmt.params).await?;
        let n: i64 = row.try_get_idx(0)?;
        Ok(n.max(0) as u64)
    }

    /// Execute a write statement and return the number of affected rows.
    ///
    /// UPDATE and DELETE without a WHERE predicate are refused unless
    /// [`Query::allow_all`] was called.
    pub async fn execute(&self, conn: &impl GenericClient) -> OrmResult<u64> {
        self.validate()?;
        let stmt = self.build()?;
        conn.execute(&stmt.sql, &stmt.params).await
    }

    /// Execute an INSERT and return the generated id.
    pub async fn insert_get_id(&self, conn: &impl GenericClient) -> OrmResult<u64> {
        if self.kind() != QueryKind::Insert {
            return Err(OrmError::validation("insert_get_id requires an INSERT query"));
        }
        let stmt = self.build()?;
        conn.insert(&stmt.sql, &stmt.params).await
    }
}
