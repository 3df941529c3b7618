//! Loading and saving records.

use crate::client::GenericClient;
use crate::context::{ConnectionProvider, Context};
use crate::entity::descriptor::TableDescriptor;
use crate::entity::record::Record;
use crate::error::{OrmError, OrmResult};
use crate::ident::quote_ident;
use crate::qb::{self, Query};
use crate::value::Value;
use futures_util::future::BoxFuture;

/// What [`save`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// A row was inserted. Carries the generated id, if the server made one.
    Inserted(Option<u64>),
    Updated,
    /// Nothing differed from the snapshot; no statement was issued.
    Unchanged,
}

/// Options for finders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// How many foreign-key hops to load eagerly. `0` loads nothing.
    pub depth: u32,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order_by(mut self, clause: &str) -> Self {
        self.order_by.push(clause.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }
}

/// SELECT over `descriptor`'s table constrained by a raw fragment.
pub fn find_query(
    descriptor: &TableDescriptor,
    fragment: &str,
    values: Vec<Value>,
    options: &FindOptions,
) -> Query {
    let mut q = qb::select(descriptor.table)
        .where_raw(fragment, values)
        .order_by_list(&options.order_by);
    if let Some(limit) = options.limit {
        q = q.limit(limit);
    }
    if let Some(offset) = options.offset {
        q = q.offset(offset);
    }
    q
}

/// Run a finder and hydrate the rows, loading related records up to
/// `options.depth` hops.
pub async fn find_records<P: ConnectionProvider>(
    ctx: &Context<P>,
    descriptor: &'static TableDescriptor,
    fragment: &str,
    values: Vec<Value>,
    options: &FindOptions,
) -> OrmResult<Vec<Record>> {
    let query = find_query(descriptor, fragment, values, options);
    let client = ctx.client(descriptor.connection).await?;
    let rows = query.fetch_rows(client.as_ref()).await?;
    let mut records: Vec<Record> = rows
        .into_iter()
        .map(|row| Record::hydrate(descriptor, row))
        .collect();
    load_related(ctx, &mut records, options.depth).await?;
    Ok(records)
}

/// Attach the records referenced by each foreign-key column.
///
/// One `IN (...)` query per column per level. Columns whose target table is
/// not in the context's registry are left alone.
pub fn load_related<'a, P: ConnectionProvider>(
    ctx: &'a Context<P>,
    records: &'a mut [Record],
    depth: u32,
) -> BoxFuture<'a, OrmResult<()>> {
    Box::pin(async move {
        let Some(first) = records.first() else {
            return Ok(());
        };
        if depth == 0 {
            return Ok(());
        }
        let owner = first.descriptor();

        for column in owner.columns {
            let Some(target) = ctx.registry().resolve_reference(owner, column) else {
                continue;
            };
            let Some(target_pk) = target.primary_key() else {
                continue;
            };

            let mut ids: Vec<Value> = Vec::new();
            for record in records.iter() {
                if let Some(v) = record.value(column.name).filter(|v| !v.is_null()) {
                    if !ids.iter().any(|seen| seen.loosely_eq(v)) {
                        ids.push(v.clone());
                    }
                }
            }
            if ids.is_empty() {
                continue;
            }

            tracing::debug!(
                target: "myorm.entity",
                table = owner.table,
                column = column.name,
                related = target.table,
                count = ids.len(),
                depth,
                "loading related records"
            );
            let client = ctx.client(target.connection).await?;
            let rows = qb::select(target.table)
                .where_in(&quote_ident(target_pk.name), ids)
                .fetch_rows(client.as_ref())
                .await?;
            let mut related: Vec<Record> = rows
                .into_iter()
                .map(|row| Record::hydrate(target, row))
                .collect();
            load_related(ctx, &mut related, depth - 1).await?;

            for record in records.iter_mut() {
                let Some(v) = record.value(column.name).cloned() else {
                    continue;
                };
                let found = related
                    .iter()
                    .find(|r| r.value(target_pk.name).is_some_and(|k| k.loosely_eq(&v)));
                if let Some(found) = found {
                    record
                        .related
                        .insert(column.name.to_string(), found.clone());
                }
            }
        }
        Ok(())
    })
}

/// Whether a row with `key = value` exists.
pub async fn exists<P: ConnectionProvider>(
    ctx: &Context<P>,
    descriptor: &TableDescriptor,
    value: Value,
    key: &str,
) -> OrmResult<bool> {
    let client = ctx.client(descriptor.connection).await?;
    row_exists(client.as_ref(), descriptor, &[(key, value)]).await
}

async fn row_exists(
    client: &impl GenericClient,
    descriptor: &TableDescriptor,
    keys: &[(&str, Value)],
) -> OrmResult<bool> {
    let n = key_filter(qb::select(descriptor.table), keys)
        .count(client)
        .await?;
    Ok(n > 0)
}

fn key_filter(mut query: Query, keys: &[(&str, Value)]) -> Query {
    for (i, (column, value)) in keys.iter().enumerate() {
        if i > 0 {
            query = query.where_and();
        }
        query = query.where_equal(&quote_ident(column), value.clone());
    }
    query
}

/// Insert or update a record, then make its current values the snapshot.
///
/// Related records without an identity are saved first and their keys
/// copied into the referencing columns. A record whose values match its
/// snapshot issues no statement.
///
/// Insert or update:
/// - no key value: insert
/// - a non-numeric key: update when the record was loaded, otherwise insert
/// - a numeric key: update when a row with that key exists, otherwise
///   insert with the explicit key
pub fn save<'a, P: ConnectionProvider>(
    ctx: &'a Context<P>,
    record: &'a mut Record,
) -> BoxFuture<'a, OrmResult<SaveOutcome>> {
    Box::pin(async move {
        let descriptor = record.descriptor();
        if record.is_deleted() {
            return Err(OrmError::validation(format!(
                "cannot save deleted record of `{}`",
                descriptor.table
            )));
        }

        let columns: Vec<String> = record.related.keys().cloned().collect();
        for column in columns {
            if let Some(related) = record.related.get_mut(&column) {
                if related.identity().is_none() {
                    save(ctx, related).await?;
                }
                if let Some(id) = related.identity() {
                    record.values.insert(column, id);
                }
            }
        }

        let loaded = record.snapshot().is_some();
        if loaded && record.changes().is_empty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let client = ctx.client(descriptor.connection).await?;
        let keys = record.key_values();
        let update = match record.identity() {
            None => false,
            Some(id) if !id.is_numeric() => loaded,
            Some(_) if keys.is_empty() => false,
            Some(_) => row_exists(client.as_ref(), descriptor, &keys).await?,
        };

        let outcome = if update {
            let changes = record.changes();
            if changes.is_empty() {
                record.take_snapshot();
                return Ok(SaveOutcome::Unchanged);
            }
            let mut query = qb::update(descriptor.table);
            for (column, value) in changes {
                query = query.set(&quote_ident(column), value);
            }
            key_filter(query, &keys)
                .execute(client.as_ref())
                .await?;
            SaveOutcome::Updated
        } else {
            let writes = record.diff(None);
            if writes.is_empty() {
                return Err(OrmError::validation(format!(
                    "nothing to insert into `{}`",
                    descriptor.table
                )));
            }
            let mut query = qb::insert(descriptor.table);
            for (column, value) in writes {
                query = query.set(&quote_ident(column), value);
            }
            let id = query.insert_get_id(client.as_ref()).await?;
            match descriptor.primary_key() {
                Some(pk) if pk.is_auto_increment() && record.identity().is_none() && id > 0 => {
                    record.values.insert(pk.name.to_string(), Value::from(id));
                    SaveOutcome::Inserted(Some(id))
                }
                _ => SaveOutcome::Inserted(None),
            }
        };

        record.take_snapshot();
        Ok(outcome)
    })
}

/// Delete the row behind a record.
///
/// Fails with `MissingPrimaryKey`, before any statement is issued, when the
/// record has no key value.
pub async fn remove<P: ConnectionProvider>(
    ctx: &Context<P>,
    record: &mut Record,
) -> OrmResult<u64> {
    let descriptor = record.descriptor();
    let keys = record.key_values();
    if keys.is_empty() {
        return Err(OrmError::MissingPrimaryKey {
            table: descriptor.table.to_string(),
        });
    }
    let client = ctx.client(descriptor.connection).await?;
    let affected = key_filter(qb::delete(descriptor.table), &keys)
        .execute(client.as_ref())
        .await?;
    record.mark_deleted();
    Ok(affected)
}
