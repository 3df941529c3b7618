//! Active-record entities.
//!
//! A generated model wraps a [`Record`] and implements [`Entity`] by pointing
//! at its static [`TableDescriptor`]. Everything else (finders, change
//! tracking, insert-or-update, guarded delete, eager loading) lives here and
//! works off the descriptor.
//!
//! Records loaded from storage carry a snapshot of their values; `save`
//! writes only the columns that differ from it and issues nothing when no
//! column does.
//!
//! # Example
//!
//! ```ignore
//! use myorm::entity::{Entity, FindOptions};
//!
//! let mut user = Users::find_by_id(&ctx, 7).await?.ok_or(...)?;
//! user.set_status("active".to_string());
//! user.save(&ctx).await?;
//!
//! let orders = Orders::find_by(
//!     &ctx,
//!     "status=?",
//!     vec!["open".into()],
//!     &FindOptions::new().order_by("id DESC").limit(10).depth(1),
//! )
//! .await?;
//! ```

mod descriptor;
mod persist;
mod record;
mod registry;

#[cfg(test)]
mod tests;

pub use descriptor::{ColumnDescriptor, KeyKind, TableDescriptor};
pub use persist::{FindOptions, SaveOutcome, exists, find_query, find_records, load_related, remove, save};
pub use record::{Record, RecordState, Snapshot};
pub use registry::Registry;

use crate::context::{ConnectionProvider, Context};
use crate::error::{OrmError, OrmResult};
use crate::ident::quote_ident;
use crate::qb::{self, Query};
use crate::value::Value;
use std::future::Future;

/// A typed model over one table.
pub trait Entity: Sized + Send + Sync + 'static {
    fn descriptor() -> &'static TableDescriptor;

    /// Wrap a record without checking its table.
    fn from_record(record: Record) -> Self;

    fn record(&self) -> &Record;

    fn record_mut(&mut self) -> &mut Record;

    fn into_record(self) -> Record;

    /// Wrap a record, failing with `TypeMismatch` if it belongs to another
    /// table.
    fn try_from_record(record: Record) -> OrmResult<Self> {
        let expected = Self::descriptor();
        if !expected.same_table(record.descriptor()) {
            return Err(OrmError::type_mismatch(
                expected.qualified_name(),
                record.descriptor().qualified_name(),
            ));
        }
        Ok(Self::from_record(record))
    }

    /// A SELECT over this entity's table.
    fn select() -> Query {
        qb::select(Self::descriptor().table)
    }

    /// The query `find_by` would run.
    fn find_query(fragment: &str, values: Vec<Value>, options: &FindOptions) -> Query {
        persist::find_query(Self::descriptor(), fragment, values, options)
    }

    /// Load every row matching a raw predicate fragment.
    fn find_by<P: ConnectionProvider>(
        ctx: &Context<P>,
        fragment: &str,
        values: Vec<Value>,
        options: &FindOptions,
    ) -> impl Future<Output = OrmResult<Vec<Self>>> + Send {
        async move {
            let records =
                persist::find_records(ctx, Self::descriptor(), fragment, values, options).await?;
            Ok(records.into_iter().map(Self::from_record).collect())
        }
    }

    /// First row matching a raw predicate fragment.
    fn find_first_by<P: ConnectionProvider>(
        ctx: &Context<P>,
        fragment: &str,
        values: Vec<Value>,
        options: &FindOptions,
    ) -> impl Future<Output = OrmResult<Option<Self>>> + Send {
        async move {
            let options = options.clone().limit(1);
            let mut found = Self::find_by(ctx, fragment, values, &options).await?;
            Ok(if found.is_empty() {
                None
            } else {
                Some(found.swap_remove(0))
            })
        }
    }

    /// Row with the given primary-key value.
    fn find_by_id<P: ConnectionProvider>(
        ctx: &Context<P>,
        id: impl Into<Value> + Send,
    ) -> impl Future<Output = OrmResult<Option<Self>>> + Send {
        let id = id.into();
        async move {
            let descriptor = Self::descriptor();
            let Some(pk) = descriptor.primary_key() else {
                return Err(OrmError::MissingPrimaryKey {
                    table: descriptor.table.to_string(),
                });
            };
            let fragment = format!("{}=?", quote_ident(pk.name));
            Self::find_first_by(ctx, &fragment, vec![id], &FindOptions::default()).await
        }
    }

    /// Whether a row with `key = value` exists.
    fn exists<P: ConnectionProvider>(
        ctx: &Context<P>,
        value: impl Into<Value> + Send,
        key: &str,
    ) -> impl Future<Output = OrmResult<bool>> + Send {
        let value = value.into();
        async move { persist::exists(ctx, Self::descriptor(), value, key).await }
    }

    /// Insert or update; see [`save`].
    fn save<'a, P: ConnectionProvider>(
        &'a mut self,
        ctx: &'a Context<P>,
    ) -> impl Future<Output = OrmResult<SaveOutcome>> + Send + 'a {
        persist::save(ctx, self.record_mut())
    }

    /// Delete the row; see [`remove`].
    fn remove<P: ConnectionProvider>(
        &mut self,
        ctx: &Context<P>,
    ) -> impl Future<Output = OrmResult<u64>> + Send {
        async move { persist::remove(ctx, self.record_mut()).await }
    }

    /// Copy another record's values into this one.
    fn replace(&mut self, other: &Record) -> OrmResult<()> {
        self.record_mut().replace(other)
    }
}
