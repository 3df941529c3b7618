//! # myorm
//!
//! A lightweight MySQL data-access layer.
//!
//! ## Features
//!
//! - **Query builder**: fluent SELECT / INSERT / UPDATE / DELETE with bound
//!   parameters, grouped predicates, joins and a COUNT rewrite
//! - **Active records**: generated models track a snapshot of their stored
//!   values and write only what changed
//! - **Schema introspection**: table list, `DESCRIBE` output and foreign-key
//!   classification, consumed by `myorm-cli` to generate models
//! - **Safe defaults**: UPDATE and DELETE refuse to run without a WHERE
//!   predicate unless explicitly allowed
//!
//! ## Query Builder (qb)
//!
//! ```ignore
//! use myorm::{qb, Row};
//!
//! let rows: Vec<Row> = qb::select("users")
//!     .fields(&["id", "name"])
//!     .where_equal("status", "active")
//!     .where_and()
//!     .where_superior("age", 18)
//!     .order_by("created_at DESC")
//!     .limit(10)
//!     .fetch_as(&client)
//!     .await?;
//!
//! let id = qb::insert("users")
//!     .set("name", "alice")
//!     .insert_get_id(&client)
//!     .await?;
//!
//! qb::delete("users")
//!     .where_equal("id", id)
//!     .execute(&client)
//!     .await?;
//! ```

pub mod client;
pub mod context;
pub mod entity;
pub mod error;
pub mod ident;
pub mod naming;
pub mod qb;
pub mod row;
pub mod schema;
pub mod transaction;
pub mod value;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(test)]
mod testing;

pub use client::{DescribeRow, ForeignKeyRef, GenericClient, TableRef, Transactional};
pub use context::{ConnectionFactory, ConnectionProvider, ConnectionRegistry, Context, SingleConnection};
pub use entity::{
    ColumnDescriptor, Entity, FindOptions, KeyKind, Record, RecordState, Registry, SaveOutcome,
    TableDescriptor,
};
pub use error::{OrmError, OrmResult};
pub use qb::{Fetched, JoinDirection, Query, QueryKind, Statement};
pub use row::{FromRow, Row};
pub use schema::{ForeignKeyMode, SchemaSnapshot, TableInfo, introspect};
pub use value::{FromValue, Value};

#[cfg(feature = "mysql")]
pub use mysql::{MySqlClient, MySqlFactory, MySqlRegistry};

/// Value types used by generated models.
pub mod types {
    pub use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    pub use rust_decimal::Decimal;
    pub use serde_json::Value as JsonValue;
}
