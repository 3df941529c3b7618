//! Fluent query builder for MySQL.
//!
//! One [`Query`] type covers SELECT, INSERT, UPDATE, DELETE and DESCRIBE.
//! Builder calls only record state; [`Query::build`] renders the SQL text and
//! the bound values together, so the `?` placeholders always line up with
//! the value list (INSERT/UPDATE values first, then WHERE, then HAVING).
//!
//! Column text in predicates is emitted as given (`status=?`), while field
//! lists and table names are backtick-quoted when they are plain identifiers.
//!
//! # Usage
//!
//! ```ignore
//! use myorm::qb;
//!
//! let admins = qb::select("users")
//!     .where_equal("status", "active")
//!     .where_and()
//!     .where_equal("type", "admin")
//!     .order_by("created_at DESC")
//!     .limit(20)
//!     .fetch_assoc(&client)
//!     .await?;
//!
//! let id = qb::insert("users")
//!     .set("username", "alice")
//!     .set("email", "alice@example.com")
//!     .insert_get_id(&client)
//!     .await?;
//!
//! qb::update("users")
//!     .set("status", "inactive")
//!     .where_equal("id", id)
//!     .execute(&client)
//!     .await?;
//!
//! // DELETE/UPDATE without WHERE must be asked for explicitly.
//! qb::delete("sessions").allow_all().execute(&client).await?;
//! ```

mod clause;
mod fetch;
mod query;

#[cfg(test)]
mod tests;

pub use clause::{Clause, ClauseList, Predicate};
pub use fetch::Fetched;
pub use query::{JoinDirection, Query, QueryKind, Statement};

pub(crate) use clause::placeholders;

/// Create a SELECT builder.
pub fn select(table: &str) -> Query {
    Query::new(QueryKind::Select, table)
}

/// Create an INSERT builder.
pub fn insert(table: &str) -> Query {
    Query::new(QueryKind::Insert, table)
}

/// Create an UPDATE builder.
pub fn update(table: &str) -> Query {
    Query::new(QueryKind::Update, table)
}

/// Create a DELETE builder.
pub fn delete(table: &str) -> Query {
    Query::new(QueryKind::Delete, table)
}

/// Create a DESCRIBE builder. `table` may be `db.table`.
pub fn describe(table: &str) -> Query {
    Query::new(QueryKind::Describe, table)
}
