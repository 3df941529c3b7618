//! MySQL driver built on `sqlx`.
//!
//! [`MySqlClient`] owns a connection pool and at most one open transaction.
//! While a transaction is open every statement issued through the client
//! runs inside it; otherwise statements go to the pool.

use crate::client::{GenericClient, Transactional};
use crate::context::{ConnectionFactory, ConnectionRegistry};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions, MySqlQueryResult, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column as _, MySql, MySqlPool, Row as _, Transaction, TypeInfo as _, ValueRef as _};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// Pooled MySQL client.
pub struct MySqlClient {
    pool: MySqlPool,
    tx: Mutex<Option<Transaction<'static, MySql>>>,
}

impl MySqlClient {
    /// Connect with a default pool size.
    pub async fn connect(url: &str) -> OrmResult<Self> {
        Self::connect_with(url, 5).await
    }

    pub async fn connect_with(url: &str, max_connections: u32) -> OrmResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| OrmError::Connection(e.to_string()))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            tx: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn fetch(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<MySqlRow>> {
        tracing::debug!(target: "myorm.sql", sql, params = ?params, "query");
        let query = bind_all(sqlx::query(sql), params);
        let mut guard = self.tx.lock().await;
        if let Some(tx) = guard.as_mut() {
            return query.fetch_all(&mut **tx).await.map_err(|e| fail(sql, params, e));
        }
        drop(guard);
        query.fetch_all(&self.pool).await.map_err(|e| fail(sql, params, e))
    }

    async fn run(&self, sql: &str, params: &[Value]) -> OrmResult<MySqlQueryResult> {
        tracing::debug!(target: "myorm.sql", sql, params = ?params, "execute");
        let query = bind_all(sqlx::query(sql), params);
        let mut guard = self.tx.lock().await;
        if let Some(tx) = guard.as_mut() {
            return query.execute(&mut **tx).await.map_err(|e| fail(sql, params, e));
        }
        drop(guard);
        query.execute(&self.pool).await.map_err(|e| fail(sql, params, e))
    }
}

fn fail(sql: &str, params: &[Value], e: sqlx::Error) -> OrmError {
    tracing::error!(target: "myorm.sql", sql, error = %e, "statement failed");
    OrmError::query_execution(sql, params, e.to_string())
}

fn bind_all<'q>(mut query: MySqlQuery<'q>, params: &[Value]) -> MySqlQuery<'q> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::UInt(u) => query.bind(*u),
            Value::Float(f) => query.bind(*f),
            Value::Decimal(d) => query.bind(*d),
            Value::Text(s) => query.bind(s.clone()),
            Value::Bytes(b) => query.bind(b.clone()),
            Value::Date(d) => query.bind(*d),
            Value::Time(t) => query.bind(*t),
            Value::DateTime(dt) => query.bind(*dt),
            Value::Json(j) => query.bind(j.to_string()),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> OrmResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_cell(row, idx, column.name(), column.type_info().name())?);
    }
    Ok(Row::new(columns, values))
}

fn decode_cell(row: &MySqlRow, idx: usize, name: &str, ty: &str) -> OrmResult<Value> {
    let raw = row
        .try_get_raw(idx)
        .map_err(|e| OrmError::decode(name, e.to_string()))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let typed = match ty {
        "BOOLEAN" => row.try_get::<bool, _>(idx).map(Value::Bool).ok(),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(idx).map(Value::Int).ok()
        }
        t if t.ends_with(" UNSIGNED") => row.try_get::<u64, _>(idx).map(Value::UInt).ok(),
        "YEAR" => decode_year(row, idx),
        "FLOAT" => row
            .try_get::<f32, _>(idx)
            .map(|f| Value::Float(f64::from(f)))
            .ok(),
        "DOUBLE" => row.try_get::<f64, _>(idx).map(Value::Float).ok(),
        "DECIMAL" => row.try_get::<Decimal, _>(idx).map(Value::Decimal).ok(),
        "DATE" => row.try_get::<chrono::NaiveDate, _>(idx).map(Value::Date).ok(),
        "TIME" => row.try_get::<chrono::NaiveTime, _>(idx).map(Value::Time).ok(),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(Value::DateTime)
            .ok(),
        "JSON" => text_or_bytes(row, idx)
            .and_then(|v| match &v {
                Value::Text(s) => serde_json::from_str(s).ok(),
                Value::Bytes(b) => serde_json::from_slice(b).ok(),
                _ => None,
            })
            .map(Value::Json),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes).ok(),
        _ => None,
    };

    match typed.or_else(|| text_or_bytes(row, idx)) {
        Some(v) => Ok(v),
        None => Err(OrmError::decode(
            name,
            format!("unsupported column type `{ty}`"),
        )),
    }
}

/// `YEAR` arrives as a two-byte integer that the strict decoders refuse.
fn decode_year(row: &MySqlRow, idx: usize) -> Option<Value> {
    row.try_get::<u16, _>(idx)
        .or_else(|_| row.try_get_unchecked::<u16, _>(idx))
        .map(|y| Value::UInt(u64::from(y)))
        .ok()
}

fn text_or_bytes(row: &MySqlRow, idx: usize) -> Option<Value> {
    row.try_get::<String, _>(idx)
        .map(Value::Text)
        .or_else(|_| row.try_get::<Vec<u8>, _>(idx).map(Value::Bytes))
        .ok()
}

impl GenericClient for MySqlClient {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let rows = self.fetch(sql, params).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        Ok(self.run(sql, params).await?.rows_affected())
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        Ok(self.run(sql, params).await?.last_insert_id())
    }
}

impl Transactional for MySqlClient {
    async fn begin(&self) -> OrmResult<()> {
        let mut guard = self.tx.lock().await;
        if guard.is_some() {
            return Err(OrmError::validation("transaction already active"));
        }
        tracing::debug!(target: "myorm.sql", "BEGIN");
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| fail("BEGIN", &[], e))?;
        *guard = Some(tx);
        Ok(())
    }

    async fn commit(&self) -> OrmResult<()> {
        let Some(tx) = self.tx.lock().await.take() else {
            return Err(OrmError::validation("no active transaction"));
        };
        tracing::debug!(target: "myorm.sql", "COMMIT");
        tx.commit().await.map_err(|e| fail("COMMIT", &[], e))
    }

    async fn rollback(&self) -> OrmResult<()> {
        let Some(tx) = self.tx.lock().await.take() else {
            return Ok(());
        };
        tracing::debug!(target: "myorm.sql", "ROLLBACK");
        tx.rollback().await.map_err(|e| fail("ROLLBACK", &[], e))
    }

    async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }
}

/// Opens [`MySqlClient`]s from a connection-name to URL map.
#[derive(Debug, Clone)]
pub struct MySqlFactory {
    urls: BTreeMap<String, String>,
    max_connections: u32,
}

impl MySqlFactory {
    pub fn new(urls: BTreeMap<String, String>) -> Self {
        Self {
            urls,
            max_connections: 5,
        }
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn url(&self, name: &str) -> Option<&str> {
        self.urls.get(name).map(String::as_str)
    }
}

impl ConnectionFactory for MySqlFactory {
    type Client = MySqlClient;

    async fn connect(&self, name: &str) -> OrmResult<MySqlClient> {
        let Some(url) = self.urls.get(name) else {
            return Err(OrmError::Connection(format!(
                "no connection named `{name}`"
            )));
        };
        MySqlClient::connect_with(url, self.max_connections).await
    }
}

/// Lazily connecting registry of named MySQL clients.
pub type MySqlRegistry = ConnectionRegistry<MySqlFactory>;

impl MySqlRegistry {
    pub fn from_urls(urls: BTreeMap<String, String>) -> Self {
        ConnectionRegistry::new(MySqlFactory::new(urls))
    }
}
