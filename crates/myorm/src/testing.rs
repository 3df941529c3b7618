//! In-memory client used by unit tests.
//!
//! Records every statement and replays scripted results in FIFO order. When
//! the script is empty, queries return no rows, statements report one
//! affected row and inserts hand out increasing ids.

use crate::client::{GenericClient, Transactional};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Recorded {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug)]
enum Scripted {
    Rows(Vec<Row>),
    Affected(u64),
    Id(u64),
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    statements: Vec<Recorded>,
    script: VecDeque<Scripted>,
    next_id: u64,
    in_tx: bool,
    tx_log: Vec<&'static str>,
}

#[derive(Debug, Default)]
pub(crate) struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.lock().script.push_back(Scripted::Rows(rows));
    }

    pub fn push_count(&self, n: i64) {
        self.push_rows(vec![Row::from_pairs([("COUNT(*)", Value::Int(n))])]);
    }

    pub fn push_affected(&self, n: u64) {
        self.lock().script.push_back(Scripted::Affected(n));
    }

    pub fn push_id(&self, id: u64) {
        self.lock().script.push_back(Scripted::Id(id));
    }

    pub fn push_error(&self, message: &str) {
        self.lock()
            .script
            .push_back(Scripted::Fail(message.to_string()));
    }

    pub fn statements(&self) -> Vec<Recorded> {
        self.lock().statements.clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.lock()
            .statements
            .iter()
            .map(|s| s.sql.clone())
            .collect()
    }

    pub fn tx_log(&self) -> Vec<&'static str> {
        self.lock().tx_log.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(&self, sql: &str, params: &[Value]) -> Option<Scripted> {
        let mut state = self.lock();
        state.statements.push(Recorded {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        state.script.pop_front()
    }
}

fn fail(sql: &str, params: &[Value], message: String) -> OrmError {
    OrmError::query_execution(sql, params, message)
}

impl GenericClient for MockClient {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        match self.record(sql, params) {
            None => Ok(Vec::new()),
            Some(Scripted::Rows(rows)) => Ok(rows),
            Some(Scripted::Fail(msg)) => Err(fail(sql, params, msg)),
            Some(other) => Err(fail(sql, params, format!("unexpected script entry {other:?}"))),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        match self.record(sql, params) {
            None => Ok(1),
            Some(Scripted::Affected(n)) => Ok(n),
            Some(Scripted::Fail(msg)) => Err(fail(sql, params, msg)),
            Some(other) => Err(fail(sql, params, format!("unexpected script entry {other:?}"))),
        }
    }

    async fn insert(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        match self.record(sql, params) {
            None => {
                let mut state = self.lock();
                state.next_id += 1;
                Ok(state.next_id)
            }
            Some(Scripted::Id(id)) => Ok(id),
            Some(Scripted::Fail(msg)) => Err(fail(sql, params, msg)),
            Some(other) => Err(fail(sql, params, format!("unexpected script entry {other:?}"))),
        }
    }
}

impl Transactional for MockClient {
    async fn begin(&self) -> OrmResult<()> {
        let mut state = self.lock();
        if state.in_tx {
            return Err(OrmError::validation("transaction already active"));
        }
        state.in_tx = true;
        state.tx_log.push("begin");
        Ok(())
    }

    async fn commit(&self) -> OrmResult<()> {
        let mut state = self.lock();
        if !state.in_tx {
            return Err(OrmError::validation("no active transaction"));
        }
        state.in_tx = false;
        state.tx_log.push("commit");
        Ok(())
    }

    async fn rollback(&self) -> OrmResult<()> {
        let mut state = self.lock();
        if state.in_tx {
            state.in_tx = false;
            state.tx_log.push("rollback");
        }
        Ok(())
    }

    async fn in_transaction(&self) -> bool {
        self.lock().in_tx
    }
}
