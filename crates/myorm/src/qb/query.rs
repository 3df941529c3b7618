//! The statement builder.

use crate::error::{OrmError, OrmResult};
use crate::ident::{quote_ident, quote_path, quote_table};
use crate::qb::clause::{Clause, ClauseList, Predicate, placeholders};
use crate::value::Value;

/// Statement kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Describe,
}

/// Direction of an outer join.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinDirection {
    Left,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
enum JoinKind {
    Natural,
    Inner(String),
    On(String),
    Outer(JoinDirection, String),
    Using(Vec<String>),
}

#[derive(Clone, Debug, PartialEq)]
struct Join {
    table: String,
    kind: JoinKind,
}

#[derive(Clone, Debug, PartialEq)]
struct TableName {
    name: String,
    alias: Option<String>,
}

/// A compiled statement: SQL text plus values in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Fluent builder for one SQL statement.
///
/// Every method consumes and returns the builder. Nothing is rendered until
/// [`Query::build`].
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    kind: QueryKind,
    tables: Vec<TableName>,
    database: Option<String>,
    fields: Vec<String>,
    values: Vec<Value>,
    where_clauses: ClauseList,
    having_clauses: ClauseList,
    joins: Vec<Join>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    count: bool,
    allow_all: bool,
}

macro_rules! predicate_methods {
    ($list:ident;
     $eq:ident, $like:ident, $not_like:ident, $between:ident, $in_:ident,
     $is_null:ident, $is_not_null:ident, $sup:ident, $sup_eq:ident,
     $inf:ident, $inf_eq:ident, $diff:ident, $and:ident, $or:ident,
     $begin:ident, $end:ident, $raw:ident) => {
        /// `column=?`
        pub fn $eq(mut self, column: &str, value: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::compare(column, "=", value));
            self
        }

        /// `column LIKE ?`
        pub fn $like(mut self, column: &str, pattern: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::Like {
                column: column.to_string(),
                pattern: pattern.into(),
                negated: false,
            });
            self
        }

        /// `column NOT LIKE ?`
        pub fn $not_like(mut self, column: &str, pattern: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::Like {
                column: column.to_string(),
                pattern: pattern.into(),
                negated: true,
            });
            self
        }

        /// `column BETWEEN ? AND ?`
        pub fn $between(
            mut self,
            column: &str,
            from: impl Into<Value>,
            to: impl Into<Value>,
        ) -> Self {
            self.$list.predicate(Predicate::Between {
                column: column.to_string(),
                from: from.into(),
                to: to.into(),
            });
            self
        }

        /// `column IN (?,...)`; an empty list matches nothing.
        pub fn $in_<V: Into<Value>>(
            mut self,
            column: &str,
            values: impl IntoIterator<Item = V>,
        ) -> Self {
            self.$list.predicate(Predicate::In {
                column: column.to_string(),
                values: values.into_iter().map(Into::into).collect(),
            });
            self
        }

        /// `column IS NULL`
        pub fn $is_null(mut self, column: &str) -> Self {
            self.$list.predicate(Predicate::NullCheck {
                column: column.to_string(),
                is_null: true,
            });
            self
        }

        /// `column IS NOT NULL`
        pub fn $is_not_null(mut self, column: &str) -> Self {
            self.$list.predicate(Predicate::NullCheck {
                column: column.to_string(),
                is_null: false,
            });
            self
        }

        /// `column>?`
        pub fn $sup(mut self, column: &str, value: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::compare(column, ">", value));
            self
        }

        /// `column>=?`
        pub fn $sup_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::compare(column, ">=", value));
            self
        }

        /// `column<?`
        pub fn $inf(mut self, column: &str, value: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::compare(column, "<", value));
            self
        }

        /// `column<=?`
        pub fn $inf_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::compare(column, "<=", value));
            self
        }

        /// `column<>?`
        pub fn $diff(mut self, column: &str, value: impl Into<Value>) -> Self {
            self.$list.predicate(Predicate::compare(column, "<>", value));
            self
        }

        /// `AND` between the previous and the next operand.
        pub fn $and(mut self) -> Self {
            self.$list.push(Clause::And);
            self
        }

        /// `OR` between the previous and the next operand.
        pub fn $or(mut self) -> Self {
            self.$list.push(Clause::Or);
            self
        }

        /// Open a parenthesized group.
        pub fn $begin(mut self) -> Self {
            self.$list.push(Clause::BeginGroup);
            self
        }

        /// Close the innermost group.
        pub fn $end(mut self) -> Self {
            self.$list.push(Clause::EndGroup);
            self
        }

        /// Raw fragment with its own `?` placeholders. An empty fragment is ignored.
        pub fn $raw<V: Into<Value>>(
            mut self,
            sql: &str,
            values: impl IntoIterator<Item = V>,
        ) -> Self {
            if !sql.trim().is_empty() {
                self.$list.predicate(Predicate::Raw {
                    sql: sql.to_string(),
                    values: values.into_iter().map(Into::into).collect(),
                });
            }
            self
        }
    };
}

impl Query {
    /// Create a builder of the given kind for a table.
    pub fn new(kind: QueryKind, table: &str) -> Self {
        Self {
            kind,
            tables: vec![TableName {
                name: table.to_string(),
                alias: None,
            }],
            database: None,
            fields: Vec::new(),
            values: Vec::new(),
            where_clauses: ClauseList::new(),
            having_clauses: ClauseList::new(),
            joins: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            count: false,
            allow_all: false,
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    // ==================== Tables ====================

    /// Qualify every table with a database (schema) name.
    pub fn database(mut self, database: &str) -> Self {
        self.database = Some(database.to_string());
        self
    }

    /// Add another table (`FROM a, b`).
    pub fn table(mut self, table: &str) -> Self {
        self.tables.push(TableName {
            name: table.to_string(),
            alias: None,
        });
        self
    }

    /// Add another table with an alias.
    pub fn table_as(mut self, table: &str, alias: &str) -> Self {
        self.tables.push(TableName {
            name: table.to_string(),
            alias: Some(alias.to_string()),
        });
        self
    }

    /// Alias the primary table.
    pub fn alias(mut self, alias: &str) -> Self {
        if let Some(first) = self.tables.first_mut() {
            first.alias = Some(alias.to_string());
        }
        self
    }

    // ==================== Fields & values ====================

    /// Replace the projected / written columns.
    pub fn fields<S: AsRef<str>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Append columns.
    pub fn add_fields<S: AsRef<str>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields
            .extend(fields.into_iter().map(|f| f.as_ref().to_string()));
        self
    }

    /// Replace the positional INSERT/UPDATE values.
    pub fn values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Append one column together with its value.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.push(field.to_string());
        self.values.push(value.into());
        self
    }

    // ==================== WHERE / HAVING ====================

    predicate_methods!(where_clauses;
        where_equal, where_like, where_not_like, where_between, where_in,
        where_is_null, where_is_not_null, where_superior, where_superior_equal,
        where_inferior, where_inferior_equal, where_different, where_and, where_or,
        where_begin_group, where_end_group, where_raw);

    predicate_methods!(having_clauses;
        having_equal, having_like, having_not_like, having_between, having_in,
        having_is_null, having_is_not_null, having_superior, having_superior_equal,
        having_inferior, having_inferior_equal, having_different, having_and, having_or,
        having_begin_group, having_end_group, having_raw);

    /// Whether any WHERE predicate was added.
    pub fn has_where(&self) -> bool {
        self.where_clauses.has_predicates()
    }

    /// Permit UPDATE/DELETE execution without a WHERE predicate.
    pub fn allow_all(mut self) -> Self {
        self.allow_all = true;
        self
    }

    // ==================== JOIN ====================

    /// `NATURAL JOIN table`
    pub fn join_natural(mut self, table: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            kind: JoinKind::Natural,
        });
        self
    }

    /// `INNER JOIN table ON (on)`
    pub fn join_inner(mut self, table: &str, on: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            kind: JoinKind::Inner(on.to_string()),
        });
        self
    }

    /// `JOIN table ON (on)`
    pub fn join_on(mut self, table: &str, on: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            kind: JoinKind::On(on.to_string()),
        });
        self
    }

    /// `LEFT|RIGHT OUTER JOIN table ON (on)`
    pub fn join_outer(mut self, direction: JoinDirection, table: &str, on: &str) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            kind: JoinKind::Outer(direction, on.to_string()),
        });
        self
    }

    /// `LEFT OUTER JOIN table ON (on)`
    pub fn join_outer_left(self, table: &str, on: &str) -> Self {
        self.join_outer(JoinDirection::Left, table, on)
    }

    /// `JOIN table USING (columns)`
    pub fn join_using<S: AsRef<str>>(
        mut self,
        table: &str,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.joins.push(Join {
            table: table.to_string(),
            kind: JoinKind::Using(columns.into_iter().map(|c| c.as_ref().to_string()).collect()),
        });
        self
    }

    // ==================== Grouping, ordering, paging ====================

    pub fn group_by<S: AsRef<str>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.group_by
            .extend(columns.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    /// Append an ORDER BY term, e.g. `"created_at DESC"`.
    pub fn order_by(mut self, clause: &str) -> Self {
        if !clause.trim().is_empty() {
            self.order_by.push(clause.trim().to_string());
        }
        self
    }

    /// Append several ORDER BY terms.
    pub fn order_by_list<S: AsRef<str>>(mut self, clauses: impl IntoIterator<Item = S>) -> Self {
        for c in clauses {
            self = self.order_by(c.as_ref());
        }
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

    // ==================== Compilation ====================

    /// Derive the row-count query for this SELECT.
    ///
    /// ORDER BY and LIMIT/OFFSET are dropped. With GROUP BY or HAVING the
    /// grouped query becomes a subquery, so the result is the number of
    /// groups. The subquery projects `1`, or the explicit fields when a
    /// HAVING predicate may refer to their aliases.
    pub fn to_count(&self) -> Query {
        let mut q = self.clone();
        q.kind = QueryKind::Select;
        q.order_by.clear();
        q.limit = None;
        q.offset = None;
        q.count = true;
        q
    }

    /// Compile to SQL text and the ordered value list.
    pub fn build(&self) -> OrmResult<Statement> {
        let mut params = Vec::new();
        let sql = match self.kind {
            QueryKind::Select if self.count => self.build_count(&mut params)?,
            QueryKind::Select => self.build_select(&mut params)?,
            QueryKind::Insert => self.build_insert(&mut params)?,
            QueryKind::Update => self.build_update(&mut params)?,
            QueryKind::Delete => self.build_delete(&mut params)?,
            QueryKind::Describe => format!("DESCRIBE {}", self.primary_table()?),
        };
        Ok(Statement { sql, params })
    }

    /// Compiled SQL, or an empty string if the builder is incomplete.
    pub fn to_sql(&self) -> String {
        self.build().map(|s| s.sql).unwrap_or_default()
    }

    /// Bound values in placeholder order: INSERT/UPDATE values, then WHERE,
    /// then HAVING. Empty if the builder is incomplete.
    pub fn params(&self) -> Vec<Value> {
        self.build().map(|s| s.params).unwrap_or_default()
    }

    /// Check that the statement is safe to execute.
    pub fn validate(&self) -> OrmResult<()> {
        if matches!(self.kind, QueryKind::Update | QueryKind::Delete)
            && !self.allow_all
            && !self.where_clauses.has_predicates()
        {
            return Err(OrmError::validation(format!(
                "{:?} without WHERE requires allow_all()",
                self.kind
            )));
        }
        Ok(())
    }

    fn primary_table(&self) -> OrmResult<String> {
        let Some(first) = self.tables.first() else {
            return Err(OrmError::validation("no table given"));
        };
        if first.name.trim().is_empty() {
            return Err(OrmError::validation("no table given"));
        }
        Ok(self.render_table(first))
    }

    fn render_table(&self, t: &TableName) -> String {
        let mut s = quote_table(self.database.as_deref(), &t.name);
        if let Some(alias) = &t.alias {
            s.push_str(" AS ");
            s.push_str(&quote_ident(alias));
        }
        s
    }

    fn render_tables(&self) -> OrmResult<String> {
        self.primary_table()?;
        Ok(self
            .tables
            .iter()
            .map(|t| self.render_table(t))
            .collect::<Vec<_>>()
            .join(","))
    }

    fn render_fields(fields: &[String]) -> String {
        if fields.is_empty() {
            return "*".to_string();
        }
        fields
            .iter()
            .map(|f| quote_path(f))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn render_joins(&self, sql: &mut String) {
        for j in &self.joins {
            let table = quote_table(self.database.as_deref(), &j.table);
            match &j.kind {
                JoinKind::Natural => sql.push_str(&format!(" NATURAL JOIN {table}")),
                JoinKind::Inner(on) => sql.push_str(&format!(" INNER JOIN {table} ON ({on})")),
                JoinKind::On(on) => sql.push_str(&format!(" JOIN {table} ON ({on})")),
                JoinKind::Outer(dir, on) => {
                    let dir = match dir {
                        JoinDirection::Left => "LEFT",
                        JoinDirection::Right => "RIGHT",
                    };
                    sql.push_str(&format!(" {dir} OUTER JOIN {table} ON ({on})"));
                }
                JoinKind::Using(cols) => {
                    let cols = cols
                        .iter()
                        .map(|c| quote_path(c))
                        .collect::<Vec<_>>()
                        .join(",");
                    sql.push_str(&format!(" JOIN {table} USING ({cols})"));
                }
            }
        }
    }

    fn render_where(&self, sql: &mut String, params: &mut Vec<Value>) -> OrmResult<()> {
        let text = self.where_clauses.render(params)?;
        if !text.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&text);
        }
        Ok(())
    }

    fn render_group_having(&self, sql: &mut String, params: &mut Vec<Value>) -> OrmResult<()> {
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&Self::render_fields(&self.group_by));
        }
        let having = self.having_clauses.render(params)?;
        if !having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }
        Ok(())
    }

    fn render_order_limit(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(","));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // MySQL has no bare OFFSET.
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {offset}", u64::MAX)),
            (None, None) => {}
        }
    }

    fn build_select(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            Self::render_fields(&self.fields),
            self.render_tables()?
        );
        self.render_joins(&mut sql);
        self.render_where(&mut sql, params)?;
        self.render_group_having(&mut sql, params)?;
        self.render_order_limit(&mut sql);
        Ok(sql)
    }

    fn build_count(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        let tables = self.render_tables()?;
        let grouped = !self.group_by.is_empty() || self.having_clauses.has_predicates();

        if !grouped {
            let mut sql = format!("SELECT COUNT(*) FROM {tables}");
            self.render_joins(&mut sql);
            self.render_where(&mut sql, params)?;
            return Ok(sql);
        }

        // Only HAVING can refer to a select alias. Group columns are never
        // projected: `o.id` and `c.id` would collide inside the derived table.
        let projection = if self.having_clauses.has_predicates() && !self.fields.is_empty() {
            Self::render_fields(&self.fields)
        } else {
            "1".to_string()
        };
        let mut inner = format!("SELECT {projection} FROM {tables}");
        self.render_joins(&mut inner);
        self.render_where(&mut inner, params)?;
        self.render_group_having(&mut inner, params)?;
        Ok(format!("SELECT COUNT(*) FROM ({inner}) AS `t`"))
    }

    fn check_writes(&self) -> OrmResult<()> {
        if self.fields.is_empty() {
            return Err(OrmError::validation(format!(
                "{:?} requires at least one field",
                self.kind
            )));
        }
        if self.fields.len() != self.values.len() {
            return Err(OrmError::validation(format!(
                "{:?} has {} fields but {} values",
                self.kind,
                self.fields.len(),
                self.values.len()
            )));
        }
        Ok(())
    }

    fn build_insert(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        let table = self.primary_table()?;
        self.check_writes()?;
        params.extend(self.values.iter().cloned());
        Ok(format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            Self::render_fields(&self.fields),
            placeholders(self.values.len())
        ))
    }

    fn build_update(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        let mut sql = format!("UPDATE {}", self.primary_table()?);
        self.check_writes()?;
        self.render_joins(&mut sql);
        let sets = self
            .fields
            .iter()
            .map(|f| format!("{}=?", quote_path(f)))
            .collect::<Vec<_>>()
            .join(",");
        sql.push_str(" SET ");
        sql.push_str(&sets);
        params.extend(self.values.iter().cloned());
        self.render_where(&mut sql, params)?;
        Ok(sql)
    }

    fn build_delete(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        let table = self.primary_table()?;
        let mut sql = if self.joins.is_empty() {
            format!("DELETE FROM {table}")
        } else {
            // Multi-table form names the target explicitly.
            let target = match self.tables.first().and_then(|t| t.alias.as_deref()) {
                Some(alias) => quote_ident(alias),
                None => quote_table(self.database.as_deref(), &self.tables[0].name),
            };
            format!("DELETE {target} FROM {table}")
        };
        self.render_joins(&mut sql);
        self.render_where(&mut sql, params)?;
        Ok(sql)
    }
}
