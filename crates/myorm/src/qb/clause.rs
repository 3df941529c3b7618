//! Clause AST for WHERE/HAVING.
//!
//! Builder calls append [`Clause`] nodes in call order. Nothing is rendered
//! until [`ClauseList::render`], which walks the list once and writes the SQL
//! text and the bound values side by side, so the `?` placeholders and the
//! value list cannot drift apart.
//!
//! Rendering rules:
//! - a combinator is only emitted between two operands; a leading combinator,
//!   one directly after `(`, and a trailing one are dropped
//! - two operands with no combinator between them are joined with `AND`
//! - an empty group renders nothing
//! - unbalanced groups are an error

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// A single predicate. Column text is emitted exactly as given.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// `column<op>?`
    Compare {
        column: String,
        op: &'static str,
        value: Value,
    },
    /// `column LIKE ?` / `column NOT LIKE ?`
    Like {
        column: String,
        pattern: Value,
        negated: bool,
    },
    /// `column BETWEEN ? AND ?`
    Between {
        column: String,
        from: Value,
        to: Value,
    },
    /// `column IN (?,?,...)`; an empty list renders `1=0`.
    In { column: String, values: Vec<Value> },
    /// `column IS NULL` / `column IS NOT NULL`
    NullCheck { column: String, is_null: bool },
    /// Raw text with its own `?` placeholders.
    Raw { sql: String, values: Vec<Value> },
}

impl Predicate {
    pub fn compare(column: &str, op: &'static str, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    /// Write this predicate's SQL and push its values.
    pub fn render(&self, sql: &mut String, params: &mut Vec<Value>) -> OrmResult<()> {
        match self {
            Predicate::Compare { column, op, value } => {
                sql.push_str(column);
                sql.push_str(op);
                sql.push('?');
                params.push(value.clone());
            }
            Predicate::Like {
                column,
                pattern,
                negated,
            } => {
                sql.push_str(column);
                sql.push_str(if *negated { " NOT LIKE ?" } else { " LIKE ?" });
                params.push(pattern.clone());
            }
            Predicate::Between { column, from, to } => {
                sql.push_str(column);
                sql.push_str(" BETWEEN ? AND ?");
                params.push(from.clone());
                params.push(to.clone());
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    sql.push_str("1=0");
                } else {
                    sql.push_str(column);
                    sql.push_str(" IN (");
                    sql.push_str(&placeholders(values.len()));
                    sql.push(')');
                    params.extend(values.iter().cloned());
                }
            }
            Predicate::NullCheck { column, is_null } => {
                sql.push_str(column);
                sql.push_str(if *is_null { " IS NULL" } else { " IS NOT NULL" });
            }
            Predicate::Raw { sql: raw, values } => {
                let expected = count_placeholders(raw);
                if expected != values.len() {
                    return Err(OrmError::validation(format!(
                        "placeholder count mismatch in `{raw}`: expected {expected} values, got {}",
                        values.len()
                    )));
                }
                sql.push_str(raw);
                params.extend(values.iter().cloned());
            }
        }
        Ok(())
    }
}

/// One node of a WHERE/HAVING clause.
#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Predicate(Predicate),
    And,
    Or,
    BeginGroup,
    EndGroup,
}

/// Ordered list of clause nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClauseList {
    nodes: Vec<Clause>,
}

#[derive(Default)]
struct Level {
    has_operand: bool,
    pending: Option<&'static str>,
    /// Output length before this group's joiner and `(`.
    restore: usize,
    /// Parent's pending combinator at the time the group opened.
    saved_pending: Option<&'static str>,
}

impl ClauseList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: Clause) {
        self.nodes.push(clause);
    }

    pub fn predicate(&mut self, predicate: Predicate) {
        self.nodes.push(Clause::Predicate(predicate));
    }

    pub fn nodes(&self) -> &[Clause] {
        &self.nodes
    }

    /// Whether any predicate was added.
    pub fn has_predicates(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| matches!(n, Clause::Predicate(_)))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Render to SQL text, appending bound values to `params` in placeholder order.
    ///
    /// Returns an empty string when nothing renders.
    pub fn render(&self, params: &mut Vec<Value>) -> OrmResult<String> {
        let mut out = String::new();
        let mut root = Level::default();
        let mut groups: Vec<Level> = Vec::new();

        for node in &self.nodes {
            match node {
                Clause::Predicate(p) => {
                    let level = current(&mut root, &mut groups);
                    if level.has_operand {
                        write_joiner(&mut out, level.pending.take());
                    }
                    level.has_operand = true;
                    level.pending = None;
                    p.render(&mut out, params)?;
                }
                Clause::And | Clause::Or => {
                    let level = current(&mut root, &mut groups);
                    if level.has_operand {
                        level.pending = Some(if *node == Clause::And { "AND" } else { "OR" });
                    }
                }
                Clause::BeginGroup => {
                    let restore = out.len();
                    let parent = current(&mut root, &mut groups);
                    let saved_pending = parent.pending;
                    if parent.has_operand {
                        write_joiner(&mut out, parent.pending.take());
                    }
                    out.push('(');
                    groups.push(Level {
                        restore,
                        saved_pending,
                        ..Level::default()
                    });
                }
                Clause::EndGroup => {
                    let Some(group) = groups.pop() else {
                        return Err(OrmError::validation(
                            "end of group without a matching begin",
                        ));
                    };
                    let parent = current(&mut root, &mut groups);
                    if group.has_operand {
                        out.push(')');
                        parent.has_operand = true;
                        parent.pending = None;
                    } else {
                        out.truncate(group.restore);
                        parent.pending = group.saved_pending;
                    }
                }
            }
        }

        if !groups.is_empty() {
            return Err(OrmError::validation(format!(
                "{} unclosed group(s) in condition",
                groups.len()
            )));
        }

        Ok(out)
    }
}

fn current<'a>(root: &'a mut Level, groups: &'a mut [Level]) -> &'a mut Level {
    match groups.last_mut() {
        Some(level) => level,
        None => root,
    }
}

fn write_joiner(out: &mut String, combinator: Option<&'static str>) {
    out.push(' ');
    out.push_str(combinator.unwrap_or("AND"));
    out.push(' ');
}

/// `?,?,?`
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Count `?` placeholders outside quoted strings and identifiers.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' && q != '`' {
                    chars.next();
                } else if c == q {
                    // Doubled quote is an escaped quote.
                    if chars.peek() == Some(&q) {
                        chars.next();
                    } else {
                        quote = None;
                    }
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(col: &str, v: impl Into<Value>) -> Clause {
        Clause::Predicate(Predicate::compare(col, "=", v))
    }

    fn render(nodes: Vec<Clause>) -> OrmResult<(String, Vec<Value>)> {
        let list = ClauseList { nodes };
        let mut params = Vec::new();
        let sql = list.render(&mut params)?;
        Ok((sql, params))
    }

    #[test]
    fn combinators_only_between_operands() {
        let (sql, params) =
            render(vec![Clause::And, eq("a", 1), Clause::Or, eq("b", 2), Clause::And]).unwrap();
        assert_eq!(sql, "a=? OR b=?");
        assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn adjacent_predicates_default_to_and() {
        let (sql, _) = render(vec![eq("a", 1), eq("b", 2)]).unwrap();
        assert_eq!(sql, "a=? AND b=?");
    }

    #[test]
    fn nested_groups() {
        let (sql, params) = render(vec![
            eq("status", "active"),
            Clause::And,
            Clause::BeginGroup,
            Clause::Or,
            eq("role", "admin"),
            Clause::Or,
            eq("role", "owner"),
            Clause::EndGroup,
        ])
        .unwrap();
        assert_eq!(sql, "status=? AND (role=? OR role=?)");
        assert_eq!(
            params,
            vec![
                Value::from("active"),
                Value::from("admin"),
                Value::from("owner")
            ]
        );
    }

    #[test]
    fn empty_group_disappears() {
        let (sql, _) = render(vec![
            eq("a", 1),
            Clause::Or,
            Clause::BeginGroup,
            Clause::EndGroup,
            eq("b", 2),
        ])
        .unwrap();
        assert_eq!(sql, "a=? OR b=?");
    }

    #[test]
    fn unbalanced_groups_fail() {
        assert!(render(vec![Clause::BeginGroup, eq("a", 1)]).is_err());
        assert!(render(vec![eq("a", 1), Clause::EndGroup]).is_err());
    }

    #[test]
    fn raw_placeholder_mismatch_fails() {
        let raw = Clause::Predicate(Predicate::Raw {
            sql: "a=? OR b=?".into(),
            values: vec![Value::Int(1)],
        });
        let err = render(vec![raw]).unwrap_err();
        assert!(err.to_string().contains("placeholder count mismatch"));
    }

    #[test]
    fn placeholder_count_skips_literals() {
        assert_eq!(count_placeholders("a = ? AND b = '?' AND `c?` = ?"), 2);
        assert_eq!(count_placeholders("note = 'it''s ?'"), 0);
    }

    #[test]
    fn empty_in_list_is_false() {
        let (sql, params) = render(vec![Clause::Predicate(Predicate::In {
            column: "id".into(),
            values: vec![],
        })])
        .unwrap();
        assert_eq!(sql, "1=0");
        assert!(params.is_empty());
    }
}
