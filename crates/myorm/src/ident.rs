//! MySQL identifier quoting.
//!
//! Plain identifiers (`[A-Za-z_][A-Za-z0-9_$]*`) and dotted paths of them are
//! wrapped in backticks. Anything else (already-quoted names, `*`, function
//! calls, arithmetic) is treated as an expression and passed through.
//! Table names are stricter: any bare name is quoted.
//!
//! # Example
//! ```ignore
//! use myorm::ident::{quote_path, quote_table};
//!
//! assert_eq!(quote_path("users.id"), "`users`.`id`");
//! assert_eq!(quote_path("COUNT(*)"), "COUNT(*)");
//! assert_eq!(quote_table(Some("app"), "users"), "`app`.`users`");
//! ```

/// Quote a single identifier, escaping embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Whether `s` is a bare identifier that needs no quoting to be valid.
pub fn is_plain_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

/// Quote a column or table reference if it is a plain (optionally dotted) path.
///
/// `t.*` becomes `` `t`.* ``. Expressions are returned unchanged.
pub fn quote_path(path: &str) -> String {
    let path = path.trim();
    if path == "*" {
        return path.to_string();
    }

    let parts: Vec<&str> = path.split('.').collect();
    let last = parts.len() - 1;
    let plain = parts
        .iter()
        .enumerate()
        .all(|(i, p)| is_plain_ident(p) || (i == last && i > 0 && *p == "*"));
    if !plain {
        return path.to_string();
    }

    parts
        .iter()
        .map(|p| if *p == "*" { "*".to_string() } else { quote_ident(p) })
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a table name, qualifying it with `database` unless it already
/// carries its own qualifier.
///
/// Any bare name is quoted, plain or not (`order-items` is a legal table).
/// Text with whitespace or parentheses (`customers c`, a subquery) and
/// already-quoted text are returned unchanged.
pub fn quote_table(database: Option<&str>, table: &str) -> String {
    let table = table.trim();
    if is_table_expression(table) {
        return table.to_string();
    }
    if let Some((db, name)) = table.split_once('.') {
        return format!("{}.{}", quote_ident(db), quote_ident(name));
    }
    match database {
        Some(db) if !db.is_empty() => format!("{}.{}", quote_ident(db), quote_ident(table)),
        _ => quote_ident(table),
    }
}

fn is_table_expression(table: &str) -> bool {
    table.is_empty()
        || table.contains('`')
        || table.contains('(')
        || table.chars().any(char::is_whitespace)
}
