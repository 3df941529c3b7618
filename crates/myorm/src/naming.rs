//! Foreign-key naming convention.
//!
//! A column named `<base>_id` refers to the table `<base>` or its plural.

/// Suffix that marks a foreign-key column.
pub const FK_SUFFIX: &str = "_id";

/// `customer_id` -> `customer`. `None` for columns outside the convention.
pub fn foreign_key_base(column: &str) -> Option<&str> {
    column.strip_suffix(FK_SUFFIX).filter(|base| !base.is_empty())
}

/// Naive English plural used to match `<base>_id` against table names.
pub fn pluralize(base: &str) -> String {
    if base.ends_with('y')
        && base.len() > 1
        && !matches!(
            base.chars().nth(base.len() - 2),
            Some('a' | 'e' | 'i' | 'o' | 'u')
        )
    {
        format!("{}ies", &base[..base.len() - 1])
    } else if base.ends_with('s')
        || base.ends_with('x')
        || base.ends_with('z')
        || base.ends_with("ch")
        || base.ends_with("sh")
    {
        format!("{base}es")
    } else {
        format!("{base}s")
    }
}

/// Table names a `<base>_id` column may point at, singular first.
pub fn reference_candidates(column: &str) -> Option<[String; 2]> {
    foreign_key_base(column).map(|base| [base.to_string(), pluralize(base)])
}
