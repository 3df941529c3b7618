use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    /// User overrides from `[models.types]` (normalized MySQL type -> Rust type).
    custom: BTreeMap<String, String>,
}

impl TypeMapper {
    pub fn new(custom: BTreeMap<String, String>) -> Self {
        let mut normalized = BTreeMap::new();
        for (k, v) in custom {
            normalized.insert(normalize_mysql_type(&k), v);
        }
        Self { custom: normalized }
    }

    /// Rust type for a `DESCRIBE` type such as `int(10) unsigned`.
    ///
    /// Types are spelled through `myorm::types` so generated files need no
    /// extra dependencies.
    pub fn map(&self, sql_type: &str) -> String {
        let normalized = normalize_mysql_type(sql_type);

        if let Some(t) = self.custom.get(&normalized) {
            return t.clone();
        }

        // `tinyint(1)` is MySQL's boolean.
        if is_tinyint_one(sql_type) {
            return "bool".to_string();
        }

        let (base, unsigned) = match normalized.strip_suffix(" unsigned") {
            Some(base) => (base, true),
            None => (normalized.as_str(), false),
        };
        let base = base.strip_suffix(" zerofill").unwrap_or(base);

        let ty = match (base, unsigned) {
            ("bool" | "boolean", _) => "bool",

            ("tinyint", false) => "i8",
            ("tinyint", true) => "u8",
            ("smallint", false) => "i16",
            ("smallint", true) => "u16",
            ("mediumint" | "int" | "integer", false) => "i32",
            ("mediumint" | "int" | "integer", true) => "u32",
            ("bigint", false) => "i64",
            ("bigint", true) | ("serial", _) => "u64",
            ("year", _) => "i32",

            ("float", _) => "f32",
            ("double" | "double precision" | "real", _) => "f64",
            ("decimal" | "numeric" | "dec" | "fixed", _) => "myorm::types::Decimal",

            ("char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum"
            | "set", _) => "String",

            ("date", _) => "myorm::types::NaiveDate",
            ("time", _) => "myorm::types::NaiveTime",
            ("datetime" | "timestamp", _) => "myorm::types::NaiveDateTime",

            ("json", _) => "myorm::types::JsonValue",

            ("binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" | "bit"
            | "geometry" | "point" | "linestring" | "polygon", _) => "Vec<u8>",

            _ => "String",
        };
        ty.to_string()
    }
}

fn is_tinyint_one(sql_type: &str) -> bool {
    let s = sql_type.trim().to_ascii_lowercase();
    s == "tinyint(1)"
}

pub fn normalize_mysql_type(sql_type: &str) -> String {
    // Lowercase, drop `(…)` length / value lists, compress spaces.
    let mut s = sql_type.trim().to_ascii_lowercase();

    while let Some(start) = s.find('(') {
        let Some(end) = s[start..].find(')') else {
            break;
        };
        s.replace_range(start..start + end + 1, "");
    }

    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_lengths() {
        assert_eq!(normalize_mysql_type("varchar(255)"), "varchar");
        assert_eq!(normalize_mysql_type("INT(10)  UNSIGNED"), "int unsigned");
        assert_eq!(normalize_mysql_type("enum('a','b')"), "enum");
        assert_eq!(normalize_mysql_type("decimal(10,2)"), "decimal");
    }

    #[test]
    fn map_builtin_types() {
        let m = TypeMapper::default();
        assert_eq!(m.map("int(11)"), "i32");
        assert_eq!(m.map("int(10) unsigned"), "u32");
        assert_eq!(m.map("bigint(20) unsigned"), "u64");
        assert_eq!(m.map("tinyint(1)"), "bool");
        assert_eq!(m.map("tinyint(4)"), "i8");
        assert_eq!(m.map("decimal(10,2)"), "myorm::types::Decimal");
        assert_eq!(m.map("datetime"), "myorm::types::NaiveDateTime");
        assert_eq!(m.map("json"), "myorm::types::JsonValue");
        assert_eq!(m.map("enum('new','paid')"), "String");
        assert_eq!(m.map("longblob"), "Vec<u8>");
        assert_eq!(m.map("something_exotic"), "String");
    }

    #[test]
    fn custom_mapping_overrides_builtin() {
        let mut custom = BTreeMap::new();
        custom.insert("DATETIME".to_string(), "String".to_string());
        let m = TypeMapper::new(custom);
        assert_eq!(m.map("datetime"), "String");
        assert_eq!(m.map("date"), "myorm::types::NaiveDate");
    }
}
