use crate::config::ModelsConfig;
use crate::type_mapper::TypeMapper;
use crate::write::{GeneratedFile, SyncTarget};
use heck::{ToSnakeCase, ToUpperCamelCase};
use myorm::entity::KeyKind;
use myorm::naming;
use myorm::schema::{ColumnInfo, SchemaSnapshot, TableInfo};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// First line of every generated file; stale cleanup only removes files
/// that start with it.
pub const BANNER: &str = "// AUTO-GENERATED by myorm - DO NOT MODIFY.";

/// Inherent names a column getter must not take: they would shadow the
/// `Entity` methods or the generated constructors.
const RESERVED_GETTERS: &[&str] = &[
    "new",
    "default",
    "clone",
    "descriptor",
    "from_record",
    "try_from_record",
    "record",
    "record_mut",
    "into_record",
    "select",
    "find_query",
    "find_by",
    "find_first_by",
    "find_by_id",
    "exists",
    "save",
    "remove",
    "replace",
];

/// Everything one `myorm model` run produces for a connection.
#[derive(Debug, Clone)]
pub struct ModelPlan {
    pub files: Vec<GeneratedFile>,
    pub target: SyncTarget,
}

/// Directory holding a connection's generated files.
pub fn base_dir(out_root: &Path, connection: &str) -> PathBuf {
    out_root.join(format!("c_{connection}")).join("base")
}

#[derive(Debug, Clone)]
struct TableNames {
    module: String,
    struct_name: String,
}

impl TableNames {
    fn for_table(table: &str) -> Self {
        Self {
            module: sanitize_field_ident(table),
            struct_name: sanitize_type_ident(&table.to_upper_camel_case()),
        }
    }

    fn file_name(&self) -> String {
        format!("{}.rs", module_file_stem(&self.module))
    }
}

pub fn generate_models(
    out_root: &Path,
    connection: &str,
    cfg: &ModelsConfig,
    snapshot: &SchemaSnapshot,
) -> anyhow::Result<ModelPlan> {
    let dir = base_dir(out_root, connection);
    let type_mapper = TypeMapper::new(cfg.types.clone());

    let (tables, skipped) = select_tables(cfg, snapshot)?;

    // Modules that will exist after this run: generated ones plus files
    // kept for tables that failed introspection.
    let mut modules: BTreeMap<String, TableNames> = BTreeMap::new();
    let mut keep: BTreeSet<PathBuf> = BTreeSet::new();
    for t in &tables {
        modules.insert(t.name.clone(), TableNames::for_table(&t.name));
    }
    for name in &skipped {
        let names = TableNames::for_table(name);
        let path = dir.join(names.file_name());
        if path.exists() {
            tracing::warn!(table = %name, file = %path.display(), "keeping previous model");
            keep.insert(path);
            modules.insert(name.clone(), names);
        } else {
            tracing::warn!(table = %name, "no previous model to keep");
        }
    }
    check_unique(&modules)?;

    let mut files = Vec::with_capacity(tables.len() + 1);
    files.push(GeneratedFile {
        path: dir.join("mod.rs"),
        content: generate_mod_rs(&modules),
    });

    for t in &tables {
        let names = &modules[&t.name];
        let content = generate_table_module_rs(&type_mapper, connection, t, names, &modules)?;
        files.push(GeneratedFile {
            path: dir.join(names.file_name()),
            content,
        });
    }

    Ok(ModelPlan {
        files,
        target: SyncTarget { dir, keep },
    })
}

/// Tables to generate, and configured tables that were skipped.
fn select_tables<'a>(
    cfg: &ModelsConfig,
    snapshot: &'a SchemaSnapshot,
) -> anyhow::Result<(Vec<&'a TableInfo>, Vec<String>)> {
    let mut tables: Vec<&TableInfo> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();

    if cfg.tables.is_empty() {
        tables.extend(snapshot.tables.iter());
        skipped.extend(snapshot.skipped.iter().map(|s| s.name.clone()));
    } else {
        for name in &cfg.tables {
            let name = name.trim();
            if let Some(t) = snapshot.find_table(name) {
                tables.push(t);
            } else if snapshot.is_skipped(name) {
                skipped.push(name.to_string());
            } else {
                anyhow::bail!("table not found: {name}");
            }
        }
    }

    tables.sort_by(|a, b| a.name.cmp(&b.name));
    tables.dedup_by(|a, b| a.name == b.name);
    skipped.sort();
    skipped.dedup();
    Ok((tables, skipped))
}

fn check_unique(modules: &BTreeMap<String, TableNames>) -> anyhow::Result<()> {
    let mut seen_modules: BTreeMap<&str, &str> = BTreeMap::new();
    let mut seen_structs: BTreeMap<&str, &str> = BTreeMap::new();
    for (table, names) in modules {
        if let Some(other) = seen_modules.insert(&names.module, table) {
            anyhow::bail!(
                "tables `{other}` and `{table}` map to the same module name: {}",
                names.module
            );
        }
        if let Some(other) = seen_structs.insert(&names.struct_name, table) {
            anyhow::bail!(
                "tables `{other}` and `{table}` map to the same struct name: {}",
                names.struct_name
            );
        }
    }
    Ok(())
}

fn generate_mod_rs(modules: &BTreeMap<String, TableNames>) -> String {
    let mut names: Vec<&TableNames> = modules.values().collect();
    names.sort_by(|a, b| a.module.cmp(&b.module));

    let mut out = String::new();
    out.push_str(BANNER);
    out.push_str("\n\n");

    for n in &names {
        let _ = writeln!(out, "pub mod {};", n.module);
    }
    out.push('\n');
    for n in &names {
        let _ = writeln!(out, "pub use {}::{};", n.module, n.struct_name);
    }

    out.push_str("\n/// Every generated table, for `myorm::Registry::from_descriptors`.\n");
    out.push_str("pub static REGISTRY: &[&myorm::entity::TableDescriptor] = &[\n");
    for n in &names {
        let _ = writeln!(out, "    &{}::DESCRIPTOR,", n.module);
    }
    out.push_str("];\n");
    out
}

#[derive(Debug)]
struct Accessor {
    getter: String,
    setter: String,
    column: String,
    ty: String,
    nullable: bool,
}

#[derive(Debug)]
struct Relation {
    getter: String,
    setter: String,
    column: String,
    model_path: String,
}

fn generate_table_module_rs(
    type_mapper: &TypeMapper,
    connection: &str,
    t: &TableInfo,
    names: &TableNames,
    modules: &BTreeMap<String, TableNames>,
) -> anyhow::Result<String> {
    let accessors = column_accessors(type_mapper, t)?;
    let taken: BTreeSet<&str> = accessors
        .iter()
        .flat_map(|a| [a.getter.trim_start_matches("r#"), a.setter.as_str()])
        .collect();
    let relations = relation_accessors(t, modules, &taken);
    let struct_name = &names.struct_name;

    let mut out = String::new();
    out.push_str(BANNER);
    out.push('\n');
    let _ = writeln!(
        out,
        "// Table `{}` on connection `{connection}`.\n",
        t.name
    );
    out.push_str("use myorm::entity::{ColumnDescriptor, Entity, KeyKind, Record, TableDescriptor};\n\n");

    // Descriptor literal.
    out.push_str("pub static DESCRIPTOR: TableDescriptor = TableDescriptor {\n");
    let _ = writeln!(out, "    connection: {connection:?},");
    let _ = writeln!(out, "    table: {:?},", t.name);
    out.push_str("    columns: &[\n");
    for c in &t.columns {
        render_column_descriptor(&mut out, c);
    }
    out.push_str("    ],\n};\n\n");

    // Struct and trait impls.
    let _ = write!(
        out,
        "\
#[derive(Debug, Clone)]
pub struct {struct_name} {{
    record: Record,
}}

impl Default for {struct_name} {{
    fn default() -> Self {{
        Self {{
            record: Record::new(&DESCRIPTOR),
        }}
    }}
}}

impl Entity for {struct_name} {{
    fn descriptor() -> &'static TableDescriptor {{
        &DESCRIPTOR
    }}

    fn from_record(record: Record) -> Self {{
        Self {{ record }}
    }}

    fn record(&self) -> &Record {{
        &self.record
    }}

    fn record_mut(&mut self) -> &mut Record {{
        &mut self.record
    }}

    fn into_record(self) -> Record {{
        self.record
    }}
}}

impl {struct_name} {{
    pub fn new() -> Self {{
        Self::default()
    }}
"
    );

    for a in &accessors {
        let param_ty = if a.nullable {
            format!("Option<{}>", a.ty)
        } else {
            a.ty.clone()
        };
        let _ = write!(
            out,
            "
    pub fn {getter}(&self) -> Option<{ty}> {{
        self.record.get({column:?})
    }}

    pub fn {setter}(&mut self, value: {param_ty}) -> &mut Self {{
        self.record.set({column:?}, value);
        self
    }}
",
            getter = a.getter,
            setter = a.setter,
            ty = a.ty,
            column = a.column,
        );
    }

    for r in &relations {
        let _ = write!(
            out,
            "
    pub fn {getter}(&self) -> Option<{path}> {{
        self.record
            .related({column:?})
            .cloned()
            .map({path}::from_record)
    }}

    pub fn {setter}(&mut self, related: {path}) -> &mut Self {{
        self.record.attach({column:?}, related.into_record());
        self
    }}
",
            getter = r.getter,
            setter = r.setter,
            path = r.model_path,
            column = r.column,
        );
    }

    out.push_str("}\n");
    Ok(out)
}

fn render_column_descriptor(out: &mut String, c: &ColumnInfo) {
    let default = match &c.default {
        Some(d) => format!("Some({d:?})"),
        None => "None".to_string(),
    };
    let references = match &c.references {
        Some(r) => format!("Some({r:?})"),
        None => "None".to_string(),
    };
    let _ = write!(
        out,
        "        ColumnDescriptor {{
            name: {name:?},
            sql_type: {sql_type:?},
            nullable: {nullable},
            key: {key},
            default: {default},
            extra: {extra:?},
            references: {references},
        }},
",
        name = c.name,
        sql_type = c.sql_type,
        nullable = c.nullable,
        key = c.key.as_path(),
        extra = c.extra,
    );
}

fn column_accessors(type_mapper: &TypeMapper, t: &TableInfo) -> anyhow::Result<Vec<Accessor>> {
    // Getters and setters share one namespace: a column `set_x` collides
    // with the setter of a column `x`.
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::with_capacity(t.columns.len());
    for c in &t.columns {
        let base = sanitize_field_ident(&c.name);
        let bare = base.trim_start_matches("r#").to_string();
        let first = if RESERVED_GETTERS.contains(&base.as_str()) {
            None
        } else {
            Some(base)
        };
        let candidates = first.into_iter().chain([format!("{bare}_value")]);

        let mut chosen = None;
        for getter in candidates {
            let setter = format!("set_{}", getter.trim_start_matches("r#"));
            let free = |n: &str| !seen.contains(n);
            if free(getter.trim_start_matches("r#")) && free(&setter) {
                chosen = Some((getter, setter));
                break;
            }
        }
        let Some((getter, setter)) = chosen else {
            anyhow::bail!(
                "duplicate accessor name after sanitization in {}: {bare}",
                t.name
            );
        };
        seen.insert(getter.trim_start_matches("r#").to_string());
        seen.insert(setter.clone());

        out.push(Accessor {
            getter,
            setter,
            column: c.name.clone(),
            ty: type_mapper.map(&c.sql_type),
            nullable: c.nullable,
        });
    }
    Ok(out)
}

fn relation_accessors(
    t: &TableInfo,
    modules: &BTreeMap<String, TableNames>,
    taken: &BTreeSet<&str>,
) -> Vec<Relation> {
    let mut used: BTreeSet<String> = taken.iter().map(|s| s.to_string()).collect();
    let mut out = Vec::new();

    for c in &t.columns {
        if c.key != KeyKind::Foreign {
            continue;
        }
        let Some(target) = c.references.as_deref() else {
            continue;
        };
        let Some(target_names) = modules.get(target) else {
            tracing::warn!(
                table = %t.name,
                column = %c.name,
                target,
                "referenced table has no model; skipping relation accessor"
            );
            continue;
        };

        let base = naming::foreign_key_base(&c.name)
            .filter(|b| !b.is_empty())
            .map(sanitize_field_ident)
            .unwrap_or_else(|| format!("{}_related", sanitize_field_ident(&c.name)));
        let mut getter = base;
        let bare = getter.trim_start_matches("r#").to_string();
        let clashes = |name: &str| {
            used.contains(name)
                || used.contains(&format!("set_{name}"))
                || RESERVED_GETTERS.contains(&name)
        };
        if clashes(&bare) {
            getter = format!("{bare}_related");
        }
        let bare = getter.trim_start_matches("r#").to_string();
        if clashes(&bare) {
            continue;
        }
        used.insert(bare.clone());
        used.insert(format!("set_{bare}"));

        out.push(Relation {
            setter: format!("set_{bare}"),
            getter,
            column: c.name.clone(),
            model_path: format!(
                "super::{}::{}",
                target_names.module, target_names.struct_name
            ),
        });
    }
    out
}

fn sanitize_type_ident(name: &str) -> String {
    let mut s = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();

    if s.is_empty() {
        s.push('_');
    }
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    if s == "Self" {
        s.push('_');
    }
    s
}

fn module_file_stem(module_ident: &str) -> &str {
    module_ident.trim_start_matches("r#")
}

fn sanitize_field_ident(column: &str) -> String {
    let s = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();
    let mut s = s.to_snake_case();
    if s.is_empty() {
        s.push('_');
    }
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    if matches!(s.as_str(), "self" | "super" | "crate" | "Self") {
        s.push('_');
        return s;
    }
    if is_rust_keyword(&s) {
        format!("r#{s}")
    } else {
        s
    }
}

fn is_rust_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "break"
            | "const"
            | "continue"
            | "else"
            | "enum"
            | "extern"
            | "false"
            | "fn"
            | "for"
            | "if"
            | "impl"
            | "in"
            | "let"
            | "loop"
            | "match"
            | "mod"
            | "move"
            | "mut"
            | "pub"
            | "ref"
            | "return"
            | "static"
            | "struct"
            | "trait"
            | "true"
            | "type"
            | "unsafe"
            | "use"
            | "where"
            | "while"
            | "async"
            | "await"
            | "dyn"
            | "gen"
    )
}
