//! Dynamic row with change tracking.

use crate::entity::descriptor::TableDescriptor;
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::{FromValue, Value};
use std::collections::BTreeMap;

/// Column values as they were when the record was last loaded or saved.
///
/// A plain value map: a snapshot never carries related records or another
/// snapshot.
pub type Snapshot = BTreeMap<String, Value>;

/// Lifecycle position of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never loaded or saved.
    New,
    /// Matches its snapshot.
    Persisted,
    /// Has changes relative to its snapshot.
    Dirty,
    /// Removed from storage.
    Deleted,
}

/// A row of one table: current values, the snapshot they are diffed against,
/// and related records attached by foreign-key column.
#[derive(Debug, Clone)]
pub struct Record {
    pub(super) descriptor: &'static TableDescriptor,
    pub(super) values: BTreeMap<String, Value>,
    pub(super) related: BTreeMap<String, Record>,
    pub(super) snapshot: Option<Snapshot>,
    pub(super) deleted: bool,
}

impl Record {
    /// A new, unsaved record with no values set.
    pub fn new(descriptor: &'static TableDescriptor) -> Self {
        Self {
            descriptor,
            values: BTreeMap::new(),
            related: BTreeMap::new(),
            snapshot: None,
            deleted: false,
        }
    }

    /// A record loaded from storage. Columns the table does not declare are
    /// dropped; the snapshot is taken immediately.
    pub fn hydrate(descriptor: &'static TableDescriptor, row: Row) -> Self {
        let mut record = Self::new(descriptor);
        for (column, value) in row.into_map() {
            if descriptor.has_column(&column) {
                record.values.insert(column, value);
            }
        }
        record.take_snapshot();
        record
    }

    pub fn descriptor(&self) -> &'static TableDescriptor {
        self.descriptor
    }

    pub fn table(&self) -> &'static str {
        self.descriptor.table
    }

    /// Typed value of a column. `None` when unset, null, or not convertible.
    pub fn get<T: FromValue>(&self, column: &str) -> Option<T> {
        self.values.get(column).and_then(T::from_value)
    }

    /// Raw value of a column. `None` when unset.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn is_set(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// All set values.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Set a column. Any record attached to that column is detached.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.related.remove(column);
        self.values.insert(column.to_string(), value.into());
        self
    }

    /// Forget a column's value so it is left out of the next write.
    pub fn unset(&mut self, column: &str) -> &mut Self {
        self.related.remove(column);
        self.values.remove(column);
        self
    }

    /// Attach a related record to a foreign-key column.
    ///
    /// When the related record has an identity the column takes it now;
    /// otherwise it is saved first and the column is filled in on save.
    pub fn attach(&mut self, column: &str, related: Record) -> &mut Self {
        if let Some(id) = related.identity() {
            self.values.insert(column.to_string(), id);
        }
        self.related.insert(column.to_string(), related);
        self
    }

    pub fn related(&self, column: &str) -> Option<&Record> {
        self.related.get(column)
    }

    pub fn related_mut(&mut self, column: &str) -> Option<&mut Record> {
        self.related.get_mut(column)
    }

    /// Detach and return the related record of a column.
    pub fn take_related(&mut self, column: &str) -> Option<Record> {
        self.related.remove(column)
    }

    /// Value of the first primary-key column, when set and not null.
    pub fn identity(&self) -> Option<Value> {
        let pk = self.descriptor.primary_key()?;
        self.values.get(pk.name).filter(|v| !v.is_null()).cloned()
    }

    /// Primary-key columns with a non-null value. Key values from the
    /// snapshot win over current ones so a changed key still targets the
    /// stored row.
    pub fn key_values(&self) -> Vec<(&'static str, Value)> {
        self.descriptor
            .primary_keys()
            .filter_map(|pk| {
                let stored = self
                    .snapshot
                    .as_ref()
                    .and_then(|s| s.get(pk.name))
                    .filter(|v| !v.is_null());
                let current = self.values.get(pk.name).filter(|v| !v.is_null());
                stored.or(current).map(|v| (pk.name, v.clone()))
            })
            .collect()
    }

    /// Copy values and related records from another record of the same
    /// table. The snapshot is kept, so the copied values show up as changes.
    pub fn replace(&mut self, other: &Record) -> OrmResult<()> {
        if !self.descriptor.same_table(other.descriptor) {
            return Err(OrmError::type_mismatch(
                self.descriptor.qualified_name(),
                other.descriptor.qualified_name(),
            ));
        }
        self.values = other.values.clone();
        self.related = other.related.clone();
        Ok(())
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Make the current values the new baseline.
    pub fn take_snapshot(&mut self) {
        self.snapshot = Some(self.values.clone());
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub(super) fn mark_deleted(&mut self) {
        self.deleted = true;
        self.snapshot = None;
    }

    pub fn state(&self) -> RecordState {
        if self.deleted {
            RecordState::Deleted
        } else if self.snapshot.is_none() {
            RecordState::New
        } else if self.changes().is_empty() {
            RecordState::Persisted
        } else {
            RecordState::Dirty
        }
    }

    /// Changes relative to the snapshot, as columns and storage values.
    pub fn changes(&self) -> Vec<(&'static str, Value)> {
        self.diff(self.snapshot.as_ref())
    }

    /// Columns to write, in declaration order, compared against `baseline`.
    ///
    /// - unset columns are skipped
    /// - columns loosely equal to the baseline are skipped
    /// - null on a NOT NULL column with a literal default writes the
    ///   default; with an expression default the column is skipped
    /// - any other null writes `NULL`
    /// - everything else is written in storage form (`true` as `1`, dates
    ///   as text)
    pub fn diff(&self, baseline: Option<&Snapshot>) -> Vec<(&'static str, Value)> {
        let mut out = Vec::new();
        for column in self.descriptor.columns {
            let current = match self.related.get(column.name).and_then(Record::identity) {
                Some(id) => id,
                None => match self.values.get(column.name) {
                    Some(v) => v.clone(),
                    None => continue,
                },
            };

            if let Some(before) = baseline.and_then(|b| b.get(column.name)) {
                if before.loosely_eq(&current) {
                    continue;
                }
            }

            if current.is_null() {
                if let Some(default) = column.literal_default() {
                    out.push((column.name, default));
                } else if !column.has_expression_default() {
                    out.push((column.name, Value::Null));
                }
                continue;
            }

            out.push((column.name, current.to_storage()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::descriptor::{ColumnDescriptor, KeyKind};
    use chrono::NaiveDate;

    static COLUMNS: [ColumnDescriptor; 5] = [
        ColumnDescriptor {
            name: "id",
            sql_type: "int(11)",
            nullable: false,
            key: KeyKind::Primary,
            default: None,
            extra: "auto_increment",
            references: None,
        },
        ColumnDescriptor {
            name: "status",
            sql_type: "varchar(16)",
            nullable: false,
            key: KeyKind::None,
            default: Some("pending"),
            extra: "",
            references: None,
        },
        ColumnDescriptor {
            name: "note",
            sql_type: "text",
            nullable: true,
            key: KeyKind::None,
            default: None,
            extra: "",
            references: None,
        },
        ColumnDescriptor {
            name: "active",
            sql_type: "tinyint(1)",
            nullable: false,
            key: KeyKind::None,
            default: Some("1"),
            extra: "",
            references: None,
        },
        ColumnDescriptor {
            name: "created_at",
            sql_type: "datetime",
            nullable: false,
            key: KeyKind::None,
            default: Some("CURRENT_TIMESTAMP"),
            extra: "",
            references: None,
        },
    ];

    static TASKS: TableDescriptor = TableDescriptor {
        connection: "main",
        table: "tasks",
        columns: &COLUMNS,
    };

    static OTHER: TableDescriptor = TableDescriptor {
        connection: "main",
        table: "other",
        columns: &[],
    };

    fn loaded() -> Record {
        Record::hydrate(
            &TASKS,
            Row::from_pairs([
                ("id", Value::Int(4)),
                ("status", Value::from("open")),
                ("note", Value::Null),
                ("active", Value::Int(1)),
                ("created_at", Value::from("2024-01-02 03:04:05")),
                ("not_a_column", Value::Int(9)),
            ]),
        )
    }

    #[test]
    fn hydrated_record_is_persisted_and_clean() {
        let r = loaded();
        assert_eq!(r.state(), RecordState::Persisted);
        assert!(r.changes().is_empty());
        assert!(!r.is_set("not_a_column"));
        assert_eq!(r.get::<i64>("id"), Some(4));
        assert_eq!(r.get::<Option<String>>("note"), Some(None));
    }

    #[test]
    fn equivalent_values_are_not_changes() {
        let mut r = loaded();
        r.set("active", true);
        r.set(
            "created_at",
            NaiveDate::from_ymd_opt(2024, 1, 2)
                .and_then(|d| d.and_hms_opt(3, 4, 5))
                .unwrap(),
        );
        r.set("id", 4u64);
        assert!(r.changes().is_empty());
    }

    #[test]
    fn changes_use_storage_form() {
        let mut r = loaded();
        r.set("active", false).set("note", "hello");
        assert_eq!(r.state(), RecordState::Dirty);
        assert_eq!(
            r.changes(),
            vec![("note", Value::from("hello")), ("active", Value::Int(0))]
        );
    }

    #[test]
    fn nulls_fall_back_to_literal_defaults() {
        let mut r = Record::new(&TASKS);
        r.set("status", Value::Null)
            .set("note", Value::Null)
            .set("created_at", Value::Null);
        assert_eq!(
            r.diff(None),
            vec![("status", Value::from("pending")), ("note", Value::Null)]
        );
    }

    #[test]
    fn unset_columns_are_skipped() {
        let mut r = Record::new(&TASKS);
        r.set("note", "x");
        r.unset("note");
        assert!(r.diff(None).is_empty());
        assert_eq!(r.state(), RecordState::New);
    }

    #[test]
    fn snapshot_holds_values_only() {
        let mut r = loaded();
        let mut parent = Record::new(&TASKS);
        parent.set("id", 7);
        r.attach("note", parent);
        r.take_snapshot();
        let snapshot = r.snapshot().unwrap();
        assert_eq!(snapshot.get("note"), Some(&Value::Int(7)));
        assert_eq!(snapshot.len(), r.values().len());
        assert!(r.related("note").unwrap().snapshot().is_none());
    }

    #[test]
    fn key_values_prefer_snapshot() {
        let mut r = loaded();
        r.set("id", 99);
        assert_eq!(r.key_values(), vec![("id", Value::Int(4))]);
        assert_eq!(r.identity(), Some(Value::Int(99)));
    }

    #[test]
    fn replace_checks_table() {
        let mut r = loaded();
        let other = Record::new(&OTHER);
        let err = r.replace(&other).unwrap_err();
        assert!(matches!(err, OrmError::TypeMismatch { .. }));

        let mut fresh = Record::new(&TASKS);
        fresh.replace(&r).unwrap();
        assert_eq!(fresh.get::<String>("status").as_deref(), Some("open"));
    }
}
