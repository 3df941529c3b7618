//! Table name to descriptor lookup.

use crate::entity::descriptor::{ColumnDescriptor, KeyKind, TableDescriptor};
use crate::naming;
use std::collections::BTreeMap;

/// Descriptors of every known table, keyed by connection and table name.
///
/// Populated once from the generated `REGISTRY` slices; eager loading uses it
/// to find the table a foreign-key column points at.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tables: BTreeMap<(String, String), &'static TableDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = &'static TableDescriptor>,
    ) -> Self {
        let mut registry = Self::new();
        registry.extend(descriptors);
        registry
    }

    /// Add a descriptor, replacing any previous one for the same table.
    pub fn register(&mut self, descriptor: &'static TableDescriptor) -> &mut Self {
        self.tables.insert(
            (descriptor.connection.to_string(), descriptor.table.to_string()),
            descriptor,
        );
        self
    }

    pub fn extend(&mut self, descriptors: impl IntoIterator<Item = &'static TableDescriptor>) {
        for d in descriptors {
            self.register(d);
        }
    }

    pub fn get(&self, connection: &str, table: &str) -> Option<&'static TableDescriptor> {
        self.tables
            .get(&(connection.to_string(), table.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &'static TableDescriptor> + '_ {
        self.tables.values().copied()
    }

    /// Table referenced by a column of `owner`.
    ///
    /// An explicit `references` wins. Otherwise a non-primary column named
    /// `<base>_id` resolves to `<base>` or its plural on the same connection.
    pub fn resolve_reference(
        &self,
        owner: &TableDescriptor,
        column: &ColumnDescriptor,
    ) -> Option<&'static TableDescriptor> {
        if let Some(target) = column.references {
            return self.get(owner.connection, target);
        }
        if column.key == KeyKind::Primary {
            return None;
        }
        naming::reference_candidates(column.name)?
            .iter()
            .find_map(|candidate| self.get(owner.connection, candidate))
    }
}
