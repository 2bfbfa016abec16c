//! Change applier: turns a `DatabaseChanges` message into table store calls.

use std::collections::HashMap;
use std::sync::Arc;

use prost::Message;

use crate::error::SinkError;
use crate::pb::table_change::Operation;
use crate::pb::{DatabaseChanges, TableChange};
use crate::store::TableStore;

/// Decode a module output payload into `DatabaseChanges`.
pub fn decode_changes(payload: &[u8]) -> Result<DatabaseChanges, SinkError> {
    DatabaseChanges::decode(payload).map_err(|e| SinkError::Decode(e.to_string()))
}

/// Applies table changes in order, stopping at the first failure.
pub struct ChangeApplier {
    store: Arc<dyn TableStore>,
}

impl ChangeApplier {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Apply every change of `changes`.
    ///
    /// Fails fast on an unknown table or a store error; changes after the
    /// failing one are not forwarded to the store.
    pub fn apply(&self, changes: &DatabaseChanges) -> Result<(), SinkError> {
        for change in &changes.table_changes {
            self.apply_one(change)?;
        }
        Ok(())
    }

    fn apply_one(&self, change: &TableChange) -> Result<(), SinkError> {
        if !self.store.has_table(&change.table) {
            return Err(SinkError::SchemaMismatch {
                table: change.table.clone(),
                store: self.store.identifier(),
                available: self.store.available_tables(),
            });
        }

        let operation = match Operation::try_from(change.operation) {
            Ok(op) => op,
            Err(_) => {
                tracing::debug!(
                    table = %change.table,
                    operation = change.operation,
                    "Ignoring table change with unknown operation"
                );
                return Ok(());
            }
        };

        let result = match operation {
            Operation::Create => self.store.insert(&change.table, &change.pk, project_fields(change)),
            Operation::Update => self.store.update(&change.table, &change.pk, project_fields(change)),
            Operation::Delete => self.store.delete(&change.table, &change.pk),
            Operation::Unset => return Ok(()),
        };

        result.map_err(|e| SinkError::Apply {
            operation: operation_verb(operation),
            table: change.table.clone(),
            pk: change.pk.clone(),
            reason: e.to_string(),
        })
    }
}

/// Field name → new value; later duplicates win.
fn project_fields(change: &TableChange) -> HashMap<String, String> {
    change
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.new_value.clone()))
        .collect()
}

fn operation_verb(operation: Operation) -> &'static str {
    match operation {
        Operation::Create => "insert",
        Operation::Update => "update",
        Operation::Delete => "delete",
        Operation::Unset => "unset",
    }
}
