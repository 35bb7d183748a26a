//! Graph-scoped variables
//!
//! Named values shared between variable read and write nodes of one graph.
//! Only declarations are persisted; values are runtime state.

use crate::doc::{VariableDoc, VariablesDoc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use patchbay_types::{DataType, Value};
use std::sync::Arc;
use tracing::debug;

/// One declared variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Datatype
    pub dt: DataType,
    /// Carries a sequence
    pub array: bool,
    /// Current value
    pub value: Value,
    /// Bumped on every write
    pub version: u64,
}

/// Shared variable table of one graph
#[derive(Debug, Clone, Default)]
pub struct Variables {
    table: Arc<RwLock<IndexMap<String, Variable>>>,
}

impl Variables {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable, keeping the value if it already exists with the
    /// same type
    pub fn declare(&self, name: impl Into<String>, dt: DataType, array: bool) {
        let name = name.into();
        let mut table = self.table.write();
        match table.get_mut(&name) {
            Some(var) if var.dt == dt && var.array == array => {}
            Some(var) => {
                var.dt = dt;
                var.array = array;
                var.value = dt.default_value();
                var.version += 1;
            }
            None => {
                debug!(variable = %name, dt = %dt, "declaring variable");
                table.insert(
                    name,
                    Variable {
                        dt,
                        array,
                        value: dt.default_value(),
                        version: 0,
                    },
                );
            }
        }
    }

    /// Write a value; undeclared names are declared as wildcards.
    /// Returns `true` when the stored value changed.
    pub fn write(&self, name: &str, value: Value) -> bool {
        let mut table = self.table.write();
        let var = table.entry(name.to_owned()).or_insert_with(|| Variable {
            dt: DataType::Any,
            array: false,
            value: Value::Null,
            version: 0,
        });
        if var.value == value {
            return false;
        }
        var.value = value;
        var.version += 1;
        true
    }

    /// Current value
    #[must_use]
    pub fn read(&self, name: &str) -> Option<Value> {
        self.table.read().get(name).map(|v| v.value.clone())
    }

    /// Write counter of a variable
    #[must_use]
    pub fn version(&self, name: &str) -> Option<u64> {
        self.table.read().get(name).map(|v| v.version)
    }

    /// Declaration and value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Variable> {
        self.table.read().get(name).cloned()
    }

    /// Remove a variable
    pub fn remove(&self, name: &str) -> Option<Variable> {
        self.table.write().shift_remove(name)
    }

    /// Declared names in declaration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.table.read().keys().cloned().collect()
    }

    /// Number of declared variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Whether nothing is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Reset every value to its type's zero value
    pub fn reset(&self) {
        for var in self.table.write().values_mut() {
            var.value = var.dt.default_value();
            var.version += 1;
        }
    }

    /// Persistent form; none when empty
    #[must_use]
    pub fn serialise(&self) -> Option<VariablesDoc> {
        let table = self.table.read();
        if table.is_empty() {
            return None;
        }
        Some(
            table
                .iter()
                .map(|(name, var)| {
                    (
                        name.clone(),
                        VariableDoc {
                            dt: var.dt,
                            array: var.array,
                        },
                    )
                })
                .collect(),
        )
    }

    /// Declare everything in a saved document
    pub fn load(&self, doc: &VariablesDoc) {
        for (name, decl) in doc {
            self.declare(name.clone(), decl.dt, decl.array);
        }
    }
}
