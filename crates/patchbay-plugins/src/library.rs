//! Plugin library
//!
//! Provides [`PluginLibrary`], the [`PluginFactory`] the graph core uses
//! to create plugins by id.

use crate::array::ArrayFunction;
use crate::constant::{ConstantBool, ConstantFloat};
use crate::gate::Gate;
use crate::math::{Binary, Double};
use crate::pass_through::PassThrough;
use crate::sink::{Log, Recorder};
use crate::subgraph::{InputProxy, OutputProxy, Subgraph};
use crate::variable::{VariableRead, VariableWrite};
use indexmap::IndexMap;
use patchbay_graph::{Core, Plugin, PluginFactory};
use std::fmt;
use tracing::debug;

/// Constructor of one plugin kind
pub type PluginBuilder = fn(&Core) -> Box<dyn Plugin>;

/// A registered plugin kind
#[derive(Clone)]
pub struct PluginEntry {
    /// Human readable name
    pub name: String,
    /// Constructor
    pub build: PluginBuilder,
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry of plugin kinds by id
#[derive(Debug, Default, Clone)]
pub struct PluginLibrary {
    entries: IndexMap<String, PluginEntry>,
}

impl PluginLibrary {
    /// Create new empty library
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Create library with the built-in plugins
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut library = Self::new();
        library.register("constant_float", "Float", |_| Box::<ConstantFloat>::default());
        library.register("constant_bool", "Bool", |_| Box::<ConstantBool>::default());
        library.register("double", "Double", |_| Box::<Double>::default());
        library.register("multiply", "Multiply", |_| Box::new(Binary::multiply()));
        library.register("add", "Add", |_| Box::new(Binary::add()));
        library.register("recorder", "Recorder", |_| Box::<Recorder>::default());
        library.register("log", "Log", |_| Box::<Log>::default());
        library.register("gate", "Gate", |_| Box::<Gate>::default());
        library.register("pass_through", "Pass Through", |_| {
            Box::<PassThrough>::default()
        });
        library.register("graph", "Graph", |core| Box::new(Subgraph::new(core)));
        library.register("entity", "Entity", |core| Box::new(Subgraph::entity(core)));
        library.register("input_proxy", "Input", |_| Box::<InputProxy>::default());
        library.register("output_proxy", "Output", |_| Box::<OutputProxy>::default());
        library.register("array_function", "Array Function", |core| {
            Box::new(ArrayFunction::new(core))
        });
        library.register("variable_local_read", "Read Variable", |_| {
            Box::<VariableRead>::default()
        });
        library.register("variable_local_write", "Write Variable", |_| {
            Box::<VariableWrite>::default()
        });
        library
    }

    /// Register a plugin kind, replacing any kind with the same id
    pub fn register(&mut self, id: &str, name: &str, build: PluginBuilder) {
        debug!(plugin = id, "registering plugin");
        self.entries.insert(
            id.to_owned(),
            PluginEntry {
                name: name.to_owned(),
                build,
            },
        );
    }

    /// Check if a plugin id is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Remove a plugin kind
    #[inline]
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.shift_remove(id).is_some()
    }

    /// Entry of a plugin id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PluginEntry> {
        self.entries.get(id)
    }

    /// List all registered plugin ids in registration order
    #[inline]
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Get number of registered plugin kinds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if library is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over ids and entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PluginEntry)> {
        self.entries.iter()
    }
}

impl PluginFactory for PluginLibrary {
    fn create(&self, plugin_id: &str, core: &Core) -> Option<Box<dyn Plugin>> {
        self.entries.get(plugin_id).map(|entry| (entry.build)(core))
    }

    fn display_name(&self, plugin_id: &str) -> Option<String> {
        self.entries.get(plugin_id).map(|entry| entry.name.clone())
    }
}
