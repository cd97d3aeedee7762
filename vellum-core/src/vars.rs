//! Variable bindings owned by one renderer instance.

use std::collections::HashMap;

use serde_json::Value;

/// Name → value map merged into the evaluation scope before a compiled
/// artifact runs.
///
/// [`set`](Bindings::set) always wins; [`set_all`](Bindings::set_all) is a
/// bulk merge that leaves already-present keys untouched.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: HashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind one variable. Replaces an existing binding of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.map.insert(name.into(), value);
    }

    /// Bulk merge: inserts every pair whose key is not already bound.
    pub fn set_all<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (name, value) in vars {
            self.map.entry(name).or_insert(value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Clone the bindings into a plain map (the interpreter's scope type).
    pub fn to_scope(&self) -> HashMap<String, Value> {
        self.map.clone()
    }
}
