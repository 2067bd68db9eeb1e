//! Typed variable storage shared by every node of a graph module.
//!
//! Variables are addressed by [`VariableId`] or by name. Writes that go through
//! [`Blackboard::set`], [`Blackboard::set_variable_value`] or [`Blackboard::send_event`] bump the
//! variable's version, call its change listeners synchronously and append a [`VariableChange`] to
//! the journal. The owning scheduler drains the journal to wake nodes watching a variable.

use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde_json::Value;

use crate::VariableId;

/// Typed, const-constructible handle onto a variable.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BbKey<T: 'static> {
    id: VariableId,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> Copy for BbKey<T> {}

impl<T: 'static> Clone for BbKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> BbKey<T> {
    pub const fn new(id: u128) -> Self {
        Self {
            id: VariableId::from_u128(id),
            _phantom: PhantomData,
        }
    }

    pub fn id(self) -> VariableId {
        self.id
    }
}

/// A variable lookup by id or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef<'a> {
    Id(VariableId),
    Name(&'a str),
}

impl From<VariableId> for VarRef<'_> {
    fn from(value: VariableId) -> Self {
        VarRef::Id(value)
    }
}

impl<'a> From<&'a str> for VarRef<'a> {
    fn from(value: &'a str) -> Self {
        VarRef::Name(value)
    }
}

impl<'a> From<&'a String> for VarRef<'a> {
    fn from(value: &'a String) -> Self {
        VarRef::Name(value.as_str())
    }
}

impl<T: 'static> From<BbKey<T>> for VarRef<'_> {
    fn from(value: BbKey<T>) -> Self {
        VarRef::Id(value.id)
    }
}

/// Marker value for variables used only as event channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventChannel;

pub struct Variable {
    id: VariableId,
    name: String,
    type_name: &'static str,
    version: u64,
    value: Box<dyn Any>,
}

impl Variable {
    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Incremented on every notifying write.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Journal entry for one notifying write.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableChange {
    pub variable: VariableId,
    pub version: u64,
    /// Payload when the write was an event message.
    pub message: Option<Value>,
}

pub type ChangeListener = Box<dyn FnMut(&Variable, Option<&Value>)>;

#[derive(Default)]
pub struct Blackboard {
    variables: BTreeMap<VariableId, Variable>,
    names: BTreeMap<String, VariableId>,
    listeners: BTreeMap<VariableId, Vec<ChangeListener>>,
    journal: Vec<VariableChange>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.variables.clear();
        self.names.clear();
        self.listeners.clear();
        self.journal.clear();
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Defines a variable under a fresh id.
    pub fn define<T: 'static>(&mut self, name: impl Into<String>, value: T) -> VariableId {
        self.define_with_id(VariableId::random(), name, value)
    }

    /// Defines (or redefines) a variable under `id`. Does not notify.
    pub fn define_with_id<T: 'static>(
        &mut self,
        id: VariableId,
        name: impl Into<String>,
        value: T,
    ) -> VariableId {
        let name = name.into();
        if let Some(previous) = self.variables.get(&id) {
            self.names.remove(&previous.name);
        }
        self.names.insert(name.clone(), id);
        self.variables.insert(
            id,
            Variable {
                id,
                name,
                type_name: std::any::type_name::<T>(),
                version: 0,
                value: Box::new(value),
            },
        );
        id
    }

    /// Defines an [`EventChannel`] variable.
    pub fn define_channel(&mut self, name: impl Into<String>) -> VariableId {
        self.define(name, EventChannel)
    }

    pub fn resolve<'v>(&self, var: impl Into<VarRef<'v>>) -> Option<VariableId> {
        match var.into() {
            VarRef::Id(id) => self.variables.contains_key(&id).then_some(id),
            VarRef::Name(name) => self.names.get(name).copied(),
        }
    }

    pub fn contains<'v>(&self, var: impl Into<VarRef<'v>>) -> bool {
        self.resolve(var).is_some()
    }

    pub fn get_variable<'v>(&self, var: impl Into<VarRef<'v>>) -> Option<&Variable> {
        let id = self.resolve(var)?;
        self.variables.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn get<T: 'static>(&self, key: BbKey<T>) -> Option<&T> {
        self.value(key)
    }

    /// Mutable access without notification.
    pub fn get_mut<T: 'static>(&mut self, key: BbKey<T>) -> Option<&mut T> {
        self.value_mut(key)
    }

    /// Read by name or id. A stored value of another type reads as `None` and is logged.
    pub fn value<'v, T: 'static>(&self, var: impl Into<VarRef<'v>>) -> Option<&T> {
        let variable = self.get_variable(var)?;
        let value = variable.value::<T>();
        if value.is_none() {
            tracing::warn!(
                variable = %variable.id,
                name = %variable.name,
                stored = variable.type_name,
                requested = std::any::type_name::<T>(),
                "blackboard type mismatch"
            );
        }
        value
    }

    /// Mutable access by name or id, without notification.
    pub fn value_mut<'v, T: 'static>(&mut self, var: impl Into<VarRef<'v>>) -> Option<&mut T> {
        let id = self.resolve(var)?;
        self.variables.get_mut(&id)?.value.downcast_mut::<T>()
    }

    /// Inserts or replaces the value behind a typed key and notifies.
    pub fn set<T: 'static>(&mut self, key: BbKey<T>, value: T) {
        match self.variables.get_mut(&key.id) {
            Some(variable) => {
                variable.value = Box::new(value);
                variable.type_name = std::any::type_name::<T>();
            }
            None => {
                self.define_with_id(key.id, key.id.to_string(), value);
            }
        }
        self.notify(key.id, None);
    }

    /// Writes an existing variable. Returns `false` when it does not exist or holds another type.
    pub fn set_variable_value<'v, T: 'static>(
        &mut self,
        var: impl Into<VarRef<'v>>,
        value: T,
    ) -> bool {
        let Some(id) = self.resolve(var) else {
            return false;
        };
        let Some(variable) = self.variables.get_mut(&id) else {
            return false;
        };
        if !variable.value.is::<T>() {
            tracing::warn!(
                variable = %id,
                name = %variable.name,
                stored = variable.type_name,
                written = std::any::type_name::<T>(),
                "rejected blackboard write with mismatched type"
            );
            return false;
        }
        variable.value = Box::new(value);
        self.notify(id, None);
        true
    }

    pub fn remove<T: 'static>(&mut self, key: BbKey<T>) -> Option<T> {
        let variable = self.variables.remove(&key.id)?;
        self.names.remove(&variable.name);
        self.listeners.remove(&key.id);
        match variable.value.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(_) => {
                tracing::warn!(variable = %key.id, stored = variable.type_name, "removed blackboard value of unexpected type");
                None
            }
        }
    }

    /// Publishes a message on an existing variable (usually an [`EventChannel`]).
    pub fn send_event<'v>(&mut self, var: impl Into<VarRef<'v>>, message: Value) -> bool {
        let Some(id) = self.resolve(var) else {
            return false;
        };
        self.notify(id, Some(message));
        true
    }

    /// Registers a synchronous listener; returns `false` if the variable does not exist.
    pub fn subscribe<'v>(
        &mut self,
        var: impl Into<VarRef<'v>>,
        listener: impl FnMut(&Variable, Option<&Value>) + 'static,
    ) -> bool {
        let Some(id) = self.resolve(var) else {
            return false;
        };
        self.listeners.entry(id).or_default().push(Box::new(listener));
        true
    }

    pub fn has_changes(&self) -> bool {
        !self.journal.is_empty()
    }

    /// Drops journaled changes nobody has consumed yet.
    pub fn clear_changes(&mut self) {
        self.journal.clear();
    }

    /// Takes every journaled change, oldest first.
    pub fn drain_changes(&mut self) -> Vec<VariableChange> {
        std::mem::take(&mut self.journal)
    }

    fn notify(&mut self, id: VariableId, message: Option<Value>) {
        let Some(variable) = self.variables.get_mut(&id) else {
            return;
        };
        variable.version = variable.version.wrapping_add(1);
        let version = variable.version;

        if let Some(listeners) = self.listeners.get_mut(&id) {
            let variable = &self.variables[&id];
            for listener in listeners.iter_mut() {
                listener(variable, message.as_ref());
            }
        }

        self.journal.push(VariableChange {
            variable: id,
            version,
            message,
        });
    }
}
