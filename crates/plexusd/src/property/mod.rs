//! Property registry and per-process property values.
//!
//! The [`PropertyRegistry`] maps canonical names to [`PropertyDescriptor`]s
//! and is read-only once the process starts serving. Values live in a
//! [`PropertyStore`] owned by each process and written only by setters.

pub mod builtin;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use thiserror::Error;

use crate::request::ExecContext;
use crate::set::Assignment;

/// Signal returned by a setter after handling one assignment.
#[derive(Debug)]
pub enum SetterOutcome {
    /// The value was stored; continue with the next assignment.
    Continue,
    /// A semantic error was already reported to the client; stop quietly.
    HandledStop,
    /// An internal fault; stop and fail the request.
    Fail(SetterError),
}

/// Internal faults raised by setters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetterError {
    /// The property store cannot hold another value.
    #[error("property store is full ({capacity} entries)")]
    StoreFull {
        /// Configured store capacity.
        capacity: usize,
    },
    /// A setter failed for a reason other than a bad value.
    #[error("setter for '{property}' failed: {message}")]
    Internal {
        /// Property whose setter failed.
        property: String,
        /// Failure description.
        message: String,
    },
}

/// Function invoked to apply one assignment to a property.
pub type Setter = fn(&PropertyDescriptor, &mut ExecContext<'_>, &Assignment) -> SetterOutcome;

/// Registered property: a canonical name and an optional setter.
///
/// A descriptor without a setter is read-only.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    setter: Option<Setter>,
}

impl PropertyDescriptor {
    /// Describes a writable property.
    pub fn writable(name: impl Into<String>, setter: Setter) -> Self {
        Self {
            name: name.into(),
            setter: Some(setter),
        }
    }

    /// Describes a read-only property.
    pub fn read_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setter: None,
        }
    }

    /// Canonical property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Setter, or `None` for a read-only property.
    #[must_use]
    pub fn setter(&self) -> Option<Setter> {
        self.setter
    }

    /// Returns true when the property has no setter.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two descriptors share a name.
    #[error("property '{name}' is already registered")]
    Duplicate {
        /// Conflicting name.
        name: String,
    },
}

/// Lookup table from property name to descriptor.
#[derive(Debug, Default, Clone)]
pub struct PropertyRegistry {
    by_name: HashMap<String, PropertyDescriptor>,
}

impl PropertyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is already taken.
    pub fn register(&mut self, descriptor: PropertyDescriptor) -> Result<(), RegistryError> {
        if self.by_name.contains_key(descriptor.name()) {
            return Err(RegistryError::Duplicate {
                name: descriptor.name,
            });
        }
        self.by_name.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Finds the descriptor registered under `name`.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.by_name.get(name)
    }

    /// Registered names in lexical order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Maximum number of values a store holds unless configured otherwise.
pub const DEFAULT_STORE_CAPACITY: usize = 256;

/// Current property values of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyStore {
    values: BTreeMap<String, String>,
    capacity: usize,
}

impl Default for PropertyStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }
}

impl PropertyStore {
    /// Creates an empty store holding at most `capacity` values.
    #[must_use]
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            values: BTreeMap::new(),
            capacity,
        }
    }

    /// Returns the stored value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Stores `value` under `name` and returns the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`SetterError::StoreFull`] when `name` is new and the store is
    /// at capacity.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<Option<String>, SetterError> {
        if !self.values.contains_key(name) && self.values.len() >= self.capacity {
            return Err(SetterError::StoreFull {
                capacity: self.capacity,
            });
        }
        Ok(self.values.insert(name.to_owned(), value.into()))
    }

    /// Seeds a value during startup, ignoring the capacity limit.
    pub(crate) fn seed(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_owned(), value.into());
    }

    /// Iterates over stored values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no value is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
