//! Ordered mapping from full PV name to endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use pv_data_model::{ElementType, EndpointSchema, Value};

use crate::endpoint::{Descriptor, Endpoint};
use crate::error::RegistryError;

/// Endpoints of one group, in registration order.
///
/// Built once while a group is declared; afterwards only the stored values
/// of its endpoints change.
#[derive(Debug)]
pub struct Registry {
    prefix: String,
    entries: Vec<Arc<Endpoint>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn full_name(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.prefix)
    }

    /// Fails if `suffix` is taken, without touching the registry.
    pub fn ensure_vacant(&self, suffix: &str) -> Result<(), RegistryError> {
        let name = self.full_name(suffix);
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        Ok(())
    }

    /// Adds an endpoint at `prefix + suffix` and returns its full name.
    pub fn register(&mut self, suffix: &str, descriptor: Descriptor) -> Result<String, RegistryError> {
        self.ensure_vacant(suffix)?;
        let name = self.full_name(suffix);

        let initial = checked_initial(&name, &descriptor)?;
        tracing::debug!(
            name = %name,
            element_type = %descriptor.element_type(),
            access = ?descriptor.access_mode(),
            "registered endpoint"
        );

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Arc::new(Endpoint::new(
            name.clone(),
            suffix.to_string(),
            descriptor,
            initial,
        )));
        Ok(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<Endpoint>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Endpoint>> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn all(&self) -> &[Arc<Endpoint>] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flat description of every endpoint, for binding generation.
    pub fn schema(&self) -> Vec<EndpointSchema> {
        self.entries.iter().map(|e| e.schema()).collect()
    }
}

pub(crate) fn checked_initial(name: &str, descriptor: &Descriptor) -> Result<Value, RegistryError> {
    let element_type = descriptor.element_type();
    let invalid = || RegistryError::InvalidInitial {
        name: name.to_string(),
        element_type,
    };

    let value = descriptor
        .initial_value()
        .clone()
        .coerce(element_type)
        .ok_or_else(|| invalid())?;

    let strings = descriptor.allowed_strings();
    if element_type == ElementType::Enum && !strings.is_empty() {
        let text = value.as_text().unwrap_or_default();
        if !strings.iter().any(|s| s == text) {
            return Err(invalid());
        }
    }
    Ok(value)
}
