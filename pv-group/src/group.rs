use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use pv_codegen::{Binding, GenerateOptions, GenerationError};
use pv_data_model::EndpointSchema;

use crate::database::{Database, Hook};
use crate::endpoint::Descriptor;
use crate::error::RegistryError;
use crate::function::{expand, Function, FunctionCluster};
use crate::registry::Registry;

/// Declares the variables and functions of one group under a prefix.
///
/// ```
/// use pv_data_model::{ElementType, Value};
/// use pv_group::{Descriptor, Function, GroupBuilder};
///
/// let mut group = GroupBuilder::new("Motor", "m1:");
/// group
///     .add_variable("position", Descriptor::new(ElementType::Double).read_only())
///     .unwrap();
/// group
///     .add_function(
///         Function::new("home", ElementType::Int, |_| async { Ok(Value::Int(vec![0])) })
///             .parameter("speed", ElementType::Double, vec![1.0]),
///     )
///     .unwrap();
/// assert_eq!(group.registry().len(), 5);
/// ```
pub struct GroupBuilder {
    name: String,
    doc: String,
    registry: Registry,
    startup: Vec<Hook>,
    shutdown: Vec<Hook>,
}

impl GroupBuilder {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            registry: Registry::new(prefix),
            startup: Vec::new(),
            shutdown: Vec::new(),
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn add_variable(&mut self, suffix: &str, descriptor: Descriptor) -> Result<String, RegistryError> {
        self.registry.register(suffix, descriptor)
    }

    pub fn add_function(&mut self, function: Function) -> Result<FunctionCluster, RegistryError> {
        expand(&mut self.registry, function)
    }

    pub fn on_startup<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Database) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.startup.push(Arc::new(move |db| hook(db).boxed()));
    }

    pub fn on_shutdown<F, Fut>(&mut self, hook: F)
    where
        F: Fn(Database) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.shutdown.push(Arc::new(move |db| hook(db).boxed()));
    }

    pub fn schema(&self) -> Vec<EndpointSchema> {
        self.registry.schema()
    }

    /// Client bindings for the group as declared so far.
    pub fn bindings(&self, options: &GenerateOptions) -> Result<Binding, GenerationError> {
        pv_codegen::generate(&self.name, &self.doc, &self.registry.schema(), options)
    }

    pub fn into_database(self) -> Database {
        Database::with_hooks(self.registry, self.startup, self.shutdown)
    }
}
