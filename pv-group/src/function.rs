//! Call emulation: a function becomes parameter variables plus `Status`,
//! `Retval` and a `Process` trigger whose writes run the function.

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::BoxFuture;
use futures::FutureExt;
use pv_data_model::{
    member_suffix, status, ElementType, EndpointSchema, FunctionSchema, ParameterSchema, Value, PROCESS, RETVAL,
    STATUS,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::endpoint::{Descriptor, Endpoint, LockGroup};
use crate::error::RegistryError;
use crate::registry::{checked_initial, Registry};

/// Receives the parameter values in declaration order.
pub type FunctionBody =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

#[derive(Debug, Clone)]
struct Parameter {
    name: String,
    element_type: ElementType,
    default: Value,
}

/// A function to be exposed through a group.
#[derive(Clone)]
pub struct Function {
    name: String,
    doc: String,
    parameters: Vec<Parameter>,
    return_type: ElementType,
    body: FunctionBody,
}

impl Function {
    pub fn new<F, Fut>(name: impl Into<String>, return_type: ElementType, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            doc: String::new(),
            parameters: Vec::new(),
            return_type,
            body: Arc::new(move |args| body(args).boxed()),
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Appends a parameter. The default is converted to `element_type` when
    /// that loses nothing, so `[100]` works for a double parameter.
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        element_type: ElementType,
        default: impl Into<Value>,
    ) -> Self {
        let default = default.into();
        let default = default.clone().coerce(element_type).unwrap_or(default);
        self.parameters.push(Parameter {
            name: name.into(),
            element_type,
            default,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> FunctionSchema {
        FunctionSchema {
            name: self.name.clone(),
            doc: self.doc.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|p| ParameterSchema {
                    name: p.name.clone(),
                    element_type: p.element_type.name().to_string(),
                    default: p.default.clone(),
                })
                .collect(),
            return_type: self.return_type.name().to_string(),
        }
    }
}

/// Full names of the variables a function was expanded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCluster {
    pub function: String,
    pub parameters: Vec<String>,
    pub status: String,
    pub retval: String,
    pub process: String,
}

fn base(endpoint: &EndpointSchema, element_type: ElementType) -> Descriptor {
    Descriptor::new(element_type)
        .access(endpoint.access)
        .doc(endpoint.doc.clone())
        .member_of(endpoint.cluster.clone())
}

/// Checks everything registration could reject, so a failing function
/// leaves no partial cluster behind.
fn precheck(registry: &Registry, function: &Function, endpoints: &[EndpointSchema]) -> Result<(), RegistryError> {
    let mut names = HashSet::new();
    for p in &function.parameters {
        if [STATUS, RETVAL, PROCESS].contains(&p.name.as_str()) {
            return Err(RegistryError::ReservedParameter {
                function: function.name.clone(),
                parameter: p.name.clone(),
            });
        }
        let name = registry.full_name(&member_suffix(&function.name, &p.name));
        if !names.insert(p.name.as_str()) {
            return Err(RegistryError::DuplicateName(name));
        }
        checked_initial(&name, &Descriptor::new(p.element_type).initial(p.default.clone()))?;
    }
    endpoints
        .iter()
        .try_for_each(|e| registry.ensure_vacant(&e.suffix))
}

/// Registers the variables emulating `function` and wires its dispatch to
/// writes of `Process`.
pub fn expand(registry: &mut Registry, function: Function) -> Result<FunctionCluster, RegistryError> {
    let schema = function.schema();
    precheck(registry, &function, &schema.endpoints())?;

    // parameter writes queue behind an in-flight dispatch
    let lock: LockGroup = Arc::new(Mutex::new(()));

    let mut parameters = Vec::new();
    let mut parameter_names = Vec::new();
    for (p, endpoint) in function.parameters.iter().zip(schema.parameter_endpoints()) {
        let name = registry.register(
            &endpoint.suffix,
            base(&endpoint, p.element_type)
                .initial(p.default.clone())
                .serialized_with(lock.clone()),
        )?;
        parameters.push(registry.lookup(&name)?.clone());
        parameter_names.push(name);
    }

    let endpoint = schema.status_endpoint();
    let status_name = registry.register(
        &endpoint.suffix,
        base(&endpoint, ElementType::Enum)
            .enum_strings(status::STRINGS)
            .initial(Value::Enum(status::INIT.to_string())),
    )?;
    let status = registry.lookup(&status_name)?.clone();

    let endpoint = schema.retval_endpoint();
    let retval_name = registry.register(&endpoint.suffix, base(&endpoint, function.return_type))?;
    let retval = registry.lookup(&retval_name)?.clone();

    let dispatch = Arc::new(Dispatch {
        function: function.name.clone(),
        parameters,
        status,
        retval,
        return_type: function.return_type,
        body: function.body.clone(),
    });
    let endpoint = schema.process_endpoint();
    let process_name = registry.register(
        &endpoint.suffix,
        base(&endpoint, ElementType::Int)
            .serialized_with(lock)
            .on_put(move |_| {
                let dispatch = dispatch.clone();
                async move {
                    dispatch.run().await;
                    Ok(None)
                }
            }),
    )?;

    Ok(FunctionCluster {
        function: function.name,
        parameters: parameter_names,
        status: status_name,
        retval: retval_name,
        process: process_name,
    })
}

struct Dispatch {
    function: String,
    parameters: Vec<Arc<Endpoint>>,
    status: Arc<Endpoint>,
    retval: Arc<Endpoint>,
    return_type: ElementType,
    body: FunctionBody,
}

impl Dispatch {
    fn set_status(&self, status: &str) {
        self.status.publish(Value::Enum(status.to_string()));
    }

    /// Runs the body once. Failures only show up in `Status`.
    async fn run(&self) {
        self.set_status(status::RUNNING);
        let args: Vec<Value> = self.parameters.iter().map(|p| p.value()).collect();
        info!(function = %self.function, "calling");

        let result = match AssertUnwindSafe((self.body)(args)).catch_unwind().await {
            Ok(Ok(value)) => value.clone().coerce(self.return_type).ok_or_else(|| {
                anyhow!(
                    "returned a {} value, expected {}",
                    value.element_type(),
                    self.return_type
                )
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(anyhow!("function body panicked")),
        };

        match result {
            Ok(value) => {
                self.retval.publish(value);
                self.set_status(status::SUCCESS);
            }
            Err(err) => {
                warn!(function = %self.function, error = %err, "call failed");
                self.set_status(status::ERROR);
            }
        }
    }
}
