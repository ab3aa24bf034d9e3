//! The PV database a server loop drives: reads and writes by full channel
//! name, change subscriptions and startup/shutdown hooks.

use std::sync::Arc;

use futures::future::BoxFuture;
use pv_data_model::{ElementType, EndpointSchema, Value};
use pv_schema_parser::{parse_channel_filter, parse_record_field};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::endpoint::Endpoint;
use crate::error::DatabaseError;
use crate::registry::Registry;

/// Runs once when serving starts or stops.
pub type Hook = Arc<dyn Fn(Database) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Value,
    Description,
}

struct Resolved<'a> {
    endpoint: &'a Arc<Endpoint>,
    field: Field,
    long_string: bool,
}

struct Inner {
    registry: Registry,
    startup: Vec<Hook>,
    shutdown: Vec<Hook>,
}

/// Cheap to clone; all clones share the same endpoints.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    pub fn new(registry: Registry) -> Self {
        Self::with_hooks(registry, Vec::new(), Vec::new())
    }

    pub(crate) fn with_hooks(registry: Registry, startup: Vec<Hook>, shutdown: Vec<Hook>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                startup,
                shutdown,
            }),
        }
    }

    pub fn prefix(&self) -> &str {
        self.inner.registry.prefix()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.registry.names().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    pub fn schema(&self) -> Vec<EndpointSchema> {
        self.inner.registry.schema()
    }

    fn resolve(&self, name: &str) -> Result<Resolved<'_>, DatabaseError> {
        let registry = &self.inner.registry;
        if let Some(endpoint) = registry.get(name) {
            return Ok(Resolved {
                endpoint,
                field: Field::Value,
                long_string: false,
            });
        }

        // prefixes may contain dots, so the record is the longest registered head
        let head = name.find('{').map_or(name, |at| &name[..at]);
        let (record, endpoint, parsed) = head
            .rmatch_indices('.')
            .find_map(|(dot, _)| {
                let record = &name[..dot];
                let endpoint = registry.get(record)?;
                Some((record, endpoint, parse_record_field(&name[dot..])))
            })
            .ok_or_else(|| DatabaseError::UnknownName(name.to_string()))?;

        // filters are only validated here; applying them is up to the server loop
        if let Some(filter) = &parsed.filter {
            parse_channel_filter(filter).map_err(|source| DatabaseError::Filter {
                name: name.to_string(),
                source,
            })?;
        }

        let field = match parsed.field.as_deref() {
            None | Some("VAL") => Field::Value,
            Some("DESC") => Field::Description,
            Some(other) => {
                return Err(DatabaseError::UnknownField {
                    name: record.to_string(),
                    field: other.to_string(),
                })
            }
        };
        Ok(Resolved {
            endpoint,
            field,
            long_string: parsed.modifiers.is_some_and(|m| m.long_string),
        })
    }

    /// Current value of `name`, running its get handler if it has one.
    pub async fn read(&self, name: &str) -> Result<Value, DatabaseError> {
        let Resolved {
            endpoint,
            field,
            long_string,
        } = self.resolve(name)?;

        let value = match field {
            Field::Description => Value::String(endpoint.descriptor().documentation().to_string()),
            Field::Value => match endpoint.descriptor().get_handler() {
                None => endpoint.value(),
                Some(handler) => {
                    let value = handler().await.map_err(|source| DatabaseError::Handler {
                        name: endpoint.name().to_string(),
                        source,
                    })?;
                    let value = coerce(endpoint, value)?;
                    endpoint.publish(value.clone());
                    value
                }
            },
        };

        if long_string {
            if let Some(text) = value.as_text() {
                return Ok(Value::Char(text.as_bytes().to_vec()));
            }
        }
        Ok(value)
    }

    /// Stores `value` in `name` once access, type and the put handler agree.
    ///
    /// Writes to endpoints sharing a lock group wait for each other, so the
    /// returned future completes only after any dispatch it triggers.
    pub async fn write(&self, name: &str, value: Value) -> Result<(), DatabaseError> {
        let Resolved {
            endpoint, field, ..
        } = self.resolve(name)?;
        let descriptor = endpoint.descriptor();
        if field == Field::Description || !descriptor.access_mode().is_writable() {
            return Err(DatabaseError::ReadOnly(name.to_string()));
        }

        let value = coerce(endpoint, value)?;
        check_enum(endpoint, &value)?;

        let _guard = match descriptor.lock_group() {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        debug!(name = %endpoint.name(), %value, "write");

        let stored = match descriptor.put_handler() {
            None => value,
            Some(handler) => {
                let replaced = handler(value.clone())
                    .await
                    .map_err(|source| DatabaseError::Handler {
                        name: endpoint.name().to_string(),
                        source,
                    })?;
                match replaced {
                    Some(replacement) => {
                        let replacement = coerce(endpoint, replacement)?;
                        check_enum(endpoint, &replacement)?;
                        replacement
                    }
                    None => value,
                }
            }
        };
        endpoint.publish(stored);
        Ok(())
    }

    /// Every value stored in `name` from now on.
    pub fn subscribe(&self, name: &str) -> Result<broadcast::Receiver<Value>, DatabaseError> {
        let Resolved { endpoint, .. } = self.resolve(name)?;
        Ok(endpoint.subscribe())
    }

    /// Spawns every startup hook; the handles let the caller stop them.
    pub fn run_startup(&self) -> Vec<JoinHandle<()>> {
        self.inner
            .startup
            .iter()
            .map(|hook| {
                let run = hook(self.clone());
                tokio::spawn(async move {
                    if let Err(err) = run.await {
                        warn!(error = %err, "startup hook failed");
                    }
                })
            })
            .collect()
    }

    pub async fn run_shutdown(&self) {
        for hook in &self.inner.shutdown {
            if let Err(err) = hook(self.clone()).await {
                warn!(error = %err, "shutdown hook failed");
            }
        }
    }

    /// Runs the startup hooks, waits for `shutdown`, then runs the shutdown
    /// hooks and stops whatever the startup hooks left running.
    pub async fn serve(&self, config: &ServerConfig, shutdown: CancellationToken) {
        info!(prefix = %self.prefix(), pvs = self.len(), "serving");
        if config.log_pv_names {
            for name in self.inner.registry.names() {
                info!("PV: {name}");
            }
        }

        let tasks = self.run_startup();
        shutdown.cancelled().await;
        info!("server exiting");

        self.run_shutdown().await;
        for task in tasks {
            task.abort();
        }
    }
}

fn coerce(endpoint: &Endpoint, value: Value) -> Result<Value, DatabaseError> {
    let expected = endpoint.descriptor().element_type();
    let found = value.element_type();
    value
        .coerce(expected)
        .ok_or_else(|| DatabaseError::TypeMismatch {
            name: endpoint.name().to_string(),
            expected,
            found,
        })
}

fn check_enum(endpoint: &Endpoint, value: &Value) -> Result<(), DatabaseError> {
    let strings = endpoint.descriptor().allowed_strings();
    if endpoint.descriptor().element_type() != ElementType::Enum || strings.is_empty() {
        return Ok(());
    }
    let text = value.as_text().unwrap_or_default();
    if strings.iter().any(|s| s == text) {
        Ok(())
    } else {
        Err(DatabaseError::NotInEnum {
            name: endpoint.name().to_string(),
            value: text.to_string(),
        })
    }
}
