//! Endpoint descriptors and the cells holding their current values.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use futures::FutureExt;
use pv_data_model::{Access, ClusterMember, ElementType, EndpointSchema, Kind, Value};
use tokio::sync::{broadcast, Mutex};

/// Produces the value returned to a reader.
pub type GetHandler = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Runs on every accepted write. `Ok(None)` stores the written value as is,
/// `Ok(Some(v))` stores `v` instead.
pub type PutHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Option<Value>>> + Send + Sync>;

/// Writes to endpoints sharing a lock group never run concurrently.
pub type LockGroup = Arc<Mutex<()>>;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct Descriptor {
    element_type: ElementType,
    access: Access,
    doc: String,
    initial: Value,
    enum_strings: Vec<String>,
    get: Option<GetHandler>,
    put: Option<PutHandler>,
    lock: Option<LockGroup>,
    cluster: Option<ClusterMember>,
}

impl Descriptor {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            access: Access::ReadWrite,
            doc: String::new(),
            initial: Value::default_for(element_type),
            enum_strings: Vec::new(),
            get: None,
            put: None,
            lock: None,
            cluster: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn initial(mut self, value: impl Into<Value>) -> Self {
        self.initial = value.into();
        self
    }

    /// Restricts an enum endpoint to `strings`. An empty initial value
    /// becomes the first string.
    pub fn enum_strings<I, S>(mut self, strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_strings = strings.into_iter().map(Into::into).collect();
        if self.initial.as_text() == Some("") {
            if let Some(first) = self.enum_strings.first() {
                self.initial = Value::Enum(first.clone());
            }
        }
        self
    }

    pub fn on_get<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.get = Some(Arc::new(move || handler().boxed()));
        self
    }

    pub fn on_put<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Value>>> + Send + 'static,
    {
        self.put = Some(Arc::new(move |value| handler(value).boxed()));
        self
    }

    pub fn serialized_with(mut self, lock: LockGroup) -> Self {
        self.lock = Some(lock);
        self
    }

    pub(crate) fn member_of(mut self, cluster: Option<ClusterMember>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn kind(&self) -> Kind {
        self.element_type.kind()
    }

    pub fn access_mode(&self) -> Access {
        self.access
    }

    pub fn documentation(&self) -> &str {
        &self.doc
    }

    pub fn initial_value(&self) -> &Value {
        &self.initial
    }

    pub fn allowed_strings(&self) -> &[String] {
        &self.enum_strings
    }

    pub fn cluster(&self) -> Option<&ClusterMember> {
        self.cluster.as_ref()
    }

    pub(crate) fn get_handler(&self) -> Option<&GetHandler> {
        self.get.as_ref()
    }

    pub(crate) fn put_handler(&self) -> Option<&PutHandler> {
        self.put.as_ref()
    }

    pub(crate) fn lock_group(&self) -> Option<&LockGroup> {
        self.lock.as_ref()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("element_type", &self.element_type)
            .field("access", &self.access)
            .field("doc", &self.doc)
            .field("initial", &self.initial)
            .field("enum_strings", &self.enum_strings)
            .field("get", &self.get.is_some())
            .field("put", &self.put.is_some())
            .field("cluster", &self.cluster)
            .finish()
    }
}

/// Current value of an endpoint plus its change notifications.
pub(crate) struct ValueCell {
    value: RwLock<Value>,
    changes: broadcast::Sender<Value>,
}

impl ValueCell {
    fn new(value: Value) -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            value: RwLock::new(value),
            changes,
        }
    }

    fn read(&self) -> Value {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, value: Value) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value.clone();
        // no subscribers is fine
        let _ = self.changes.send(value);
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.changes.subscribe()
    }
}

/// A registered endpoint: its full name, descriptor and stored value.
pub struct Endpoint {
    name: String,
    suffix: String,
    descriptor: Descriptor,
    cell: ValueCell,
}

impl Endpoint {
    /// `initial` must already hold the descriptor's element type.
    pub(crate) fn new(name: String, suffix: String, descriptor: Descriptor, initial: Value) -> Self {
        Self {
            name,
            suffix,
            descriptor,
            cell: ValueCell::new(initial),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Last stored value, without running any get handler.
    pub fn value(&self) -> Value {
        self.cell.read()
    }

    pub(crate) fn publish(&self, value: Value) {
        self.cell.publish(value);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.cell.subscribe()
    }

    pub fn schema(&self) -> EndpointSchema {
        EndpointSchema {
            suffix: self.suffix.clone(),
            element_type: self.descriptor.element_type.name().to_string(),
            access: self.descriptor.access,
            doc: self.descriptor.doc.clone(),
            cluster: self.descriptor.cluster.clone(),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("value", &self.value())
            .finish()
    }
}
