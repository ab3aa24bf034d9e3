//! Client runtime used by generated bindings.
//!
//! Bindings only talk to a [`Transport`]; [`LocalTransport`] provides one
//! over an in-process [`Database`], network transports plug in the same way.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use pv_data_model::{status, ElementType, Value};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::Database;
use crate::error::DatabaseError;

pub use crate::config::ClientConfig;

/// Whether a read may be answered from a monitor cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    #[default]
    Cached,
    /// Always ask the server.
    Fresh,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Reported by network transports when a channel's server goes away.
    /// `LocalTransport` never returns it.
    #[error("connection to `{0}` lost")]
    Disconnected(String),
}

/// Get/put/subscribe primitives of the named-value protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, name: &str, freshness: Freshness) -> Result<Value, TransportError>;

    /// With `wait`, returns once the server has processed the write,
    /// including any handler it runs.
    async fn put(&self, name: &str, value: Value, wait: bool) -> Result<(), TransportError>;

    async fn subscribe(&self, name: &str) -> Result<BoxStream<'static, Value>, TransportError>;
}

/// Failure of a binding operation.
#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Rpc(#[from] RpcFailure),

    #[error("`{name}`: {source}")]
    Transport {
        name: String,
        #[source]
        source: TransportError,
    },

    #[error("`{name}` did not answer within {after:?}")]
    Timeout { name: String, after: Duration },

    #[error("`{name}` holds {found} values, expected {expected}")]
    UnexpectedType {
        name: String,
        expected: ElementType,
        found: ElementType,
    },
}

/// The remote function finished with a status other than `Success`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("RPC function failed: {status}")]
pub struct RpcFailure {
    pub status: String,
}

/// Final step of a generated `call`.
pub fn check_status<T>(status: String, retval: T) -> Result<T, CallError> {
    if status == status::SUCCESS {
        Ok(retval)
    } else {
        Err(RpcFailure { status }.into())
    }
}

/// Rust types a signal can carry.
pub trait PvType: Clone + Send + Sync + 'static {
    const ELEMENT_TYPE: ElementType;

    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Option<Self>;
}

impl PvType for Vec<i64> {
    const ELEMENT_TYPE: ElementType = ElementType::Int;

    fn into_value(self) -> Value {
        Value::Int(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value.coerce(Self::ELEMENT_TYPE)? {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl PvType for Vec<f64> {
    const ELEMENT_TYPE: ElementType = ElementType::Double;

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value.coerce(Self::ELEMENT_TYPE)? {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl PvType for Vec<u8> {
    const ELEMENT_TYPE: ElementType = ElementType::Char;

    fn into_value(self) -> Value {
        Value::Char(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value.coerce(Self::ELEMENT_TYPE)? {
            Value::Char(v) => Some(v),
            _ => None,
        }
    }
}

/// Also used for enum variables, which travel as their string.
impl PvType for String {
    const ELEMENT_TYPE: ElementType = ElementType::String;

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value.coerce(Self::ELEMENT_TYPE)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

async fn timed<T, F>(name: &str, after: Duration, operation: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(after, operation).await {
        Ok(result) => result.map_err(|source| CallError::Transport {
            name: name.to_string(),
            source,
        }),
        Err(_) => Err(CallError::Timeout {
            name: name.to_string(),
            after,
        }),
    }
}

struct SignalInner<T> {
    name: String,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    cache: RwLock<Option<T>>,
}

/// Read-write handle on one remote variable.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PvType> Signal<T> {
    pub fn new(transport: Arc<dyn Transport>, name: String, config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                name,
                transport,
                timeout: config.timeout,
                cache: RwLock::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Sends the value without waiting for the server to process it.
    pub async fn put(&self, value: T) -> Result<(), CallError> {
        self.write(value, false).await
    }

    pub async fn put_wait(&self, value: T) -> Result<(), CallError> {
        self.write(value, true).await
    }

    async fn write(&self, value: T, wait: bool) -> Result<(), CallError> {
        let inner = &self.inner;
        timed(
            &inner.name,
            inner.timeout,
            inner.transport.put(&inner.name, value.into_value(), wait),
        )
        .await
    }

    /// With [`Freshness::Cached`] a running monitor answers without a round
    /// trip.
    pub async fn get(&self, freshness: Freshness) -> Result<T, CallError> {
        let inner = &self.inner;
        if freshness == Freshness::Cached {
            let cached = inner.cache.read().unwrap_or_else(PoisonError::into_inner).clone();
            if let Some(value) = cached {
                return Ok(value);
            }
        }

        let value = timed(
            &inner.name,
            inner.timeout,
            inner.transport.get(&inner.name, freshness),
        )
        .await?;
        let found = value.element_type();
        T::from_value(value).ok_or_else(|| CallError::UnexpectedType {
            name: inner.name.clone(),
            expected: T::ELEMENT_TYPE,
            found,
        })
    }

    /// Keeps a cache of the latest value for cached reads. The background
    /// task ends with the last handle to this signal.
    pub async fn monitor(&self) -> Result<(), CallError> {
        let inner = &self.inner;
        let mut updates = timed(&inner.name, inner.timeout, inner.transport.subscribe(&inner.name)).await?;
        let signal: Weak<SignalInner<T>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(value) = updates.next().await {
                let Some(inner) = signal.upgrade() else {
                    break;
                };
                match T::from_value(value) {
                    Some(value) => {
                        *inner.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(value)
                    }
                    None => tracing::warn!(name = %inner.name, "monitor update of unexpected type"),
                }
            }
        });
        Ok(())
    }
}

/// Read-only handle on one remote variable.
pub struct SignalRo<T>(Signal<T>);

impl<T> Clone for SignalRo<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PvType> SignalRo<T> {
    pub fn new(transport: Arc<dyn Transport>, name: String, config: &ClientConfig) -> Self {
        Self(Signal::new(transport, name, config))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn get(&self, freshness: Freshness) -> Result<T, CallError> {
        self.0.get(freshness).await
    }

    pub async fn monitor(&self) -> Result<(), CallError> {
        self.0.monitor().await
    }
}

/// Serializes calls made through clones of one binding.
#[derive(Debug, Clone, Default)]
pub struct CallLock(Arc<Mutex<()>>);

impl CallLock {
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        self.0.clone().lock_owned().await
    }
}

/// Transport over a database in the same process. Reads are always fresh.
#[derive(Clone)]
pub struct LocalTransport {
    database: Database,
}

impl LocalTransport {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn shared(database: Database) -> Arc<dyn Transport> {
        Arc::new(Self::new(database))
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn get(&self, name: &str, _freshness: Freshness) -> Result<Value, TransportError> {
        Ok(self.database.read(name).await?)
    }

    async fn put(&self, name: &str, value: Value, wait: bool) -> Result<(), TransportError> {
        if wait {
            return Ok(self.database.write(name, value).await?);
        }
        let database = self.database.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(err) = database.write(&name, value).await {
                tracing::warn!(name = %name, error = %err, "unacknowledged write failed");
            }
        });
        Ok(())
    }

    async fn subscribe(&self, name: &str) -> Result<BoxStream<'static, Value>, TransportError> {
        let receiver = self.database.subscribe(name)?;
        let updates = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(value) => return Some((value, receiver)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(updates.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Descriptor;
    use crate::registry::Registry;
    use rstest::rstest;

    fn transport() -> Arc<dyn Transport> {
        let mut registry = Registry::new("t:");
        registry
            .register("x", Descriptor::new(ElementType::Double))
            .expect("vacant");
        registry
            .register("name", Descriptor::new(ElementType::Enum).enum_strings(["a", "b"]))
            .expect("vacant");
        LocalTransport::shared(Database::new(registry))
    }

    #[rstest]
    #[case("Success", true)]
    #[case("Error", false)]
    #[case("Running", false)]
    fn status_check(#[case] status: &str, #[case] ok: bool) {
        let result = check_status(status.to_string(), vec![1i64]);
        assert_eq!(result.is_ok(), ok);
        if let Err(CallError::Rpc(failure)) = result {
            assert_eq!(failure.status, status);
        }
    }

    #[test]
    fn pv_type_conversions() {
        assert_eq!(Vec::<f64>::from_value(Value::Int(vec![2])), Some(vec![2.0]));
        assert_eq!(String::from_value(Value::Enum("a".into())), Some("a".to_string()));
        assert_eq!(Vec::<i64>::from_value(Value::from("a")), None);
        assert_eq!(Vec::<u8>::from_value(Value::Int(vec![300])), None);
    }

    #[tokio::test]
    async fn signal_round_trip() {
        let transport = transport();
        let config = ClientConfig::default();
        let x: Signal<Vec<f64>> = Signal::new(transport.clone(), "t:x".into(), &config);
        x.put_wait(vec![1.5, 2.5]).await.expect("writable");
        assert_eq!(x.get(Freshness::Fresh).await.expect("readable"), vec![1.5, 2.5]);

        let name: SignalRo<String> = SignalRo::new(transport, "t:name".into(), &config);
        assert_eq!(name.get(Freshness::Fresh).await.expect("readable"), "a");
    }

    #[tokio::test]
    async fn type_mismatch_on_read() {
        let x: Signal<Vec<u8>> = Signal::new(transport(), "t:x".into(), &ClientConfig::default());
        assert!(matches!(
            x.get(Freshness::Fresh).await,
            Err(CallError::UnexpectedType {
                expected: ElementType::Char,
                found: ElementType::Double,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn transport_errors_name_the_signal() {
        let missing: Signal<Vec<i64>> =
            Signal::new(transport(), "t:missing".into(), &ClientConfig::default());
        assert!(matches!(
            missing.put_wait(vec![1]).await,
            Err(CallError::Transport { name, source: TransportError::Database(DatabaseError::UnknownName(_)) })
                if name == "t:missing"
        ));
    }

    #[tokio::test]
    async fn monitor_feeds_cached_reads() {
        let transport = transport();
        let config = ClientConfig::default();
        let x: Signal<Vec<f64>> = Signal::new(transport.clone(), "t:x".into(), &config);
        x.monitor().await.expect("subscribed");

        let mut updates = transport.subscribe("t:x").await.expect("subscribed");
        x.put_wait(vec![7.0]).await.expect("writable");
        updates.next().await.expect("one update");
        // the monitor task saw the same update; give it a turn to store it
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(x.get(Freshness::Cached).await.expect("readable"), vec![7.0]);
    }

    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn get(&self, _: &str, _: Freshness) -> Result<Value, TransportError> {
            futures::future::pending().await
        }

        async fn put(&self, _: &str, _: Value, _: bool) -> Result<(), TransportError> {
            futures::future::pending().await
        }

        async fn subscribe(&self, name: &str) -> Result<BoxStream<'static, Value>, TransportError> {
            Err(TransportError::Disconnected(name.to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts() {
        let config = ClientConfig {
            timeout: Duration::from_millis(50),
        };
        let x: Signal<Vec<i64>> = Signal::new(Arc::new(Stalled), "s:x".into(), &config);
        assert!(matches!(
            x.put_wait(vec![1]).await,
            Err(CallError::Timeout { after, .. }) if after == Duration::from_millis(50)
        ));
        assert!(matches!(x.get(Freshness::Fresh).await, Err(CallError::Timeout { .. })));
    }

    #[tokio::test]
    async fn disconnects_name_the_signal() {
        let x: Signal<Vec<i64>> = Signal::new(Arc::new(Stalled), "s:x".into(), &ClientConfig::default());
        assert!(matches!(
            x.monitor().await,
            Err(CallError::Transport {
                name,
                source: TransportError::Disconnected(channel),
            }) if name == "s:x" && channel == "s:x"
        ));
    }
}
