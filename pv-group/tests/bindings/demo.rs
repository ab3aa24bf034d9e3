// Output of `pv-group` for the example group, kept in sync by
// tests/generated_bindings.rs.

#[doc = "A configurable random number"]
#[derive(Clone)]
pub struct GetRandomBinding {
    #[doc = "Parameter int low"]
    pub low: ::pv_group::client::Signal<Vec<i64>>,
    #[doc = "Parameter int high"]
    pub high: ::pv_group::client::Signal<Vec<i64>>,
    pub status: ::pv_group::client::SignalRo<String>,
    pub retval: ::pv_group::client::SignalRo<Vec<i64>>,
    pub process: ::pv_group::client::Signal<Vec<i64>>,
    lock: ::pv_group::client::CallLock,
}

impl GetRandomBinding {
    pub fn new(
        transport: std::sync::Arc<dyn ::pv_group::client::Transport>,
        prefix: &str,
        config: &::pv_group::client::ClientConfig,
    ) -> Self {
        Self {
            low: ::pv_group::client::Signal::new(transport.clone(), format!("{prefix}low"), config),
            high: ::pv_group::client::Signal::new(transport.clone(), format!("{prefix}high"), config),
            status: ::pv_group::client::SignalRo::new(transport.clone(), format!("{prefix}Status"), config),
            retval: ::pv_group::client::SignalRo::new(transport.clone(), format!("{prefix}Retval"), config),
            process: ::pv_group::client::Signal::new(transport, format!("{prefix}Process"), config),
            lock: ::pv_group::client::CallLock::default(),
        }
    }

    #[doc = "A configurable random number"]
    pub async fn call(&self, low: Vec<i64>, high: Vec<i64>) -> Result<Vec<i64>, ::pv_group::client::CallError> {
        let __call_guard = self.lock.acquire().await;
        self.low.put_wait(low).await?;
        self.high.put_wait(high).await?;
        self.process.put_wait(vec![1i64]).await?;
        let status = self.status.get(::pv_group::client::Freshness::Fresh).await?;
        let retval = self.retval.get(::pv_group::client::Freshness::Fresh).await?;
        ::pv_group::client::check_status(status, retval)
    }

    pub async fn call_with_defaults(&self) -> Result<Vec<i64>, ::pv_group::client::CallError> {
        self.call(vec![100i64], vec![1000i64]).await
    }
}

#[doc = "Example group of PVs, where the prefix is defined on instantiation"]
#[derive(Clone)]
pub struct GroupBinding {
    #[doc = "Poke me to exit"]
    pub exit: ::pv_group::client::Signal<Vec<i64>>,
    #[doc = "Random integer between 1 and 100"]
    pub random1: ::pv_group::client::Signal<Vec<i64>>,
    #[doc = "A nice random integer between 1000 and 2000"]
    pub random2: ::pv_group::client::Signal<Vec<i64>>,
    #[doc = "A configurable random number"]
    pub get_random: GetRandomBinding,
}

impl GroupBinding {
    pub fn new(
        transport: std::sync::Arc<dyn ::pv_group::client::Transport>,
        prefix: &str,
        config: &::pv_group::client::ClientConfig,
    ) -> Self {
        Self {
            exit: ::pv_group::client::Signal::new(transport.clone(), format!("{prefix}exit"), config),
            random1: ::pv_group::client::Signal::new(transport.clone(), format!("{prefix}random1"), config),
            random2: ::pv_group::client::Signal::new(transport.clone(), format!("{prefix}random2"), config),
            get_random: GetRandomBinding::new(transport.clone(), &format!("{prefix}get_random:"), config),
        }
    }
}
