//! Recording mock providers for lifecycle tests.

use async_trait::async_trait;
use docsync_core::{
    ActiveProvider, DocId, LazyProvider, PassiveProvider, Provider, ProviderError, provider_error,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Ordered record of every provider call, shared by all mocks of a test.
#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// Holds gated providers back until opened.
pub struct Gate {
    tx: watch::Sender<bool>,
}

impl Gate {
    pub fn closed() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Provider whose capabilities are chosen per test.
///
/// Calls are recorded as `"{name}.sync"`, `"{name}.ready"`,
/// `"{name}.connect"`, `"{name}.disconnect"`, and for lazy providers
/// `"{name}.connect({doc})"` / `"{name}.disconnect({doc})"`.
pub struct MockProvider {
    name: String,
    log: Arc<CallLog>,
    is_active: bool,
    is_passive: bool,
    is_lazy: bool,
    gate: Option<watch::Receiver<bool>>,
    fail_ready: AtomicBool,
    fail_connect: AtomicBool,
    fail_disconnect: AtomicBool,
}

impl MockProvider {
    pub fn new(name: &str, log: &Arc<CallLog>) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            is_active: false,
            is_passive: false,
            is_lazy: false,
            gate: None,
            fail_ready: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
        }
    }

    pub fn with_active(mut self) -> Self {
        self.is_active = true;
        self
    }

    pub fn with_passive(mut self) -> Self {
        self.is_passive = true;
        self
    }

    pub fn with_lazy(mut self) -> Self {
        self.is_lazy = true;
        self
    }

    /// Blocks readiness and connects until `gate` is opened.
    pub fn with_gate(mut self, gate: &Gate) -> Self {
        self.gate = Some(gate.subscribe());
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn into_dyn(self) -> Arc<dyn Provider> {
        Arc::new(self)
    }

    pub fn set_fail_ready(&self, fail: bool) {
        self.fail_ready.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    async fn pass_gate(&self) -> Result<(), ProviderError> {
        if let Some(gate) = &self.gate {
            let mut rx = gate.clone();
            if rx.wait_for(|open| *open).await.is_err() {
                return Err(provider_error(std::io::Error::other("gate dropped")));
            }
        }
        Ok(())
    }

    fn outcome(&self, flag: &AtomicBool, what: &str) -> Result<(), ProviderError> {
        if flag.load(Ordering::SeqCst) {
            return Err(provider_error(std::io::Error::other(format!(
                "{} {} failed",
                self.name, what
            ))));
        }
        Ok(())
    }
}

/// Upcasts a mock kept for later inspection.
pub fn shared(provider: &Arc<MockProvider>) -> Arc<dyn Provider> {
    Arc::clone(provider) as Arc<dyn Provider>
}

#[async_trait]
impl ActiveProvider for MockProvider {
    fn sync(&self) {
        self.log.record(format!("{}.sync", self.name));
    }

    async fn when_ready(&self) -> Result<(), ProviderError> {
        self.pass_gate().await?;
        self.outcome(&self.fail_ready, "ready")?;
        self.log.record(format!("{}.ready", self.name));
        Ok(())
    }
}

#[async_trait]
impl PassiveProvider for MockProvider {
    async fn connect(&self) -> Result<(), ProviderError> {
        self.pass_gate().await?;
        self.log.record(format!("{}.connect", self.name));
        self.outcome(&self.fail_connect, "connect")
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.log.record(format!("{}.disconnect", self.name));
        self.outcome(&self.fail_disconnect, "disconnect")
    }
}

#[async_trait]
impl LazyProvider for MockProvider {
    async fn connect(&self, doc: &DocId) -> Result<(), ProviderError> {
        self.pass_gate().await?;
        self.log.record(format!("{}.connect({})", self.name, doc));
        self.outcome(&self.fail_connect, "connect")
    }

    async fn disconnect(&self, doc: &DocId) -> Result<(), ProviderError> {
        self.log.record(format!("{}.disconnect({})", self.name, doc));
        self.outcome(&self.fail_disconnect, "disconnect")
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn active(&self) -> Option<&dyn ActiveProvider> {
        self.is_active.then_some(self as &dyn ActiveProvider)
    }

    fn passive(&self) -> Option<&dyn PassiveProvider> {
        self.is_passive.then_some(self as &dyn PassiveProvider)
    }

    fn lazy(&self) -> Option<&dyn LazyProvider> {
        self.is_lazy.then_some(self as &dyn LazyProvider)
    }
}
