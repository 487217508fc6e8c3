//! Shared gateway context: the registry, the collaborators, and the
//! process-lifetime proxy cache.
//!
//! The context replaces any global state; several independent contexts (and
//! therefore registries and caches) can coexist in one process, which is what
//! the tests rely on.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::mock::{self, MockEngine};
use crate::proxy::{Proxy, ProxyError, Transport};
use crate::registry::ProfileRegistry;

pub struct GatewayContext {
    registry: Arc<ProfileRegistry>,
    engine: Arc<dyn MockEngine>,
    transport: Arc<dyn Transport>,
    proxies: RwLock<HashMap<String, Arc<Proxy>>>,
}

impl GatewayContext {
    /// Build a context with the engine named by the registry's configuration.
    pub fn new(registry: ProfileRegistry, transport: Arc<dyn Transport>) -> Self {
        let engine = mock::engine_by_name(registry.engine());
        Self::with_engine(registry, engine, transport)
    }

    /// Build a context with an explicitly injected engine.
    pub fn with_engine(
        registry: ProfileRegistry,
        engine: Arc<dyn MockEngine>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        GatewayContext {
            registry: Arc::new(registry),
            engine,
            transport,
            proxies: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Resolve the proxy for an interface id, constructing and caching it on
    /// first use. The cache is write-once per id: profiles are immutable
    /// after load, so a cached proxy can never go stale.
    pub fn proxy(&self, interface_id: &str) -> Result<Arc<Proxy>, ProxyError> {
        if let Some(proxy) = self.proxies.read().get(interface_id) {
            return Ok(Arc::clone(proxy));
        }

        let profile = self
            .registry
            .get_profile(interface_id)
            .ok_or_else(|| ProxyError::UnknownInterface(interface_id.to_string()))?
            .clone();
        let proxy = Arc::new(Proxy::new(
            profile,
            Arc::clone(&self.registry),
            Arc::clone(&self.engine),
            Arc::clone(&self.transport),
        )?);

        // Two racing first resolutions construct identical proxies; the
        // first insert wins and both callers observe the same instance.
        let mut proxies = self.proxies.write();
        Ok(Arc::clone(
            proxies
                .entry(interface_id.to_string())
                .or_insert(proxy),
        ))
    }
}
