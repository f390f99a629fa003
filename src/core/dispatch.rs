//! Inbound message dispatch
//!
//! Each transport carries at most one registered handler. Re-registration
//! overwrites the previous handler; dispatch is a no-op until one is set.

use std::sync::Arc;

use tokio::sync::RwLock;

/// Handler for line-oriented text transports (Bluetooth Classic, BLE)
pub type TextHandler = dyn Fn(&str) + Send + Sync;

/// Handler for MQTT messages: topic plus raw payload
pub type TopicHandler = dyn Fn(&str, &[u8]) + Send + Sync;

/// Single-slot handler registration for one transport
///
/// Lives as long as its owning session manager; there is no explicit
/// teardown beyond dropping the manager.
pub struct HandlerSlot<H: ?Sized> {
    inner: RwLock<Option<Arc<H>>>,
}

impl<H: ?Sized> HandlerSlot<H> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Register a handler, replacing any previous one
    pub async fn register(&self, handler: Arc<H>) {
        *self.inner.write().await = Some(handler);
    }

    pub async fn is_registered(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Current handler, if any
    pub async fn get(&self) -> Option<Arc<H>> {
        self.inner.read().await.clone()
    }
}

impl<H: ?Sized> Default for HandlerSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}
