//! RAII ownership of native engine handles.
//!
//! Each guard releases its handle exactly once: on drop, unless ownership was
//! handed back with `into_raw`. Connections keep their context alive through
//! an `Arc`, so a context is never freed underneath a live connection.

use std::sync::Arc;

use tracing::debug;

use crate::ports::{ConnectionHandle, ContextHandle, EngineGateway, GatewayError, SessionHandle};

/// Owned engine context.
pub struct EngineContext<G: EngineGateway + ?Sized> {
    gateway: Arc<G>,
    handle: ContextHandle,
}

impl<G: EngineGateway + ?Sized> EngineContext<G> {
    /// # Errors
    /// Propagates the gateway's allocation failure.
    pub fn new(gateway: Arc<G>) -> Result<Arc<Self>, GatewayError> {
        let handle = gateway.context_new()?;
        debug!(ctx = handle.raw(), "engine context created");
        Ok(Arc::new(Self { gateway, handle }))
    }

    #[must_use]
    pub fn handle(&self) -> ContextHandle {
        self.handle
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Scope sessions created under this context; resumption only matches
    /// sessions from the same id context.
    ///
    /// # Errors
    /// Propagates the gateway's rejection.
    pub fn set_session_id_context(&self, sid_ctx: &[u8]) -> Result<(), GatewayError> {
        self.gateway.set_session_id_context(self.handle, sid_ctx)
    }
}

impl<G: EngineGateway + ?Sized> Drop for EngineContext<G> {
    fn drop(&mut self) {
        debug!(ctx = self.handle.raw(), "engine context freed");
        self.gateway.context_free(self.handle);
    }
}

/// Owned connection; holds its context alive.
pub struct ConnectionGuard<G: EngineGateway + ?Sized> {
    context: Arc<EngineContext<G>>,
    handle: ConnectionHandle,
}

impl<G: EngineGateway + ?Sized> ConnectionGuard<G> {
    /// # Errors
    /// Propagates the gateway's allocation failure.
    pub fn new(context: Arc<EngineContext<G>>) -> Result<Self, GatewayError> {
        let handle = context.gateway.connection_new(context.handle)?;
        Ok(Self { context, handle })
    }

    #[must_use]
    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<G> {
        &self.context.gateway
    }

    #[must_use]
    pub fn context(&self) -> &Arc<EngineContext<G>> {
        &self.context
    }
}

impl<G: EngineGateway + ?Sized> Drop for ConnectionGuard<G> {
    fn drop(&mut self) {
        self.context.gateway.connection_free(self.handle);
    }
}

/// Borrowed-gateway guard for a session handle.
pub struct SessionGuard<'g, G: EngineGateway + ?Sized> {
    gateway: &'g G,
    handle: SessionHandle,
    armed: bool,
}

impl<'g, G: EngineGateway + ?Sized> SessionGuard<'g, G> {
    pub fn new(gateway: &'g G, handle: SessionHandle) -> Self {
        Self {
            gateway,
            handle,
            armed: true,
        }
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// Give up ownership without freeing.
    #[must_use]
    pub fn into_raw(mut self) -> SessionHandle {
        self.armed = false;
        self.handle
    }
}

impl<G: EngineGateway + ?Sized> Drop for SessionGuard<'_, G> {
    fn drop(&mut self) {
        if self.armed {
            self.gateway.session_free(self.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedGateway;

    #[test]
    fn connection_keeps_context_alive() {
        let gw = Arc::new(ScriptedGateway::new());
        let ctx = EngineContext::new(gw.clone()).unwrap();
        let conn = ConnectionGuard::new(ctx.clone()).unwrap();
        drop(ctx);
        assert_eq!(gw.live_contexts(), 1);
        assert_eq!(gw.live_connections(), 1);
        drop(conn);
        assert_eq!(gw.live_connections(), 0);
        assert_eq!(gw.live_contexts(), 0);
    }

    #[test]
    fn session_guard_frees_unless_taken() {
        let gw = ScriptedGateway::new();
        let a = gw.session_decode(b"first").unwrap();
        let b = gw.session_decode(b"second").unwrap();
        drop(SessionGuard::new(&gw, a));
        assert_eq!(gw.live_sessions(), 1);
        let raw = SessionGuard::new(&gw, b).into_raw();
        assert_eq!(raw, b);
        assert_eq!(gw.live_sessions(), 1);
        gw.session_free(raw);
        assert_eq!(gw.live_sessions(), 0);
    }
}
