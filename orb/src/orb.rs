use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tracing::info;

use crate::{
    bidir::{
        connection::{Connection, ConnectionResolver, Role},
        router::{BidirRouter, IncomingReply},
    },
    cdr::value::CdrCodec,
    configuration::OrbConfiguration,
    error::{OrbError, OrbResult},
    reference::{ConnectionId, ObjectReference},
    xtypes::{dynamic_value::DynamicValue, type_descriptor::TypeDescriptor},
};

/// The context connections and references live in. Owns the configuration
/// and the routers of every attached connection.
///
/// Several independent instances may coexist in one process.
pub struct Orb<C> {
    configuration: OrbConfiguration,
    routers: Mutex<HashMap<ConnectionId, Arc<BidirRouter<C>>>>,
    next_connection_id: AtomicU64,
}

impl<C: Connection> Orb<C> {
    pub fn new(configuration: OrbConfiguration) -> Self {
        Self {
            configuration,
            routers: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
        }
    }

    pub fn configuration(&self) -> &OrbConfiguration {
        &self.configuration
    }

    /// Codec following this ORB's configuration, bound to no connection.
    pub fn codec(&self) -> CdrCodec {
        CdrCodec::from_configuration(&self.configuration)
    }

    fn routers(&self) -> MutexGuard<'_, HashMap<ConnectionId, Arc<BidirRouter<C>>>> {
        self.routers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes over an established connection and gives it a fresh identity.
    pub fn attach(&self, connection: C, role: Role) -> Arc<BidirRouter<C>> {
        let connection_id =
            ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let router = Arc::new(BidirRouter::new(
            connection,
            connection_id,
            role,
            self.codec(),
        ));
        self.routers().insert(connection_id, router.clone());
        router
    }

    /// Forgets a connection. References bound to it resolve a new connection
    /// from then on.
    pub fn detach(&self, connection_id: ConnectionId) -> Option<Arc<BidirRouter<C>>> {
        let router = self.routers().remove(&connection_id);
        if router.is_some() {
            info!(%connection_id, "Connection detached");
        }
        router
    }

    pub fn router(&self, connection_id: ConnectionId) -> Option<Arc<BidirRouter<C>>> {
        self.routers().get(&connection_id).cloned()
    }

    /// Invokes `operation` on the object `reference` designates.
    ///
    /// A reference bound to an attached connection is invoked over that
    /// connection, closed or not. Otherwise `resolver` establishes a new
    /// connection, which is attached, and the request goes through a copy
    /// of the reference bound to it.
    #[tracing::instrument(skip(self, arguments, resolver))]
    pub async fn invoke<R: ConnectionResolver<C>>(
        &self,
        reference: &ObjectReference,
        operation: &str,
        arguments: &[DynamicValue],
        resolver: &R,
    ) -> OrbResult<IncomingReply> {
        if reference.is_nil() {
            return Err(OrbError::PreconditionNotMet(
                "a nil reference cannot be invoked".to_string(),
            ));
        }
        if let Some(router) = reference.connection_id().and_then(|id| self.router(id)) {
            return router.invoke(reference, operation, arguments).await;
        }
        let connection = resolver.resolve(reference).await?;
        let router = self.attach(connection, Role::Initiator);
        let rebound = reference.rebound_to(router.connection_id());
        router.invoke(&rebound, operation, arguments).await
    }

    /// Decodes the results of a reply through the router it arrived on.
    pub fn decode_results(
        &self,
        reply: &IncomingReply,
        types: &[TypeDescriptor],
    ) -> OrbResult<Vec<DynamicValue>> {
        self.router(reply.connection_id())
            .ok_or(OrbError::ConnectionLost)?
            .decode_results(reply, types)
    }
}
