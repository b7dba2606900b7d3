use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use tracing::{debug, info, warn};

use crate::{
    bidir::{
        connection::{Connection, Role},
        message::{
            encode_close_connection, encode_reply, encode_request, Message, MessageBody,
            ReplyHeader, ReplyStatus, RequestHeader,
        },
        oneshot::{oneshot, OneshotReceiver, OneshotSender},
        request_id::RequestIdGenerator,
    },
    cdr::value::CdrCodec,
    error::{OrbError, OrbResult},
    reference::{ConnectionId, ObjectId, ObjectReference},
    xtypes::{dynamic_value::DynamicValue, type_descriptor::TypeDescriptor},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Established,
    /// The peer has sent at least one reference bound to this connection.
    HasInboundRefs,
    Closed,
}

/// A request received from the peer, to be answered with
/// [`BidirRouter::reply`] when it expects a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    header: RequestHeader,
    body: MessageBody,
}

impl IncomingRequest {
    pub fn request_id(&self) -> u32 {
        self.header.request_id
    }

    pub fn response_expected(&self) -> bool {
        self.header.response_expected
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.header.object_id
    }

    pub fn operation(&self) -> &str {
        &self.header.operation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingReply {
    connection_id: ConnectionId,
    header: ReplyHeader,
    body: MessageBody,
}

impl IncomingReply {
    pub fn request_id(&self) -> u32 {
        self.header.request_id
    }

    pub fn reply_status(&self) -> ReplyStatus {
        self.header.reply_status
    }

    /// Connection the reply arrived on.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

/// An outstanding request. Dropping it, or the future of
/// [`PendingReply::wait`], removes its correlation entry so a later reply is
/// discarded.
pub struct PendingReply {
    request_id: u32,
    receiver: OneshotReceiver<OrbResult<IncomingReply>>,
    state: Weak<Mutex<RouterState>>,
}

impl PendingReply {
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Resolves with the reply carrying this request's identifier, whatever
    /// the order replies arrive in. Fails with [`OrbError::ConnectionLost`]
    /// when the connection closes first.
    pub async fn wait(mut self) -> OrbResult<IncomingReply> {
        (&mut self.receiver).await?
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            // The sender is dropped once the router state is unlocked
            let sender = lock_state(&state).pending.remove(&self.request_id);
            drop(sender);
        }
    }
}

fn lock_state(state: &Mutex<RouterState>) -> MutexGuard<'_, RouterState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct RouterState {
    state: ConnectionState,
    request_ids: RequestIdGenerator,
    pending: HashMap<u32, OneshotSender<OrbResult<IncomingReply>>>,
}

/// Routes requests and replies over one established duplex connection.
///
/// Both ends may originate requests. Invoking a reference bound to this
/// connection writes the request to the same connection the reference came
/// in on, which is what lets a request handler call back whoever just
/// called it.
pub struct BidirRouter<C> {
    connection_id: ConnectionId,
    codec: CdrCodec,
    connection: async_lock::Mutex<C>,
    state: Arc<Mutex<RouterState>>,
}

impl<C: Connection> BidirRouter<C> {
    /// `codec` carries the settings negotiated for the connection. It is
    /// bound to `connection_id` so every reference it decodes is too.
    pub fn new(connection: C, connection_id: ConnectionId, role: Role, codec: CdrCodec) -> Self {
        info!(%connection_id, ?role, "Connection attached");
        Self {
            connection_id,
            codec: codec.bound_to(connection_id),
            connection: async_lock::Mutex::new(connection),
            state: Arc::new(Mutex::new(RouterState {
                state: ConnectionState::Established,
                request_ids: RequestIdGenerator::new(role),
                pending: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        lock_state(&self.state)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn codec(&self) -> &CdrCodec {
        &self.codec
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Sends a request and waits for its reply.
    #[tracing::instrument(skip(self, arguments), fields(connection_id = %self.connection_id))]
    pub async fn invoke(
        &self,
        reference: &ObjectReference,
        operation: &str,
        arguments: &[DynamicValue],
    ) -> OrbResult<IncomingReply> {
        self.send_request(reference, operation, arguments)
            .await?
            .wait()
            .await
    }

    /// Sends a request and registers its correlation entry, leaving the wait
    /// to the caller. Fails with [`OrbError::ForeignConnection`] when the
    /// reference is not bound to this connection.
    #[tracing::instrument(skip(self, arguments), fields(connection_id = %self.connection_id))]
    pub async fn send_request(
        &self,
        reference: &ObjectReference,
        operation: &str,
        arguments: &[DynamicValue],
    ) -> OrbResult<PendingReply> {
        if reference.is_nil() {
            return Err(OrbError::PreconditionNotMet(
                "a nil reference cannot be invoked".to_string(),
            ));
        }
        if reference.connection_id() != Some(self.connection_id) {
            return Err(OrbError::ForeignConnection);
        }
        let (request_id, receiver) = {
            let mut state = self.lock();
            if state.state == ConnectionState::Closed {
                return Err(OrbError::ConnectionLost);
            }
            let request_id = state.request_ids.next_id()?;
            let (sender, receiver) = oneshot();
            // Registered before sending so an early reply finds its entry
            state.pending.insert(request_id, sender);
            (request_id, receiver)
        };
        let header = RequestHeader {
            request_id,
            response_expected: true,
            object_id: reference.object_id().clone(),
            operation: operation.to_string(),
        };
        let sent = match encode_request(&self.codec, &header, arguments) {
            Ok(message) => self.connection.lock().await.send(message).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            self.lock().pending.remove(&request_id);
            return Err(e);
        }
        debug!(request_id, operation, "Request sent");
        Ok(PendingReply {
            request_id,
            receiver,
            state: Arc::downgrade(&self.state),
        })
    }

    /// Removes the correlation entry of `request_id`. Its waiter fails with
    /// [`OrbError::PreconditionNotMet`] and a reply arriving later is
    /// discarded. Returns whether an entry was registered.
    pub fn unregister(&self, request_id: u32) -> bool {
        let sender = self.lock().pending.remove(&request_id);
        match sender {
            Some(sender) => {
                sender.send(Err(OrbError::PreconditionNotMet(format!(
                    "request {request_id} was unregistered"
                ))));
                true
            }
            None => false,
        }
    }

    /// Dispatches one received message. Replies are delivered to their
    /// waiters; a request is handed back to the caller to execute.
    ///
    /// A message whose preamble disagrees with the connection settings
    /// closes the connection.
    #[tracing::instrument(skip(self, message), fields(connection_id = %self.connection_id))]
    pub fn handle_incoming(&self, message: Vec<u8>) -> OrbResult<Option<IncomingRequest>> {
        if self.state() == ConnectionState::Closed {
            return Err(OrbError::ConnectionLost);
        }
        let message = match Message::parse(message, self.codec.settings()) {
            Ok(message) => message,
            Err(e @ OrbError::EncodingMismatch(_)) => {
                warn!(error = %e, "Closing connection");
                self.mark_closed();
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        match message {
            Message::Request { header, body } => {
                debug!(request_id = header.request_id, operation = %header.operation, "Request received");
                Ok(Some(IncomingRequest { header, body }))
            }
            Message::Reply { header, body } => {
                let sender = self.lock().pending.remove(&header.request_id);
                match sender {
                    Some(sender) => sender.send(Ok(IncomingReply {
                        connection_id: self.connection_id,
                        header,
                        body,
                    })),
                    None => debug!(
                        request_id = header.request_id,
                        "Discarding reply without a pending request"
                    ),
                }
                Ok(None)
            }
            Message::CloseConnection => {
                info!("Peer closed the connection");
                self.mark_closed();
                Ok(None)
            }
        }
    }

    /// Sends the reply to a request received on this connection.
    #[tracing::instrument(skip(self, results), fields(connection_id = %self.connection_id))]
    pub async fn reply(
        &self,
        request_id: u32,
        reply_status: ReplyStatus,
        results: &[DynamicValue],
    ) -> OrbResult<()> {
        if self.state() == ConnectionState::Closed {
            return Err(OrbError::ConnectionLost);
        }
        let header = ReplyHeader {
            request_id,
            reply_status,
        };
        let message = encode_reply(&self.codec, &header, results)?;
        self.connection.lock().await.send(message).await?;
        debug!(request_id, ?reply_status, "Reply sent");
        Ok(())
    }

    /// Decodes the arguments of a request received on this connection. The
    /// references among them are bound to it.
    pub fn decode_arguments(
        &self,
        request: &IncomingRequest,
        types: &[TypeDescriptor],
    ) -> OrbResult<Vec<DynamicValue>> {
        let arguments = request.body.decode(&self.codec, types)?;
        self.note_references(&arguments);
        Ok(arguments)
    }

    pub fn decode_results(
        &self,
        reply: &IncomingReply,
        types: &[TypeDescriptor],
    ) -> OrbResult<Vec<DynamicValue>> {
        let results = reply.body.decode(&self.codec, types)?;
        self.note_references(&results);
        Ok(results)
    }

    fn note_references(&self, values: &[DynamicValue]) {
        if !values.iter().any(|v| v.storage().contains_reference()) {
            return;
        }
        let mut state = self.lock();
        if state.state == ConnectionState::Established {
            state.state = ConnectionState::HasInboundRefs;
            info!(connection_id = %self.connection_id, "Peer sent a reference bound to this connection");
        }
    }

    /// Tells the peer the connection is closing and fails every pending
    /// request with [`OrbError::ConnectionLost`].
    #[tracing::instrument(skip(self), fields(connection_id = %self.connection_id))]
    pub async fn close(&self) -> OrbResult<()> {
        if self.state() == ConnectionState::Closed {
            return Ok(());
        }
        self.mark_closed();
        let message = encode_close_connection(self.codec.settings());
        self.connection.lock().await.send(message).await
    }

    fn mark_closed(&self) {
        let pending = {
            let mut state = self.lock();
            state.state = ConnectionState::Closed;
            core::mem::take(&mut state.pending)
        };
        if !pending.is_empty() {
            info!(
                connection_id = %self.connection_id,
                outstanding = pending.len(),
                "Failing requests outstanding at close"
            );
        }
        // Dropping the senders resolves the waiters with ConnectionLost
        drop(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bidir::message::MESSAGE_PREAMBLE_LENGTH,
        cdr::endianness::CodecSettings,
        xtypes::type_support::TypeSupport,
    };

    #[derive(Clone, Default)]
    struct RecordingConnection {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Connection for RecordingConnection {
        async fn send(&mut self, message: Vec<u8>) -> OrbResult<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    const ID: ConnectionId = ConnectionId::new(1);

    fn router() -> (BidirRouter<RecordingConnection>, RecordingConnection) {
        let connection = RecordingConnection::default();
        let codec = CdrCodec::new(CodecSettings::default());
        (
            BidirRouter::new(connection.clone(), ID, Role::Initiator, codec),
            connection,
        )
    }

    fn reply_bytes(request_id: u32, value: i32) -> Vec<u8> {
        encode_reply(
            &CdrCodec::new(CodecSettings::default()),
            &ReplyHeader {
                request_id,
                reply_status: ReplyStatus::NoException,
            },
            &[DynamicValue::from_value(value)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn replies_in_reverse_order_reach_their_own_request() {
        let (router, connection) = router();
        let target = ObjectReference::bound("Echo", "echo", ID);
        let first = router.send_request(&target, "a", &[]).await.unwrap();
        let second = router.send_request(&target, "b", &[]).await.unwrap();
        assert_eq!((first.request_id(), second.request_id()), (1, 3));
        assert_eq!(connection.sent.lock().unwrap().len(), 2);

        router.handle_incoming(reply_bytes(3, 30)).unwrap();
        router.handle_incoming(reply_bytes(1, 10)).unwrap();

        let first = first.wait().await.unwrap();
        let second = second.wait().await.unwrap();
        let long = [i32::type_descriptor()];
        assert_eq!(router.decode_results(&first, &long).unwrap()[0].extract::<i32>(), Ok(10));
        assert_eq!(router.decode_results(&second, &long).unwrap()[0].extract::<i32>(), Ok(30));
    }

    #[tokio::test]
    async fn foreign_reference_is_refused() {
        let (router, connection) = router();
        let elsewhere = ObjectReference::bound("Echo", "echo", ConnectionId::new(2));
        assert_eq!(
            router.send_request(&elsewhere, "a", &[]).await.err(),
            Some(OrbError::ForeignConnection)
        );
        let unbound = ObjectReference::new("Echo", "echo");
        assert_eq!(
            router.send_request(&unbound, "a", &[]).await.err(),
            Some(OrbError::ForeignConnection)
        );
        assert!(connection.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_fails_outstanding_requests() {
        let (router, connection) = router();
        let target = ObjectReference::bound("Echo", "echo", ID);
        let pending = router.send_request(&target, "a", &[]).await.unwrap();
        router.close().await.unwrap();
        assert_eq!(pending.wait().await, Err(OrbError::ConnectionLost));
        assert_eq!(router.state(), ConnectionState::Closed);
        assert_eq!(
            connection.sent.lock().unwrap().last().map(|m| m.len()),
            Some(MESSAGE_PREAMBLE_LENGTH)
        );
        assert_eq!(
            router.send_request(&target, "b", &[]).await.err(),
            Some(OrbError::ConnectionLost)
        );
    }

    #[tokio::test]
    async fn unregistered_request_ignores_its_late_reply() {
        let (router, _connection) = router();
        let target = ObjectReference::bound("Echo", "echo", ID);
        let dropped = router.send_request(&target, "a", &[]).await.unwrap();
        let kept = router.send_request(&target, "b", &[]).await.unwrap();
        assert!(router.unregister(dropped.request_id()));
        assert!(!router.unregister(dropped.request_id()));
        assert!(matches!(
            dropped.wait().await,
            Err(OrbError::PreconditionNotMet(_))
        ));

        assert_eq!(router.handle_incoming(reply_bytes(1, 10)), Ok(None));
        router.handle_incoming(reply_bytes(3, 30)).unwrap();
        assert_eq!(kept.wait().await.unwrap().request_id(), 3);
    }

    #[tokio::test]
    async fn dropped_pending_reply_releases_its_entry() {
        let (router, _connection) = router();
        let target = ObjectReference::bound("Echo", "echo", ID);
        let pending = router.send_request(&target, "a", &[]).await.unwrap();
        let request_id = pending.request_id();
        drop(pending);
        assert!(!router.unregister(request_id));
        assert_eq!(router.handle_incoming(reply_bytes(request_id, 10)), Ok(None));

        let pending = router.send_request(&target, "b", &[]).await.unwrap();
        let request_id = pending.request_id();
        let wait = pending.wait();
        drop(wait);
        assert!(!router.unregister(request_id));
    }

    #[tokio::test]
    async fn nil_reference_cannot_be_invoked() {
        let (router, connection) = router();
        assert!(matches!(
            router.send_request(&ObjectReference::nil(), "a", &[]).await,
            Err(OrbError::PreconditionNotMet(_))
        ));
        assert!(connection.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mismatched_preamble_closes_the_connection() {
        let (router, _connection) = router();
        let target = ObjectReference::bound("Echo", "echo", ID);
        let pending = router.send_request(&target, "a", &[]).await.unwrap();
        let mut message = reply_bytes(1, 10);
        message[0] = 0;
        assert!(matches!(
            router.handle_incoming(message),
            Err(OrbError::EncodingMismatch(_))
        ));
        assert_eq!(router.state(), ConnectionState::Closed);
        assert_eq!(pending.wait().await, Err(OrbError::ConnectionLost));
        assert_eq!(
            router.handle_incoming(reply_bytes(1, 10)),
            Err(OrbError::ConnectionLost)
        );
    }

    #[test]
    fn inbound_reference_changes_state() {
        let (router, _connection) = router();
        let request = encode_request(
            &CdrCodec::new(CodecSettings::default()),
            &RequestHeader {
                request_id: 2,
                response_expected: true,
                object_id: ObjectId::from("server"),
                operation: "register".to_string(),
            },
            &[DynamicValue::from_value(ObjectReference::new("Callback", "cb"))],
        )
        .unwrap();
        let request = router.handle_incoming(request).unwrap().unwrap();
        assert_eq!(request.operation(), "register");
        assert_eq!(router.state(), ConnectionState::Established);

        let arguments = router
            .decode_arguments(&request, &[ObjectReference::type_descriptor()])
            .unwrap();
        assert_eq!(
            arguments[0].extract::<ObjectReference>().unwrap().connection_id(),
            Some(ID)
        );
        assert_eq!(router.state(), ConnectionState::HasInboundRefs);
    }
}
